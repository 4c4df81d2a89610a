//! CRM service: customers, interactions, dashboard metrics and AI chat

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use shared::models::{Customer, DashboardMetrics, Interaction, ProfileUpdateJob};
use shared::validation::next_display_id;

use crate::error::{AppError, AppResult};
use crate::external::{ChatMessage, GeminiClient};

const CUSTOMER_COLUMNS: &str = "customer_id, customer_name, display_id, sales_stage, \
     latest_profile_text, profile_updated_at, created_at, updated_at";

const INTERACTION_COLUMNS: &str =
    "id, customer_id, user_id, input_text, ai_response, file_url, file_type, tds_id, \
     created_at, updated_at";

const JOB_COLUMNS: &str = "id, customer_id, interaction_id, status, priority, run_after, \
     attempts, last_error, created_at, updated_at";

/// CRM service for customer management and AI-assisted workflows
#[derive(Clone)]
pub struct CrmService {
    db: PgPool,
    gemini: GeminiClient,
}

/// Input for creating a customer
#[derive(Debug, Deserialize)]
pub struct CreateCustomerInput {
    pub customer_name: String,
    pub display_id: Option<String>,
}

/// Input for updating a customer (partial)
#[derive(Debug, Default, Deserialize)]
pub struct UpdateCustomerInput {
    pub customer_name: Option<String>,
    pub display_id: Option<String>,
    pub sales_stage: Option<String>,
}

/// Input for recording an interaction
#[derive(Debug, Default, Deserialize)]
pub struct CreateInteractionInput {
    pub input_text: Option<String>,
    pub ai_response: Option<String>,
    pub file_url: Option<String>,
    pub file_type: Option<String>,
    pub tds_id: Option<Uuid>,
}

/// Input for updating an interaction (partial)
#[derive(Debug, Default, Deserialize)]
pub struct UpdateInteractionInput {
    pub input_text: Option<String>,
    pub ai_response: Option<String>,
    pub file_url: Option<String>,
    pub file_type: Option<String>,
    pub tds_id: Option<Uuid>,
}

/// Request body for AI chat with a customer
#[derive(Debug, Deserialize)]
pub struct CustomerChatRequest {
    pub input_text: String,
    pub tds_id: Option<Uuid>,
}

/// AI chat response, with the persisted interaction
#[derive(Debug, Serialize)]
pub struct CustomerChatResponse {
    pub answer: String,
    pub interaction: Interaction,
}

impl CrmService {
    /// Create a new CrmService instance
    pub fn new(db: PgPool, gemini: GeminiClient) -> Self {
        Self { db, gemini }
    }

    // =========================================================================
    // Customers
    // =========================================================================

    /// List customers, newest first
    pub async fn list_customers(&self, limit: i64, offset: i64) -> AppResult<Vec<Customer>> {
        let customers = sqlx::query_as::<_, Customer>(&format!(
            r#"
            SELECT {}
            FROM customers
            ORDER BY created_at DESC NULLS LAST
            LIMIT $1 OFFSET $2
            "#,
            CUSTOMER_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;
        Ok(customers)
    }

    /// Total customer count
    pub async fn count_customers(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }

    /// Search customers by name
    pub async fn search_customers(&self, query: &str, limit: i64) -> AppResult<Vec<Customer>> {
        let customers = sqlx::query_as::<_, Customer>(&format!(
            r#"
            SELECT {}
            FROM customers
            WHERE customer_name ILIKE '%' || $1 || '%'
            ORDER BY customer_name ASC
            LIMIT $2
            "#,
            CUSTOMER_COLUMNS
        ))
        .bind(query)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;
        Ok(customers)
    }

    /// Get a customer by id
    pub async fn get_customer(&self, customer_id: Uuid) -> AppResult<Customer> {
        sqlx::query_as::<_, Customer>(&format!(
            "SELECT {} FROM customers WHERE customer_id = $1",
            CUSTOMER_COLUMNS
        ))
        .bind(customer_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Customer".to_string()))
    }

    /// Create a customer, generating a display id when none was provided
    ///
    /// Rejects names that look like existing customers so duplicates get
    /// reviewed instead of silently multiplying.
    pub async fn create_customer(&self, input: CreateCustomerInput) -> AppResult<Customer> {
        let name = input.customer_name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::ValidationError(
                "customer_name must not be empty".to_string(),
            ));
        }

        let similar = self.similar_customers(&name, None).await?;
        if !similar.is_empty() {
            return Err(AppError::Conflict(format!(
                "Similar customers already exist. Please review before creating a new one: {}",
                similar[..similar.len().min(3)].join("; ")
            )));
        }

        let display_id = match input.display_id {
            Some(id) => id,
            None => self.generate_display_id().await?,
        };

        let customer = sqlx::query_as::<_, Customer>(&format!(
            r#"
            INSERT INTO customers (customer_name, display_id)
            VALUES ($1, $2)
            RETURNING {}
            "#,
            CUSTOMER_COLUMNS
        ))
        .bind(&name)
        .bind(&display_id)
        .fetch_one(&self.db)
        .await?;

        Ok(customer)
    }

    /// Update a customer
    pub async fn update_customer(
        &self,
        customer_id: Uuid,
        input: UpdateCustomerInput,
    ) -> AppResult<Customer> {
        let existing = self.get_customer(customer_id).await?;

        if let Some(new_name) = &input.customer_name {
            let similar = self.similar_customers(new_name, Some(customer_id)).await?;
            if !similar.is_empty() {
                return Err(AppError::Conflict(format!(
                    "Similar customer already exists: {}",
                    similar[0]
                )));
            }
        }

        let customer = sqlx::query_as::<_, Customer>(&format!(
            r#"
            UPDATE customers
            SET customer_name = $1, display_id = $2, sales_stage = $3, updated_at = NOW()
            WHERE customer_id = $4
            RETURNING {}
            "#,
            CUSTOMER_COLUMNS
        ))
        .bind(input.customer_name.unwrap_or(existing.customer_name))
        .bind(input.display_id.or(existing.display_id))
        .bind(input.sales_stage.or(existing.sales_stage))
        .bind(customer_id)
        .fetch_one(&self.db)
        .await?;

        Ok(customer)
    }

    /// Delete a customer; interactions cascade via the foreign key
    pub async fn delete_customer(&self, customer_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM customers WHERE customer_id = $1")
            .bind(customer_id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Customer".to_string()));
        }
        Ok(())
    }

    /// Names of existing customers whose name contains, or is contained in,
    /// the candidate name
    async fn similar_customers(
        &self,
        name: &str,
        exclude: Option<Uuid>,
    ) -> AppResult<Vec<String>> {
        let rows = sqlx::query_as::<_, (Uuid, String, Option<String>)>(
            r#"
            SELECT customer_id, customer_name, display_id
            FROM customers
            WHERE customer_name ILIKE '%' || $1 || '%'
               OR $1 ILIKE '%' || customer_name || '%'
            LIMIT 20
            "#,
        )
        .bind(name.trim())
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .filter(|(id, _, _)| Some(*id) != exclude)
            .map(|(_, customer_name, display_id)| {
                format!(
                    "{} (ID: {})",
                    customer_name,
                    display_id.unwrap_or_else(|| "—".to_string())
                )
            })
            .collect())
    }

    /// Generate the next `LC-YYYY-CUST-NNNN` display id for this year
    async fn generate_display_id(&self) -> AppResult<String> {
        let year = Utc::now().year();
        let existing: Vec<Option<String>> =
            sqlx::query_scalar("SELECT display_id FROM customers")
                .fetch_all(&self.db)
                .await?;

        Ok(next_display_id(
            year,
            existing.iter().filter_map(|id| id.as_deref()),
        ))
    }

    // =========================================================================
    // Interactions
    // =========================================================================

    /// List interactions for a customer, newest first
    pub async fn list_interactions(
        &self,
        customer_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Interaction>> {
        let interactions = sqlx::query_as::<_, Interaction>(&format!(
            r#"
            SELECT {}
            FROM interactions
            WHERE customer_id = $1
            ORDER BY created_at DESC NULLS LAST
            LIMIT $2 OFFSET $3
            "#,
            INTERACTION_COLUMNS
        ))
        .bind(customer_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;
        Ok(interactions)
    }

    /// Count interactions for a customer
    pub async fn count_interactions(&self, customer_id: Uuid) -> AppResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM interactions WHERE customer_id = $1")
                .bind(customer_id)
                .fetch_one(&self.db)
                .await?;
        Ok(count)
    }

    /// Record an interaction for a customer
    pub async fn create_interaction(
        &self,
        customer_id: Uuid,
        user_id: Option<Uuid>,
        input: CreateInteractionInput,
    ) -> AppResult<Interaction> {
        // The FK would catch this too; a typed error beats a 500
        self.get_customer(customer_id).await?;

        let interaction = sqlx::query_as::<_, Interaction>(&format!(
            r#"
            INSERT INTO interactions (customer_id, user_id, input_text, ai_response,
                                      file_url, file_type, tds_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            INTERACTION_COLUMNS
        ))
        .bind(customer_id)
        .bind(user_id)
        .bind(&input.input_text)
        .bind(&input.ai_response)
        .bind(&input.file_url)
        .bind(&input.file_type)
        .bind(input.tds_id)
        .fetch_one(&self.db)
        .await?;

        Ok(interaction)
    }

    /// Update an interaction
    pub async fn update_interaction(
        &self,
        interaction_id: Uuid,
        input: UpdateInteractionInput,
    ) -> AppResult<Interaction> {
        let existing = sqlx::query_as::<_, Interaction>(&format!(
            "SELECT {} FROM interactions WHERE id = $1",
            INTERACTION_COLUMNS
        ))
        .bind(interaction_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Interaction".to_string()))?;

        let interaction = sqlx::query_as::<_, Interaction>(&format!(
            r#"
            UPDATE interactions
            SET input_text = $1, ai_response = $2, file_url = $3, file_type = $4,
                tds_id = $5, updated_at = NOW()
            WHERE id = $6
            RETURNING {}
            "#,
            INTERACTION_COLUMNS
        ))
        .bind(input.input_text.or(existing.input_text))
        .bind(input.ai_response.or(existing.ai_response))
        .bind(input.file_url.or(existing.file_url))
        .bind(input.file_type.or(existing.file_type))
        .bind(input.tds_id.or(existing.tds_id))
        .bind(interaction_id)
        .fetch_one(&self.db)
        .await?;

        Ok(interaction)
    }

    /// Delete an interaction
    pub async fn delete_interaction(&self, interaction_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM interactions WHERE id = $1")
            .bind(interaction_id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Interaction".to_string()));
        }
        Ok(())
    }

    // =========================================================================
    // Dashboard
    // =========================================================================

    /// High-level CRM metrics
    pub async fn dashboard_metrics(&self) -> AppResult<DashboardMetrics> {
        let total_customers: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
            .fetch_one(&self.db)
            .await?;
        let total_interactions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM interactions")
            .fetch_one(&self.db)
            .await?;
        let customers_with_interactions: i64 =
            sqlx::query_scalar("SELECT COUNT(DISTINCT customer_id) FROM interactions")
                .fetch_one(&self.db)
                .await?;

        let stages = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT sales_stage, COUNT(*)
            FROM customers
            WHERE sales_stage IS NOT NULL
            GROUP BY sales_stage
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(DashboardMetrics {
            total_customers,
            total_interactions,
            customers_with_interactions,
            sales_stages_distribution: stages.into_iter().collect(),
        })
    }

    // =========================================================================
    // AI chat and profile refresh
    // =========================================================================

    /// Chat with the AI about a customer
    ///
    /// The exchange is persisted as an interaction and a profile refresh is
    /// queued so the customer's profile text catches up in the background.
    pub async fn chat_with_customer(
        &self,
        customer_id: Uuid,
        user_id: Option<Uuid>,
        request: CustomerChatRequest,
    ) -> AppResult<CustomerChatResponse> {
        let customer = self.get_customer(customer_id).await?;

        let mut context = format!("Customer: {}\n", customer.customer_name);
        if let Some(stage) = &customer.sales_stage {
            context.push_str(&format!("Sales stage: {}\n", stage));
        }
        if let Some(profile) = &customer.latest_profile_text {
            context.push_str(&format!("\nCustomer profile:\n{}\n", profile));
        }

        let recent = self.list_interactions(customer_id, 10, 0).await?;
        if !recent.is_empty() {
            context.push_str("\nRecent interactions (newest first):\n");
            for interaction in &recent {
                if let Some(q) = &interaction.input_text {
                    context.push_str(&format!("Q: {}\n", q));
                }
                if let Some(a) = &interaction.ai_response {
                    context.push_str(&format!("A: {}\n", a));
                }
            }
        }

        if let Some(tds_id) = request.tds_id {
            let specs: Option<Option<serde_json::Value>> =
                sqlx::query_scalar("SELECT specs FROM tds_data WHERE id = $1")
                    .bind(tds_id)
                    .fetch_optional(&self.db)
                    .await?;
            if let Some(Some(specs)) = specs {
                context.push_str(&format!("\nProduct TDS specs:\n{}\n", specs));
            }
        }

        let messages = [
            ChatMessage::system(
                "You are a sales assistant for a chemical trading company. \
                 Answer using the customer context below. Be concise and factual.",
            ),
            ChatMessage::system(context),
            ChatMessage::user(request.input_text.clone()),
        ];
        let answer = self.gemini.chat(&messages).await?;

        let interaction = self
            .create_interaction(
                customer_id,
                user_id,
                CreateInteractionInput {
                    input_text: Some(request.input_text),
                    ai_response: Some(answer.clone()),
                    tds_id: request.tds_id,
                    ..Default::default()
                },
            )
            .await?;

        self.enqueue_profile_refresh(customer_id, Some(interaction.id))
            .await?;

        Ok(CustomerChatResponse {
            answer,
            interaction,
        })
    }

    /// Queue a profile refresh for the background worker
    pub async fn enqueue_profile_refresh(
        &self,
        customer_id: Uuid,
        interaction_id: Option<Uuid>,
    ) -> AppResult<ProfileUpdateJob> {
        self.get_customer(customer_id).await?;

        let job = sqlx::query_as::<_, ProfileUpdateJob>(&format!(
            r#"
            INSERT INTO profile_update_jobs (customer_id, interaction_id, status, run_after)
            VALUES ($1, $2, 'queued', NOW())
            RETURNING {}
            "#,
            JOB_COLUMNS
        ))
        .bind(customer_id)
        .bind(interaction_id)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(customer_id = %customer_id, job_id = %job.id, "queued profile refresh");
        Ok(job)
    }
}
