//! Sales pipeline service: deal records, stage management and forecasting

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use shared::models::{Currency, Forex, PipelineForecast, PipelineStage, SalesPipeline, Unit};
use shared::validation;

use crate::error::{AppError, AppResult};
use crate::external::{ChatMessage, GeminiClient};

const PIPELINE_COLUMNS: &str = "id, customer_id, tds_id, chemical_type_id, stage, amount, \
     expected_close_date, close_reason, lead_source, contact_per_lead, business_model, unit, \
     unit_price, currency, forex, business_unit, incoterm, metadata, created_at, updated_at";

/// Sales pipeline service
#[derive(Clone)]
pub struct PipelineService {
    db: PgPool,
    gemini: GeminiClient,
}

/// Input for creating a pipeline record
#[derive(Debug, Deserialize)]
pub struct CreatePipelineInput {
    pub customer_id: Uuid,
    pub tds_id: Option<Uuid>,
    pub chemical_type_id: Option<Uuid>,
    pub stage: PipelineStage,
    pub amount: Option<Decimal>,
    pub expected_close_date: Option<NaiveDate>,
    pub close_reason: Option<String>,
    pub lead_source: Option<String>,
    pub contact_per_lead: Option<String>,
    pub business_model: Option<String>,
    pub unit: Option<Unit>,
    pub unit_price: Option<Decimal>,
    pub currency: Option<Currency>,
    pub forex: Option<Forex>,
    pub business_unit: Option<String>,
    pub incoterm: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Input for updating a pipeline record (partial)
#[derive(Debug, Default, Deserialize)]
pub struct UpdatePipelineInput {
    pub tds_id: Option<Uuid>,
    pub chemical_type_id: Option<Uuid>,
    pub stage: Option<PipelineStage>,
    pub amount: Option<Decimal>,
    pub expected_close_date: Option<NaiveDate>,
    pub close_reason: Option<String>,
    pub lead_source: Option<String>,
    pub contact_per_lead: Option<String>,
    pub business_model: Option<String>,
    pub unit: Option<Unit>,
    pub unit_price: Option<Decimal>,
    pub currency: Option<Currency>,
    pub forex: Option<Forex>,
    pub business_unit: Option<String>,
    pub incoterm: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Input for advancing a pipeline stage
#[derive(Debug, Deserialize)]
pub struct AdvanceStageInput {
    pub stage: PipelineStage,
    pub close_reason: Option<String>,
}

/// Pipeline listing filters
#[derive(Debug, Default, Deserialize)]
pub struct PipelineFilter {
    pub customer_id: Option<Uuid>,
    pub stage: Option<PipelineStage>,
    pub tds_id: Option<Uuid>,
}

/// Lead info pulled from interaction history by the AI
#[derive(Debug, Default, Deserialize)]
struct ExtractedLeadInfo {
    lead_source: Option<String>,
    contact_per_lead: Option<String>,
}

impl PipelineService {
    /// Create a new PipelineService instance
    pub fn new(db: PgPool, gemini: GeminiClient) -> Self {
        Self { db, gemini }
    }

    /// List pipeline records, newest first
    pub async fn list_pipelines(
        &self,
        filter: &PipelineFilter,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<SalesPipeline>> {
        let mut qb = QueryBuilder::new(format!(
            "SELECT {} FROM sales_pipeline WHERE 1=1",
            PIPELINE_COLUMNS
        ));
        Self::push_filters(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC NULLS LAST LIMIT ");
        qb.push_bind(limit);
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let pipelines = qb.build_query_as().fetch_all(&self.db).await?;
        Ok(pipelines)
    }

    /// Count pipeline records matching the filters
    pub async fn count_pipelines(&self, filter: &PipelineFilter) -> AppResult<i64> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM sales_pipeline WHERE 1=1");
        Self::push_filters(&mut qb, filter);
        let count: i64 = qb.build_query_scalar().fetch_one(&self.db).await?;
        Ok(count)
    }

    fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &PipelineFilter) {
        if let Some(customer_id) = filter.customer_id {
            qb.push(" AND customer_id = ");
            qb.push_bind(customer_id);
        }
        if let Some(stage) = filter.stage {
            qb.push(" AND stage = ");
            qb.push_bind(stage);
        }
        if let Some(tds_id) = filter.tds_id {
            qb.push(" AND tds_id = ");
            qb.push_bind(tds_id);
        }
    }

    /// Get a pipeline record by id
    pub async fn get_pipeline(&self, pipeline_id: Uuid) -> AppResult<SalesPipeline> {
        sqlx::query_as::<_, SalesPipeline>(&format!(
            "SELECT {} FROM sales_pipeline WHERE id = $1",
            PIPELINE_COLUMNS
        ))
        .bind(pipeline_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Sales pipeline record".to_string()))
    }

    /// Create a pipeline record
    ///
    /// Lead source and contact are auto-extracted from the customer's
    /// interaction history when not provided.
    pub async fn create_pipeline(&self, mut input: CreatePipelineInput) -> AppResult<SalesPipeline> {
        Self::validate_commercial_fields(
            input.stage,
            input.amount,
            input.business_model.as_deref(),
            input.unit,
            input.unit_price,
            input.business_unit.as_deref(),
            input.incoterm.as_deref(),
        )?;

        let customer_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM customers WHERE customer_id = $1)")
                .bind(input.customer_id)
                .fetch_one(&self.db)
                .await?;
        if !customer_exists {
            return Err(AppError::ValidationError("Customer not found".to_string()));
        }

        if input.lead_source.is_none() || input.contact_per_lead.is_none() {
            let extracted = self.extract_lead_info(input.customer_id).await;
            if input.lead_source.is_none() {
                input.lead_source = extracted.lead_source;
            }
            if input.contact_per_lead.is_none() {
                input.contact_per_lead = extracted.contact_per_lead;
            }
        }

        let pipeline = sqlx::query_as::<_, SalesPipeline>(&format!(
            r#"
            INSERT INTO sales_pipeline (
                customer_id, tds_id, chemical_type_id, stage, amount, expected_close_date,
                close_reason, lead_source, contact_per_lead, business_model, unit, unit_price,
                currency, forex, business_unit, incoterm, metadata
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING {}
            "#,
            PIPELINE_COLUMNS
        ))
        .bind(input.customer_id)
        .bind(input.tds_id)
        .bind(input.chemical_type_id)
        .bind(input.stage)
        .bind(input.amount)
        .bind(input.expected_close_date)
        .bind(&input.close_reason)
        .bind(&input.lead_source)
        .bind(&input.contact_per_lead)
        .bind(&input.business_model)
        .bind(input.unit)
        .bind(input.unit_price)
        .bind(input.currency)
        .bind(input.forex)
        .bind(&input.business_unit)
        .bind(&input.incoterm)
        .bind(&input.metadata)
        .fetch_one(&self.db)
        .await?;

        Ok(pipeline)
    }

    /// Update a pipeline record
    pub async fn update_pipeline(
        &self,
        pipeline_id: Uuid,
        input: UpdatePipelineInput,
    ) -> AppResult<SalesPipeline> {
        let existing = self.get_pipeline(pipeline_id).await?;

        let stage = input.stage.unwrap_or(existing.stage);
        let amount = input.amount.or(existing.amount);
        let business_model = input.business_model.or(existing.business_model);
        let unit = input.unit.or(existing.unit);
        let unit_price = input.unit_price.or(existing.unit_price);
        let business_unit = input.business_unit.or(existing.business_unit);
        let incoterm = input.incoterm.or(existing.incoterm);
        Self::validate_commercial_fields(
            stage,
            amount,
            business_model.as_deref(),
            unit,
            unit_price,
            business_unit.as_deref(),
            incoterm.as_deref(),
        )?;

        let pipeline = sqlx::query_as::<_, SalesPipeline>(&format!(
            r#"
            UPDATE sales_pipeline
            SET tds_id = $1, chemical_type_id = $2, stage = $3, amount = $4,
                expected_close_date = $5, close_reason = $6, lead_source = $7,
                contact_per_lead = $8, business_model = $9, unit = $10, unit_price = $11,
                currency = $12, forex = $13, business_unit = $14, incoterm = $15,
                metadata = $16, updated_at = NOW()
            WHERE id = $17
            RETURNING {}
            "#,
            PIPELINE_COLUMNS
        ))
        .bind(input.tds_id.or(existing.tds_id))
        .bind(input.chemical_type_id.or(existing.chemical_type_id))
        .bind(stage)
        .bind(amount)
        .bind(input.expected_close_date.or(existing.expected_close_date))
        .bind(input.close_reason.or(existing.close_reason))
        .bind(input.lead_source.or(existing.lead_source))
        .bind(input.contact_per_lead.or(existing.contact_per_lead))
        .bind(business_model)
        .bind(unit)
        .bind(unit_price)
        .bind(input.currency.or(existing.currency))
        .bind(input.forex.or(existing.forex))
        .bind(business_unit)
        .bind(incoterm)
        .bind(input.metadata.or(existing.metadata))
        .bind(pipeline_id)
        .fetch_one(&self.db)
        .await?;

        Ok(pipeline)
    }

    /// Delete a pipeline record
    pub async fn delete_pipeline(&self, pipeline_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM sales_pipeline WHERE id = $1")
            .bind(pipeline_id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Sales pipeline record".to_string()));
        }
        Ok(())
    }

    /// Move a pipeline to a new stage, recording the transition in the
    /// metadata stage history
    pub async fn advance_stage(
        &self,
        pipeline_id: Uuid,
        input: AdvanceStageInput,
    ) -> AppResult<SalesPipeline> {
        let existing = self.get_pipeline(pipeline_id).await?;

        validation::validate_pipeline_business_details(
            input.stage,
            existing.business_model.as_deref(),
            existing.unit,
            existing.unit_price,
        )?;

        let mut metadata = match existing.metadata {
            Some(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        };
        let history = metadata
            .entry("stage_history")
            .or_insert_with(|| json!([]));
        if let Some(entries) = history.as_array_mut() {
            entries.push(json!({
                "from_stage": existing.stage.as_str(),
                "to_stage": input.stage.as_str(),
                "changed_at": Utc::now().to_rfc3339(),
            }));
        }

        self.update_pipeline(
            pipeline_id,
            UpdatePipelineInput {
                stage: Some(input.stage),
                close_reason: input.close_reason,
                metadata: Some(serde_json::Value::Object(metadata)),
                ..Default::default()
            },
        )
        .await
    }

    /// Revenue forecast for pipelines expected to close within `days_ahead`
    pub async fn forecast(
        &self,
        days_ahead: i64,
        customer_id: Option<Uuid>,
    ) -> AppResult<PipelineForecast> {
        let filter = PipelineFilter {
            customer_id,
            ..Default::default()
        };
        let pipelines = self.list_pipelines(&filter, 1000, 0).await?;

        let forecast_end = Utc::now().date_naive() + Duration::days(days_ahead);
        let in_window: Vec<&SalesPipeline> = pipelines
            .iter()
            .filter(|p| p.expected_close_date.map_or(false, |d| d <= forecast_end))
            .collect();

        let mut forecast_by_stage: BTreeMap<String, Decimal> = PipelineStage::ALL
            .iter()
            .map(|s| (s.as_str().to_string(), Decimal::ZERO))
            .collect();
        let mut forecast_by_week: BTreeMap<String, Decimal> = BTreeMap::new();
        let mut total = Decimal::ZERO;

        for pipeline in &in_window {
            let amount = pipeline.amount.unwrap_or(Decimal::ZERO);
            total += amount;

            if let Some(value) = forecast_by_stage.get_mut(pipeline.stage.as_str()) {
                *value += amount;
            }

            if let Some(close_date) = pipeline.expected_close_date {
                let week_start =
                    close_date - Duration::days(close_date.weekday().num_days_from_monday() as i64);
                *forecast_by_week
                    .entry(week_start.to_string())
                    .or_insert(Decimal::ZERO) += amount;
            }
        }

        Ok(PipelineForecast {
            forecast_period_days: days_ahead,
            total_forecast_value: total,
            forecast_by_stage,
            forecast_by_week,
            pipeline_count: in_window.len() as i64,
        })
    }

    /// Validate the commercial fields shared by create and update
    fn validate_commercial_fields(
        stage: PipelineStage,
        amount: Option<Decimal>,
        business_model: Option<&str>,
        unit: Option<Unit>,
        unit_price: Option<Decimal>,
        business_unit: Option<&str>,
        incoterm: Option<&str>,
    ) -> AppResult<()> {
        validation::validate_amount(amount)?;
        validation::validate_pipeline_business_details(stage, business_model, unit, unit_price)?;
        if let Some(business_unit) = business_unit {
            validation::validate_business_unit(business_unit)?;
        }
        if let Some(incoterm) = incoterm {
            validation::validate_incoterm(incoterm)?;
        }
        Ok(())
    }

    /// Ask the AI to pull lead source and contact person out of the
    /// customer's recent interactions; best-effort, failures yield nothing
    async fn extract_lead_info(&self, customer_id: Uuid) -> ExtractedLeadInfo {
        let rows = sqlx::query_as::<_, (Option<String>, Option<String>)>(
            r#"
            SELECT input_text, ai_response
            FROM interactions
            WHERE customer_id = $1
            ORDER BY created_at DESC NULLS LAST
            LIMIT 10
            "#,
        )
        .bind(customer_id)
        .fetch_all(&self.db)
        .await
        .unwrap_or_default();

        let mut context = String::new();
        for (input_text, ai_response) in &rows {
            if let Some(text) = input_text {
                context.push_str(&format!("User: {}\n", truncate(text, 200)));
            }
            if let Some(text) = ai_response {
                context.push_str(&format!("AI: {}\n", truncate(text, 200)));
            }
        }
        if context.trim().is_empty() {
            return ExtractedLeadInfo::default();
        }

        let messages = [
            ChatMessage::system(
                "You are analyzing customer interactions to extract lead information.\n\
                 Extract the lead source (e.g. \"Website\", \"Referral\", \"Trade Show\") and the \
                 contact person for this lead if mentioned.\n\
                 Return ONLY a JSON object: {\"lead_source\": \"value or null\", \
                 \"contact_per_lead\": \"value or null\"}",
            ),
            ChatMessage::user(format!(
                "Extract lead information from these interactions:\n\n{}",
                context
            )),
        ];

        match self.gemini.chat(&messages).await {
            Ok(response) => parse_lead_info(&response),
            Err(e) => {
                tracing::debug!("lead info extraction failed: {}", e);
                ExtractedLeadInfo::default()
            }
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Pull the first `{...}` block out of an AI response and parse it
fn parse_lead_info(response: &str) -> ExtractedLeadInfo {
    let Some(start) = response.find('{') else {
        return ExtractedLeadInfo::default();
    };
    let Some(end) = response[start..].find('}') else {
        return ExtractedLeadInfo::default();
    };
    serde_json::from_str(&response[start..start + end + 1]).unwrap_or_default()
}
