//! Background worker for AI customer-profile refreshes
//!
//! Polls the `profile_update_jobs` queue, claims one job at a time, builds
//! the customer context (interactions, pipelines, web research), asks the AI
//! provider for an updated profile and writes it back to the customer row.
//! The worker does not start automatically; `main` spawns it when enabled in
//! configuration.

use std::time::Duration;

use sqlx::PgPool;

use shared::models::ProfileUpdateJob;

use crate::error::{AppError, AppResult};
use crate::external::{ChatMessage, GeminiClient, WebSearchClient};

const JOB_COLUMNS: &str = "id, customer_id, interaction_id, status, priority, run_after, \
     attempts, last_error, created_at, updated_at";

/// Failed jobs are requeued until they hit this many attempts
const MAX_ATTEMPTS: i32 = 3;

/// Delay before a failed job is retried
const RETRY_DELAY_SECS: i64 = 60;

/// Profile-refresh worker
#[derive(Clone)]
pub struct ProfileWorker {
    db: PgPool,
    gemini: GeminiClient,
    search: WebSearchClient,
    poll_interval: Duration,
}

impl ProfileWorker {
    /// Create a new worker
    pub fn new(
        db: PgPool,
        gemini: GeminiClient,
        search: WebSearchClient,
        poll_interval_secs: u64,
    ) -> Self {
        Self {
            db,
            gemini,
            search,
            poll_interval: Duration::from_secs(poll_interval_secs),
        }
    }

    /// Claim and process jobs until the process exits
    pub async fn run_forever(self) {
        tracing::info!(
            poll_interval_secs = self.poll_interval.as_secs(),
            "profile worker started"
        );
        loop {
            match self.run_once().await {
                Ok(true) => {
                    // A job was processed; look for the next one right away
                }
                Ok(false) => tokio::time::sleep(self.poll_interval).await,
                Err(e) => {
                    tracing::error!("profile worker loop error: {}", e);
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    /// Claim and process a single job; `false` when the queue is empty
    pub async fn run_once(&self) -> AppResult<bool> {
        let Some(job) = self.claim_next_job().await? else {
            return Ok(false);
        };

        tracing::info!(
            job_id = %job.id,
            customer_id = %job.customer_id,
            attempt = job.attempts,
            "processing profile refresh"
        );

        match self.process_job(&job).await {
            Ok(()) => self.mark_done(&job).await?,
            Err(e) => {
                tracing::warn!(job_id = %job.id, "profile refresh failed: {}", e);
                self.mark_failed(&job, &e.to_string()).await?;
            }
        }

        Ok(true)
    }

    /// Atomically claim the next queued job by priority and run-after time
    async fn claim_next_job(&self) -> AppResult<Option<ProfileUpdateJob>> {
        let job = sqlx::query_as::<_, ProfileUpdateJob>(&format!(
            r#"
            UPDATE profile_update_jobs
            SET status = 'processing', attempts = attempts + 1, updated_at = NOW()
            WHERE id = (
                SELECT id FROM profile_update_jobs
                WHERE status = 'queued' AND run_after <= NOW()
                ORDER BY priority DESC, run_after ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {}
            "#,
            JOB_COLUMNS
        ))
        .fetch_optional(&self.db)
        .await?;
        Ok(job)
    }

    /// Build the customer context, call the AI and store the profile text
    async fn process_job(&self, job: &ProfileUpdateJob) -> AppResult<()> {
        let customer: (String, Option<String>) = sqlx::query_as(
            "SELECT customer_name, sales_stage FROM customers WHERE customer_id = $1",
        )
        .bind(job.customer_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Customer".to_string()))?;
        let (customer_name, sales_stage) = customer;

        let mut context = format!("Customer: {}\n", customer_name);
        if let Some(stage) = sales_stage {
            context.push_str(&format!("Sales stage: {}\n", stage));
        }

        let interactions = sqlx::query_as::<_, (Option<String>, Option<String>)>(
            r#"
            SELECT input_text, ai_response
            FROM interactions
            WHERE customer_id = $1
            ORDER BY created_at DESC NULLS LAST
            LIMIT 15
            "#,
        )
        .bind(job.customer_id)
        .fetch_all(&self.db)
        .await?;
        if !interactions.is_empty() {
            context.push_str("\nRecent interactions (newest first):\n");
            for (input_text, ai_response) in &interactions {
                if let Some(q) = input_text {
                    context.push_str(&format!("Q: {}\n", q));
                }
                if let Some(a) = ai_response {
                    context.push_str(&format!("A: {}\n", a));
                }
            }
        }

        let pipelines = sqlx::query_as::<_, (String, Option<rust_decimal::Decimal>)>(
            r#"
            SELECT stage, amount
            FROM sales_pipeline
            WHERE customer_id = $1
            ORDER BY created_at DESC NULLS LAST
            LIMIT 10
            "#,
        )
        .bind(job.customer_id)
        .fetch_all(&self.db)
        .await?;
        if !pipelines.is_empty() {
            context.push_str("\nOpen pipelines:\n");
            for (stage, amount) in &pipelines {
                match amount {
                    Some(amount) => context.push_str(&format!("- {} ({})\n", stage, amount)),
                    None => context.push_str(&format!("- {}\n", stage)),
                }
            }
        }

        // Web research is optional enrichment; missing keys or provider
        // outages must not fail the job
        match self.search.search_company(&customer_name).await {
            Ok(web_context) if !web_context.trim().is_empty() => {
                context.push_str("\nWeb research:\n");
                context.push_str(&web_context);
            }
            Ok(_) => {}
            Err(e) => tracing::debug!("web research skipped: {}", e),
        }

        let messages = [
            ChatMessage::system(
                "You write ideal-customer-profile summaries for a chemical trading company. \
                 Using the context below, produce a concise profile of the customer: who they \
                 are, what they buy, open opportunities and anything a sales person should know. \
                 Plain text, no markdown headings.",
            ),
            ChatMessage::user(context),
        ];
        let profile = self.gemini.chat(&messages).await?;
        if profile.trim().is_empty() {
            return Err(AppError::AiProvider(
                "empty profile response".to_string(),
            ));
        }

        sqlx::query(
            r#"
            UPDATE customers
            SET latest_profile_text = $1, profile_updated_at = NOW(), updated_at = NOW()
            WHERE customer_id = $2
            "#,
        )
        .bind(&profile)
        .bind(job.customer_id)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn mark_done(&self, job: &ProfileUpdateJob) -> AppResult<()> {
        sqlx::query(
            "UPDATE profile_update_jobs SET status = 'done', last_error = NULL, updated_at = NOW() WHERE id = $1",
        )
        .bind(job.id)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    /// Requeue with a delay while attempts remain, then park the job as
    /// failed
    async fn mark_failed(&self, job: &ProfileUpdateJob, error: &str) -> AppResult<()> {
        if job.attempts < MAX_ATTEMPTS {
            sqlx::query(
                r#"
                UPDATE profile_update_jobs
                SET status = 'queued', last_error = $1,
                    run_after = NOW() + make_interval(secs => $2),
                    updated_at = NOW()
                WHERE id = $3
                "#,
            )
            .bind(error)
            .bind(RETRY_DELAY_SECS as f64)
            .bind(job.id)
            .execute(&self.db)
            .await?;
        } else {
            sqlx::query(
                "UPDATE profile_update_jobs SET status = 'failed', last_error = $1, updated_at = NOW() WHERE id = $2",
            )
            .bind(error)
            .bind(job.id)
            .execute(&self.db)
            .await?;
        }
        Ok(())
    }
}
