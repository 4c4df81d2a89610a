//! CRM models: customers, interactions and profile-refresh jobs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A customer account
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Customer {
    pub customer_id: Uuid,
    pub customer_name: String,
    /// Human-readable identifier, e.g. `LC-2026-CUST-0042`
    pub display_id: Option<String>,
    /// Current sales stage (1-7)
    pub sales_stage: Option<String>,
    /// AI-generated profile text, refreshed by the background worker
    pub latest_profile_text: Option<String>,
    pub profile_updated_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A single exchange between a customer and the AI/user
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Interaction {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub user_id: Option<Uuid>,
    pub input_text: Option<String>,
    pub ai_response: Option<String>,
    pub file_url: Option<String>,
    pub file_type: Option<String>,
    pub tds_id: Option<Uuid>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Profile-refresh job lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Done,
    Failed,
}

/// Queued unit of work for the profile-refresh worker
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProfileUpdateJob {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub interaction_id: Option<Uuid>,
    pub status: JobStatus,
    pub priority: i32,
    pub run_after: DateTime<Utc>,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Paginated customer listing
#[derive(Debug, Serialize)]
pub struct CustomerListResponse {
    pub customers: Vec<Customer>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Paginated interaction listing
#[derive(Debug, Serialize)]
pub struct InteractionListResponse {
    pub interactions: Vec<Interaction>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// High-level CRM metrics for the dashboard
#[derive(Debug, Serialize)]
pub struct DashboardMetrics {
    pub total_customers: i64,
    pub total_interactions: i64,
    pub customers_with_interactions: i64,
    pub sales_stages_distribution: BTreeMap<String, i64>,
}
