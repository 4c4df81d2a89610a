//! Sales pipeline models
//!
//! Deals move through a seven-stage process; stages from Validation onwards
//! require the commercial details (business model, unit, unit price).

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Unit;

/// Pipeline stages, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR")]
pub enum PipelineStage {
    #[sqlx(rename = "Lead ID")]
    #[serde(rename = "Lead ID")]
    LeadId,
    Discovery,
    Sample,
    Validation,
    Proposal,
    Confirmation,
    Closed,
}

impl PipelineStage {
    pub const ALL: [PipelineStage; 7] = [
        PipelineStage::LeadId,
        PipelineStage::Discovery,
        PipelineStage::Sample,
        PipelineStage::Validation,
        PipelineStage::Proposal,
        PipelineStage::Confirmation,
        PipelineStage::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::LeadId => "Lead ID",
            PipelineStage::Discovery => "Discovery",
            PipelineStage::Sample => "Sample",
            PipelineStage::Validation => "Validation",
            PipelineStage::Proposal => "Proposal",
            PipelineStage::Confirmation => "Confirmation",
            PipelineStage::Closed => "Closed",
        }
    }

    /// Stages that require business model, unit and unit price
    pub fn requires_business_details(&self) -> bool {
        matches!(
            self,
            PipelineStage::Validation
                | PipelineStage::Proposal
                | PipelineStage::Confirmation
                | PipelineStage::Closed
        )
    }
}

/// Supported deal currencies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Etb,
    Kes,
    Usd,
    Eur,
}

/// Who bears the forex risk on a deal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR")]
pub enum Forex {
    LeanChems,
    Client,
}

/// Business unit options
pub const BUSINESS_UNITS: [&str; 5] = ["Hayat", "Alhadi", "Bet-chem", "Barracoda", "Nyumb-Chem"];

/// Incoterm options
pub const INCOTERMS: [&str; 4] = [
    "Import of Record",
    "Agency",
    "Direct Import",
    "Stock – Addis Ababa",
];

/// A sales pipeline record for one customer/product combination
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SalesPipeline {
    pub id: Uuid,
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
    /// Free-form metadata; the service keeps a `stage_history` array here
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Paginated pipeline listing
#[derive(Debug, Serialize)]
pub struct SalesPipelineListResponse {
    pub pipelines: Vec<SalesPipeline>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Revenue forecast over the coming window
#[derive(Debug, Serialize)]
pub struct PipelineForecast {
    pub forecast_period_days: i64,
    pub total_forecast_value: Decimal,
    pub forecast_by_stage: BTreeMap<String, Decimal>,
    /// Keyed by ISO date of the week's Monday
    pub forecast_by_week: BTreeMap<String, Decimal>,
    pub pipeline_count: i64,
}
