//! PMS models: chemical types, technical data sheets and trading partners

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A chemical category in the product master
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChemicalType {
    pub id: Uuid,
    pub name: String,
    pub category: Option<String>,
    pub hs_code: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// A technical data sheet record (product master entry)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tds {
    pub id: Uuid,
    pub chemical_type_id: Option<Uuid>,
    pub brand: Option<String>,
    pub grade: Option<String>,
    pub owner: Option<String>,
    pub source: Option<String>,
    pub specs: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A trading partner (supplier)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Partner {
    pub id: Uuid,
    pub partner: Option<String>,
    pub partner_country: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Paginated chemical type listing
#[derive(Debug, Serialize)]
pub struct ChemicalTypeListResponse {
    pub chemicals: Vec<ChemicalType>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Paginated TDS listing
#[derive(Debug, Serialize)]
pub struct TdsListResponse {
    pub tds: Vec<Tds>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Paginated partner listing
#[derive(Debug, Serialize)]
pub struct PartnerListResponse {
    pub partners: Vec<Partner>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}
