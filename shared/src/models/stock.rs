//! Stock management models
//!
//! Stock is tracked across three warehouse locations:
//! - Addis Ababa (Ethiopia): full stock management with sales and purchases
//! - SEZ Kenya: purchases and inter-company transfers
//! - Nairobi Partner: partner supplier stock, tracked via snapshot entries

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Warehouse locations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Location {
    AddisAbaba,
    SezKenya,
    NairobiPartner,
}

impl Location {
    pub const ALL: [Location; 3] = [
        Location::AddisAbaba,
        Location::SezKenya,
        Location::NairobiPartner,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Location::AddisAbaba => "addis_ababa",
            Location::SezKenya => "sez_kenya",
            Location::NairobiPartner => "nairobi_partner",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "addis_ababa" => Some(Location::AddisAbaba),
            "sez_kenya" => Some(Location::SezKenya),
            "nairobi_partner" => Some(Location::NairobiPartner),
            _ => None,
        }
    }
}

/// Stock movement transaction types
///
/// Wire strings match the stored ledger values, including the two
/// multi-word types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR")]
pub enum TransactionType {
    Sales,
    Purchase,
    #[sqlx(rename = "Inter-company transfer")]
    #[serde(rename = "Inter-company transfer")]
    InterCompanyTransfer,
    Sample,
    Damage,
    #[sqlx(rename = "Stock Availability")]
    #[serde(rename = "Stock Availability")]
    StockAvailability,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Sales => "Sales",
            TransactionType::Purchase => "Purchase",
            TransactionType::InterCompanyTransfer => "Inter-company transfer",
            TransactionType::Sample => "Sample",
            TransactionType::Damage => "Damage",
            TransactionType::StockAvailability => "Stock Availability",
        }
    }
}

/// Units of measurement for movements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Kg,
    Ton,
    G,
    Lb,
    Oz,
    Piece,
    Unit,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Kg => "kg",
            Unit::Ton => "ton",
            Unit::G => "g",
            Unit::Lb => "lb",
            Unit::Oz => "oz",
            Unit::Piece => "piece",
            Unit::Unit => "unit",
        }
    }
}

impl Default for Unit {
    fn default() -> Self {
        Unit::Kg
    }
}

/// Business model tag for Nairobi Partner movements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR")]
pub enum BusinessModel {
    Stock,
    #[sqlx(rename = "Direct Delivery")]
    #[serde(rename = "Direct Delivery")]
    DirectDelivery,
}

/// What a product is traded for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UseCase {
    Sales,
    Internal,
}

/// A tradable chemical/brand/packaging combination
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub chemical: String,
    pub chemical_type: String,
    pub brand: String,
    pub packaging: String,
    pub kg_per_unit: Decimal,
    pub use_case: UseCase,
    pub tds_id: Option<Uuid>,
    pub tds_link: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Computed stock state for one location
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LocationStock {
    pub total: Decimal,
    pub reserved: Decimal,
    pub available: Decimal,
}

impl LocationStock {
    /// Reserved stock has no reservation mechanism behind it yet and is
    /// always zero.
    pub fn from_total(total: Decimal) -> Self {
        let reserved = Decimal::ZERO;
        Self {
            total,
            reserved,
            available: total - reserved,
        }
    }
}

/// Per-location computed stock for a product
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProductStock {
    pub addis_ababa: LocationStock,
    pub sez_kenya: LocationStock,
    pub nairobi_partner: LocationStock,
}

impl ProductStock {
    pub fn get(&self, location: Location) -> LocationStock {
        match location {
            Location::AddisAbaba => self.addis_ababa,
            Location::SezKenya => self.sez_kenya,
            Location::NairobiPartner => self.nairobi_partner,
        }
    }

    pub fn total(&self) -> Decimal {
        self.addis_ababa.total + self.sez_kenya.total + self.nairobi_partner.total
    }

    pub fn total_reserved(&self) -> Decimal {
        self.addis_ababa.reserved + self.sez_kenya.reserved + self.nairobi_partner.reserved
    }

    pub fn total_available(&self) -> Decimal {
        self.addis_ababa.available + self.sez_kenya.available + self.nairobi_partner.available
    }
}

/// Product decorated with its computed stock state
#[derive(Debug, Clone, Serialize)]
pub struct ProductWithStock {
    #[serde(flatten)]
    pub product: Product,
    pub stock: ProductStock,
}

/// A single ledger entry for one product at one location on one date
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StockMovement {
    pub id: Uuid,
    pub product_id: Uuid,
    pub tds_id: Option<Uuid>,
    pub date: NaiveDate,
    pub location: Location,
    pub transaction_type: TransactionType,
    pub unit: Unit,

    // Quantity fields, all non-negative
    pub beginning_balance: Decimal,
    pub purchase_kg: Decimal,
    pub sold_kg: Decimal,
    pub purchase_direct_shipment_kg: Decimal,
    pub sold_direct_shipment_kg: Decimal,
    pub sample_or_damage_kg: Decimal,
    pub inter_company_transfer_kg: Decimal,

    /// Destination for inter-company transfers
    pub transfer_to_location: Option<Location>,

    /// Ending balance after this movement, derived by ledger replay
    pub balance_kg: Decimal,

    pub supplier_id: Option<Uuid>,
    pub supplier_name: Option<String>,
    pub customer_id: Option<Uuid>,
    pub customer_name: Option<String>,

    pub business_model: Option<BusinessModel>,
    pub brand: Option<String>,
    pub reference: Option<String>,
    pub remark: Option<String>,
    pub warehouse: Option<String>,

    /// Absent on rows imported before timestamps were recorded; such
    /// entries sort earliest within their date
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Paginated product listing
#[derive(Debug, Serialize)]
pub struct ProductListResponse {
    pub products: Vec<ProductWithStock>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Paginated movement listing
#[derive(Debug, Serialize)]
pub struct StockMovementListResponse {
    pub movements: Vec<StockMovement>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Stock availability summary row for one product across all locations
#[derive(Debug, Serialize)]
pub struct StockAvailabilitySummary {
    pub product_id: Uuid,
    pub product_name: String,
    pub chemical: String,
    pub brand: String,
    pub addis_ababa: LocationStock,
    pub sez_kenya: LocationStock,
    pub nairobi_partner: LocationStock,
    pub total_stock: Decimal,
    pub total_reserved: Decimal,
    pub total_available: Decimal,
}
