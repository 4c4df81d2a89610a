//! PMS service: chemical types, technical data sheets and trading partners

use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use shared::models::{ChemicalType, Partner, Tds};

use crate::error::{AppError, AppResult};

const TDS_COLUMNS: &str =
    "id, chemical_type_id, brand, grade, owner, source, specs, created_at, updated_at";

/// PMS service for the product master data
#[derive(Clone)]
pub struct PmsService {
    db: PgPool,
}

/// Input for creating a chemical type
#[derive(Debug, Deserialize)]
pub struct CreateChemicalTypeInput {
    pub name: String,
    pub category: Option<String>,
    pub hs_code: Option<String>,
}

/// Input for creating a TDS record
#[derive(Debug, Default, Deserialize)]
pub struct CreateTdsInput {
    pub chemical_type_id: Option<Uuid>,
    pub brand: Option<String>,
    pub grade: Option<String>,
    pub owner: Option<String>,
    pub source: Option<String>,
    pub specs: Option<serde_json::Value>,
}

/// Input for updating a TDS record (partial)
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTdsInput {
    pub chemical_type_id: Option<Uuid>,
    pub brand: Option<String>,
    pub grade: Option<String>,
    pub owner: Option<String>,
    pub source: Option<String>,
    pub specs: Option<serde_json::Value>,
}

/// Input for creating a partner
#[derive(Debug, Default, Deserialize)]
pub struct CreatePartnerInput {
    pub partner: Option<String>,
    pub partner_country: Option<String>,
}

impl PmsService {
    /// Create a new PmsService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    // =========================================================================
    // Chemical types
    // =========================================================================

    /// List chemical types alphabetically
    pub async fn list_chemical_types(
        &self,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<ChemicalType>> {
        let chemicals = sqlx::query_as::<_, ChemicalType>(
            r#"
            SELECT id, name, category, hs_code, created_at
            FROM chemical_types
            ORDER BY name ASC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;
        Ok(chemicals)
    }

    /// Count chemical types
    pub async fn count_chemical_types(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chemical_types")
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }

    /// Create a chemical type
    pub async fn create_chemical_type(
        &self,
        input: CreateChemicalTypeInput,
    ) -> AppResult<ChemicalType> {
        let chemical = sqlx::query_as::<_, ChemicalType>(
            r#"
            INSERT INTO chemical_types (name, category, hs_code)
            VALUES ($1, $2, $3)
            RETURNING id, name, category, hs_code, created_at
            "#,
        )
        .bind(&input.name)
        .bind(&input.category)
        .bind(&input.hs_code)
        .fetch_one(&self.db)
        .await?;
        Ok(chemical)
    }

    /// Distinct chemical categories
    pub async fn list_categories(&self) -> AppResult<Vec<String>> {
        let categories: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT category FROM chemical_types WHERE category IS NOT NULL ORDER BY category",
        )
        .fetch_all(&self.db)
        .await?;
        Ok(categories)
    }

    // =========================================================================
    // TDS records
    // =========================================================================

    /// List TDS records, newest first
    pub async fn list_tds(&self, limit: i64, offset: i64) -> AppResult<Vec<Tds>> {
        let tds = sqlx::query_as::<_, Tds>(&format!(
            r#"
            SELECT {}
            FROM tds_data
            ORDER BY created_at DESC NULLS LAST
            LIMIT $1 OFFSET $2
            "#,
            TDS_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;
        Ok(tds)
    }

    /// Count TDS records
    pub async fn count_tds(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tds_data")
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }

    /// Get a TDS record by id
    pub async fn get_tds(&self, tds_id: Uuid) -> AppResult<Tds> {
        sqlx::query_as::<_, Tds>(&format!(
            "SELECT {} FROM tds_data WHERE id = $1",
            TDS_COLUMNS
        ))
        .bind(tds_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("TDS".to_string()))
    }

    /// Create a TDS record
    pub async fn create_tds(&self, input: CreateTdsInput) -> AppResult<Tds> {
        let tds = sqlx::query_as::<_, Tds>(&format!(
            r#"
            INSERT INTO tds_data (chemical_type_id, brand, grade, owner, source, specs)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            TDS_COLUMNS
        ))
        .bind(input.chemical_type_id)
        .bind(&input.brand)
        .bind(&input.grade)
        .bind(&input.owner)
        .bind(&input.source)
        .bind(&input.specs)
        .fetch_one(&self.db)
        .await?;
        Ok(tds)
    }

    /// Update a TDS record
    pub async fn update_tds(&self, tds_id: Uuid, input: UpdateTdsInput) -> AppResult<Tds> {
        let existing = self.get_tds(tds_id).await?;

        let tds = sqlx::query_as::<_, Tds>(&format!(
            r#"
            UPDATE tds_data
            SET chemical_type_id = $1, brand = $2, grade = $3, owner = $4, source = $5,
                specs = $6, updated_at = NOW()
            WHERE id = $7
            RETURNING {}
            "#,
            TDS_COLUMNS
        ))
        .bind(input.chemical_type_id.or(existing.chemical_type_id))
        .bind(input.brand.or(existing.brand))
        .bind(input.grade.or(existing.grade))
        .bind(input.owner.or(existing.owner))
        .bind(input.source.or(existing.source))
        .bind(input.specs.or(existing.specs))
        .bind(tds_id)
        .fetch_one(&self.db)
        .await?;
        Ok(tds)
    }

    // =========================================================================
    // Partners
    // =========================================================================

    /// List partners alphabetically
    pub async fn list_partners(&self, limit: i64, offset: i64) -> AppResult<Vec<Partner>> {
        let partners = sqlx::query_as::<_, Partner>(
            r#"
            SELECT id, partner, partner_country, created_at, updated_at
            FROM partner_data
            ORDER BY partner ASC NULLS LAST
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;
        Ok(partners)
    }

    /// Count partners
    pub async fn count_partners(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM partner_data")
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }

    /// Get a partner by id
    pub async fn get_partner(&self, partner_id: Uuid) -> AppResult<Partner> {
        sqlx::query_as::<_, Partner>(
            "SELECT id, partner, partner_country, created_at, updated_at FROM partner_data WHERE id = $1",
        )
        .bind(partner_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Partner".to_string()))
    }

    /// Create a partner
    pub async fn create_partner(&self, input: CreatePartnerInput) -> AppResult<Partner> {
        let partner = sqlx::query_as::<_, Partner>(
            r#"
            INSERT INTO partner_data (partner, partner_country)
            VALUES ($1, $2)
            RETURNING id, partner, partner_country, created_at, updated_at
            "#,
        )
        .bind(&input.partner)
        .bind(&input.partner_country)
        .fetch_one(&self.db)
        .await?;
        Ok(partner)
    }
}
