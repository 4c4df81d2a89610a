//! Stock management service: products, the movement ledger and balance
//! recalculation
//!
//! Every mutation of the ledger (create/update/delete of a movement) runs
//! inside one database transaction together with the recalculation pass it
//! triggers. The product row is locked first, so concurrent writers to the
//! same product serialize on the read-recompute-write sequence.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use shared::ledger;
use shared::models::{
    BusinessModel, Location, LocationStock, Product, ProductStock, ProductWithStock,
    StockAvailabilitySummary, StockMovement, TransactionType, Unit, UseCase,
};
use shared::validation;

use crate::error::{AppError, AppResult};

const PRODUCT_COLUMNS: &str = "id, chemical, chemical_type, brand, packaging, kg_per_unit, \
     use_case, tds_id, tds_link, created_at, updated_at";

const MOVEMENT_COLUMNS: &str = "id, product_id, tds_id, date, location, transaction_type, unit, \
     beginning_balance, purchase_kg, sold_kg, purchase_direct_shipment_kg, \
     sold_direct_shipment_kg, sample_or_damage_kg, inter_company_transfer_kg, \
     transfer_to_location, balance_kg, supplier_id, supplier_name, customer_id, customer_name, \
     business_model, brand, reference, remark, warehouse, created_at, updated_at";

/// Stock service for products and the movement ledger
#[derive(Clone)]
pub struct StockService {
    db: PgPool,
}

/// Input for creating a product
#[derive(Debug, Deserialize)]
pub struct CreateProductInput {
    pub chemical: String,
    pub chemical_type: String,
    pub brand: String,
    pub packaging: String,
    pub kg_per_unit: Decimal,
    pub use_case: UseCase,
    pub tds_id: Option<Uuid>,
    pub tds_link: Option<String>,
}

/// Input for updating a product (partial)
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProductInput {
    pub chemical: Option<String>,
    pub chemical_type: Option<String>,
    pub brand: Option<String>,
    pub packaging: Option<String>,
    pub kg_per_unit: Option<Decimal>,
    pub use_case: Option<UseCase>,
    pub tds_id: Option<Uuid>,
    pub tds_link: Option<String>,
}

/// Product listing filters
#[derive(Debug, Default, Deserialize)]
pub struct ProductFilter {
    pub chemical: Option<String>,
    pub brand: Option<String>,
    pub use_case: Option<UseCase>,
}

/// Input for creating a stock movement
#[derive(Debug, Deserialize)]
pub struct CreateMovementInput {
    pub product_id: Uuid,
    pub tds_id: Option<Uuid>,
    pub date: NaiveDate,
    pub location: Location,
    pub transaction_type: TransactionType,
    #[serde(default)]
    pub unit: Unit,
    /// Derived from the prior ledger state when omitted (except snapshots)
    #[serde(default)]
    pub beginning_balance: Decimal,
    #[serde(default)]
    pub purchase_kg: Decimal,
    #[serde(default)]
    pub sold_kg: Decimal,
    #[serde(default)]
    pub purchase_direct_shipment_kg: Decimal,
    #[serde(default)]
    pub sold_direct_shipment_kg: Decimal,
    #[serde(default)]
    pub sample_or_damage_kg: Decimal,
    #[serde(default)]
    pub inter_company_transfer_kg: Decimal,
    pub transfer_to_location: Option<Location>,
    pub supplier_id: Option<Uuid>,
    pub supplier_name: Option<String>,
    pub customer_id: Option<Uuid>,
    pub customer_name: Option<String>,
    pub business_model: Option<BusinessModel>,
    pub brand: Option<String>,
    pub reference: Option<String>,
    pub remark: Option<String>,
    pub warehouse: Option<String>,
}

/// Input for updating a stock movement (partial)
#[derive(Debug, Default, Deserialize)]
pub struct UpdateMovementInput {
    pub date: Option<NaiveDate>,
    pub location: Option<Location>,
    pub transaction_type: Option<TransactionType>,
    pub unit: Option<Unit>,
    pub beginning_balance: Option<Decimal>,
    pub purchase_kg: Option<Decimal>,
    pub sold_kg: Option<Decimal>,
    pub purchase_direct_shipment_kg: Option<Decimal>,
    pub sold_direct_shipment_kg: Option<Decimal>,
    pub sample_or_damage_kg: Option<Decimal>,
    pub inter_company_transfer_kg: Option<Decimal>,
    pub transfer_to_location: Option<Location>,
    pub supplier_id: Option<Uuid>,
    pub supplier_name: Option<String>,
    pub customer_id: Option<Uuid>,
    pub customer_name: Option<String>,
    pub business_model: Option<BusinessModel>,
    pub brand: Option<String>,
    pub reference: Option<String>,
    pub remark: Option<String>,
    pub warehouse: Option<String>,
}

impl UpdateMovementInput {
    /// Whether the patch touches a field that feeds the balance replay
    fn affects_balances(&self) -> bool {
        self.beginning_balance.is_some()
            || self.purchase_kg.is_some()
            || self.sold_kg.is_some()
            || self.purchase_direct_shipment_kg.is_some()
            || self.sold_direct_shipment_kg.is_some()
            || self.sample_or_damage_kg.is_some()
            || self.inter_company_transfer_kg.is_some()
            || self.date.is_some()
            || self.location.is_some()
            || self.transaction_type.is_some()
            || self.transfer_to_location.is_some()
    }
}

/// Movement listing filters
#[derive(Debug, Default, Deserialize)]
pub struct MovementFilter {
    pub product_id: Option<Uuid>,
    pub location: Option<Location>,
    pub transaction_type: Option<TransactionType>,
    pub business_model: Option<BusinessModel>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl StockService {
    /// Create a new StockService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// List products with computed per-location stock
    pub async fn list_products(
        &self,
        filter: &ProductFilter,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<ProductWithStock>> {
        let mut qb = QueryBuilder::new(format!(
            "SELECT {} FROM products WHERE 1=1",
            PRODUCT_COLUMNS
        ));
        Self::push_product_filters(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC NULLS LAST LIMIT ");
        qb.push_bind(limit);
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let products: Vec<Product> = qb.build_query_as().fetch_all(&self.db).await?;

        let mut decorated = Vec::with_capacity(products.len());
        for product in products {
            let stock = self.compute_product_stock(product.id).await?;
            decorated.push(ProductWithStock { product, stock });
        }
        Ok(decorated)
    }

    /// Count products matching the filters
    pub async fn count_products(&self, filter: &ProductFilter) -> AppResult<i64> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM products WHERE 1=1");
        Self::push_product_filters(&mut qb, filter);
        let count: i64 = qb.build_query_scalar().fetch_one(&self.db).await?;
        Ok(count)
    }

    fn push_product_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &ProductFilter) {
        if let Some(chemical) = &filter.chemical {
            qb.push(" AND chemical ILIKE ");
            qb.push_bind(format!("%{}%", chemical));
        }
        if let Some(brand) = &filter.brand {
            qb.push(" AND brand ILIKE ");
            qb.push_bind(format!("%{}%", brand));
        }
        if let Some(use_case) = filter.use_case {
            qb.push(" AND use_case = ");
            qb.push_bind(use_case);
        }
    }

    /// Get a product by id with computed stock
    pub async fn get_product(&self, product_id: Uuid) -> AppResult<ProductWithStock> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products WHERE id = $1",
            PRODUCT_COLUMNS
        ))
        .bind(product_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

        let stock = self.compute_product_stock(product.id).await?;
        Ok(ProductWithStock { product, stock })
    }

    /// Get the product linked to a TDS record
    pub async fn get_product_by_tds(&self, tds_id: Uuid) -> AppResult<ProductWithStock> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products WHERE tds_id = $1 LIMIT 1",
            PRODUCT_COLUMNS
        ))
        .bind(tds_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

        let stock = self.compute_product_stock(product.id).await?;
        Ok(ProductWithStock { product, stock })
    }

    /// Create a new product
    pub async fn create_product(&self, input: CreateProductInput) -> AppResult<ProductWithStock> {
        validation::validate_kg_per_unit(input.kg_per_unit)?;

        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            INSERT INTO products (chemical, chemical_type, brand, packaging, kg_per_unit,
                                  use_case, tds_id, tds_link)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(&input.chemical)
        .bind(&input.chemical_type)
        .bind(&input.brand)
        .bind(&input.packaging)
        .bind(input.kg_per_unit)
        .bind(input.use_case)
        .bind(input.tds_id)
        .bind(&input.tds_link)
        .fetch_one(&self.db)
        .await?;

        let stock = self.compute_product_stock(product.id).await?;
        Ok(ProductWithStock { product, stock })
    }

    /// Update an existing product
    pub async fn update_product(
        &self,
        product_id: Uuid,
        input: UpdateProductInput,
    ) -> AppResult<ProductWithStock> {
        let existing = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products WHERE id = $1",
            PRODUCT_COLUMNS
        ))
        .bind(product_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

        let kg_per_unit = input.kg_per_unit.unwrap_or(existing.kg_per_unit);
        validation::validate_kg_per_unit(kg_per_unit)?;

        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            UPDATE products
            SET chemical = $1, chemical_type = $2, brand = $3, packaging = $4,
                kg_per_unit = $5, use_case = $6, tds_id = $7, tds_link = $8,
                updated_at = NOW()
            WHERE id = $9
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(input.chemical.unwrap_or(existing.chemical))
        .bind(input.chemical_type.unwrap_or(existing.chemical_type))
        .bind(input.brand.unwrap_or(existing.brand))
        .bind(input.packaging.unwrap_or(existing.packaging))
        .bind(kg_per_unit)
        .bind(input.use_case.unwrap_or(existing.use_case))
        .bind(input.tds_id.or(existing.tds_id))
        .bind(input.tds_link.or(existing.tds_link))
        .bind(product_id)
        .fetch_one(&self.db)
        .await?;

        let stock = self.compute_product_stock(product.id).await?;
        Ok(ProductWithStock { product, stock })
    }

    /// Delete a product; its movements go with it
    pub async fn delete_product(&self, product_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(product_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Product".to_string()));
        }
        Ok(())
    }

    /// Computed per-location stock for a product
    pub async fn get_product_stock(&self, product_id: Uuid) -> AppResult<ProductStock> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM products WHERE id = $1)")
            .bind(product_id)
            .fetch_one(&self.db)
            .await?;
        if !exists {
            return Err(AppError::NotFound("Product".to_string()));
        }
        self.compute_product_stock(product_id).await
    }

    /// Stock availability summary across products
    pub async fn availability_summary(
        &self,
        filter: &ProductFilter,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<StockAvailabilitySummary>> {
        let products = self.list_products(filter, limit, offset).await?;

        Ok(products
            .into_iter()
            .map(|p| StockAvailabilitySummary {
                product_id: p.product.id,
                product_name: format!("{} - {}", p.product.chemical, p.product.brand),
                chemical: p.product.chemical,
                brand: p.product.brand,
                addis_ababa: p.stock.addis_ababa,
                sez_kenya: p.stock.sez_kenya,
                nairobi_partner: p.stock.nairobi_partner,
                total_stock: p.stock.total(),
                total_reserved: p.stock.total_reserved(),
                total_available: p.stock.total_available(),
            })
            .collect())
    }

    /// Replay the full ledger of a product into per-location stock
    async fn compute_product_stock(&self, product_id: Uuid) -> AppResult<ProductStock> {
        let movements = sqlx::query_as::<_, StockMovement>(&format!(
            "SELECT {} FROM stock_movements WHERE product_id = $1",
            MOVEMENT_COLUMNS
        ))
        .bind(product_id)
        .fetch_all(&self.db)
        .await?;

        Ok(ProductStock {
            addis_ababa: LocationStock::from_total(ledger::location_total(
                &movements,
                Location::AddisAbaba,
            )),
            sez_kenya: LocationStock::from_total(ledger::location_total(
                &movements,
                Location::SezKenya,
            )),
            nairobi_partner: LocationStock::from_total(ledger::location_total(
                &movements,
                Location::NairobiPartner,
            )),
        })
    }

    // =========================================================================
    // Stock movements
    // =========================================================================

    /// List movements, newest first
    pub async fn list_movements(
        &self,
        filter: &MovementFilter,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<StockMovement>> {
        let mut qb = QueryBuilder::new(format!(
            "SELECT {} FROM stock_movements WHERE 1=1",
            MOVEMENT_COLUMNS
        ));
        Self::push_movement_filters(&mut qb, filter);
        qb.push(" ORDER BY date DESC, created_at DESC NULLS LAST LIMIT ");
        qb.push_bind(limit);
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let movements = qb.build_query_as().fetch_all(&self.db).await?;
        Ok(movements)
    }

    /// Count movements matching the filters
    pub async fn count_movements(&self, filter: &MovementFilter) -> AppResult<i64> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM stock_movements WHERE 1=1");
        Self::push_movement_filters(&mut qb, filter);
        let count: i64 = qb.build_query_scalar().fetch_one(&self.db).await?;
        Ok(count)
    }

    fn push_movement_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &MovementFilter) {
        if let Some(product_id) = filter.product_id {
            qb.push(" AND product_id = ");
            qb.push_bind(product_id);
        }
        if let Some(location) = filter.location {
            qb.push(" AND location = ");
            qb.push_bind(location);
        }
        if let Some(transaction_type) = filter.transaction_type {
            qb.push(" AND transaction_type = ");
            qb.push_bind(transaction_type);
        }
        if let Some(business_model) = filter.business_model {
            qb.push(" AND business_model = ");
            qb.push_bind(business_model);
        }
        if let Some(start_date) = filter.start_date {
            qb.push(" AND date >= ");
            qb.push_bind(start_date);
        }
        if let Some(end_date) = filter.end_date {
            qb.push(" AND date <= ");
            qb.push_bind(end_date);
        }
    }

    /// Get a single movement by id
    pub async fn get_movement(&self, movement_id: Uuid) -> AppResult<StockMovement> {
        sqlx::query_as::<_, StockMovement>(&format!(
            "SELECT {} FROM stock_movements WHERE id = $1",
            MOVEMENT_COLUMNS
        ))
        .bind(movement_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Stock movement".to_string()))
    }

    /// Create a movement and recalculate every affected location
    ///
    /// Returns the reloaded record so the caller sees post-recalculation
    /// balances.
    pub async fn create_movement(&self, mut input: CreateMovementInput) -> AppResult<StockMovement> {
        validation::validate_location_transaction(input.location, input.transaction_type)?;
        validation::validate_quantities(&[
            input.beginning_balance,
            input.purchase_kg,
            input.sold_kg,
            input.purchase_direct_shipment_kg,
            input.sold_direct_shipment_kg,
            input.sample_or_damage_kg,
            input.inter_company_transfer_kg,
        ])?;

        let mut tx = self.db.begin().await?;

        // Lock the product row: one writer per product at a time
        let product: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM products WHERE id = $1 FOR UPDATE")
                .bind(input.product_id)
                .fetch_optional(&mut *tx)
                .await?;
        if product.is_none() {
            return Err(AppError::ValidationError("Product not found".to_string()));
        }

        // Validate references, backfilling display names
        if let Some(tds_id) = input.tds_id {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM tds_data WHERE id = $1)")
                    .bind(tds_id)
                    .fetch_one(&mut *tx)
                    .await?;
            if !exists {
                return Err(AppError::ValidationError("TDS not found".to_string()));
            }
        }
        if let Some(supplier_id) = input.supplier_id {
            let supplier: Option<Option<String>> =
                sqlx::query_scalar("SELECT partner FROM partner_data WHERE id = $1")
                    .bind(supplier_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            match supplier {
                None => return Err(AppError::ValidationError("Supplier not found".to_string())),
                Some(name) => {
                    if input.supplier_name.is_none() {
                        input.supplier_name = name;
                    }
                }
            }
        }
        if let Some(customer_id) = input.customer_id {
            let customer: Option<String> = sqlx::query_scalar(
                "SELECT customer_name FROM customers WHERE customer_id = $1",
            )
            .bind(customer_id)
            .fetch_optional(&mut *tx)
            .await?;
            match customer {
                None => return Err(AppError::ValidationError("Customer not found".to_string())),
                Some(name) => {
                    if input.customer_name.is_none() {
                        input.customer_name = Some(name);
                    }
                }
            }
        }

        // Derive the beginning balance from prior ledger state when omitted.
        // Snapshot entries carry an operator-entered count instead.
        if input.beginning_balance == Decimal::ZERO
            && input.transaction_type != TransactionType::StockAvailability
        {
            let movements = Self::movements_for_update(&mut tx, input.product_id).await?;
            input.beginning_balance =
                ledger::balance_before(&movements, input.location, input.date);
        }

        // Initial balance; the recalculation pass below is authoritative
        let balance = match input.transaction_type {
            TransactionType::StockAvailability => input.beginning_balance,
            TransactionType::InterCompanyTransfer => {
                input.beginning_balance - input.inter_company_transfer_kg
            }
            _ => {
                input.beginning_balance + input.purchase_kg + input.purchase_direct_shipment_kg
                    - input.sold_kg
                    - input.sold_direct_shipment_kg
                    - input.sample_or_damage_kg
            }
        }
        .max(Decimal::ZERO);

        let created: StockMovement = sqlx::query_as(&format!(
            r#"
            INSERT INTO stock_movements (
                product_id, tds_id, date, location, transaction_type, unit,
                beginning_balance, purchase_kg, sold_kg, purchase_direct_shipment_kg,
                sold_direct_shipment_kg, sample_or_damage_kg, inter_company_transfer_kg,
                transfer_to_location, balance_kg, supplier_id, supplier_name,
                customer_id, customer_name, business_model, brand, reference, remark, warehouse
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                    $18, $19, $20, $21, $22, $23, $24)
            RETURNING {}
            "#,
            MOVEMENT_COLUMNS
        ))
        .bind(input.product_id)
        .bind(input.tds_id)
        .bind(input.date)
        .bind(input.location)
        .bind(input.transaction_type)
        .bind(input.unit)
        .bind(input.beginning_balance)
        .bind(input.purchase_kg)
        .bind(input.sold_kg)
        .bind(input.purchase_direct_shipment_kg)
        .bind(input.sold_direct_shipment_kg)
        .bind(input.sample_or_damage_kg)
        .bind(input.inter_company_transfer_kg)
        .bind(input.transfer_to_location)
        .bind(balance)
        .bind(input.supplier_id)
        .bind(&input.supplier_name)
        .bind(input.customer_id)
        .bind(&input.customer_name)
        .bind(input.business_model)
        .bind(&input.brand)
        .bind(&input.reference)
        .bind(&input.remark)
        .bind(&input.warehouse)
        .fetch_one(&mut *tx)
        .await?;

        let mut affected = vec![input.location];
        if input.transaction_type == TransactionType::InterCompanyTransfer {
            if let Some(destination) = input.transfer_to_location {
                affected.push(destination);
            }
        }
        Self::recalculate(&mut tx, input.product_id, &affected).await?;

        tx.commit().await?;

        self.get_movement(created.id).await
    }

    /// Update a movement; recalculates when a balance-affecting field changed
    pub async fn update_movement(
        &self,
        movement_id: Uuid,
        input: UpdateMovementInput,
    ) -> AppResult<StockMovement> {
        let mut tx = self.db.begin().await?;

        let existing: StockMovement = sqlx::query_as(&format!(
            "SELECT {} FROM stock_movements WHERE id = $1 FOR UPDATE",
            MOVEMENT_COLUMNS
        ))
        .bind(movement_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Stock movement".to_string()))?;

        sqlx::query("SELECT id FROM products WHERE id = $1 FOR UPDATE")
            .bind(existing.product_id)
            .fetch_optional(&mut *tx)
            .await?;

        let location = input.location.unwrap_or(existing.location);
        let transaction_type = input.transaction_type.unwrap_or(existing.transaction_type);
        validation::validate_location_transaction(location, transaction_type)?;

        let beginning_balance = input.beginning_balance.unwrap_or(existing.beginning_balance);
        let purchase_kg = input.purchase_kg.unwrap_or(existing.purchase_kg);
        let sold_kg = input.sold_kg.unwrap_or(existing.sold_kg);
        let purchase_direct_shipment_kg = input
            .purchase_direct_shipment_kg
            .unwrap_or(existing.purchase_direct_shipment_kg);
        let sold_direct_shipment_kg = input
            .sold_direct_shipment_kg
            .unwrap_or(existing.sold_direct_shipment_kg);
        let sample_or_damage_kg = input
            .sample_or_damage_kg
            .unwrap_or(existing.sample_or_damage_kg);
        let inter_company_transfer_kg = input
            .inter_company_transfer_kg
            .unwrap_or(existing.inter_company_transfer_kg);
        validation::validate_quantities(&[
            beginning_balance,
            purchase_kg,
            sold_kg,
            purchase_direct_shipment_kg,
            sold_direct_shipment_kg,
            sample_or_damage_kg,
            inter_company_transfer_kg,
        ])?;

        let transfer_to_location = input.transfer_to_location.or(existing.transfer_to_location);
        let recalculate = input.affects_balances();

        sqlx::query(
            r#"
            UPDATE stock_movements
            SET date = $1, location = $2, transaction_type = $3, unit = $4,
                beginning_balance = $5, purchase_kg = $6, sold_kg = $7,
                purchase_direct_shipment_kg = $8, sold_direct_shipment_kg = $9,
                sample_or_damage_kg = $10, inter_company_transfer_kg = $11,
                transfer_to_location = $12, supplier_id = $13, supplier_name = $14,
                customer_id = $15, customer_name = $16, business_model = $17,
                brand = $18, reference = $19, remark = $20, warehouse = $21,
                updated_at = NOW()
            WHERE id = $22
            "#,
        )
        .bind(input.date.unwrap_or(existing.date))
        .bind(location)
        .bind(transaction_type)
        .bind(input.unit.unwrap_or(existing.unit))
        .bind(beginning_balance)
        .bind(purchase_kg)
        .bind(sold_kg)
        .bind(purchase_direct_shipment_kg)
        .bind(sold_direct_shipment_kg)
        .bind(sample_or_damage_kg)
        .bind(inter_company_transfer_kg)
        .bind(transfer_to_location)
        .bind(input.supplier_id.or(existing.supplier_id))
        .bind(input.supplier_name.or(existing.supplier_name))
        .bind(input.customer_id.or(existing.customer_id))
        .bind(input.customer_name.or(existing.customer_name))
        .bind(input.business_model.or(existing.business_model))
        .bind(input.brand.or(existing.brand))
        .bind(input.reference.or(existing.reference))
        .bind(input.remark.or(existing.remark))
        .bind(input.warehouse.or(existing.warehouse))
        .bind(movement_id)
        .execute(&mut *tx)
        .await?;

        if recalculate {
            // Both the pre- and post-patch locations need a fresh chain
            let mut affected = vec![existing.location, location];
            if existing.transaction_type == TransactionType::InterCompanyTransfer {
                if let Some(destination) = existing.transfer_to_location {
                    affected.push(destination);
                }
            }
            if transaction_type == TransactionType::InterCompanyTransfer {
                if let Some(destination) = transfer_to_location {
                    affected.push(destination);
                }
            }
            Self::recalculate(&mut tx, existing.product_id, &affected).await?;
        }

        tx.commit().await?;

        self.get_movement(movement_id).await
    }

    /// Delete a movement and recalculate the locations it vacated
    pub async fn delete_movement(&self, movement_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let existing: StockMovement = sqlx::query_as(&format!(
            "SELECT {} FROM stock_movements WHERE id = $1 FOR UPDATE",
            MOVEMENT_COLUMNS
        ))
        .bind(movement_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Stock movement".to_string()))?;

        sqlx::query("SELECT id FROM products WHERE id = $1 FOR UPDATE")
            .bind(existing.product_id)
            .fetch_optional(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM stock_movements WHERE id = $1")
            .bind(movement_id)
            .execute(&mut *tx)
            .await?;

        // Recalculate with the pre-deletion location values; the row is gone
        let mut affected = vec![existing.location];
        if existing.transaction_type == TransactionType::InterCompanyTransfer {
            if let Some(destination) = existing.transfer_to_location {
                affected.push(destination);
            }
        }
        Self::recalculate(&mut tx, existing.product_id, &affected).await?;

        tx.commit().await?;
        Ok(())
    }

    // =========================================================================
    // Recalculation
    // =========================================================================

    /// Replay and persist balances for every listed location of a product
    async fn recalculate(
        tx: &mut Transaction<'_, Postgres>,
        product_id: Uuid,
        locations: &[Location],
    ) -> AppResult<()> {
        let mut done: Vec<Location> = Vec::with_capacity(locations.len());
        for &location in locations {
            if done.contains(&location) {
                continue;
            }
            done.push(location);

            let movements = Self::movements_for_update(tx, product_id).await?;
            let entries = ledger::entries_affecting(&movements, location);
            let updates = ledger::replay(&entries);
            tracing::debug!(
                product_id = %product_id,
                location = location.as_str(),
                entries = updates.len(),
                "recalculating balances"
            );

            for update in updates {
                sqlx::query(
                    "UPDATE stock_movements SET beginning_balance = $1, balance_kg = $2 WHERE id = $3",
                )
                .bind(update.beginning_balance)
                .bind(update.balance_kg)
                .bind(update.id)
                .execute(&mut **tx)
                .await?;
            }
        }
        Ok(())
    }

    /// Export rows as CSV
    pub fn export_to_csv<T: Serialize>(data: &[T]) -> AppResult<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        for record in data {
            wtr.serialize(record).map_err(|e| {
                AppError::Internal(format!("CSV serialization error: {}", e))
            })?;
        }
        let csv_data = String::from_utf8(
            wtr.into_inner()
                .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?,
        )
        .map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))?;
        Ok(csv_data)
    }

    /// All movements of a product, locked for the duration of the transaction
    async fn movements_for_update(
        tx: &mut Transaction<'_, Postgres>,
        product_id: Uuid,
    ) -> AppResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(&format!(
            "SELECT {} FROM stock_movements WHERE product_id = $1 FOR UPDATE",
            MOVEMENT_COLUMNS
        ))
        .bind(product_id)
        .fetch_all(&mut **tx)
        .await?;
        Ok(movements)
    }
}
