//! HTTP handlers for stock management endpoints

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use uuid::Uuid;

use shared::models::{
    ProductListResponse, ProductStock, ProductWithStock, StockAvailabilitySummary, StockMovement,
    StockMovementListResponse,
};
use shared::types::ListQuery;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::stock::{
    CreateMovementInput, CreateProductInput, MovementFilter, ProductFilter, StockService,
    UpdateMovementInput, UpdateProductInput,
};
use crate::AppState;

// =============================================================================
// Products
// =============================================================================

/// List products with computed stock
pub async fn list_products(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(page): Query<ListQuery>,
    Query(filter): Query<ProductFilter>,
) -> AppResult<Json<ProductListResponse>> {
    let page = page.clamped();
    let service = StockService::new(state.db);
    let products = service
        .list_products(&filter, page.limit, page.offset)
        .await?;
    let total = service.count_products(&filter).await?;
    Ok(Json(ProductListResponse {
        products,
        total,
        limit: page.limit,
        offset: page.offset,
    }))
}

/// Get a product with computed stock
pub async fn get_product(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<ProductWithStock>> {
    let service = StockService::new(state.db);
    let product = service.get_product(product_id).await?;
    Ok(Json(product))
}

/// Get the product linked to a TDS record
pub async fn get_product_by_tds(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(tds_id): Path<Uuid>,
) -> AppResult<Json<ProductWithStock>> {
    let service = StockService::new(state.db);
    let product = service.get_product_by_tds(tds_id).await?;
    Ok(Json(product))
}

/// Create a product
pub async fn create_product(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Json(input): Json<CreateProductInput>,
) -> AppResult<(StatusCode, Json<ProductWithStock>)> {
    let service = StockService::new(state.db);
    let product = service.create_product(input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// Update a product
pub async fn update_product(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
    Json(input): Json<UpdateProductInput>,
) -> AppResult<Json<ProductWithStock>> {
    let service = StockService::new(state.db);
    let product = service.update_product(product_id, input).await?;
    Ok(Json(product))
}

/// Delete a product
pub async fn delete_product(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = StockService::new(state.db);
    service.delete_product(product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Per-location stock for a product
pub async fn get_product_stock(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<ProductStock>> {
    let service = StockService::new(state.db);
    let stock = service.get_product_stock(product_id).await?;
    Ok(Json(stock))
}

// =============================================================================
// Stock movements
// =============================================================================

/// List stock movements
pub async fn list_movements(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(page): Query<ListQuery>,
    Query(filter): Query<MovementFilter>,
) -> AppResult<Json<StockMovementListResponse>> {
    let page = page.clamped();
    let service = StockService::new(state.db);
    let movements = service
        .list_movements(&filter, page.limit, page.offset)
        .await?;
    let total = service.count_movements(&filter).await?;
    Ok(Json(StockMovementListResponse {
        movements,
        total,
        limit: page.limit,
        offset: page.offset,
    }))
}

/// Get a single stock movement
pub async fn get_movement(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(movement_id): Path<Uuid>,
) -> AppResult<Json<StockMovement>> {
    let service = StockService::new(state.db);
    let movement = service.get_movement(movement_id).await?;
    Ok(Json(movement))
}

/// Create a stock movement; balances are recalculated before returning
pub async fn create_movement(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Json(input): Json<CreateMovementInput>,
) -> AppResult<(StatusCode, Json<StockMovement>)> {
    let service = StockService::new(state.db);
    let movement = service.create_movement(input).await?;
    Ok((StatusCode::CREATED, Json(movement)))
}

/// Update a stock movement; balances are recalculated when quantities change
pub async fn update_movement(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(movement_id): Path<Uuid>,
    Json(input): Json<UpdateMovementInput>,
) -> AppResult<Json<StockMovement>> {
    let service = StockService::new(state.db);
    let movement = service.update_movement(movement_id, input).await?;
    Ok(Json(movement))
}

/// Delete a stock movement; balances are recalculated afterwards
pub async fn delete_movement(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(movement_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = StockService::new(state.db);
    service.delete_movement(movement_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Export the movement ledger as CSV
pub async fn export_movements(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(filter): Query<MovementFilter>,
) -> AppResult<Response> {
    let service = StockService::new(state.db);
    let movements = service.list_movements(&filter, 10000, 0).await?;
    let csv = StockService::export_to_csv(&movements)?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"stock_movements.csv\"",
            ),
        ],
        csv,
    )
        .into_response())
}

// =============================================================================
// Availability summary
// =============================================================================

/// Stock availability summary across products
pub async fn get_stock_availability(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(page): Query<ListQuery>,
    Query(filter): Query<ProductFilter>,
) -> AppResult<Json<Vec<StockAvailabilitySummary>>> {
    let page = page.clamped();
    let service = StockService::new(state.db);
    let summary = service
        .availability_summary(&filter, page.limit, page.offset)
        .await?;
    Ok(Json(summary))
}
