//! HTTP handlers for PMS endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use shared::models::{
    ChemicalTypeListResponse, Partner, PartnerListResponse, Tds, TdsListResponse,
};
use shared::types::ListQuery;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::pms::{
    CreateChemicalTypeInput, CreatePartnerInput, CreateTdsInput, PmsService, UpdateTdsInput,
};
use crate::AppState;

/// List chemical types
pub async fn list_chemical_types(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(page): Query<ListQuery>,
) -> AppResult<Json<ChemicalTypeListResponse>> {
    let page = page.clamped();
    let service = PmsService::new(state.db);
    let chemicals = service.list_chemical_types(page.limit, page.offset).await?;
    let total = service.count_chemical_types().await?;
    Ok(Json(ChemicalTypeListResponse {
        chemicals,
        total,
        limit: page.limit,
        offset: page.offset,
    }))
}

/// Create a chemical type
pub async fn create_chemical_type(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Json(input): Json<CreateChemicalTypeInput>,
) -> AppResult<(StatusCode, Json<shared::models::ChemicalType>)> {
    let service = PmsService::new(state.db);
    let chemical = service.create_chemical_type(input).await?;
    Ok((StatusCode::CREATED, Json(chemical)))
}

/// Distinct chemical categories
pub async fn list_categories(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<String>>> {
    let service = PmsService::new(state.db);
    let categories = service.list_categories().await?;
    Ok(Json(categories))
}

/// List TDS records
pub async fn list_tds(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(page): Query<ListQuery>,
) -> AppResult<Json<TdsListResponse>> {
    let page = page.clamped();
    let service = PmsService::new(state.db);
    let tds = service.list_tds(page.limit, page.offset).await?;
    let total = service.count_tds().await?;
    Ok(Json(TdsListResponse {
        tds,
        total,
        limit: page.limit,
        offset: page.offset,
    }))
}

/// Get a TDS record
pub async fn get_tds(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(tds_id): Path<Uuid>,
) -> AppResult<Json<Tds>> {
    let service = PmsService::new(state.db);
    let tds = service.get_tds(tds_id).await?;
    Ok(Json(tds))
}

/// Create a TDS record
pub async fn create_tds(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Json(input): Json<CreateTdsInput>,
) -> AppResult<(StatusCode, Json<Tds>)> {
    let service = PmsService::new(state.db);
    let tds = service.create_tds(input).await?;
    Ok((StatusCode::CREATED, Json(tds)))
}

/// Update a TDS record
pub async fn update_tds(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(tds_id): Path<Uuid>,
    Json(input): Json<UpdateTdsInput>,
) -> AppResult<Json<Tds>> {
    let service = PmsService::new(state.db);
    let tds = service.update_tds(tds_id, input).await?;
    Ok(Json(tds))
}

/// List partners
pub async fn list_partners(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(page): Query<ListQuery>,
) -> AppResult<Json<PartnerListResponse>> {
    let page = page.clamped();
    let service = PmsService::new(state.db);
    let partners = service.list_partners(page.limit, page.offset).await?;
    let total = service.count_partners().await?;
    Ok(Json(PartnerListResponse {
        partners,
        total,
        limit: page.limit,
        offset: page.offset,
    }))
}

/// Get a partner
pub async fn get_partner(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(partner_id): Path<Uuid>,
) -> AppResult<Json<Partner>> {
    let service = PmsService::new(state.db);
    let partner = service.get_partner(partner_id).await?;
    Ok(Json(partner))
}

/// Create a partner
pub async fn create_partner(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Json(input): Json<CreatePartnerInput>,
) -> AppResult<(StatusCode, Json<Partner>)> {
    let service = PmsService::new(state.db);
    let partner = service.create_partner(input).await?;
    Ok((StatusCode::CREATED, Json(partner)))
}
