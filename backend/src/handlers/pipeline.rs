//! HTTP handlers for sales pipeline endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use shared::models::{PipelineForecast, SalesPipeline, SalesPipelineListResponse};
use shared::types::ListQuery;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::pipeline::{
    AdvanceStageInput, CreatePipelineInput, PipelineFilter, PipelineService, UpdatePipelineInput,
};
use crate::AppState;

/// Query parameters for the pipeline forecast
#[derive(Debug, Deserialize)]
pub struct ForecastQuery {
    #[serde(default = "default_days_ahead")]
    pub days_ahead: i64,
    pub customer_id: Option<Uuid>,
}

fn default_days_ahead() -> i64 {
    30
}

/// List pipeline records
pub async fn list_pipelines(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(page): Query<ListQuery>,
    Query(filter): Query<PipelineFilter>,
) -> AppResult<Json<SalesPipelineListResponse>> {
    let page = page.clamped();
    let service = PipelineService::new(state.db, state.gemini);
    let pipelines = service
        .list_pipelines(&filter, page.limit, page.offset)
        .await?;
    let total = service.count_pipelines(&filter).await?;
    Ok(Json(SalesPipelineListResponse {
        pipelines,
        total,
        limit: page.limit,
        offset: page.offset,
    }))
}

/// Get a pipeline record
pub async fn get_pipeline(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(pipeline_id): Path<Uuid>,
) -> AppResult<Json<SalesPipeline>> {
    let service = PipelineService::new(state.db, state.gemini);
    let pipeline = service.get_pipeline(pipeline_id).await?;
    Ok(Json(pipeline))
}

/// Create a pipeline record
pub async fn create_pipeline(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Json(input): Json<CreatePipelineInput>,
) -> AppResult<(StatusCode, Json<SalesPipeline>)> {
    let service = PipelineService::new(state.db, state.gemini);
    let pipeline = service.create_pipeline(input).await?;
    Ok((StatusCode::CREATED, Json(pipeline)))
}

/// Update a pipeline record
pub async fn update_pipeline(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(pipeline_id): Path<Uuid>,
    Json(input): Json<UpdatePipelineInput>,
) -> AppResult<Json<SalesPipeline>> {
    let service = PipelineService::new(state.db, state.gemini);
    let pipeline = service.update_pipeline(pipeline_id, input).await?;
    Ok(Json(pipeline))
}

/// Delete a pipeline record
pub async fn delete_pipeline(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(pipeline_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = PipelineService::new(state.db, state.gemini);
    service.delete_pipeline(pipeline_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Advance a pipeline to a new stage
pub async fn advance_pipeline_stage(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(pipeline_id): Path<Uuid>,
    Json(input): Json<AdvanceStageInput>,
) -> AppResult<Json<SalesPipeline>> {
    let service = PipelineService::new(state.db, state.gemini);
    let pipeline = service.advance_stage(pipeline_id, input).await?;
    Ok(Json(pipeline))
}

/// Revenue forecast for the coming window
pub async fn get_pipeline_forecast(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<ForecastQuery>,
) -> AppResult<Json<PipelineForecast>> {
    let service = PipelineService::new(state.db, state.gemini);
    let forecast = service
        .forecast(query.days_ahead, query.customer_id)
        .await?;
    Ok(Json(forecast))
}
