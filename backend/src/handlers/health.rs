//! Health check handler

use axum::{extract::State, Json};
use serde::Serialize;

use crate::error::AppResult;
use crate::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub environment: String,
    pub database: &'static str,
}

/// Health check endpoint; verifies database connectivity
pub async fn health_check(State(state): State<AppState>) -> AppResult<Json<HealthResponse>> {
    let database = match sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.db)
        .await
    {
        Ok(_) => "up",
        Err(_) => "down",
    };

    Ok(Json(HealthResponse {
        status: "ok",
        environment: state.config.environment.clone(),
        database,
    }))
}
