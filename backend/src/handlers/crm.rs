//! HTTP handlers for CRM endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use shared::models::{
    Customer, CustomerListResponse, DashboardMetrics, Interaction, InteractionListResponse,
    ProfileUpdateJob,
};
use shared::types::ListQuery;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::crm::{
    CreateCustomerInput, CreateInteractionInput, CrmService, CustomerChatRequest,
    CustomerChatResponse, UpdateCustomerInput, UpdateInteractionInput,
};
use crate::AppState;

/// Query parameters for customer search
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    #[serde(default = "default_search_limit")]
    pub limit: i64,
}

fn default_search_limit() -> i64 {
    20
}

/// List customers
pub async fn list_customers(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(page): Query<ListQuery>,
) -> AppResult<Json<CustomerListResponse>> {
    let page = page.clamped();
    let service = CrmService::new(state.db, state.gemini);
    let customers = service.list_customers(page.limit, page.offset).await?;
    let total = service.count_customers().await?;
    Ok(Json(CustomerListResponse {
        customers,
        total,
        limit: page.limit,
        offset: page.offset,
    }))
}

/// Search customers by name
pub async fn search_customers(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Vec<Customer>>> {
    let service = CrmService::new(state.db, state.gemini);
    let customers = service.search_customers(&query.q, query.limit).await?;
    Ok(Json(customers))
}

/// Get a customer
pub async fn get_customer(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(customer_id): Path<Uuid>,
) -> AppResult<Json<Customer>> {
    let service = CrmService::new(state.db, state.gemini);
    let customer = service.get_customer(customer_id).await?;
    Ok(Json(customer))
}

/// Create a customer
pub async fn create_customer(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Json(input): Json<CreateCustomerInput>,
) -> AppResult<(StatusCode, Json<Customer>)> {
    let service = CrmService::new(state.db, state.gemini);
    let customer = service.create_customer(input).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

/// Update a customer
pub async fn update_customer(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(customer_id): Path<Uuid>,
    Json(input): Json<UpdateCustomerInput>,
) -> AppResult<Json<Customer>> {
    let service = CrmService::new(state.db, state.gemini);
    let customer = service.update_customer(customer_id, input).await?;
    Ok(Json(customer))
}

/// Delete a customer
pub async fn delete_customer(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(customer_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = CrmService::new(state.db, state.gemini);
    service.delete_customer(customer_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// List interactions for a customer
pub async fn list_interactions(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(customer_id): Path<Uuid>,
    Query(page): Query<ListQuery>,
) -> AppResult<Json<InteractionListResponse>> {
    let page = page.clamped();
    let service = CrmService::new(state.db, state.gemini);
    let interactions = service
        .list_interactions(customer_id, page.limit, page.offset)
        .await?;
    let total = service.count_interactions(customer_id).await?;
    Ok(Json(InteractionListResponse {
        interactions,
        total,
        limit: page.limit,
        offset: page.offset,
    }))
}

/// Record an interaction for a customer
pub async fn create_interaction(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(customer_id): Path<Uuid>,
    Json(input): Json<CreateInteractionInput>,
) -> AppResult<(StatusCode, Json<Interaction>)> {
    let service = CrmService::new(state.db, state.gemini);
    let interaction = service
        .create_interaction(customer_id, Some(current_user.0.user_id), input)
        .await?;
    Ok((StatusCode::CREATED, Json(interaction)))
}

/// Update an interaction
pub async fn update_interaction(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path((_customer_id, interaction_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<UpdateInteractionInput>,
) -> AppResult<Json<Interaction>> {
    let service = CrmService::new(state.db, state.gemini);
    let interaction = service.update_interaction(interaction_id, input).await?;
    Ok(Json(interaction))
}

/// Delete an interaction
pub async fn delete_interaction(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path((_customer_id, interaction_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    let service = CrmService::new(state.db, state.gemini);
    service.delete_interaction(interaction_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Chat with the AI about a customer
pub async fn chat_with_customer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(customer_id): Path<Uuid>,
    Json(request): Json<CustomerChatRequest>,
) -> AppResult<Json<CustomerChatResponse>> {
    let service = CrmService::new(state.db, state.gemini);
    let response = service
        .chat_with_customer(customer_id, Some(current_user.0.user_id), request)
        .await?;
    Ok(Json(response))
}

/// Queue a profile refresh for the background worker
pub async fn refresh_customer_profile(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(customer_id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<ProfileUpdateJob>)> {
    let service = CrmService::new(state.db, state.gemini);
    let job = service.enqueue_profile_refresh(customer_id, None).await?;
    Ok((StatusCode::ACCEPTED, Json(job)))
}

/// CRM dashboard metrics
pub async fn get_dashboard_metrics(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<DashboardMetrics>> {
    let service = CrmService::new(state.db, state.gemini);
    let metrics = service.dashboard_metrics().await?;
    Ok(Json(metrics))
}
