//! Route definitions for the ChemTrade CRM/PMS platform

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes - stock management
        .nest("/stock", stock_routes())
        // Protected routes - CRM
        .nest("/customers", customer_routes())
        // Protected routes - PMS product master
        .nest("/pms", pms_routes())
        // Protected routes - sales pipelines
        .nest("/pipelines", pipeline_routes())
}

/// Stock management routes (protected)
fn stock_routes() -> Router<AppState> {
    Router::new()
        // Products
        .route(
            "/products",
            get(handlers::list_products).post(handlers::create_product),
        )
        .route("/products/by-tds/:tds_id", get(handlers::get_product_by_tds))
        .route(
            "/products/:product_id",
            get(handlers::get_product)
                .put(handlers::update_product)
                .delete(handlers::delete_product),
        )
        .route("/products/:product_id/stock", get(handlers::get_product_stock))
        // Movements
        .route(
            "/movements",
            get(handlers::list_movements).post(handlers::create_movement),
        )
        .route("/movements/export", get(handlers::export_movements))
        .route(
            "/movements/:movement_id",
            get(handlers::get_movement)
                .put(handlers::update_movement)
                .delete(handlers::delete_movement),
        )
        // Availability summary
        .route("/availability", get(handlers::get_stock_availability))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// CRM routes (protected)
fn customer_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_customers).post(handlers::create_customer),
        )
        .route("/search", get(handlers::search_customers))
        .route("/dashboard/metrics", get(handlers::get_dashboard_metrics))
        .route(
            "/:customer_id",
            get(handlers::get_customer)
                .put(handlers::update_customer)
                .delete(handlers::delete_customer),
        )
        .route(
            "/:customer_id/interactions",
            get(handlers::list_interactions).post(handlers::create_interaction),
        )
        .route(
            "/:customer_id/interactions/:interaction_id",
            put(handlers::update_interaction).delete(handlers::delete_interaction),
        )
        .route("/:customer_id/chat", post(handlers::chat_with_customer))
        .route(
            "/:customer_id/profile/refresh",
            post(handlers::refresh_customer_profile),
        )
        .route_layer(middleware::from_fn(auth_middleware))
}

/// PMS routes (protected)
fn pms_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/chemical-types",
            get(handlers::list_chemical_types).post(handlers::create_chemical_type),
        )
        .route("/chemical-types/categories", get(handlers::list_categories))
        .route("/tds", get(handlers::list_tds).post(handlers::create_tds))
        .route(
            "/tds/:tds_id",
            get(handlers::get_tds).put(handlers::update_tds),
        )
        .route(
            "/partners",
            get(handlers::list_partners).post(handlers::create_partner),
        )
        .route("/partners/:partner_id", get(handlers::get_partner))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Sales pipeline routes (protected)
fn pipeline_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_pipelines).post(handlers::create_pipeline),
        )
        .route("/forecast", get(handlers::get_pipeline_forecast))
        .route(
            "/:pipeline_id",
            get(handlers::get_pipeline)
                .put(handlers::update_pipeline)
                .delete(handlers::delete_pipeline),
        )
        .route(
            "/:pipeline_id/advance",
            post(handlers::advance_pipeline_stage),
        )
        .route_layer(middleware::from_fn(auth_middleware))
}
