use axum::{
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::services::RecommendationService;

pub mod analysis;
pub mod recommendations;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub recommendations: RecommendationService,
}

impl AppState {
    pub fn new(recommendations: RecommendationService) -> Self {
        Self { recommendations }
    }
}

/// Creates the application router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(Arc::new(state))
}

/// API routes under /api/v1
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/products/:product_id/recommendations",
            get(recommendations::recommend),
        )
        .route(
            "/products/:product_id/bought-together",
            get(recommendations::bought_together),
        )
        .route(
            "/recommendations/cache/clear",
            post(recommendations::clear_cache),
        )
        .route("/analysis", get(analysis::analyze))
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}
