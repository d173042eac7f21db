use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{BoughtTogether, Product, ProductId},
    routes::AppState,
    services::recommendations::{DEFAULT_BOUGHT_TOGETHER_LIMIT, DEFAULT_RECOMMENDATION_LIMIT},
};

pub const MAX_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

fn resolve_limit(requested: Option<usize>, default: usize) -> AppResult<usize> {
    match requested.unwrap_or(default) {
        limit @ 1..=MAX_LIMIT => Ok(limit),
        _ => Err(AppError::InvalidInput(format!(
            "limit must be between 1 and {}",
            MAX_LIMIT
        ))),
    }
}

/// Handler for product recommendations
pub async fn recommend(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<i64>,
    Query(query): Query<LimitQuery>,
) -> AppResult<Json<Vec<Product>>> {
    let limit = resolve_limit(query.limit, DEFAULT_RECOMMENDATION_LIMIT)?;

    let products = state
        .recommendations
        .get_product_recommendations(ProductId(product_id), limit)
        .await;

    Ok(Json(products))
}

/// Handler for "frequently bought together"
pub async fn bought_together(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<i64>,
    Query(query): Query<LimitQuery>,
) -> AppResult<Json<Vec<BoughtTogether>>> {
    let limit = resolve_limit(query.limit, DEFAULT_BOUGHT_TOGETHER_LIMIT)?;

    let products = state
        .recommendations
        .get_frequently_bought_together(ProductId(product_id), limit)
        .await;

    Ok(Json(products))
}

/// Cache invalidation hook, e.g. after a bulk order import
pub async fn clear_cache(State(state): State<Arc<AppState>>) -> StatusCode {
    state.recommendations.clear_cache();
    StatusCode::NO_CONTENT
}
