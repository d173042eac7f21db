use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::models::ProductId;

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Mining error: {0}")]
    Mining(#[from] MiningError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Reasons a mining run produced nothing to serve.
///
/// The first two variants mean "not enough signal" and are expected in
/// small shops; the rest indicate a misconfiguration or a broken invariant.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum MiningError {
    #[error("insufficient transactions: found {found}, need at least 2")]
    InsufficientTransactions { found: usize },

    #[error("no frequent itemsets at min_support {min_support}")]
    NoFrequentItemsets { min_support: f64 },

    #[error("invalid {name} threshold: {value}")]
    InvalidThreshold { name: &'static str, value: f64 },

    #[error("support missing for sub-itemset {0:?}")]
    MissingSupport(Vec<ProductId>),

    #[error("itemset of {0} items is too large to enumerate rules for")]
    ItemsetTooLarge(usize),
}

impl MiningError {
    /// Whether this error only means the data carries no usable signal.
    /// Callers turn these into empty results rather than surfacing them.
    pub fn is_insufficient_data(&self) -> bool {
        matches!(
            self,
            MiningError::InsufficientTransactions { .. } | MiningError::NoFrequentItemsets { .. }
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Database(_)
            | AppError::Cache(_)
            | AppError::Serialization(_)
            | AppError::Mining(_)
            | AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
