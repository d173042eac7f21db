use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::AnalysisReport,
    routes::AppState,
};

const DEFAULT_TOP_RULES: usize = 10;
const MAX_TOP_RULES: usize = 100;

/// Threshold overrides; unset fields use the service configuration
#[derive(Debug, Deserialize)]
pub struct AnalysisQuery {
    pub min_support: Option<f64>,
    pub min_confidence: Option<f64>,
    pub max_len: Option<usize>,
    pub top: Option<usize>,
}

/// Handler for the operational analysis report
///
/// Runs a fresh mining pass (never cached) and reports the strongest rules
/// with product names.
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AnalysisQuery>,
) -> AppResult<Json<AnalysisReport>> {
    let mut config = *state.recommendations.apriori_config();
    if let Some(min_support) = query.min_support {
        config.min_support = min_support;
    }
    if let Some(min_confidence) = query.min_confidence {
        config.min_confidence = min_confidence;
    }
    if query.max_len.is_some() {
        config.max_len = query.max_len;
    }

    config
        .validate()
        .map_err(|e| AppError::InvalidInput(e.to_string()))?;

    let top = query.top.unwrap_or(DEFAULT_TOP_RULES).min(MAX_TOP_RULES);

    tracing::info!(
        min_support = config.min_support,
        min_confidence = config.min_confidence,
        top,
        "Running analysis report"
    );

    let report = state.recommendations.analysis_report(&config, top).await?;

    tracing::info!(
        transactions = report.transaction_count,
        rules = report.rule_count,
        "Analysis report completed"
    );

    Ok(Json(report))
}
