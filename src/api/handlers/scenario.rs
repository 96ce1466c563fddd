//! Scenario endpoints: kick off a concurrency scenario and return its
//! aggregated summary.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use super::{to_api_error, ApiError};
use crate::scenario::ScenarioSummary;
use crate::AppState;

fn default_n() -> usize {
    10
}

fn default_deactivate_after_ms() -> u64 {
    1000
}

#[derive(Debug, Deserialize)]
pub struct ScenarioQuery {
    #[serde(default = "default_n")]
    pub n: usize,
}

#[derive(Debug, Deserialize)]
pub struct DeactivationQuery {
    #[serde(default = "default_n")]
    pub n: usize,
    #[serde(rename = "deactivateAfterMs", default = "default_deactivate_after_ms")]
    pub deactivate_after_ms: u64,
}

/// POST /api/scenarios/duplicates?n=10
pub async fn duplicates(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ScenarioQuery>,
) -> Result<Json<ScenarioSummary>, ApiError> {
    let summary = state
        .scenarios
        .duplicates(params.n)
        .await
        .map_err(to_api_error)?;
    Ok(Json(summary))
}

/// POST /api/scenarios/descending?n=10
pub async fn descending(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ScenarioQuery>,
) -> Result<Json<ScenarioSummary>, ApiError> {
    let summary = state
        .scenarios
        .descending(params.n)
        .await
        .map_err(to_api_error)?;
    Ok(Json(summary))
}

/// POST /api/scenarios/deactivation?n=10&deactivateAfterMs=1000
pub async fn deactivation(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DeactivationQuery>,
) -> Result<Json<ScenarioSummary>, ApiError> {
    let summary = state
        .scenarios
        .deactivation_race(params.n, Duration::from_millis(params.deactivate_after_ms))
        .await
        .map_err(to_api_error)?;
    Ok(Json(summary))
}
