//! Scenario Harness
//!
//! Fires batches of concurrent admission attempts through the real
//! service layer to exercise the protocol's concurrency contracts:
//! duplicate races, descending-price floor races, and deactivations
//! landing inside the processing window.

pub mod runner;

pub use runner::ScenarioRunner;

use serde::Serialize;
use uuid::Uuid;

/// Outcome of one admission attempt (or of the deactivation step in the
/// deactivation-race scenario), reported in harness-assigned index order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioAttempt {
    pub index: usize,
    pub success: bool,
    /// Protocol reason code, or a harness-level code
    /// (`HARNESS_TIMEOUT`, `HARNESS_PANIC`) when the attempt itself did
    /// not resolve.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<Uuid>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioSummary {
    pub scenario: String,
    pub requested: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub attempts: Vec<ScenarioAttempt>,
}
