use std::collections::BTreeMap;

use async_trait::async_trait;
use brms_core::{RuleField, RuleMap, Scenario};
use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::record::{DecisionRun, SimulationResult};

/// The decision-engine service as seen by the workbench.
///
/// Every call is a single request/response; implementations do no queuing,
/// batching or retrying. Decision results are validated before they are
/// returned: an array result surfaces as [`ApiError::MultipleResults`].
///
/// Implementations must be `Send + Sync` so one client can be shared across
/// the concurrent writes of a "save all".
#[async_trait]
pub trait RulesApi: Send + Sync {
    // ── Rule maps ─────────────────────────────────────────────────────────────

    /// Authoritative rule map of a rule file.
    async fn get_rule_map(&self, filepath: &str, rule_content: &Value)
        -> Result<RuleMap, ApiError>;

    /// Rule map derived from graph content alone, ignoring any stored map.
    async fn generate_rule_map(&self, rule_content: &Value) -> Result<RuleMap, ApiError>;

    /// Field definitions matching a search text.
    async fn search_fields(&self, query: &str) -> Result<Vec<RuleField>, ApiError>;

    // ── Evaluation ────────────────────────────────────────────────────────────

    /// Evaluate the rule once against `context`.
    async fn evaluate(
        &self,
        rule_content: &Value,
        context: &Map<String, Value>,
        trace: bool,
    ) -> Result<SimulationResult, ApiError>;

    /// Re-run every stored scenario of `filepath` against `rule_content`,
    /// keyed by scenario title.
    async fn run_decisions(
        &self,
        filepath: &str,
        rule_content: &Value,
    ) -> Result<BTreeMap<String, DecisionRun>, ApiError>;

    // ── Scenarios ─────────────────────────────────────────────────────────────

    async fn list_scenarios(&self, filepath: &str) -> Result<Vec<Scenario>, ApiError>;

    /// Persist a new scenario. The returned copy carries the server `_id`.
    async fn create_scenario(&self, scenario: &Scenario) -> Result<Scenario, ApiError>;

    /// Replace the scenario stored under `id`.
    async fn update_scenario(&self, id: &str, scenario: &Scenario) -> Result<Scenario, ApiError>;

    async fn delete_scenario(&self, id: &str) -> Result<(), ApiError>;
}
