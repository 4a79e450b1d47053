//! Scenario authoring: edit a context, simulate it, save it as a scenario.

use std::collections::BTreeMap;

use brms_api::{ApiError, RuleDocument, RulesApi, SimulationResult};
use brms_core::scenario::{title_taken, variables_from_object};
use brms_core::{build_context, reseed_expected, RuleMap, Scenario, SimulationContext};
use serde_json::{Map, Value};
use tracing::{error, info, warn};

use crate::error::WorkbenchError;
use crate::upsert::upsert_scenario;
use crate::viewer::EditSeed;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorState {
    Idle,
    Simulated,
    Saved,
}

/// Outcome of [`ScenarioGenerator::save`].
///
/// Every attempt that reached the network carries the re-fetched scenario
/// list, whether or not the write itself succeeded.
#[derive(Debug)]
pub enum SaveOutcome {
    /// Preconditions not met; nothing was sent.
    Skipped,
    /// The draft failed validation; nothing was sent.
    Rejected { error: WorkbenchError },
    Saved {
        scenario: Scenario,
        scenarios: Vec<Scenario>,
    },
    Failed {
        error: ApiError,
        scenarios: Vec<Scenario>,
    },
}

impl SaveOutcome {
    /// The refreshed list, when the save reached the network.
    pub fn scenarios(&self) -> Option<&[Scenario]> {
        match self {
            SaveOutcome::Skipped | SaveOutcome::Rejected { .. } => None,
            SaveOutcome::Saved { scenarios, .. } | SaveOutcome::Failed { scenarios, .. } => {
                Some(scenarios)
            }
        }
    }
}

pub struct ScenarioGenerator {
    rule: RuleDocument,
    context: SimulationContext,
    expected: BTreeMap<String, Value>,
    scenario_name: String,
    /// Id of the stored scenario loaded by [`apply_seed`](Self::apply_seed).
    /// Cleared once a save succeeds.
    editing_id: Option<String>,
    simulation_run: bool,
    last_result: Option<SimulationResult>,
    state: GeneratorState,
}

impl ScenarioGenerator {
    pub fn new(rule: RuleDocument, rule_map: &RuleMap) -> Self {
        ScenarioGenerator {
            rule,
            context: build_context(&rule_map.inputs, None),
            expected: reseed_expected(&rule_map.result_outputs, &BTreeMap::new()),
            scenario_name: String::new(),
            editing_id: None,
            simulation_run: false,
            last_result: None,
            state: GeneratorState::Idle,
        }
    }

    pub fn rule(&self) -> &RuleDocument {
        &self.rule
    }

    pub fn set_rule(&mut self, rule: RuleDocument) {
        self.rule = rule;
    }

    pub fn state(&self) -> GeneratorState {
        self.state
    }

    pub fn simulation_run(&self) -> bool {
        self.simulation_run
    }

    pub fn context(&self) -> &SimulationContext {
        &self.context
    }

    pub fn expected(&self) -> &BTreeMap<String, Value> {
        &self.expected
    }

    pub fn scenario_name(&self) -> &str {
        &self.scenario_name
    }

    pub fn last_result(&self) -> Option<&SimulationResult> {
        self.last_result.as_ref()
    }

    /// Replace one input's whole value. Any previous simulation no longer
    /// describes the context, so the generator falls back to `Idle`.
    pub fn set_input(&mut self, field: impl Into<String>, value: Value) {
        self.context.set(field, value);
        self.invalidate();
    }

    /// Replace the whole context, as when a saved scenario is selected.
    pub fn replace_context(&mut self, context: SimulationContext) {
        self.context = context;
        self.invalidate();
    }

    pub fn set_expected(&mut self, field: impl Into<String>, value: Value) {
        self.expected.insert(field.into(), value);
    }

    pub fn set_scenario_name(&mut self, name: impl Into<String>) {
        self.scenario_name = name.into();
    }

    /// Load a stored scenario for editing.
    pub fn apply_seed(&mut self, seed: EditSeed) {
        self.context = seed.context;
        self.expected = seed.expected;
        self.scenario_name = seed.title;
        self.editing_id = seed.scenario_id;
        self.invalidate();
    }

    fn invalidate(&mut self) {
        self.simulation_run = false;
        self.last_result = None;
        self.state = GeneratorState::Idle;
    }

    /// Evaluate the current context against the rule with tracing enabled.
    pub async fn simulate(&mut self, api: &dyn RulesApi) -> Result<&SimulationResult, ApiError> {
        let input = self.context.evaluation_input();
        match api.evaluate(&self.rule.content, &input, true).await {
            Ok(result) => {
                info!(filepath = %self.rule.filepath, fields = result.result.len(), "simulation complete");
                self.simulation_run = true;
                self.state = GeneratorState::Simulated;
                Ok(&*self.last_result.insert(result))
            }
            Err(e) => {
                warn!(filepath = %self.rule.filepath, error = %e, "simulation failed");
                Err(e)
            }
        }
    }

    /// True when [`save`](Self::save) would reach the network.
    pub fn can_save(&self) -> bool {
        self.simulation_run && self.context.has_inputs() && !self.scenario_name.trim().is_empty()
    }

    /// The scenario a save would persist.
    pub fn draft(&self) -> Scenario {
        Scenario {
            id: self.editing_id.clone(),
            title: self.scenario_name.trim().to_string(),
            rule_id: self.rule.rule_id.clone(),
            filepath: self.rule.filepath.clone(),
            variables: variables_from_object(&self.context.evaluation_input()),
            expected_results: variables_from_object(&self.expected_results()),
        }
    }

    /// Entered expected values that are not null, or the simulated result
    /// when nothing was entered.
    fn expected_results(&self) -> Map<String, Value> {
        let entered: Map<String, Value> = self
            .expected
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if !entered.is_empty() {
            return entered;
        }
        self.last_result
            .as_ref()
            .map(|r| r.result.clone())
            .unwrap_or_default()
    }

    /// Create or update the scenario, then re-fetch the rule's scenarios.
    ///
    /// `scenarios` is the list currently loaded; it decides between update
    /// and create and is returned unchanged if the re-fetch fails. A draft
    /// edited from a stored scenario is rejected when its title belongs to a
    /// different scenario.
    pub async fn save(&mut self, api: &dyn RulesApi, scenarios: &[Scenario]) -> SaveOutcome {
        if !self.can_save() {
            return SaveOutcome::Skipped;
        }
        let draft = self.draft();
        if draft.id.is_some() && title_taken(scenarios, &draft.title, draft.id.as_deref()) {
            return SaveOutcome::Rejected {
                error: WorkbenchError::DuplicateTitle { title: draft.title },
            };
        }
        let written = upsert_scenario(api, scenarios, &draft).await;
        let refreshed = refresh_scenarios(api, &self.rule.filepath, scenarios).await;
        match written {
            Ok(scenario) => {
                self.state = GeneratorState::Saved;
                self.editing_id = None;
                SaveOutcome::Saved {
                    scenario,
                    scenarios: refreshed,
                }
            }
            Err(e) => {
                error!(scenario = %draft.title, filepath = %draft.filepath, error = %e, "failed to save scenario");
                SaveOutcome::Failed {
                    error: e,
                    scenarios: refreshed,
                }
            }
        }
    }

    /// Rebuild from the rule map: fresh context, expected values reseeded
    /// from `resultOutputs`, back to `Idle`.
    pub fn reset(&mut self, rule_map: &RuleMap) {
        self.context = build_context(&rule_map.inputs, None);
        self.expected = reseed_expected(&rule_map.result_outputs, &self.expected);
        self.scenario_name.clear();
        self.editing_id = None;
        self.invalidate();
    }
}

/// Fetch the canonical list for `filepath`, falling back to `current`.
pub(crate) async fn refresh_scenarios(
    api: &dyn RulesApi,
    filepath: &str,
    current: &[Scenario],
) -> Vec<Scenario> {
    match api.list_scenarios(filepath).await {
        Ok(list) => list,
        Err(e) => {
            warn!(%filepath, error = %e, "failed to refresh scenarios");
            current.to_vec()
        }
    }
}
