//! In-process [`RulesApi`]: scenarios live in memory, rule maps are inferred
//! from the graph and evaluation is delegated to a pluggable closure.
//!
//! Every call is recorded so callers can assert on the exact traffic, and
//! individual operations can be made to fail.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use brms_core::{DecisionGraph, RuleField, RuleMap, Scenario};
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::error::ApiError;
use crate::record::{
    validate_decision_runs, DecisionRun, EvaluateResponse, RawDecisionRun, SimulationResult,
};
use crate::traits::RulesApi;

/// Evaluates rule content against a context and returns the raw result.
pub type Evaluator = Arc<dyn Fn(&Value, &Map<String, Value>) -> Value + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operation {
    GetRuleMap,
    GenerateRuleMap,
    SearchFields,
    Evaluate,
    RunDecisions,
    ListScenarios,
    CreateScenario,
    UpdateScenario,
    DeleteScenario,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::GetRuleMap => "get_rule_map",
            Operation::GenerateRuleMap => "generate_rule_map",
            Operation::SearchFields => "search_fields",
            Operation::Evaluate => "evaluate",
            Operation::RunDecisions => "run_decisions",
            Operation::ListScenarios => "list_scenarios",
            Operation::CreateScenario => "create_scenario",
            Operation::UpdateScenario => "update_scenario",
            Operation::DeleteScenario => "delete_scenario",
        };
        f.write_str(name)
    }
}

/// A recorded call: the operation and its key argument (filepath, id,
/// title or query).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiCall {
    pub op: Operation,
    pub detail: String,
}

#[derive(Default)]
struct MemoryState {
    scenarios: Vec<Scenario>,
    next_id: u64,
    rule_maps: BTreeMap<String, RuleMap>,
    fields: Vec<RuleField>,
    calls: Vec<ApiCall>,
    failing: BTreeSet<Operation>,
    search_latency: Option<Duration>,
}

pub struct InMemoryRulesApi {
    state: Mutex<MemoryState>,
    evaluator: Evaluator,
}

impl Default for InMemoryRulesApi {
    fn default() -> Self {
        InMemoryRulesApi::new()
    }
}

impl InMemoryRulesApi {
    /// An empty store whose evaluator returns `{}` for every context.
    pub fn new() -> Self {
        InMemoryRulesApi {
            state: Mutex::new(MemoryState {
                next_id: 1,
                ..MemoryState::default()
            }),
            evaluator: Arc::new(|_, _| Value::Object(Map::new())),
        }
    }

    pub fn with_evaluator<F>(mut self, evaluator: F) -> Self
    where
        F: Fn(&Value, &Map<String, Value>) -> Value + Send + Sync + 'static,
    {
        self.evaluator = Arc::new(evaluator);
        self
    }

    /// Seed stored scenarios. Scenarios without an id get one assigned.
    pub async fn insert_scenarios(&self, scenarios: Vec<Scenario>) {
        let mut state = self.state.lock().await;
        for mut s in scenarios {
            if s.id.is_none() {
                s.id = Some(state.allocate_id());
            }
            state.scenarios.push(s);
        }
    }

    /// Register the authoritative rule map for a file. Files without one get
    /// the graph-derived map.
    pub async fn set_rule_map(&self, filepath: &str, rule_map: RuleMap) {
        self.state
            .lock()
            .await
            .rule_maps
            .insert(filepath.to_string(), rule_map);
    }

    pub async fn set_fields(&self, fields: Vec<RuleField>) {
        self.state.lock().await.fields = fields;
    }

    /// Delay every field search by `latency`.
    pub async fn set_search_latency(&self, latency: Duration) {
        self.state.lock().await.search_latency = Some(latency);
    }

    /// Make every later call of `op` fail with HTTP 500.
    pub async fn fail_on(&self, op: Operation) {
        self.state.lock().await.failing.insert(op);
    }

    pub async fn clear_failures(&self) {
        self.state.lock().await.failing.clear();
    }

    pub async fn calls(&self) -> Vec<ApiCall> {
        self.state.lock().await.calls.clone()
    }

    /// Recorded calls of one operation.
    pub async fn calls_of(&self, op: Operation) -> Vec<ApiCall> {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|c| c.op == op)
            .cloned()
            .collect()
    }

    pub async fn clear_calls(&self) {
        self.state.lock().await.calls.clear();
    }

    pub async fn stored_scenarios(&self) -> Vec<Scenario> {
        self.state.lock().await.scenarios.clone()
    }

    /// Record the call and apply failure injection.
    async fn enter(&self, op: Operation, detail: impl Into<String>) -> Result<(), ApiError> {
        let mut state = self.state.lock().await;
        state.calls.push(ApiCall {
            op,
            detail: detail.into(),
        });
        if state.failing.contains(&op) {
            return Err(ApiError::Status {
                method: "MEMORY".to_string(),
                url: op.to_string(),
                status: 500,
                body: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

impl MemoryState {
    fn allocate_id(&mut self) -> String {
        let id = self.next_id.to_string();
        self.next_id += 1;
        id
    }
}

fn inferred_rule_map(rule_content: &Value) -> Result<RuleMap, ApiError> {
    DecisionGraph::from_json(rule_content)
        .map(|g| g.infer_rule_map())
        .map_err(|e| ApiError::Status {
            method: "MEMORY".to_string(),
            url: "rulemap".to_string(),
            status: 400,
            body: e.to_string(),
        })
}

#[async_trait]
impl RulesApi for InMemoryRulesApi {
    async fn get_rule_map(
        &self,
        filepath: &str,
        rule_content: &Value,
    ) -> Result<RuleMap, ApiError> {
        self.enter(Operation::GetRuleMap, filepath).await?;
        let stored = self.state.lock().await.rule_maps.get(filepath).cloned();
        match stored {
            Some(map) => Ok(map),
            None => inferred_rule_map(rule_content),
        }
    }

    async fn generate_rule_map(&self, rule_content: &Value) -> Result<RuleMap, ApiError> {
        self.enter(Operation::GenerateRuleMap, "").await?;
        inferred_rule_map(rule_content)
    }

    async fn search_fields(&self, query: &str) -> Result<Vec<RuleField>, ApiError> {
        self.enter(Operation::SearchFields, query).await?;
        let latency = self.state.lock().await.search_latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let needle = query.to_lowercase();
        Ok(self
            .state
            .lock()
            .await
            .fields
            .iter()
            .filter(|f| {
                f.field.to_lowercase().contains(&needle)
                    || f.label().to_lowercase().contains(&needle)
            })
            .cloned()
            .collect())
    }

    async fn evaluate(
        &self,
        rule_content: &Value,
        context: &Map<String, Value>,
        trace: bool,
    ) -> Result<SimulationResult, ApiError> {
        self.enter(Operation::Evaluate, "").await?;
        let result = (self.evaluator)(rule_content, context);
        SimulationResult::from_response(EvaluateResponse {
            result,
            trace: trace.then(|| Value::Object(Map::new())),
        })
    }

    async fn run_decisions(
        &self,
        filepath: &str,
        rule_content: &Value,
    ) -> Result<BTreeMap<String, DecisionRun>, ApiError> {
        self.enter(Operation::RunDecisions, filepath).await?;
        let scenarios: Vec<Scenario> = self
            .state
            .lock()
            .await
            .scenarios
            .iter()
            .filter(|s| s.filepath == filepath)
            .cloned()
            .collect();
        let raw = scenarios
            .iter()
            .map(|s| {
                let inputs = s.inputs_object();
                let result = (self.evaluator)(rule_content, &inputs);
                (s.title.clone(), RawDecisionRun { inputs, result })
            })
            .collect();
        validate_decision_runs(raw)
    }

    async fn list_scenarios(&self, filepath: &str) -> Result<Vec<Scenario>, ApiError> {
        self.enter(Operation::ListScenarios, filepath).await?;
        Ok(self
            .state
            .lock()
            .await
            .scenarios
            .iter()
            .filter(|s| s.filepath == filepath)
            .cloned()
            .collect())
    }

    async fn create_scenario(&self, scenario: &Scenario) -> Result<Scenario, ApiError> {
        self.enter(Operation::CreateScenario, scenario.title.clone())
            .await?;
        let mut state = self.state.lock().await;
        let stored = Scenario {
            id: Some(state.allocate_id()),
            ..scenario.clone()
        };
        state.scenarios.push(stored.clone());
        Ok(stored)
    }

    async fn update_scenario(&self, id: &str, scenario: &Scenario) -> Result<Scenario, ApiError> {
        self.enter(Operation::UpdateScenario, id).await?;
        let mut state = self.state.lock().await;
        let slot = state
            .scenarios
            .iter_mut()
            .find(|s| s.id.as_deref() == Some(id))
            .ok_or_else(|| ApiError::NotFound { id: id.to_string() })?;
        *slot = Scenario {
            id: Some(id.to_string()),
            ..scenario.clone()
        };
        Ok(slot.clone())
    }

    async fn delete_scenario(&self, id: &str) -> Result<(), ApiError> {
        self.enter(Operation::DeleteScenario, id).await?;
        let mut state = self.state.lock().await;
        let before = state.scenarios.len();
        state.scenarios.retain(|s| s.id.as_deref() != Some(id));
        if state.scenarios.len() == before {
            return Err(ApiError::NotFound { id: id.to_string() });
        }
        Ok(())
    }
}
