//! Bulk re-run of stored scenarios and review of their results.

use std::collections::BTreeMap;

use brms_api::{ApiError, RuleDocument, RulesApi};
use brms_core::scenario::{find_by_title, variables_from_object};
use brms_core::{ResultDiff, Scenario};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::upsert::upsert_scenario;

/// Re-run every stored scenario of the rule and diff against expectations.
///
/// Each run is joined to the loaded scenario with the same title for its
/// expected results; runs without a local match have none. Any array result
/// fails the whole batch.
pub async fn run_all(
    api: &dyn RulesApi,
    rule: &RuleDocument,
    scenarios: &[Scenario],
) -> Result<BTreeMap<String, ResultDiff>, ApiError> {
    let runs = api
        .run_decisions(&rule.filepath, &rule.content)
        .await
        .inspect_err(|e| warn!(filepath = %rule.filepath, error = %e, "bulk run failed"))?;

    let diffs: BTreeMap<String, ResultDiff> = runs
        .into_iter()
        .map(|(title, run)| {
            let local = find_by_title(scenarios, &title);
            let expected = local.map(Scenario::expected_object).unwrap_or_default();
            let inputs = match local {
                Some(s) if run.inputs.is_empty() => s.inputs_object(),
                _ => run.inputs,
            };
            (title, ResultDiff::compute(inputs, run.result, expected))
        })
        .collect();

    let failed = diffs.values().filter(|d| !d.result_match).count();
    info!(filepath = %rule.filepath, total = diffs.len(), failed, "bulk run complete");
    Ok(diffs)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// One visible row of a [`ResultsTable`].
#[derive(Debug, Clone, Serialize)]
pub struct ResultRow<'a> {
    pub title: &'a str,
    #[serde(flatten)]
    pub diff: &'a ResultDiff,
}

/// Bulk-run results with view-only filtering and sorting.
#[derive(Debug, Clone, Default)]
pub struct ResultsTable {
    rows: BTreeMap<String, ResultDiff>,
    errors_only: bool,
    sort: Option<SortOrder>,
}

impl ResultsTable {
    pub fn new(rows: BTreeMap<String, ResultDiff>) -> Self {
        ResultsTable {
            rows,
            ..ResultsTable::default()
        }
    }

    pub fn show_errors_only(&mut self, errors_only: bool) {
        self.errors_only = errors_only;
    }

    pub fn sort_by_title(&mut self, order: SortOrder) {
        self.sort = Some(order);
    }

    /// Back to every row, in byte order of the title (so `C` sorts before
    /// `a`).
    pub fn clear_view(&mut self) {
        self.errors_only = false;
        self.sort = None;
    }

    pub fn rows(&self) -> Vec<ResultRow<'_>> {
        let mut rows: Vec<ResultRow<'_>> = self
            .rows
            .iter()
            .filter(|(_, d)| !self.errors_only || !d.result_match)
            .map(|(title, diff)| ResultRow { title, diff })
            .collect();
        match self.sort {
            Some(SortOrder::Ascending) => {
                rows.sort_by_key(|r| r.title.to_lowercase());
            }
            Some(SortOrder::Descending) => {
                rows.sort_by_key(|r| std::cmp::Reverse(r.title.to_lowercase()));
            }
            None => {}
        }
        rows
    }

    pub fn all(&self) -> &BTreeMap<String, ResultDiff> {
        &self.rows
    }

    pub fn passed(&self) -> usize {
        self.rows.values().filter(|d| d.result_match).count()
    }

    pub fn failed(&self) -> usize {
        self.rows.len() - self.passed()
    }
}

/// Edit the expected results of one stored scenario against a fresh run.
#[derive(Debug, Clone)]
pub struct ResultEditor {
    scenario: Scenario,
    actual: Map<String, Value>,
    expected: BTreeMap<String, Value>,
}

impl ResultEditor {
    /// Re-run `scenario` against the live rule content and seed the editable
    /// expected values from what was stored, falling back to the fresh
    /// actual value.
    pub async fn open(
        api: &dyn RulesApi,
        rule: &RuleDocument,
        scenario: &Scenario,
    ) -> Result<Self, ApiError> {
        let sim = api
            .evaluate(&rule.content, &scenario.inputs_object(), false)
            .await
            .inspect_err(|e| warn!(scenario = %scenario.title, error = %e, "re-run failed"))?;

        let mut expected: BTreeMap<String, Value> =
            scenario.expected_object().into_iter().collect();
        for (name, value) in &sim.result {
            expected.entry(name.clone()).or_insert_with(|| value.clone());
        }

        Ok(ResultEditor {
            scenario: scenario.clone(),
            actual: sim.result,
            expected,
        })
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn actual(&self) -> &Map<String, Value> {
        &self.actual
    }

    pub fn expected(&self) -> &BTreeMap<String, Value> {
        &self.expected
    }

    pub fn set_expected(&mut self, field: impl Into<String>, value: Value) {
        self.expected.insert(field.into(), value);
    }

    pub fn remove_expected(&mut self, field: &str) -> Option<Value> {
        self.expected.remove(field)
    }

    /// Accept the fresh result as the new expectation.
    pub fn accept_actual(&mut self) {
        self.expected = self
            .actual
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
    }

    fn expected_object(&self) -> Map<String, Value> {
        self.expected
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn diff(&self) -> ResultDiff {
        ResultDiff::compute(
            self.scenario.inputs_object(),
            self.actual.clone(),
            self.expected_object(),
        )
    }

    /// Persist the edited expectations through the shared upsert.
    pub async fn save(
        &mut self,
        api: &dyn RulesApi,
        scenarios: &[Scenario],
    ) -> Result<Scenario, ApiError> {
        let draft = Scenario {
            expected_results: variables_from_object(&self.expected_object()),
            ..self.scenario.clone()
        };
        let stored = upsert_scenario(api, scenarios, &draft)
            .await
            .inspect_err(|e| warn!(scenario = %draft.title, error = %e, "failed to save expected results"))?;
        self.scenario = stored.clone();
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brms_api::{InMemoryRulesApi, Operation};
    use brms_core::Variable;
    use serde_json::json;

    fn rule() -> RuleDocument {
        RuleDocument::new("r", "f.json", json!({"nodes": []}))
    }

    fn scenario(title: &str, age: i64, expected: Value) -> Scenario {
        Scenario {
            title: title.into(),
            rule_id: "r".into(),
            filepath: "f.json".into(),
            variables: vec![Variable::new("age", json!(age))],
            expected_results: vec![Variable::new("eligible", expected)],
            ..Scenario::default()
        }
    }

    fn api() -> InMemoryRulesApi {
        InMemoryRulesApi::new().with_evaluator(|_, ctx| {
            let age = ctx.get("age").and_then(Value::as_i64).unwrap_or(0);
            json!({"eligible": age >= 18})
        })
    }

    async fn loaded(api: &InMemoryRulesApi, scenarios: Vec<Scenario>) -> Vec<Scenario> {
        api.insert_scenarios(scenarios).await;
        api.list_scenarios("f.json").await.unwrap()
    }

    #[tokio::test]
    async fn run_all_diffs_against_local_expectations() {
        let api = api();
        let list = loaded(
            &api,
            vec![scenario("adult", 30, json!(true)), scenario("minor", 10, json!(true))],
        )
        .await;

        let diffs = run_all(&api, &rule(), &list).await.unwrap();
        assert!(diffs["adult"].result_match);
        assert!(!diffs["minor"].result_match);
        assert_eq!(api.calls_of(Operation::RunDecisions).await.len(), 1);
    }

    #[tokio::test]
    async fn run_all_fails_whole_batch_on_array_result() {
        let api = InMemoryRulesApi::new().with_evaluator(|_, ctx| {
            if ctx.get("age") == Some(&json!(10)) {
                json!([{"eligible": true}, {"eligible": false}])
            } else {
                json!({"eligible": true})
            }
        });
        let list = loaded(
            &api,
            vec![scenario("adult", 30, json!(true)), scenario("minor", 10, json!(true))],
        )
        .await;
        assert!(matches!(
            run_all(&api, &rule(), &list).await,
            Err(ApiError::MultipleResults)
        ));
    }

    #[tokio::test]
    async fn numeric_expectations_match_by_value() {
        let api = InMemoryRulesApi::new().with_evaluator(|_, _| json!({"out": 5}));
        let mut float = scenario("float", 1, json!(null));
        float.expected_results = vec![Variable::new("out", json!(5.0))];
        let mut text = scenario("text", 1, json!(null));
        text.expected_results = vec![Variable::new("out", json!("5"))];
        let list = loaded(&api, vec![float, text]).await;

        let diffs = run_all(&api, &rule(), &list).await.unwrap();
        assert!(diffs["float"].result_match);
        assert!(!diffs["text"].result_match);
    }

    fn table() -> ResultsTable {
        let pass = ResultDiff::compute(Map::new(), Map::new(), Map::new());
        let mut result = Map::new();
        result.insert("x".into(), json!(1));
        let fail = ResultDiff::compute(Map::new(), result, Map::new());
        let mut rows = BTreeMap::new();
        rows.insert("b".to_string(), fail.clone());
        rows.insert("a".to_string(), pass.clone());
        rows.insert("C".to_string(), fail);
        ResultsTable::new(rows)
    }

    #[test]
    fn errors_only_and_sorting() {
        let mut table = table();
        assert_eq!((table.passed(), table.failed()), (1, 2));

        table.show_errors_only(true);
        let titles: Vec<&str> = table.rows().iter().map(|r| r.title).collect();
        assert_eq!(titles, vec!["C", "b"]);

        table.sort_by_title(SortOrder::Ascending);
        let titles: Vec<&str> = table.rows().iter().map(|r| r.title).collect();
        assert_eq!(titles, vec!["b", "C"]);

        table.sort_by_title(SortOrder::Descending);
        let titles: Vec<&str> = table.rows().iter().map(|r| r.title).collect();
        assert_eq!(titles, vec!["C", "b"]);

        table.clear_view();
        let titles: Vec<&str> = table.rows().iter().map(|r| r.title).collect();
        assert_eq!(titles, vec!["C", "a", "b"]);
    }

    #[tokio::test]
    async fn editor_seeds_from_stored_then_actual() {
        let api = InMemoryRulesApi::new()
            .with_evaluator(|_, _| json!({"eligible": false, "tier": "gold"}));
        let list = loaded(&api, vec![scenario("A", 30, json!(true))]).await;

        let editor = ResultEditor::open(&api, &rule(), &list[0]).await.unwrap();
        assert_eq!(editor.expected().get("eligible"), Some(&json!(true)));
        assert_eq!(editor.expected().get("tier"), Some(&json!("gold")));
        assert!(!editor.diff().result_match);
    }

    #[tokio::test]
    async fn editor_save_updates_stored_scenario() {
        let api = api();
        let list = loaded(&api, vec![scenario("A", 10, json!(true))]).await;
        api.clear_calls().await;

        let mut editor = ResultEditor::open(&api, &rule(), &list[0]).await.unwrap();
        editor.accept_actual();
        assert!(editor.diff().result_match);
        let saved = editor.save(&api, &list).await.unwrap();

        assert_eq!(saved.id, list[0].id);
        assert_eq!(saved.expected_results, vec![Variable::new("eligible", json!(false))]);
        assert_eq!(api.calls_of(Operation::UpdateScenario).await.len(), 1);
        assert!(api.calls_of(Operation::CreateScenario).await.is_empty());
    }
}
