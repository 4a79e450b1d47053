//! Session state for one rule: rule map, scenario list, the generator's
//! context, tabs and pending batch changes.

use brms_api::{ApiError, RuleDocument, RulesApi};
use brms_core::{MisconnectedField, RuleMap, Scenario, SimulationContext};
use serde_json::Value;
use tracing::{info, warn};

use crate::batch::{save_all, BatchReport, ScenarioChangeSet};
use crate::error::WorkbenchError;
use crate::generator::{refresh_scenarios, SaveOutcome, ScenarioGenerator};
use crate::results::{run_all, ResultsTable};
use crate::viewer::{RenameOutcome, ScenarioViewer};
use crate::warnings::WarningMonitor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Scenarios,
    Inputs,
    Results,
    CsvTests,
}

/// Owns everything the workbench shows for one rule.
///
/// The generator holds the live simulation context. Switching tabs or
/// resetting rebuilds it from the rule map, except when a scenario is being
/// loaded for editing.
pub struct ScenariosManager {
    rule: RuleDocument,
    rule_map: RuleMap,
    tab: Tab,
    generator: ScenarioGenerator,
    viewer: ScenarioViewer,
    changes: ScenarioChangeSet,
    results: Option<ResultsTable>,
    monitor: WarningMonitor,
}

impl ScenariosManager {
    /// Fetch the rule map and the rule's scenarios.
    pub async fn load(api: &dyn RulesApi, rule: RuleDocument) -> Result<Self, ApiError> {
        let rule_map = api
            .get_rule_map(&rule.filepath, &rule.content)
            .await
            .inspect_err(|e| warn!(filepath = %rule.filepath, error = %e, "failed to load rule map"))?;
        let scenarios = api
            .list_scenarios(&rule.filepath)
            .await
            .inspect_err(|e| warn!(filepath = %rule.filepath, error = %e, "failed to load scenarios"))?;
        info!(filepath = %rule.filepath, scenarios = scenarios.len(), "loaded rule");

        Ok(ScenariosManager {
            generator: ScenarioGenerator::new(rule.clone(), &rule_map),
            viewer: ScenarioViewer::new(scenarios),
            rule,
            rule_map,
            tab: Tab::default(),
            changes: ScenarioChangeSet::new(),
            results: None,
            monitor: WarningMonitor::new(),
        })
    }

    pub fn rule(&self) -> &RuleDocument {
        &self.rule
    }

    pub fn rule_map(&self) -> &RuleMap {
        &self.rule_map
    }

    pub fn scenarios(&self) -> &[Scenario] {
        self.viewer.scenarios()
    }

    pub fn context(&self) -> &SimulationContext {
        self.generator.context()
    }

    pub fn tab(&self) -> Tab {
        self.tab
    }

    pub fn generator(&self) -> &ScenarioGenerator {
        &self.generator
    }

    pub fn generator_mut(&mut self) -> &mut ScenarioGenerator {
        &mut self.generator
    }

    pub fn viewer(&self) -> &ScenarioViewer {
        &self.viewer
    }

    pub fn viewer_mut(&mut self) -> &mut ScenarioViewer {
        &mut self.viewer
    }

    pub fn changes(&self) -> &ScenarioChangeSet {
        &self.changes
    }

    pub fn changes_mut(&mut self) -> &mut ScenarioChangeSet {
        &mut self.changes
    }

    pub fn results(&self) -> Option<&ResultsTable> {
        self.results.as_ref()
    }

    pub fn results_mut(&mut self) -> Option<&mut ResultsTable> {
        self.results.as_mut()
    }

    pub fn warnings(&self) -> &[MisconnectedField] {
        self.monitor.warnings()
    }

    /// Change tab. Leaving for another tab rebuilds the context.
    pub fn switch_tab(&mut self, tab: Tab) {
        if tab != self.tab {
            self.reset();
            self.tab = tab;
        }
    }

    /// Rebuild the context and expected outputs from the rule map.
    pub fn reset(&mut self) {
        self.generator.reset(&self.rule_map);
    }

    /// Show a saved scenario's inputs in the context.
    pub fn select_scenario(&mut self, id: &str) -> Result<(), WorkbenchError> {
        let context = self.viewer.select(id)?;
        self.generator.replace_context(context);
        Ok(())
    }

    /// Load a saved scenario into the generator and move to the inputs tab.
    pub fn begin_edit(&mut self, id: &str) -> Result<(), WorkbenchError> {
        let seed = self.viewer.edit(id, &self.rule_map)?;
        self.generator.reset(&self.rule_map);
        self.generator.apply_seed(seed);
        self.tab = Tab::Inputs;
        Ok(())
    }

    /// Replace the rule content and regenerate the rule map from it.
    pub async fn update_rule_content(
        &mut self,
        api: &dyn RulesApi,
        content: Value,
    ) -> Result<(), ApiError> {
        self.rule.content = content;
        self.rule_map = api
            .get_rule_map(&self.rule.filepath, &self.rule.content)
            .await
            .inspect_err(|e| warn!(filepath = %self.rule.filepath, error = %e, "failed to regenerate rule map"))?;
        self.generator.set_rule(self.rule.clone());
        self.generator.reset(&self.rule_map);
        Ok(())
    }

    pub async fn simulate(&mut self, api: &dyn RulesApi) -> Result<(), ApiError> {
        self.generator.simulate(api).await.map(|_| ())
    }

    /// Save the generator's scenario and adopt the re-fetched list.
    pub async fn save_scenario(&mut self, api: &dyn RulesApi) -> SaveOutcome {
        let outcome = self.generator.save(api, self.viewer.scenarios()).await;
        if let Some(list) = outcome.scenarios() {
            self.viewer.set_scenarios(list.to_vec());
        }
        if matches!(outcome, SaveOutcome::Saved { .. }) {
            self.tab = Tab::Scenarios;
        }
        outcome
    }

    pub async fn rename_scenario(
        &mut self,
        api: &dyn RulesApi,
        id: &str,
        title: &str,
    ) -> Result<RenameOutcome, WorkbenchError> {
        self.viewer.rename(api, id, title).await
    }

    pub async fn delete_scenario(&mut self, api: &dyn RulesApi, id: &str) -> Result<(), WorkbenchError> {
        self.viewer.delete(api, id).await
    }

    /// Re-run every scenario and show the results tab.
    pub async fn run_all(&mut self, api: &dyn RulesApi) -> Result<&mut ResultsTable, ApiError> {
        let rows = run_all(api, &self.rule, self.viewer.scenarios()).await?;
        self.tab = Tab::Results;
        Ok(self.results.insert(ResultsTable::new(rows)))
    }

    /// Dispatch all staged changes, then reload the list.
    pub async fn save_all(&mut self, api: &dyn RulesApi) -> BatchReport {
        let changes = std::mem::take(&mut self.changes);
        let report = save_all(api, changes).await;
        let list = refresh_scenarios(api, &self.rule.filepath, self.viewer.scenarios()).await;
        self.viewer.set_scenarios(list);
        report
    }

    /// Re-check misconnected fields if the rule changed since the last check.
    pub async fn refresh_warnings(&mut self, api: &dyn RulesApi) -> Result<&[MisconnectedField], ApiError> {
        self.monitor.refresh(api, &self.rule, Some(&self.rule_map)).await?;
        Ok(self.monitor.warnings())
    }

    /// Re-check misconnected fields unconditionally, as on rule save.
    pub async fn on_rule_saved(&mut self, api: &dyn RulesApi) -> Result<&[MisconnectedField], ApiError> {
        self.monitor.on_save(api, &self.rule, Some(&self.rule_map)).await?;
        Ok(self.monitor.warnings())
    }
}
