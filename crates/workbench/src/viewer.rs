//! Paginated list of a rule's saved scenarios with rename, delete and edit.

use std::collections::BTreeMap;

use brms_api::RulesApi;
use brms_core::scenario::{find_by_id, title_taken};
use brms_core::{reseed_expected, RuleMap, Scenario, SimulationContext};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::WorkbenchError;

pub const PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameOutcome {
    /// The new title equals the current one; nothing was sent.
    Unchanged,
    Renamed,
}

/// Everything the generator needs to edit a stored scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct EditSeed {
    pub scenario_id: Option<String>,
    pub title: String,
    pub context: SimulationContext,
    pub expected: BTreeMap<String, Value>,
}

#[derive(Debug, Default)]
pub struct ScenarioViewer {
    scenarios: Vec<Scenario>,
    manage_mode: bool,
    selected: Option<String>,
}

impl ScenarioViewer {
    pub fn new(scenarios: Vec<Scenario>) -> Self {
        ScenarioViewer {
            scenarios,
            ..ScenarioViewer::default()
        }
    }

    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    /// Replace the list with a freshly fetched one. A selection that no
    /// longer exists is dropped.
    pub fn set_scenarios(&mut self, scenarios: Vec<Scenario>) {
        self.scenarios = scenarios;
        if let Some(id) = &self.selected {
            if find_by_id(&self.scenarios, id).is_none() {
                self.selected = None;
            }
        }
    }

    pub fn page_count(&self) -> usize {
        self.scenarios.len().div_ceil(PAGE_SIZE).max(1)
    }

    /// Zero-based page of at most [`PAGE_SIZE`] scenarios. Out-of-range pages
    /// are empty.
    pub fn page(&self, n: usize) -> &[Scenario] {
        let start = n.saturating_mul(PAGE_SIZE).min(self.scenarios.len());
        let end = (start + PAGE_SIZE).min(self.scenarios.len());
        &self.scenarios[start..end]
    }

    pub fn manage_mode(&self) -> bool {
        self.manage_mode
    }

    pub fn toggle_manage(&mut self) -> bool {
        self.manage_mode = !self.manage_mode;
        self.manage_mode
    }

    pub fn selected(&self) -> Option<&Scenario> {
        self.selected
            .as_deref()
            .and_then(|id| find_by_id(&self.scenarios, id))
    }

    fn lookup(&self, id: &str) -> Result<&Scenario, WorkbenchError> {
        find_by_id(&self.scenarios, id).ok_or_else(|| WorkbenchError::ScenarioNotFound {
            id: id.to_string(),
        })
    }

    /// Select a scenario and return its inputs as a flat, read-only context.
    pub fn select(&mut self, id: &str) -> Result<SimulationContext, WorkbenchError> {
        let context = self.lookup(id)?.context();
        self.selected = Some(id.to_string());
        Ok(context)
    }

    /// Rename a scenario. The local title changes only after the server
    /// accepted the update.
    pub async fn rename(
        &mut self,
        api: &dyn RulesApi,
        id: &str,
        new_title: &str,
    ) -> Result<RenameOutcome, WorkbenchError> {
        let title = new_title.trim();
        if title.is_empty() {
            return Err(WorkbenchError::EmptyTitle);
        }
        let current = self.lookup(id)?;
        if current.title == title {
            return Ok(RenameOutcome::Unchanged);
        }
        if title_taken(&self.scenarios, title, Some(id)) {
            return Err(WorkbenchError::DuplicateTitle {
                title: title.to_string(),
            });
        }

        let renamed = Scenario {
            title: title.to_string(),
            ..current.clone()
        };
        if let Err(e) = api.update_scenario(id, &renamed).await {
            warn!(%id, scenario = %title, error = %e, "failed to rename scenario");
            return Err(e.into());
        }
        info!(%id, scenario = %title, "renamed scenario");
        if let Some(slot) = self.scenarios.iter_mut().find(|s| s.id.as_deref() == Some(id)) {
            slot.title = title.to_string();
        }
        Ok(RenameOutcome::Renamed)
    }

    /// Delete a scenario. On success it leaves the list and manage mode ends;
    /// on failure the list is untouched.
    pub async fn delete(&mut self, api: &dyn RulesApi, id: &str) -> Result<(), WorkbenchError> {
        self.lookup(id)?;
        if let Err(e) = api.delete_scenario(id).await {
            warn!(%id, error = %e, "failed to delete scenario");
            return Err(e.into());
        }
        info!(%id, "deleted scenario");
        self.scenarios.retain(|s| s.id.as_deref() != Some(id));
        if self.selected.as_deref() == Some(id) {
            self.selected = None;
        }
        self.manage_mode = false;
        Ok(())
    }

    /// Seed for editing: the variables as an editable context and the
    /// declared result outputs merged with the stored expected results.
    pub fn edit(&self, id: &str, rule_map: &RuleMap) -> Result<EditSeed, WorkbenchError> {
        let scenario = self.lookup(id)?;
        let mut context = scenario.context();
        context.set_editable(true);

        let stored: BTreeMap<String, Value> = scenario.expected_object().into_iter().collect();
        let mut expected = reseed_expected(&rule_map.result_outputs, &stored);
        for (name, value) in stored {
            expected.entry(name).or_insert(value);
        }

        Ok(EditSeed {
            scenario_id: scenario.id.clone(),
            title: scenario.title.clone(),
            context,
            expected,
        })
    }
}
