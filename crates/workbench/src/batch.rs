//! Tracked scenario changes and their concurrent "save all" dispatch.

use std::collections::BTreeMap;
use std::fmt;

use brms_api::{ApiError, RulesApi};
use brms_core::scenario::normalize_title;
use brms_core::Scenario;
use futures::future::{join3, join_all};
use serde::Serialize;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Create,
    Update,
    Delete,
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChangeAction::Create => "create",
            ChangeAction::Update => "update",
            ChangeAction::Delete => "delete",
        })
    }
}

/// Pending creates, updates and deletes, keyed so that repeated edits of
/// one scenario collapse into a single write.
///
/// Creates are keyed by normalized title, updates and deletes by id.
#[derive(Debug, Clone, Default)]
pub struct ScenarioChangeSet {
    created: BTreeMap<String, Scenario>,
    updated: BTreeMap<String, Scenario>,
    deleted: BTreeMap<String, String>,
}

impl ScenarioChangeSet {
    pub fn new() -> Self {
        ScenarioChangeSet::default()
    }

    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    pub fn len(&self) -> usize {
        self.created.len() + self.updated.len() + self.deleted.len()
    }

    /// Stage a scenario that has never been saved. One that already has an
    /// id is staged as an update.
    pub fn stage_create(&mut self, scenario: Scenario) {
        if scenario.id.is_some() {
            self.stage_update(scenario);
            return;
        }
        self.created.insert(normalize_title(&scenario.title), scenario);
    }

    /// Stage a modification. Editing an unsaved scenario stays a create.
    pub fn stage_update(&mut self, scenario: Scenario) {
        match scenario.id.clone() {
            Some(id) => {
                if self.deleted.contains_key(&id) {
                    debug!(%id, "ignoring update of a scenario staged for deletion");
                    return;
                }
                self.updated.insert(id, scenario);
            }
            None => {
                self.created.insert(normalize_title(&scenario.title), scenario);
            }
        }
    }

    /// Stage a removal. Removing an unsaved scenario just drops it.
    pub fn stage_delete(&mut self, scenario: &Scenario) {
        match &scenario.id {
            Some(id) => {
                self.updated.remove(id);
                self.deleted.insert(id.clone(), scenario.title.clone());
            }
            None => {
                self.created.remove(&normalize_title(&scenario.title));
            }
        }
    }

    pub fn created(&self) -> impl Iterator<Item = &Scenario> {
        self.created.values()
    }

    pub fn updated(&self) -> impl Iterator<Item = &Scenario> {
        self.updated.values()
    }

    /// Ids staged for deletion.
    pub fn deleted(&self) -> impl Iterator<Item = &str> {
        self.deleted.keys().map(String::as_str)
    }
}

#[derive(Debug)]
pub struct BatchFailure {
    pub action: ChangeAction,
    /// Scenario title, or id for deletes whose title is unknown.
    pub target: String,
    pub error: ApiError,
}

/// Summary of a [`save_all`] run.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<(ChangeAction, String)>,
    pub failed: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    fn record(&mut self, action: ChangeAction, target: String, result: Result<(), ApiError>) {
        match result {
            Ok(()) => {
                debug!(%action, scenario = %target, "scenario change saved");
                self.succeeded.push((action, target));
            }
            Err(e) => {
                error!(%action, scenario = %target, error = %e, "scenario change failed");
                self.failed.push(BatchFailure {
                    action,
                    target,
                    error: e,
                });
            }
        }
    }
}

/// Dispatch every staged change concurrently.
///
/// A failing write never stops the others and nothing is rolled back; the
/// report lists each outcome.
pub async fn save_all(api: &dyn RulesApi, changes: ScenarioChangeSet) -> BatchReport {
    let creates = join_all(changes.created.into_values().map(|s| async move {
        let result = api.create_scenario(&s).await.map(|_| ());
        (s.title, result)
    }));
    let updates = join_all(changes.updated.into_iter().map(|(id, s)| async move {
        let result = api.update_scenario(&id, &s).await.map(|_| ());
        (s.title, result)
    }));
    let deletes = join_all(changes.deleted.into_iter().map(|(id, title)| async move {
        let result = api.delete_scenario(&id).await;
        let target = if title.is_empty() { id } else { title };
        (target, result)
    }));

    let (created, updated, deleted) = join3(creates, updates, deletes).await;

    let mut report = BatchReport::default();
    for (target, result) in created {
        report.record(ChangeAction::Create, target, result);
    }
    for (target, result) in updated {
        report.record(ChangeAction::Update, target, result);
    }
    for (target, result) in deleted {
        report.record(ChangeAction::Delete, target, result);
    }
    info!(
        succeeded = report.succeeded.len(),
        failed = report.failed.len(),
        "save all complete"
    );
    report
}
