//! Create-or-update decision shared by every path that saves a scenario.

use brms_api::{ApiError, RulesApi};
use brms_core::scenario::find_by_title;
use brms_core::Scenario;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertAction {
    Create,
    Update(String),
}

/// Decide how to persist `draft` given the currently loaded `scenarios`.
///
/// A draft that already carries an id updates that id. Otherwise a loaded
/// scenario with the same title (trimmed, case-insensitive) is updated in
/// place, and anything else is created.
pub fn plan_upsert(scenarios: &[Scenario], draft: &Scenario) -> UpsertAction {
    if let Some(id) = &draft.id {
        return UpsertAction::Update(id.clone());
    }
    match find_by_title(scenarios, &draft.title).and_then(|s| s.id.clone()) {
        Some(id) => UpsertAction::Update(id),
        None => UpsertAction::Create,
    }
}

pub async fn upsert_scenario(
    api: &dyn RulesApi,
    scenarios: &[Scenario],
    draft: &Scenario,
) -> Result<Scenario, ApiError> {
    match plan_upsert(scenarios, draft) {
        UpsertAction::Create => {
            info!(scenario = %draft.title, filepath = %draft.filepath, "creating scenario");
            api.create_scenario(draft).await
        }
        UpsertAction::Update(id) => {
            info!(scenario = %draft.title, %id, "updating scenario");
            api.update_scenario(&id, draft).await
        }
    }
}
