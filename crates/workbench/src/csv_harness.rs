//! Batch testing and bulk import of scenarios from CSV.

use std::collections::BTreeMap;

use brms_api::{RuleDocument, RulesApi};
use brms_core::batch_csv::{csv_to_scenarios, results_to_csv};
use brms_core::{ResultDiff, RuleMap, Scenario};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::batch::{save_all, BatchReport, ScenarioChangeSet};
use crate::error::WorkbenchError;
use crate::upsert::{plan_upsert, UpsertAction};

/// Results of evaluating every row of a CSV file.
#[derive(Debug, Clone)]
pub struct CsvTestReport {
    /// RFC 3339 time the run finished.
    pub generated_at: String,
    pub results: BTreeMap<String, ResultDiff>,
}

impl CsvTestReport {
    pub fn passed(&self) -> usize {
        self.results.values().filter(|d| d.result_match).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.passed()
    }

    pub fn to_csv(&self) -> Result<String, WorkbenchError> {
        Ok(results_to_csv(&self.results)?)
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| OffsetDateTime::now_utc().unix_timestamp().to_string())
}

/// Evaluate each CSV row against the live rule and diff against the row's
/// expected results.
///
/// Rows run one after another; the first failing evaluation aborts the run.
pub async fn run_csv_tests(
    api: &dyn RulesApi,
    rule: &RuleDocument,
    rule_map: Option<&RuleMap>,
    csv_text: &str,
) -> Result<CsvTestReport, WorkbenchError> {
    let scenarios = csv_to_scenarios(csv_text, rule_map, &rule.rule_id, &rule.filepath)?;
    let mut results = BTreeMap::new();
    for scenario in &scenarios {
        let sim = api
            .evaluate(&rule.content, &scenario.inputs_object(), false)
            .await
            .inspect_err(|e| warn!(scenario = %scenario.title, error = %e, "csv row evaluation failed"))?;
        results.insert(scenario.title.clone(), ResultDiff::for_scenario(scenario, sim.result));
    }

    let report = CsvTestReport {
        generated_at: now_rfc3339(),
        results,
    };
    info!(
        filepath = %rule.filepath,
        rows = report.results.len(),
        failed = report.failed(),
        "csv test run complete"
    );
    Ok(report)
}

/// Stage every CSV row against the loaded scenarios: rows whose title is
/// already stored become updates, the rest creates.
pub fn stage_csv_rows(rows: Vec<Scenario>, existing: &[Scenario]) -> ScenarioChangeSet {
    let mut changes = ScenarioChangeSet::new();
    for mut row in rows {
        match plan_upsert(existing, &row) {
            UpsertAction::Create => changes.stage_create(row),
            UpsertAction::Update(id) => {
                row.id = Some(id);
                changes.stage_update(row);
            }
        }
    }
    changes
}

/// Save every CSV row as a scenario. Failures are per row and reported.
pub async fn import_csv(
    api: &dyn RulesApi,
    rule: &RuleDocument,
    rule_map: Option<&RuleMap>,
    csv_text: &str,
    existing: &[Scenario],
) -> Result<BatchReport, WorkbenchError> {
    let rows = csv_to_scenarios(csv_text, rule_map, &rule.rule_id, &rule.filepath)?;
    let changes = stage_csv_rows(rows, existing);
    Ok(save_all(api, changes).await)
}
