//! CSV form of scenarios for bulk regression testing.
//!
//! Layout: a `Scenario` title column, then one `Input: <field>` column per
//! input and one `Expected Result: <field>` column per expected output.
//! Result reports add `Result: <field>` columns and a pass/fail column.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::diff::ResultDiff;
use crate::error::CoreError;
use crate::rulemap::RuleMap;
use crate::scenario::{normalize_title, Scenario, Variable};
use crate::value::{format_cell, parse_cell};

pub const SCENARIO_COLUMN: &str = "Scenario";
pub const MATCH_COLUMN: &str = "Results Match Expected (Pass/Fail)";
pub const INPUT_PREFIX: &str = "Input: ";
pub const EXPECTED_PREFIX: &str = "Expected Result: ";
pub const RESULT_PREFIX: &str = "Result: ";

/// Header-only CSV listing every input and result output of the rule.
pub fn template_csv(rule_map: &RuleMap) -> Result<String, CoreError> {
    let inputs = Columns::from_fields(rule_map.flat_inputs().map(|f| f.field.as_str()));
    let expected = Columns::from_fields(rule_map.flat_result_outputs().map(|f| f.field.as_str()));
    write_rows(header(&[(INPUT_PREFIX, &inputs), (EXPECTED_PREFIX, &expected)], false), Vec::new())
}

/// Export scenarios. Columns follow the rule map first, then any extra
/// names found in the scenarios, in first-seen order.
pub fn scenarios_to_csv(scenarios: &[Scenario], rule_map: &RuleMap) -> Result<String, CoreError> {
    let mut inputs = Columns::from_fields(rule_map.flat_inputs().map(|f| f.field.as_str()));
    let mut expected =
        Columns::from_fields(rule_map.flat_result_outputs().map(|f| f.field.as_str()));
    for s in scenarios {
        inputs.extend(s.variables.iter().map(|v| v.name.as_str()));
        expected.extend(s.expected_results.iter().map(|v| v.name.as_str()));
    }

    let rows = scenarios
        .iter()
        .map(|s| {
            let ins = s.inputs_object();
            let exp = s.expected_object();
            let mut row = vec![s.title.clone()];
            row.extend(inputs.cells(|name| ins.get(name)));
            row.extend(expected.cells(|name| exp.get(name)));
            row
        })
        .collect();

    write_rows(
        header(&[(INPUT_PREFIX, &inputs), (EXPECTED_PREFIX, &expected)], false),
        rows,
    )
}

/// Parse scenario rows. Empty cells are omitted from the scenario; the rule
/// map (when given) supplies type hints so text fields stay text.
pub fn csv_to_scenarios(
    text: &str,
    rule_map: Option<&RuleMap>,
    rule_id: &str,
    filepath: &str,
) -> Result<Vec<Scenario>, CoreError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = reader.headers()?.clone();
    let title_idx = headers
        .iter()
        .position(|h| h == SCENARIO_COLUMN)
        .ok_or_else(|| CoreError::MissingColumn {
            column: SCENARIO_COLUMN.to_string(),
        })?;

    let mut seen = Vec::new();
    let mut scenarios = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let row = i + 2;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let title = record.get(title_idx).unwrap_or_default().to_string();
        if title.is_empty() {
            return Err(CoreError::InvalidRow {
                row,
                message: "scenario title is empty".to_string(),
            });
        }
        let key = normalize_title(&title);
        if seen.contains(&key) {
            return Err(CoreError::DuplicateTitle { title });
        }
        seen.push(key);

        let mut scenario = Scenario {
            id: None,
            title,
            rule_id: rule_id.to_string(),
            filepath: filepath.to_string(),
            variables: Vec::new(),
            expected_results: Vec::new(),
        };
        for (col, cell) in headers.iter().zip(record.iter()) {
            if let Some(name) = col.strip_prefix(INPUT_PREFIX) {
                let hint = rule_map.and_then(|m| m.kind_of(name));
                if let Some(value) = parse_cell(cell, hint) {
                    scenario.variables.push(Variable::new(name, value));
                }
            } else if let Some(name) = col.strip_prefix(EXPECTED_PREFIX) {
                let hint = rule_map.and_then(|m| m.kind_of(name));
                if let Some(value) = parse_cell(cell, hint) {
                    scenario.expected_results.push(Variable::new(name, value));
                }
            }
        }
        scenarios.push(scenario);
    }
    Ok(scenarios)
}

/// Report of a batch run keyed by scenario title.
pub fn results_to_csv(results: &BTreeMap<String, ResultDiff>) -> Result<String, CoreError> {
    let mut inputs = Columns::default();
    let mut expected = Columns::default();
    let mut actual = Columns::default();
    for diff in results.values() {
        inputs.extend(diff.inputs.keys().map(String::as_str));
        expected.extend(diff.expected_results.keys().map(String::as_str));
        actual.extend(diff.result.keys().map(String::as_str));
    }

    let rows = results
        .iter()
        .map(|(title, diff)| {
            let mut row = vec![
                title.clone(),
                if diff.result_match { "Pass" } else { "Fail" }.to_string(),
            ];
            row.extend(inputs.cells(|name| diff.inputs.get(name)));
            row.extend(expected.cells(|name| diff.expected_results.get(name)));
            row.extend(actual.cells(|name| diff.result.get(name)));
            row
        })
        .collect();

    write_rows(
        header(
            &[
                (INPUT_PREFIX, &inputs),
                (EXPECTED_PREFIX, &expected),
                (RESULT_PREFIX, &actual),
            ],
            true,
        ),
        rows,
    )
}

#[derive(Debug, Default)]
struct Columns(Vec<String>);

impl Columns {
    fn from_fields<'a>(names: impl Iterator<Item = &'a str>) -> Self {
        let mut cols = Columns::default();
        cols.extend(names);
        cols
    }

    fn extend<'a>(&mut self, names: impl Iterator<Item = &'a str>) {
        for name in names {
            if !self.0.iter().any(|c| c == name) {
                self.0.push(name.to_string());
            }
        }
    }

    fn cells<'a>(&self, lookup: impl Fn(&str) -> Option<&'a Value>) -> Vec<String> {
        self.0
            .iter()
            .map(|name| lookup(name).map(format_cell).unwrap_or_default())
            .collect()
    }
}

fn header(groups: &[(&str, &Columns)], with_match: bool) -> Vec<String> {
    let mut cols = vec![SCENARIO_COLUMN.to_string()];
    if with_match {
        cols.push(MATCH_COLUMN.to_string());
    }
    for (prefix, columns) in groups {
        cols.extend(columns.0.iter().map(|name| format!("{}{}", prefix, name)));
    }
    cols
}

fn write_rows(header: Vec<String>, rows: Vec<Vec<String>>) -> Result<String, CoreError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&header)?;
    for row in rows {
        writer.write_record(&row)?;
    }
    let bytes = writer.into_inner().map_err(|e| CoreError::Csv {
        message: e.to_string(),
    })?;
    String::from_utf8(bytes).map_err(|e| CoreError::Csv {
        message: e.to_string(),
    })
}
