//! Drift between a rule's stored rule map and the fields its graph declares.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::rulemap::{RuleField, RuleMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MisconnectionKind {
    /// The graph declares an input the rule map does not know about.
    MissingInput,
    /// The graph declares an output the rule map does not know about.
    MissingOutput,
    /// The rule map lists an input the graph no longer references.
    UnusedInput,
    /// The rule map lists an output the graph no longer references.
    UnusedOutput,
}

impl MisconnectionKind {
    pub fn label(&self) -> &'static str {
        match self {
            MisconnectionKind::MissingInput => "MISSING INPUT",
            MisconnectionKind::MissingOutput => "MISSING OUTPUT",
            MisconnectionKind::UnusedInput => "UNUSED INPUT",
            MisconnectionKind::UnusedOutput => "UNUSED OUTPUT",
        }
    }
}

impl fmt::Display for MisconnectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MisconnectedField {
    pub kind: MisconnectionKind,
    pub field: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl fmt::Display for MisconnectedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.field)
    }
}

/// Compare the stored rule map (`existing`) with the graph-derived one
/// (`generated`).
///
/// Only flat, non-nested fields take part. Results are grouped as missing
/// inputs, missing outputs, unused inputs, unused outputs; each group keeps
/// declaration order.
pub fn find_misconnections(existing: &RuleMap, generated: &RuleMap) -> Vec<MisconnectedField> {
    let existing_inputs: Vec<&RuleField> = existing.flat_inputs().collect();
    let existing_outputs: Vec<&RuleField> = existing.flat_outputs().collect();
    let generated_inputs: Vec<&RuleField> = generated.flat_inputs().collect();
    let generated_outputs: Vec<&RuleField> = generated.flat_outputs().collect();

    let mut out = Vec::new();
    difference(
        &generated_inputs,
        &existing_inputs,
        MisconnectionKind::MissingInput,
        &mut out,
    );
    difference(
        &generated_outputs,
        &existing_outputs,
        MisconnectionKind::MissingOutput,
        &mut out,
    );
    difference(
        &existing_inputs,
        &generated_inputs,
        MisconnectionKind::UnusedInput,
        &mut out,
    );
    difference(
        &existing_outputs,
        &generated_outputs,
        MisconnectionKind::UnusedOutput,
        &mut out,
    );
    out
}

fn difference(
    from: &[&RuleField],
    minus: &[&RuleField],
    kind: MisconnectionKind,
    out: &mut Vec<MisconnectedField>,
) {
    let excluded: BTreeSet<&str> = minus.iter().map(|f| f.field.as_str()).collect();
    let mut seen = BTreeSet::new();
    for f in from {
        if excluded.contains(f.field.as_str()) || !seen.insert(f.field.as_str()) {
            continue;
        }
        out.push(MisconnectedField {
            kind,
            field: f.field.clone(),
            name: f.name.clone(),
        });
    }
}
