//! The declared schema of a rule: inputs, outputs and result outputs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::value::ValueKind;

/// One declared field of a rule.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleField {
    /// Context key. Entries with an empty key are ignored by every consumer.
    #[serde(default)]
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nested: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub child_fields: Vec<RuleField>,
}

impl RuleField {
    pub fn new(field: impl Into<String>) -> Self {
        RuleField {
            field: field.into(),
            ..RuleField::default()
        }
    }

    pub fn named(field: impl Into<String>, name: impl Into<String>) -> Self {
        RuleField {
            field: field.into(),
            name: Some(name.into()),
            ..RuleField::default()
        }
    }

    pub fn is_nested(&self) -> bool {
        self.nested.unwrap_or(false)
    }

    /// True when the entry takes part in flat schema comparisons.
    pub fn is_flat(&self) -> bool {
        !self.field.is_empty() && !self.is_nested()
    }

    /// Display label: the human name when present, otherwise the key.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.field)
    }

    /// Declared value kind, if the `type` is one we recognise.
    pub fn kind(&self) -> Option<ValueKind> {
        self.data_type.as_deref().and_then(ValueKind::from_type_name)
    }
}

/// Schema of a rule as produced by the rule map endpoint.
///
/// The map is derived from the rule graph and regenerated whenever the rule
/// content changes; it is never edited directly.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleMap {
    #[serde(default)]
    pub inputs: Vec<RuleField>,
    #[serde(default)]
    pub outputs: Vec<RuleField>,
    #[serde(default)]
    pub result_outputs: Vec<RuleField>,
}

impl RuleMap {
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty() && self.outputs.is_empty() && self.result_outputs.is_empty()
    }

    pub fn flat_inputs(&self) -> impl Iterator<Item = &RuleField> {
        self.inputs.iter().filter(|f| f.is_flat())
    }

    pub fn flat_outputs(&self) -> impl Iterator<Item = &RuleField> {
        self.outputs.iter().filter(|f| f.is_flat())
    }

    pub fn flat_result_outputs(&self) -> impl Iterator<Item = &RuleField> {
        self.result_outputs.iter().filter(|f| f.is_flat())
    }

    /// Look up the declared kind of an input or result output by key.
    pub fn kind_of(&self, field: &str) -> Option<ValueKind> {
        self.inputs
            .iter()
            .chain(self.result_outputs.iter())
            .chain(self.outputs.iter())
            .find(|f| f.field == field)
            .and_then(RuleField::kind)
    }
}
