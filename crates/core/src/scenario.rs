//! Persisted regression scenarios for a rule.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::context::SimulationContext;

/// A `{name, value}` pair, used for both inputs and expected results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    #[serde(default)]
    pub value: Value,
}

impl Variable {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Variable {
            name: name.into(),
            value,
        }
    }
}

/// A named set of inputs and expected outputs saved against a rule.
///
/// Titles are unique per rule, compared trimmed and case-insensitively.
/// The server assigns `_id`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    #[serde(rename = "ruleID", default)]
    pub rule_id: String,
    #[serde(default)]
    pub filepath: String,
    #[serde(default)]
    pub variables: Vec<Variable>,
    #[serde(default)]
    pub expected_results: Vec<Variable>,
}

impl Scenario {
    /// The scenario's inputs as a flat, read-only context.
    pub fn context(&self) -> SimulationContext {
        SimulationContext::from_pairs(
            self.variables.iter().map(|v| (v.name.clone(), v.value.clone())),
            false,
        )
    }

    /// Expected results as `{name: value}`.
    pub fn expected_object(&self) -> Map<String, Value> {
        to_object(&self.expected_results)
    }

    /// Inputs as `{name: value}`.
    pub fn inputs_object(&self) -> Map<String, Value> {
        to_object(&self.variables)
    }

    pub fn title_matches(&self, title: &str) -> bool {
        normalize_title(&self.title) == normalize_title(title)
    }
}

/// Canonical form used for title comparisons.
pub fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

/// Later entries with a repeated name win, as with object assignment.
pub fn to_object(vars: &[Variable]) -> Map<String, Value> {
    vars.iter()
        .map(|v| (v.name.clone(), v.value.clone()))
        .collect()
}

pub fn variables_from_object(object: &Map<String, Value>) -> Vec<Variable> {
    object
        .iter()
        .map(|(k, v)| Variable::new(k.clone(), v.clone()))
        .collect()
}

pub fn find_by_title<'a>(scenarios: &'a [Scenario], title: &str) -> Option<&'a Scenario> {
    scenarios.iter().find(|s| s.title_matches(title))
}

pub fn find_by_id<'a>(scenarios: &'a [Scenario], id: &str) -> Option<&'a Scenario> {
    scenarios.iter().find(|s| s.id.as_deref() == Some(id))
}

/// True when another scenario (any id but `except_id`) already uses `title`.
pub fn title_taken(scenarios: &[Scenario], title: &str, except_id: Option<&str>) -> bool {
    scenarios
        .iter()
        .filter(|s| except_id.is_none() || s.id.as_deref() != except_id)
        .any(|s| s.title_matches(title))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scenario(id: &str, title: &str) -> Scenario {
        Scenario {
            id: Some(id.to_string()),
            title: title.to_string(),
            ..Scenario::default()
        }
    }

    #[test]
    fn wire_names() {
        let s: Scenario = serde_json::from_value(json!({
            "_id": "64f",
            "title": "Adult",
            "ruleID": "r1",
            "filepath": "eligibility.json",
            "variables": [{"name": "age", "value": 30}],
            "expectedResults": [{"name": "eligible", "value": true}]
        }))
        .unwrap();
        assert_eq!(s.id.as_deref(), Some("64f"));
        assert_eq!(s.rule_id, "r1");
        assert_eq!(s.expected_object().get("eligible"), Some(&json!(true)));

        let back = serde_json::to_value(&s).unwrap();
        assert!(back.get("_id").is_some());
        assert!(back.get("expectedResults").is_some());
    }

    #[test]
    fn new_scenarios_omit_id() {
        let s = Scenario {
            title: "t".into(),
            ..Scenario::default()
        };
        let v = serde_json::to_value(&s).unwrap();
        assert!(v.get("_id").is_none());
    }

    #[test]
    fn context_is_read_only() {
        let s = Scenario {
            variables: vec![Variable::new("age", json!(3))],
            ..Scenario::default()
        };
        let ctx = s.context();
        assert!(!ctx.is_editable());
        assert_eq!(ctx.get("age"), Some(&json!(3)));
    }

    #[test]
    fn title_lookup_is_case_insensitive() {
        let list = vec![scenario("1", "Adult"), scenario("2", "Minor")];
        assert_eq!(
            find_by_title(&list, "  adult ").and_then(|s| s.id.as_deref()),
            Some("1")
        );
        assert!(title_taken(&list, "MINOR", Some("1")));
        assert!(!title_taken(&list, "minor", Some("2")));
        assert!(!title_taken(&list, "Senior", None));
    }
}
