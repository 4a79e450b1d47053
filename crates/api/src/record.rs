use std::collections::BTreeMap;

use brms_core::value::ValueKind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ApiError;

/// A rule being worked on: its identity plus the decision graph content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDocument {
    /// Stable rule identifier scenarios are saved against.
    pub rule_id: String,
    /// Path of the rule file relative to the rules directory.
    pub filepath: String,
    /// The JDM decision graph.
    pub content: Value,
}

impl RuleDocument {
    pub fn new(rule_id: impl Into<String>, filepath: impl Into<String>, content: Value) -> Self {
        RuleDocument {
            rule_id: rule_id.into(),
            filepath: filepath.into(),
            content,
        }
    }
}

/// Body of `POST /rulemap`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleMapRequest<'a> {
    pub rule_dir: &'a str,
    pub filepath: &'a str,
    pub rule_content: &'a Value,
}

/// Body of `POST /rulemap/generateFromRuleContent`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRuleMapRequest<'a> {
    pub rule_dir: &'a str,
    pub rule_content: &'a Value,
}

/// Body of `POST /decisions/evaluate`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateRequest<'a> {
    pub rule_dir: &'a str,
    pub rule_content: &'a Value,
    pub context: &'a Map<String, Value>,
    pub trace: bool,
}

/// Raw response of `POST /decisions/evaluate`.
#[derive(Debug, Clone, Deserialize)]
pub struct EvaluateResponse {
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub trace: Option<Value>,
}

/// Body of `POST /scenario/run-decisions`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunDecisionsRequest<'a> {
    pub rule_dir: &'a str,
    pub filepath: &'a str,
    pub rule_content: &'a Value,
}

/// One entry of the bulk-run response, before shape validation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawDecisionRun {
    #[serde(default)]
    pub inputs: Map<String, Value>,
    #[serde(default)]
    pub result: Value,
}

/// One validated entry of the bulk-run response.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionRun {
    pub inputs: Map<String, Value>,
    pub result: Map<String, Value>,
}

/// A validated simulation: the result is always an object.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    pub result: Map<String, Value>,
    pub trace: Option<Value>,
}

impl SimulationResult {
    pub fn from_response(response: EvaluateResponse) -> Result<Self, ApiError> {
        Ok(SimulationResult {
            result: validate_result(response.result)?,
            trace: response.trace,
        })
    }
}

/// Enforce the decision result contract: a plain object, never an array.
pub fn validate_result(result: Value) -> Result<Map<String, Value>, ApiError> {
    match result {
        Value::Object(map) => Ok(map),
        Value::Array(_) => Err(ApiError::MultipleResults),
        other => Err(ApiError::UnexpectedResult {
            kind: ValueKind::of(&other).to_string(),
        }),
    }
}

/// Validate a whole bulk-run response. A single array result anywhere fails
/// the batch; no partial interpretation is attempted.
pub fn validate_decision_runs(
    raw: BTreeMap<String, RawDecisionRun>,
) -> Result<BTreeMap<String, DecisionRun>, ApiError> {
    if raw.values().any(|r| r.result.is_array()) {
        return Err(ApiError::MultipleResults);
    }
    raw.into_iter()
        .map(|(title, r)| {
            Ok((
                title,
                DecisionRun {
                    inputs: r.inputs,
                    result: validate_result(r.result)?,
                },
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(result: Value) -> RawDecisionRun {
        RawDecisionRun {
            inputs: Map::new(),
            result,
        }
    }

    #[test]
    fn object_result_accepted() {
        let map = validate_result(json!({"out": 1})).unwrap();
        assert_eq!(map.get("out"), Some(&json!(1)));
    }

    #[test]
    fn array_result_rejected() {
        assert!(matches!(
            validate_result(json!(["x"])),
            Err(ApiError::MultipleResults)
        ));
    }

    #[test]
    fn scalar_result_rejected() {
        match validate_result(json!(3)) {
            Err(ApiError::UnexpectedResult { kind }) => assert_eq!(kind, "number"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn one_array_fails_the_whole_batch() {
        let mut batch = BTreeMap::new();
        batch.insert("a".to_string(), raw(json!({"out": 1})));
        batch.insert("b".to_string(), raw(json!([{"out": 1}, {"out": 2}])));
        assert!(matches!(
            validate_decision_runs(batch),
            Err(ApiError::MultipleResults)
        ));
    }

    #[test]
    fn evaluate_request_wire_names() {
        let content = json!({"nodes": []});
        let ctx = Map::new();
        let body = serde_json::to_value(EvaluateRequest {
            rule_dir: "rules",
            rule_content: &content,
            context: &ctx,
            trace: true,
        })
        .unwrap();
        assert_eq!(
            body,
            json!({"ruleDir": "rules", "ruleContent": {"nodes": []}, "context": {}, "trace": true})
        );
    }
}
