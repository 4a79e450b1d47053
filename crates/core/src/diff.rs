//! Structural comparison of actual decision results against expected results.

use std::collections::BTreeSet;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::scenario::Scenario;

/// Exact structural equality.
///
/// Numbers compare by exact decimal value, so `5` equals `5.0` but `0.1 + 0.2`
/// does not equal `0.3`. There is no coercion across types: `5` and `"5"`
/// differ. Objects must have identical key sets.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xm), Value::Object(ym)) => objects_equal(xm, ym),
        _ => a == b,
    }
}

pub fn objects_equal(a: &Map<String, Value>, b: &Map<String, Value>) -> bool {
    a.len() == b.len()
        && a.iter()
            .all(|(k, v)| b.get(k).is_some_and(|other| values_equal(v, other)))
}

fn numbers_equal(a: &Number, b: &Number) -> bool {
    if a == b {
        return true;
    }
    match (to_decimal(a), to_decimal(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a.as_f64().is_some() && a.as_f64() == b.as_f64(),
    }
}

fn to_decimal(n: &Number) -> Option<Decimal> {
    if let Some(i) = n.as_i64() {
        return Some(Decimal::from(i));
    }
    if let Some(u) = n.as_u64() {
        return Some(Decimal::from(u));
    }
    let text = n.to_string();
    Decimal::from_str(&text)
        .ok()
        .or_else(|| Decimal::from_scientific(&text).ok())
}

/// A single field whose actual value differs from the expected one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDiff {
    pub field: String,
    /// `None` when the field is absent from the expected results.
    pub expected: Option<Value>,
    /// `None` when the field is absent from the actual result.
    pub actual: Option<Value>,
}

/// Outcome of re-running one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultDiff {
    pub inputs: Map<String, Value>,
    pub result: Map<String, Value>,
    pub expected_results: Map<String, Value>,
    pub result_match: bool,
}

impl ResultDiff {
    pub fn compute(
        inputs: Map<String, Value>,
        result: Map<String, Value>,
        expected_results: Map<String, Value>,
    ) -> Self {
        let result_match = objects_equal(&result, &expected_results);
        ResultDiff {
            inputs,
            result,
            expected_results,
            result_match,
        }
    }

    /// Diff a scenario's stored expectations against a fresh result.
    pub fn for_scenario(scenario: &Scenario, result: Map<String, Value>) -> Self {
        ResultDiff::compute(scenario.inputs_object(), result, scenario.expected_object())
    }

    /// Field-level differences, in key order.
    pub fn differences(&self) -> Vec<FieldDiff> {
        let keys: BTreeSet<&String> = self
            .result
            .keys()
            .chain(self.expected_results.keys())
            .collect();
        keys.into_iter()
            .filter_map(|key| {
                let actual = self.result.get(key);
                let expected = self.expected_results.get(key);
                let same = match (actual, expected) {
                    (Some(a), Some(e)) => values_equal(a, e),
                    _ => false,
                };
                if same {
                    None
                } else {
                    Some(FieldDiff {
                        field: key.clone(),
                        expected: expected.cloned(),
                        actual: actual.cloned(),
                    })
                }
            })
            .collect()
    }

    pub fn to_text(&self) -> String {
        if self.result_match {
            return "pass".to_string();
        }
        let mut lines = vec!["fail".to_string()];
        for d in self.differences() {
            lines.push(format!(
                "  {}: expected {}, got {}",
                d.field,
                render(d.expected.as_ref()),
                render(d.actual.as_ref())
            ));
        }
        lines.join("\n")
    }
}

fn render(value: Option<&Value>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "(absent)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::Variable;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn matching_number_result() {
        let scenario = Scenario {
            expected_results: vec![Variable::new("out", json!(5))],
            ..Scenario::default()
        };
        let diff = ResultDiff::for_scenario(&scenario, obj(json!({"out": 5})));
        assert!(diff.result_match);
        assert!(diff.differences().is_empty());
    }

    #[test]
    fn string_does_not_match_number() {
        let scenario = Scenario {
            expected_results: vec![Variable::new("out", json!(5))],
            ..Scenario::default()
        };
        let diff = ResultDiff::for_scenario(&scenario, obj(json!({"out": "5"})));
        assert!(!diff.result_match);
        assert_eq!(diff.differences()[0].field, "out");
    }

    #[test]
    fn integer_and_float_representations_are_equal() {
        assert!(values_equal(&json!(5), &json!(5.0)));
        assert!(values_equal(&json!({"a": [1, 2.50]}), &json!({"a": [1.0, 2.5]})));
    }

    #[test]
    fn no_numeric_tolerance() {
        assert!(!values_equal(&json!(0.1 + 0.2), &json!(0.3)));
        assert!(!values_equal(&json!(1), &json!(1.0000001)));
    }

    #[test]
    fn extra_actual_field_breaks_match() {
        let diff = ResultDiff::compute(
            Map::new(),
            obj(json!({"a": 1, "b": 2})),
            obj(json!({"a": 1})),
        );
        assert!(!diff.result_match);
        let d = diff.differences();
        assert_eq!(d.len(), 1);
        assert_eq!(d[0].field, "b");
        assert_eq!(d[0].expected, None);
    }

    #[test]
    fn text_rendering_lists_differences() {
        let diff = ResultDiff::compute(Map::new(), obj(json!({"a": 2})), obj(json!({"a": 1})));
        assert_eq!(diff.to_text(), "fail\n  a: expected 1, got 2");
    }

    #[test]
    fn serializes_camel_case() {
        let diff = ResultDiff::compute(Map::new(), Map::new(), Map::new());
        let v = serde_json::to_value(&diff).unwrap();
        assert_eq!(v["resultMatch"], json!(true));
        assert!(v.get("expectedResults").is_some());
    }
}
