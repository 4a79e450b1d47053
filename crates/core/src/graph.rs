//! JDM decision graphs and independent field inference.
//!
//! The walker below derives a rule's inputs and outputs purely from the node
//! declarations of the graph, without consulting any stored rule map. It is
//! the "generated" side of misconnected-field detection.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::rulemap::{RuleField, RuleMap};

pub const INPUT_NODE: &str = "inputNode";
pub const OUTPUT_NODE: &str = "outputNode";
pub const DECISION_TABLE_NODE: &str = "decisionTableNode";
pub const EXPRESSION_NODE: &str = "expressionNode";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DecisionGraph {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub content: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    #[serde(default)]
    pub id: String,
    pub source_id: String,
    pub target_id: String,
}

impl DecisionGraph {
    pub fn from_json(content: &Value) -> Result<Self, CoreError> {
        if !content.is_object() {
            return Err(CoreError::InvalidGraph {
                message: "rule content must be a JSON object".to_string(),
            });
        }
        serde_json::from_value(content.clone()).map_err(|e| CoreError::InvalidGraph {
            message: e.to_string(),
        })
    }

    /// Count nodes without requiring the content to be a well-formed graph.
    pub fn count_nodes(content: &Value) -> usize {
        content
            .get("nodes")
            .and_then(Value::as_array)
            .map_or(0, Vec::len)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Infer the rule map from node declarations.
    ///
    /// - `inputNode` fields and decision table inputs are inputs;
    /// - `outputNode` fields, decision table outputs and expression keys are
    ///   outputs;
    /// - an input that another node produces is internal wiring and is
    ///   dropped from the inputs.
    ///
    /// `resultOutputs` are the output node's fields when the graph declares
    /// any, otherwise every output.
    pub fn infer_rule_map(&self) -> RuleMap {
        let mut inputs = FieldList::default();
        let mut outputs = FieldList::default();
        let mut declared_results = FieldList::default();

        for node in &self.nodes {
            match node.kind.as_str() {
                INPUT_NODE => inputs.extend(fields_at(&node.content, "fields", "field")),
                OUTPUT_NODE => {
                    let fields = fields_at(&node.content, "fields", "field");
                    declared_results.extend(fields.clone());
                    outputs.extend(fields);
                }
                DECISION_TABLE_NODE => {
                    inputs.extend(fields_at(&node.content, "inputs", "field"));
                    outputs.extend(fields_at(&node.content, "outputs", "field"));
                }
                EXPRESSION_NODE => {
                    outputs.extend(fields_at(&node.content, "expressions", "key"));
                }
                _ => {}
            }
        }

        let produced: BTreeSet<String> = outputs.keys().collect();
        let result_outputs = if declared_results.is_empty() {
            outputs.clone().into_vec()
        } else {
            declared_results.into_vec()
        };

        RuleMap {
            inputs: inputs
                .into_vec()
                .into_iter()
                .filter(|f| !produced.contains(&f.field))
                .collect(),
            outputs: outputs.into_vec(),
            result_outputs,
        }
    }
}

/// Insertion-ordered field list, unique by key.
#[derive(Debug, Clone, Default)]
struct FieldList(Vec<RuleField>);

impl FieldList {
    fn extend(&mut self, fields: Vec<RuleField>) {
        for f in fields {
            if !self.0.iter().any(|existing| existing.field == f.field) {
                self.0.push(f);
            }
        }
    }

    fn keys(&self) -> impl Iterator<Item = String> + '_ {
        self.0.iter().map(|f| f.field.clone())
    }

    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn into_vec(self) -> Vec<RuleField> {
        self.0
    }
}

fn fields_at(content: &Value, list_key: &str, key_field: &str) -> Vec<RuleField> {
    let Some(entries) = content.get(list_key).and_then(Value::as_array) else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| {
            let key = entry.get(key_field)?.as_str()?.trim();
            if key.is_empty() {
                return None;
            }
            Some(RuleField {
                field: key.to_string(),
                name: entry
                    .get("name")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                data_type: entry
                    .get("dataType")
                    .or_else(|| entry.get("type"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
                ..RuleField::default()
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "nodes": [
                {"id": "in", "type": "inputNode", "name": "Request",
                 "content": {"fields": [{"field": "age", "name": "Age"}, {"field": "income"}]}},
                {"id": "dt", "type": "decisionTableNode", "name": "Eligibility",
                 "content": {
                    "inputs": [{"id": "i1", "field": "age"}, {"id": "i2", "field": "band"}],
                    "outputs": [{"id": "o1", "field": "eligible", "name": "Eligible"}],
                    "rules": []
                 }},
                {"id": "ex", "type": "expressionNode",
                 "content": {"expressions": [{"key": "band", "value": "income > 1000 ? 'high' : 'low'"}]}},
                {"id": "out", "type": "outputNode", "content": {}}
            ],
            "edges": [
                {"id": "e1", "sourceId": "in", "targetId": "ex"},
                {"id": "e2", "sourceId": "ex", "targetId": "dt"},
                {"id": "e3", "sourceId": "dt", "targetId": "out"}
            ]
        })
    }

    fn keys(fields: &[RuleField]) -> Vec<&str> {
        fields.iter().map(|f| f.field.as_str()).collect()
    }

    #[test]
    fn parses_graph() {
        let g = DecisionGraph::from_json(&sample()).unwrap();
        assert_eq!(g.node_count(), 4);
        assert_eq!(g.edges[1].source_id, "ex");
    }

    #[test]
    fn rejects_non_object_content() {
        assert!(matches!(
            DecisionGraph::from_json(&json!([1, 2])),
            Err(CoreError::InvalidGraph { .. })
        ));
    }

    #[test]
    fn infers_inputs_and_outputs() {
        let map = DecisionGraph::from_json(&sample()).unwrap().infer_rule_map();
        assert_eq!(keys(&map.inputs), vec!["age", "income"]);
        assert_eq!(keys(&map.outputs), vec!["eligible", "band"]);
        assert_eq!(keys(&map.result_outputs), vec!["eligible", "band"]);
        assert_eq!(map.inputs[0].label(), "Age");
    }

    #[test]
    fn output_node_fields_become_result_outputs() {
        let graph = json!({"nodes": [
            {"id": "dt", "type": "decisionTableNode",
             "content": {"inputs": [{"field": "x"}], "outputs": [{"field": "y"}, {"field": "z"}]}},
            {"id": "out", "type": "outputNode", "content": {"fields": [{"field": "y"}]}}
        ]});
        let map = DecisionGraph::from_json(&graph).unwrap().infer_rule_map();
        assert_eq!(keys(&map.result_outputs), vec!["y"]);
        assert_eq!(keys(&map.outputs), vec!["y", "z"]);
    }

    #[test]
    fn blank_table_columns_are_ignored() {
        let graph = json!({"nodes": [
            {"id": "dt", "type": "decisionTableNode",
             "content": {"inputs": [{"field": ""}, {"field": "x"}], "outputs": []}}
        ]});
        let map = DecisionGraph::from_json(&graph).unwrap().infer_rule_map();
        assert_eq!(keys(&map.inputs), vec!["x"]);
    }

    #[test]
    fn count_nodes_tolerates_bad_content() {
        assert_eq!(DecisionGraph::count_nodes(&json!("nope")), 0);
        assert_eq!(DecisionGraph::count_nodes(&sample()), 4);
    }
}
