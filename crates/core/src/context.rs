//! Simulation contexts: the live input values fed to a rule evaluation.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::rulemap::RuleField;

/// Marker key emitted on editable contexts.
pub const RULEMAP_MARKER: &str = "rulemap";

/// Keys that carry session flags rather than rule inputs.
pub const RESERVED_KEYS: [&str; 3] = [RULEMAP_MARKER, "submit", "lateEntry"];

pub fn is_reserved(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

/// Field name to current value, plus the editable marker.
///
/// On the wire this is a flat JSON object; an editable context carries
/// `"rulemap": true`. Setting a field always replaces its whole value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SimulationContext {
    values: BTreeMap<String, Value>,
    editable: bool,
}

impl SimulationContext {
    /// An empty, read-only context.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty context flagged as editable.
    pub fn editable() -> Self {
        SimulationContext {
            values: BTreeMap::new(),
            editable: true,
        }
    }

    /// Build from a JSON object. A `rulemap: true` entry becomes the marker.
    pub fn from_object(object: Map<String, Value>) -> Self {
        let mut ctx = SimulationContext::new();
        for (key, value) in object {
            ctx.set(key, value);
        }
        ctx
    }

    pub fn from_pairs<I, K>(pairs: I, editable: bool) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut ctx = SimulationContext::new();
        for (key, value) in pairs {
            ctx.set(key, value);
        }
        ctx.editable = editable;
        ctx
    }

    pub fn is_editable(&self) -> bool {
        self.editable
    }

    pub fn set_editable(&mut self, editable: bool) {
        self.editable = editable;
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    /// Replace one field's value. Writing the marker key toggles the marker.
    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        let field = field.into();
        if field == RULEMAP_MARKER {
            self.editable = value == Value::Bool(true);
            return;
        }
        self.values.insert(field, value);
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.values.remove(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// Iterate over rule inputs only, skipping session flags.
    pub fn inputs(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter().filter(|(k, _)| !is_reserved(k))
    }

    /// True when at least one non-reserved key is present.
    pub fn has_inputs(&self) -> bool {
        self.inputs().next().is_some()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The object sent to the decision evaluator.
    pub fn evaluation_input(&self) -> Map<String, Value> {
        self.inputs()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn to_json(&self) -> Value {
        let mut object: Map<String, Value> = self
            .values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if self.editable {
            object.insert(RULEMAP_MARKER.to_string(), Value::Bool(true));
        }
        Value::Object(object)
    }
}

impl Serialize for SimulationContext {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SimulationContext {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let object = Map::<String, Value>::deserialize(deserializer)?;
        Ok(SimulationContext::from_object(object))
    }
}

/// Build an editable context for `fields`, carrying over any value already
/// present in `existing` and seeding `null` otherwise.
///
/// Keys of `existing` that are not declared in `fields` are dropped.
pub fn build_context(fields: &[RuleField], existing: Option<&SimulationContext>) -> SimulationContext {
    let mut ctx = SimulationContext::editable();
    for field in fields.iter().filter(|f| !f.field.is_empty()) {
        let value = existing
            .and_then(|e| e.get(&field.field))
            .cloned()
            .unwrap_or(Value::Null);
        ctx.set(field.field.clone(), value);
    }
    ctx
}

/// Seed the expected-output map from `result_outputs`, keeping any value in
/// `previous` for fields that are still declared.
pub fn reseed_expected(
    result_outputs: &[RuleField],
    previous: &BTreeMap<String, Value>,
) -> BTreeMap<String, Value> {
    result_outputs
        .iter()
        .filter(|f| f.is_flat())
        .map(|f| {
            let value = previous
                .get(&f.field)
                .cloned()
                .or_else(|| f.value.clone())
                .unwrap_or(Value::Null);
            (f.field.clone(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(names: &[&str]) -> Vec<RuleField> {
        names.iter().map(|n| RuleField::new(*n)).collect()
    }

    #[test]
    fn empty_fields_yield_marker_only() {
        let ctx = build_context(&[], None);
        assert_eq!(ctx.to_json(), json!({"rulemap": true}));
    }

    #[test]
    fn seeds_null_and_carries_existing_values() {
        let existing = SimulationContext::from_pairs(
            [("age", json!(30)), ("stale", json!("x"))],
            false,
        );
        let ctx = build_context(&fields(&["age", "income"]), Some(&existing));
        assert_eq!(
            ctx.to_json(),
            json!({"age": 30, "income": null, "rulemap": true})
        );
    }

    #[test]
    fn existing_null_is_carried_as_null() {
        let existing = SimulationContext::from_pairs([("age", Value::Null)], true);
        let ctx = build_context(&fields(&["age"]), Some(&existing));
        assert_eq!(ctx.get("age"), Some(&Value::Null));
    }

    #[test]
    fn rebuild_is_idempotent() {
        let fs = fields(&["a", "b", "c"]);
        let seed = SimulationContext::from_pairs(
            [("a", json!(1)), ("c", json!({"deep": [1, 2]})), ("z", json!(true))],
            false,
        );
        let once = build_context(&fs, Some(&seed));
        let twice = build_context(&fs, Some(&once));
        assert_eq!(once, twice);
    }

    #[test]
    fn evaluation_input_strips_reserved_keys() {
        let mut ctx = SimulationContext::editable();
        ctx.set("age", json!(4));
        ctx.set("submit", json!(true));
        ctx.set("lateEntry", json!(false));
        let input = ctx.evaluation_input();
        assert_eq!(Value::Object(input), json!({"age": 4}));
    }

    #[test]
    fn marker_round_trips_through_json() {
        let ctx: SimulationContext =
            serde_json::from_value(json!({"a": 1, "rulemap": true})).unwrap();
        assert!(ctx.is_editable());
        assert_eq!(ctx.len(), 1);

        let plain: SimulationContext = serde_json::from_value(json!({"a": 1})).unwrap();
        assert!(!plain.is_editable());
        assert_eq!(serde_json::to_value(&plain).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn has_inputs_ignores_session_flags() {
        let mut ctx = SimulationContext::editable();
        ctx.set("submit", json!(true));
        assert!(!ctx.has_inputs());
        ctx.set("x", Value::Null);
        assert!(ctx.has_inputs());
    }

    #[test]
    fn reseed_preserves_values_of_surviving_fields() {
        let mut previous = BTreeMap::new();
        previous.insert("kept".to_string(), json!(10));
        previous.insert("dropped".to_string(), json!(1));
        let outputs = vec![
            RuleField::new("kept"),
            RuleField {
                field: "fresh".into(),
                value: Some(json!("default")),
                ..RuleField::default()
            },
        ];
        let seeded = reseed_expected(&outputs, &previous);
        assert_eq!(seeded.get("kept"), Some(&json!(10)));
        assert_eq!(seeded.get("fresh"), Some(&json!("default")));
        assert!(!seeded.contains_key("dropped"));
    }
}
