//! Classification of the loosely-typed JSON payloads carried by rule maps,
//! contexts and scenarios.

use serde_json::Value;
use std::fmt;

/// The runtime shape of a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
}

impl ValueKind {
    /// Classify a JSON value.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
        }
    }

    /// Map a rule map `type` string to a value kind.
    ///
    /// Accepts both plain JSON type names and the input-widget names the
    /// rule map endpoint emits (`number-input`, `true-false`, ...).
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "number" | "number-input" | "integer" | "decimal" => Some(ValueKind::Number),
            "string" | "text" | "text-input" | "date" | "select" | "radio" => {
                Some(ValueKind::String)
            }
            "boolean" | "bool" | "true-false" => Some(ValueKind::Bool),
            "object" => Some(ValueKind::Object),
            "array" | "object-array" | "multiselect" => Some(ValueKind::Array),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "boolean",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Array => "array",
            ValueKind::Object => "object",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a text cell (CSV, CLI argument) into a JSON value.
///
/// Empty text yields `None`. With a `hint` of [`ValueKind::String`] the text
/// is kept verbatim so identifiers such as `00123` survive; otherwise booleans,
/// numbers, `null` and inline JSON objects/arrays are recognised before
/// falling back to a string.
pub fn parse_cell(text: &str, hint: Option<ValueKind>) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if hint == Some(ValueKind::String) {
        return Some(Value::String(trimmed.to_string()));
    }
    if trimmed.eq_ignore_ascii_case("true") {
        return Some(Value::Bool(true));
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Some(Value::Bool(false));
    }
    if trimmed == "null" {
        return Some(Value::Null);
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(Value::from(i));
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Some(Value::Number(n));
        }
    }
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
            return Some(v);
        }
    }
    Some(Value::String(trimmed.to_string()))
}

/// Render a value as a single text cell. `null` renders empty; composite
/// values render as compact JSON.
pub fn format_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}
