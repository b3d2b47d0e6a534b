//! Schema-less tabular record.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Numbers outside this magnitude stay text when inferred, since they cannot
/// round-trip through a double exactly.
const MAX_SAFE_MAGNITUDE: f64 = 9_007_199_254_740_992.0;

/// One row of tabular data: column name to scalar value, in column order.
///
/// Values are `null`, booleans, numbers or strings. The store never looks
/// inside a record beyond the optional key column of its collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column, keeping its original position if it already exists.
    pub fn insert(&mut self, column: impl Into<String>, value: Value) {
        self.fields.insert(column.into(), value);
    }

    /// Builder-style variant of [`Record::insert`].
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(column, value.into());
        self
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.get(column)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Column names in order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Display text of a column; absent and null cells render as "".
    pub fn display(&self, column: &str) -> String {
        self.get(column).map(scalar_text).unwrap_or_default()
    }

    /// Text of a column when it holds a meaningful value.
    ///
    /// Falsy cells (null, empty text, `false`, zero) count as missing.
    pub fn present_text(&self, column: &str) -> Option<String> {
        match self.get(column)? {
            Value::Null | Value::Bool(false) => None,
            Value::String(s) if s.is_empty() => None,
            Value::Number(n) if n.as_f64() == Some(0.0) => None,
            value => Some(scalar_text(value)),
        }
    }
}

/// Render a scalar the way a table cell shows it.
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Infer a typed scalar from a raw CSV cell.
///
/// `true`/`TRUE`/`false`/`FALSE` become booleans, numeric literals within the
/// safe integer range become numbers (integral values stay integers, so
/// `"007"` becomes `7`), the empty cell becomes null and anything else stays
/// text.
pub fn infer_scalar(raw: &str) -> Value {
    match raw {
        "true" | "TRUE" => return Value::Bool(true),
        "false" | "FALSE" => return Value::Bool(false),
        "" => return Value::Null,
        _ => {}
    }

    if looks_numeric(raw) {
        if let Ok(parsed) = raw.trim().parse::<f64>() {
            if parsed > -MAX_SAFE_MAGNITUDE && parsed < MAX_SAFE_MAGNITUDE {
                return number_value(parsed);
            }
        }
    }

    Value::String(raw.to_string())
}

fn number_value(parsed: f64) -> Value {
    if parsed.fract() == 0.0 {
        // -0.0 collapses to 0 here
        return Value::Number(Number::from(parsed as i64));
    }
    Number::from_f64(parsed)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Matches `-?(\d+\.?|\.\d+|\d+\.\d+)([eE][-+]?\d+)?` with optional
/// surrounding whitespace.
fn looks_numeric(raw: &str) -> bool {
    let s = raw.trim().as_bytes();
    let mut i = 0;

    if s.first() == Some(&b'-') {
        i += 1;
    }

    let int_start = i;
    while i < s.len() && s[i].is_ascii_digit() {
        i += 1;
    }
    let int_digits = i - int_start;

    let mut frac_digits = 0;
    if i < s.len() && s[i] == b'.' {
        i += 1;
        let frac_start = i;
        while i < s.len() && s[i].is_ascii_digit() {
            i += 1;
        }
        frac_digits = i - frac_start;
    }

    if int_digits == 0 && frac_digits == 0 {
        return false;
    }

    if i < s.len() && (s[i] == b'e' || s[i] == b'E') {
        i += 1;
        if i < s.len() && (s[i] == b'+' || s[i] == b'-') {
            i += 1;
        }
        let exp_start = i;
        while i < s.len() && s[i].is_ascii_digit() {
            i += 1;
        }
        if i == exp_start {
            return false;
        }
    }

    i == s.len()
}
