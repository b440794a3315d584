//! Partial state updates pushed by the game server.
//!
//! A delta is a JSON object whose present fields mean "this changed" and whose
//! absent fields mean "leave it alone". Snapshots use the same shape.

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("payload is not a JSON object (got {0})")]
    NotAnObject(&'static str),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Delta {
    fields: Map<String, Value>,
}

impl Delta {
    /// Parse a raw push payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not JSON or is JSON but not an object.
    pub fn parse(text: &str) -> Result<Self, ReconcileError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    /// Wrap an already decoded JSON value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not an object.
    pub fn from_value(value: Value) -> Result<Self, ReconcileError> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(ReconcileError::NotAnObject(kind_of(&other))),
        }
    }

    #[must_use]
    pub fn puzzle_id(&self) -> Option<u64> {
        self.fields.get("puzzle_id").and_then(Value::as_u64)
    }

    /// Deltas without a discriminator are accepted by every screen.
    #[must_use]
    pub fn matches(&self, puzzle_id: u8) -> bool {
        match self.fields.get("puzzle_id") {
            None | Some(Value::Null) => true,
            Some(value) => value.as_u64() == Some(u64::from(puzzle_id)),
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.bool_field("puzzle_solved")
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// JS-style truthiness of a field; absent fields are false.
    #[must_use]
    pub fn bool_field(&self, name: &str) -> bool {
        self.get(name).is_some_and(truthy)
    }

    #[must_use]
    pub fn u64_field(&self, name: &str) -> Option<u64> {
        self.get(name).and_then(Value::as_u64)
    }

    #[must_use]
    pub fn i64_field(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(as_whole_number)
    }

    #[must_use]
    pub fn f64_field(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    #[must_use]
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    #[must_use]
    pub fn object_field(&self, name: &str) -> Option<&Map<String, Value>> {
        self.get(name).and_then(Value::as_object)
    }

    #[must_use]
    pub fn array_field(&self, name: &str) -> Option<&Vec<Value>> {
        self.get(name).and_then(Value::as_array)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

/// Truthiness as the screens historically evaluated it.
#[must_use]
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Accept integers and integral floats (`3` and `3.0` both read as 3).
#[must_use]
pub fn as_whole_number(value: &Value) -> Option<i64> {
    if let Some(n) = value.as_i64() {
        return Some(n);
    }
    let f = value.as_f64()?;
    #[allow(clippy::cast_possible_truncation)]
    let whole = f as i64;
    (f.fract() == 0.0 && f.is_finite()).then_some(whole)
}

/// Render a JSON number the way the browser would print it (`10`, `2.5`).
#[must_use]
pub fn js_number(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() && value.abs() < 1e15 {
        #[allow(clippy::cast_possible_truncation)]
        let whole = value as i64;
        whole.to_string()
    } else {
        value.to_string()
    }
}

const fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
