//! Dynamic value type for runtime ports.
//!
//! Values pushed and pulled at runtime are untyped at the Rust level;
//! ports enforce conformance against their descriptors. The shape is
//! JSON-like with one addition, an owned binary scalar, which the port
//! algebra requires and JSON cannot carry.

use crate::error::{Result, SlangError};
use crate::port::PortDef;
use bytes::Bytes;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// A dynamic value flowing through runtime ports.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent value.
    Null,
    /// A boolean.
    Bool(bool),
    /// A floating-point number.
    Number(f64),
    /// A UTF-8 string.
    String(String),
    /// Raw bytes.
    Binary(Bytes),
    /// An ordered sequence.
    Array(Vec<Value>),
    /// A named record.
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// Create a string value.
    pub fn string(v: impl Into<String>) -> Self {
        Self::String(v.into())
    }

    /// Create a binary value.
    pub fn binary(v: impl Into<Bytes>) -> Self {
        Self::Binary(v.into())
    }

    /// Create an object value from entries.
    pub fn object<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Check if the value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Convert to f64 if the value is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Convert to bool if the value is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Borrow the string if the value is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow the bytes if the value is binary.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Binary(b) => Some(b),
            _ => None,
        }
    }

    /// Borrow the elements if the value is an array.
    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Borrow the entries if the value is an object.
    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Object(entries) => Some(entries),
            _ => None,
        }
    }

    /// Get an object entry by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|entries| entries.get(key))
    }

    /// Check conformance against a port descriptor.
    ///
    /// Used to validate instance properties against the property schema.
    /// Generic descriptors conform to nothing; they must be specialized
    /// before values are checked.
    pub fn conforms_to(&self, def: &PortDef) -> bool {
        match (def, self) {
            (PortDef::Primitive, v) => !matches!(v, Self::Array(_) | Self::Object(_)),
            (PortDef::Number, Self::Number(_)) => true,
            (PortDef::String, Self::String(_)) => true,
            (PortDef::Boolean, Self::Bool(_)) => true,
            (PortDef::Binary, Self::Binary(_)) => true,
            (PortDef::Stream(element), Self::Array(items)) => {
                items.iter().all(|item| item.conforms_to(element))
            }
            (PortDef::Map(entries), Self::Object(fields)) => {
                entries.len() == fields.len()
                    && entries.iter().all(|(key, entry)| {
                        fields.get(key).is_some_and(|field| field.conforms_to(entry))
                    })
            }
            _ => false,
        }
    }

    /// Check conformance, reporting a named property error on failure.
    pub fn check_property(&self, name: &str, def: &PortDef) -> Result<()> {
        if self.conforms_to(def) {
            Ok(())
        } else {
            Err(SlangError::PropertyTypeMismatch {
                name: name.to_string(),
                expected: Box::new(def.clone()),
            })
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::Null
    }
}

impl From<JsonValue> for Value {
    fn from(v: JsonValue) -> Self {
        match v {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(b),
            JsonValue::Number(n) => Self::Number(n.as_f64().unwrap_or(0.0)),
            JsonValue::String(s) => Self::String(s),
            JsonValue::Array(items) => Self::Array(items.into_iter().map(Value::from).collect()),
            JsonValue::Object(entries) => Self::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for JsonValue {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(b),
            Value::Number(n) => serde_json::Number::from_f64(n)
                .map_or(JsonValue::Null, JsonValue::Number),
            Value::String(s) => JsonValue::String(s),
            // Binary has no JSON form; encoded as an array of byte values.
            Value::Binary(b) => {
                JsonValue::Array(b.iter().map(|byte| JsonValue::from(*byte)).collect())
            }
            Value::Array(items) => {
                JsonValue::Array(items.into_iter().map(JsonValue::from).collect())
            }
            Value::Object(entries) => JsonValue::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, JsonValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Number(v as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::Array(items.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_roundtrip() {
        let json: JsonValue = serde_json::from_str(r#"{"a": 1, "b": ["x", true]}"#).unwrap();
        let value = Value::from(json.clone());

        assert_eq!(value.get("a").and_then(Value::as_f64), Some(1.0));
        assert_eq!(
            value.get("b").and_then(Value::as_array).map(Vec::len),
            Some(2)
        );
        assert_eq!(JsonValue::from(value), json);
    }

    #[test]
    fn conforms_scalars() {
        assert!(Value::from(1.5).conforms_to(&PortDef::Number));
        assert!(Value::from("hi").conforms_to(&PortDef::String));
        assert!(Value::from(true).conforms_to(&PortDef::Boolean));
        assert!(Value::binary(&b"raw"[..]).conforms_to(&PortDef::Binary));
        assert!(!Value::from("hi").conforms_to(&PortDef::Number));
    }

    #[test]
    fn conforms_primitive_accepts_any_scalar() {
        assert!(Value::from(1.0).conforms_to(&PortDef::Primitive));
        assert!(Value::from("x").conforms_to(&PortDef::Primitive));
        assert!(!Value::Array(vec![]).conforms_to(&PortDef::Primitive));
    }

    #[test]
    fn conforms_structures() {
        let def = PortDef::stream(PortDef::map([("k", PortDef::Number)]));
        let ok = Value::from(vec![
            Value::object([("k", Value::from(1.0))]),
            Value::object([("k", Value::from(2.0))]),
        ]);
        assert!(ok.conforms_to(&def));

        let extra_key = Value::from(vec![Value::object([
            ("k", Value::from(1.0)),
            ("extra", Value::from(2.0)),
        ])]);
        assert!(!extra_key.conforms_to(&def));
    }

    #[test]
    fn check_property_reports_name() {
        let err = Value::from("nan")
            .check_property("delay", &PortDef::Number)
            .unwrap_err();
        assert!(err.to_string().contains("delay"));
    }
}
