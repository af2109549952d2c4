//! Tagged values carried by identifier and attribute maps.
//!
//! Incoming identity records arrive as loose JSON. `Value` gives those maps a
//! closed set of shapes so merging and standardization dispatch exhaustively.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Identifier/attribute map keyed by field name.
pub type ValueMap = BTreeMap<String, Value>;

/// A single identifier or attribute value.
///
/// Serialized untagged so `{"ssn": "123-45-6789", "age": 42}` deserializes
/// directly into a [`ValueMap`].
///
/// # Examples
///
/// ```
/// use entity_resolution::Value;
///
/// let ssn = Value::from("123-45-6789");
/// assert_eq!(ssn.as_identifier_text().as_deref(), Some("123-45-6789"));
/// assert!(Value::Bool(true).as_identifier_text().is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// JSON null.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer; matched exactly as an identifier.
    Int(i64),
    /// Floating-point number.
    Float(f64),
    /// Text; matched exactly as an identifier when not blank.
    String(String),
    /// Ordered list of values.
    List(Vec<Value>),
    /// Nested map.
    Record(ValueMap),
}

impl Value {
    /// Returns true for a string value.
    pub const fn is_string(&self) -> bool {
        matches!(self, Self::String(_))
    }

    /// The string, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Text form used for exact identifier matching.
    ///
    /// Only strings and integers identify anything; blank strings do not.
    #[must_use]
    pub fn as_identifier_text(&self) -> Option<String> {
        match self {
            Self::String(v) if !v.trim().is_empty() => Some(v.clone()),
            Self::Int(v) => Some(v.to_string()),
            _ => None,
        }
    }
}

/// Overlays `incoming` onto `existing`; incoming values win on key collision.
pub fn merge_values(existing: &mut ValueMap, incoming: &ValueMap) {
    for (key, value) in incoming {
        existing.insert(key.clone(), value.clone());
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match v {
            Json::Null => Self::Null,
            Json::Bool(b) => Self::Bool(b),
            Json::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float))
                .unwrap_or(Self::Null),
            Json::String(s) => Self::String(s),
            Json::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Json::Object(map) => {
                Self::Record(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_accessors() {
        assert_eq!(Value::from("x").as_str(), Some("x"));
    }

    #[test]
    fn test_identifier_text() {
        assert_eq!(Value::Int(7).as_identifier_text().as_deref(), Some("7"));
        assert_eq!(Value::from("  ").as_identifier_text(), None);
        assert_eq!(Value::Float(1.5).as_identifier_text(), None);
        assert_eq!(Value::List(vec![]).as_identifier_text(), None);
    }

    #[test]
    fn test_untagged_deserialization() {
        let map: ValueMap = serde_json::from_str(
            r#"{"ssn":"123","age":42,"score":0.5,"vip":true,"tags":["a"],"addr":{"zip":"62704"},"x":null}"#,
        )
        .unwrap();
        assert_eq!(map["ssn"], Value::from("123"));
        assert_eq!(map["age"], Value::Int(42));
        assert_eq!(map["score"], Value::Float(0.5));
        assert_eq!(map["vip"], Value::Bool(true));
        assert_eq!(map["tags"], Value::List(vec![Value::from("a")]));
        assert!(matches!(&map["addr"], Value::Record(r) if r["zip"] == Value::from("62704")));
        assert_eq!(map["x"], Value::Null);
    }

    #[test]
    fn test_from_json() {
        let v = Value::from(serde_json::json!({"a": [1, 2.5, "s"]}));
        let Value::Record(r) = v else {
            panic!("expected record");
        };
        assert_eq!(
            r["a"],
            Value::List(vec![Value::Int(1), Value::Float(2.5), Value::from("s")])
        );
    }

    #[test]
    fn test_merge_values_incoming_wins() {
        let mut existing = ValueMap::new();
        existing.insert("ssn".into(), Value::from("old"));
        existing.insert("keep".into(), Value::Int(1));

        let mut incoming = ValueMap::new();
        incoming.insert("ssn".into(), Value::from("new"));
        incoming.insert("added".into(), Value::Bool(false));

        merge_values(&mut existing, &incoming);
        assert_eq!(existing["ssn"], Value::from("new"));
        assert_eq!(existing["keep"], Value::Int(1));
        assert_eq!(existing["added"], Value::Bool(false));
    }
}
