//! Records: flat mappings from field name to scalar value.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, RowflowError};

/// Wire format for date values.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A single field value.
///
/// JSON strings always decode as [`FieldValue::String`]; dates only appear when
/// constructed explicitly or produced by date normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Date(NaiveDate),
    String(String),
    /// Arrays and objects. Forwarded as-is but never an acceptable required field.
    Nested(serde_json::Value),
}

impl FieldValue {
    /// True for present, submittable scalars: not null, not nested, finite
    /// floats, non-blank strings.
    pub fn is_acceptable_scalar(&self) -> bool {
        match self {
            FieldValue::Null | FieldValue::Nested(_) => false,
            FieldValue::Float(f) => f.is_finite(),
            FieldValue::String(s) => !s.trim().is_empty(),
            FieldValue::Bool(_) | FieldValue::Integer(_) | FieldValue::Date(_) => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Bool(_) => "bool",
            FieldValue::Integer(_) => "integer",
            FieldValue::Float(_) => "float",
            FieldValue::Date(_) => "date",
            FieldValue::String(_) => "string",
            FieldValue::Nested(_) => "nested",
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "null"),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Integer(i) => write!(f, "{}", i),
            FieldValue::Float(x) => write!(f, "{}", x),
            FieldValue::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            FieldValue::String(s) => write!(f, "{}", s),
            FieldValue::Nested(v) => write!(f, "{}", v),
        }
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Integer(i),
                None => n.as_f64().map(FieldValue::Float).unwrap_or(FieldValue::Null),
            },
            Value::String(s) => FieldValue::String(s),
            nested @ (Value::Array(_) | Value::Object(_)) => FieldValue::Nested(nested),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Integer(i)
    }
}

impl From<i32> for FieldValue {
    fn from(i: i32) -> Self {
        FieldValue::Integer(i64::from(i))
    }
}

impl From<f64> for FieldValue {
    fn from(x: f64) -> Self {
        FieldValue::Float(x)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(d: NaiveDate) -> Self {
        FieldValue::Date(d)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            FieldValue::Null => serializer.serialize_none(),
            FieldValue::Bool(b) => serializer.serialize_bool(*b),
            FieldValue::Integer(i) => serializer.serialize_i64(*i),
            FieldValue::Float(x) => serializer.serialize_f64(*x),
            FieldValue::Date(d) => serializer.collect_str(&d.format(DATE_FORMAT)),
            FieldValue::String(s) => serializer.serialize_str(s),
            FieldValue::Nested(v) => v.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(FieldValue::from)
    }
}

/// A row to be written to a tabular store.
///
/// Fields are kept in name order so serialization and content hashing are
/// deterministic. The optional `insert_id` is a caller-supplied stable key the
/// store may use to drop duplicate rows; it is not part of the row's JSON.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: BTreeMap<String, FieldValue>,
    insert_id: Option<String>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field insertion.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn with_insert_id(mut self, insert_id: impl Into<String>) -> Self {
        self.insert_id = Some(insert_id.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn insert_id(&self) -> Option<&str> {
        self.insert_id.as_deref()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Build a record from a JSON object.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Object(map) => Ok(Self {
                fields: map
                    .into_iter()
                    .map(|(k, v)| (k, FieldValue::from(v)))
                    .collect(),
                insert_id: None,
            }),
            other => Err(RowflowError::validation(format!(
                "expected a JSON object for a record, got {}",
                json_kind(&other)
            ))),
        }
    }

    pub(crate) fn replace(&mut self, name: &str, value: FieldValue) {
        if let Some(slot) = self.fields.get_mut(name) {
            *slot = value;
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            insert_id: None,
        }
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(Self {
            fields: BTreeMap::deserialize(deserializer)?,
            insert_id: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serializes_as_flat_object_with_iso_dates() {
        let record = Record::new()
            .with("date", NaiveDate::from_ymd_opt(2025, 3, 16).unwrap())
            .with("sales", 10000)
            .with("region", "US")
            .with("note", None::<String>)
            .with_insert_id("row-1");

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            json!({"date": "2025-03-16", "note": null, "region": "US", "sales": 10000})
        );
    }

    #[test]
    fn test_from_json_keeps_strings_as_strings() {
        let record =
            Record::from_json(json!({"date": "2025-03-16", "sales": 8000.5, "tags": ["a"]}))
                .unwrap();
        assert_eq!(record.get("date"), Some(&FieldValue::from("2025-03-16")));
        assert_eq!(record.get("sales"), Some(&FieldValue::Float(8000.5)));
        assert!(matches!(record.get("tags"), Some(FieldValue::Nested(_))));
    }

    #[test]
    fn test_from_json_rejects_non_objects() {
        let err = Record::from_json(json!([1, 2])).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("an array"));
    }

    #[test]
    fn test_acceptable_scalars() {
        assert!(FieldValue::from("mint").is_acceptable_scalar());
        assert!(FieldValue::from(0).is_acceptable_scalar());
        assert!(FieldValue::from(false).is_acceptable_scalar());
        assert!(!FieldValue::from("   ").is_acceptable_scalar());
        assert!(!FieldValue::Null.is_acceptable_scalar());
        assert!(!FieldValue::Float(f64::NAN).is_acceptable_scalar());
        assert!(!FieldValue::Nested(json!({"a": 1})).is_acceptable_scalar());
    }
}
