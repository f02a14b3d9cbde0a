//! Terraform State Management
//!
//! `DynamicValue` is the decoded form of a Terraform object; `ResourceData`
//! is the accessor resources use to read configuration and write state.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema::Schema;

/// Dynamic value that can be encoded/decoded from Terraform state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DynamicValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    List(Vec<DynamicValue>),
    Map(HashMap<String, DynamicValue>),
}

impl DynamicValue {
    pub fn as_string(&self) -> Option<&str> {
        match self {
            DynamicValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DynamicValue::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DynamicValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[DynamicValue]> {
        match self {
            DynamicValue::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<String, DynamicValue>> {
        match self {
            DynamicValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&DynamicValue> {
        self.as_map()?.get(key)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, DynamicValue::Null)
    }
}

impl Default for DynamicValue {
    fn default() -> Self {
        DynamicValue::Null
    }
}

impl From<&str> for DynamicValue {
    fn from(s: &str) -> Self {
        DynamicValue::String(s.to_string())
    }
}

impl From<String> for DynamicValue {
    fn from(s: String) -> Self {
        DynamicValue::String(s)
    }
}

impl From<bool> for DynamicValue {
    fn from(b: bool) -> Self {
        DynamicValue::Bool(b)
    }
}

impl From<i64> for DynamicValue {
    fn from(n: i64) -> Self {
        DynamicValue::Number(serde_json::Number::from(n))
    }
}

impl From<Vec<String>> for DynamicValue {
    fn from(items: Vec<String>) -> Self {
        DynamicValue::List(items.into_iter().map(DynamicValue::String).collect())
    }
}

impl<T: Into<DynamicValue>> From<Option<T>> for DynamicValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(DynamicValue::Null)
    }
}

/// Decode a Terraform object from its JSON encoding
pub fn decode_dynamic_value(data: &[u8]) -> serde_json::Result<DynamicValue> {
    if data.is_empty() {
        return Ok(DynamicValue::Null);
    }
    serde_json::from_slice(data)
}

/// Encode a value to its JSON encoding
pub fn encode_dynamic_value(value: &DynamicValue) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(value)
}

/// Create a DynamicValue map with the given attributes
pub fn make_state(attrs: Vec<(&str, DynamicValue)>) -> DynamicValue {
    let mut map = HashMap::new();
    for (key, value) in attrs {
        map.insert(key.to_string(), value);
    }
    DynamicValue::Map(map)
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error("invalid attribute name '{0}'")]
    UnknownAttribute(String),

    #[error("attribute '{key}' must be a {expected}")]
    TypeMismatch { key: String, expected: &'static str },
}

/// Configuration and state of a single resource instance
#[derive(Debug, Clone, Default)]
pub struct ResourceData {
    id: String,
    attributes: HashMap<String, DynamicValue>,
    known: Option<HashSet<String>>,
}

impl ResourceData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a decoded Terraform object; `id` is lifted out of the map
    pub fn from_value(value: &DynamicValue) -> Self {
        let mut attributes = value.as_map().cloned().unwrap_or_default();
        let id = match attributes.remove("id") {
            Some(DynamicValue::String(id)) => id,
            _ => String::new(),
        };
        Self {
            id,
            attributes,
            known: None,
        }
    }

    /// Reject writes to attributes the schema does not declare
    pub fn with_schema(mut self, schema: &Schema) -> Self {
        self.known = Some(schema.attributes.keys().cloned().collect());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// An empty id marks the resource as gone
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    pub fn get(&self, key: &str) -> Option<&DynamicValue> {
        self.attributes.get(key)
    }

    pub fn get_string(&self, key: &str) -> String {
        self.get(key)
            .and_then(|v| v.as_string())
            .unwrap_or("")
            .to_string()
    }

    /// `None` for missing, null and empty strings
    pub fn get_optional_string(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|v| match v {
            DynamicValue::String(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        })
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
    }

    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        self.get(key).and_then(|v| v.as_i64()).unwrap_or(default)
    }

    pub fn get_string_list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .and_then(|v| v.as_list())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_string().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn set(&mut self, key: &str, value: impl Into<DynamicValue>) -> Result<(), StateError> {
        let value = value.into();

        if key == "id" {
            return match value {
                DynamicValue::String(id) => {
                    self.id = id;
                    Ok(())
                }
                DynamicValue::Null => {
                    self.id.clear();
                    Ok(())
                }
                _ => Err(StateError::TypeMismatch {
                    key: key.to_string(),
                    expected: "string",
                }),
            };
        }

        if let Some(known) = &self.known {
            if !known.contains(key) {
                return Err(StateError::UnknownAttribute(key.to_string()));
            }
        }

        self.attributes.insert(key.to_string(), value);
        Ok(())
    }

    /// Encode back into a Terraform object, or null once the id is cleared
    pub fn to_value(&self) -> DynamicValue {
        if self.id.is_empty() {
            return DynamicValue::Null;
        }
        let mut map = self.attributes.clone();
        map.insert("id".to_string(), DynamicValue::String(self.id.clone()));
        DynamicValue::Map(map)
    }
}
