use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::binary::BinaryData;
use super::reference::{coerce_number, positive_integer, Reference};
use crate::error::{NodeError, Result};

/// One input item as handed over by the host: its resolved parameters plus
/// any binary properties.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputItem {
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub binary: BTreeMap<String, BinaryData>,
}

impl InputItem {
    pub fn with_params(params: Value) -> Self {
        Self {
            params: match params {
                Value::Object(map) => map,
                _ => Map::new(),
            },
            binary: BTreeMap::new(),
        }
    }
}

/// Typed read access to the parameters of a single item.
#[derive(Debug, Clone, Copy)]
pub struct ItemParams<'a> {
    index: usize,
    item: &'a InputItem,
}

impl<'a> ItemParams<'a> {
    pub fn new(index: usize, item: &'a InputItem) -> Self {
        Self { index, item }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn raw(&self, name: &str) -> Option<&'a Value> {
        self.item.params.get(name).filter(|v| !v.is_null())
    }

    /// String parameter; numbers are rendered, anything else reads as empty.
    pub fn string(&self, name: &str) -> String {
        match self.raw(name) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            _ => String::new(),
        }
    }

    pub fn non_empty_string(&self, name: &str) -> Option<String> {
        Some(self.string(name)).filter(|s| !s.is_empty())
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.raw(name).and_then(coerce_number)
    }

    pub fn boolean(&self, name: &str) -> bool {
        match self.raw(name) {
            Some(Value::Bool(b)) => *b,
            Some(other) => coerce_number(other).is_some_and(|n| n != 0.0),
            None => false,
        }
    }

    pub fn reference(&self, name: &str) -> Option<Reference> {
        self.raw(name)
            .map(Reference::from_value)
            .filter(|r| !r.is_empty())
    }

    pub fn collection(&self, name: &str) -> Map<String, Value> {
        match self.raw(name) {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        }
    }

    pub fn string_list(&self, name: &str) -> Vec<String> {
        match self.raw(name) {
            Some(Value::Array(values)) => values
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect(),
            Some(Value::String(s)) => s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn decode<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        self.raw(name)
            .map(|v| {
                serde_json::from_value(v.clone()).map_err(|e| {
                    NodeError::validation(format!("Parameter \"{name}\" is malformed: {e}"))
                })
            })
            .transpose()
    }

    /// Positive numeric id, unwrapping a reference if one was supplied.
    /// `entity` names the field in the error, e.g. "Card" or "Linked Card".
    pub fn positive_id(&self, name: &str, entity: &str) -> Result<u64> {
        self.raw(name)
            .map(|raw| Reference::from_value(raw).value)
            .as_ref()
            .and_then(positive_integer)
            .ok_or_else(|| NodeError::validation(format!("{entity} ID must be a positive number")))
    }

    /// Textual id that only has to be non-empty.
    pub fn required_text(&self, name: &str, entity: &str) -> Result<String> {
        let value = self
            .raw(name)
            .map(|raw| Reference::from_value(raw).value)
            .unwrap_or(Value::Null);
        let text = match value {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            _ => String::new(),
        };
        if text.trim().is_empty() {
            return Err(NodeError::validation(format!("{entity} must not be empty")));
        }
        Ok(text)
    }

    pub fn binary(&self, property: &str) -> Option<&'a BinaryData> {
        self.item.binary.get(property)
    }
}
