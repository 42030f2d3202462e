//! Decoded record types
//!
//! The decoder produces an [`OrderedRecord`]: the field ids in order of
//! appearance in the decrypted payload plus a map from id to value.

use base64::Engine;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashMap;
use std::fmt;

use crate::error::FieldError;

/// Record key of the session key chunk
pub const KEY: &str = "key";
/// Record key of the sensor value chunk
pub const SENSOR_VALUE: &str = "sensor_value";
/// Record key of the decrypted payload bytes
pub const RAW: &str = "raw";
/// Record key of the payload bytes as received
pub const ENCRYPTED: &str = "encrypted";

/// A single record value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Bytes(Vec<u8>),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Text(s) => serializer.serialize_str(s),
            FieldValue::Bytes(b) => {
                serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(b))
            }
        }
    }
}

/// Ordered field-id sequence plus id → value mapping.
///
/// An id may appear several times in `order`; the mapping keeps the value of
/// its last occurrence, so every position of that id shows the same value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderedRecord {
    order: Vec<String>,
    values: HashMap<String, FieldValue>,
}

impl OrderedRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `id` to the order and set its value, replacing any earlier value
    pub fn push(&mut self, id: impl Into<String>, value: FieldValue) {
        let id = id.into();
        self.order.push(id.clone());
        self.values.insert(id, value);
    }

    /// Field ids in order of appearance
    pub fn order(&self) -> &[String] {
        &self.order
    }

    /// Number of entries in the order sequence (duplicates included)
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.values.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&FieldValue> {
        self.values.get(id)
    }

    /// Text value of `id`
    pub fn text(&self, id: &str) -> Result<&str, FieldError> {
        match self.values.get(id) {
            Some(FieldValue::Text(s)) => Ok(s),
            Some(FieldValue::Bytes(_)) => Err(FieldError::NotText(id.to_string())),
            None => Err(FieldError::MissingField(id.to_string())),
        }
    }

    /// Byte value of `id`
    pub fn bytes(&self, id: &str) -> Result<&[u8], FieldError> {
        match self.values.get(id) {
            Some(FieldValue::Bytes(b)) => Ok(b),
            Some(FieldValue::Text(s)) => Ok(s.as_bytes()),
            None => Err(FieldError::MissingField(id.to_string())),
        }
    }
}

impl Serialize for OrderedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.order.len()))?;
        for id in &self.order {
            if let Some(value) = self.values.get(id) {
                map.serialize_entry(id, value)?;
            }
        }
        map.end()
    }
}
