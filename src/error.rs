//! Error types for sensor-lens

use thiserror::Error;

/// Fatal errors raised while decoding a sensor payload.
///
/// Any of these aborts the decode; no partial record is ever returned.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("Malformed keys: expected at least 3 ';'-separated tokens, found {0}")]
    MalformedKeys(usize),

    #[error("Transform failed: {0}")]
    TransformFailure(#[from] TransformError),

    #[error("Malformed record: {0}")]
    MalformedRecord(String),
}

impl DecodeError {
    /// Short name of the decode stage that failed
    pub fn stage(&self) -> &'static str {
        match self {
            DecodeError::MalformedEnvelope(_) => "ENVELOPE",
            DecodeError::MalformedKeys(_) => "KEYS",
            DecodeError::TransformFailure(_) => "TRANSFORM",
            DecodeError::MalformedRecord(_) => "RECORD",
        }
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(e: serde_json::Error) -> Self {
        DecodeError::MalformedEnvelope(e.to_string())
    }
}

/// Failure reported by a byte transform
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{transform} (key {key}): {reason}")]
pub struct TransformError {
    pub transform: &'static str,
    pub key: u32,
    pub reason: String,
}

/// Errors local to a single rendered leaf.
///
/// These never abort a render: the tree shows a placeholder instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("Missing field: {0}")]
    MissingField(String),

    #[error("Missing sub-field {slot} of field {field}")]
    MissingSubField { field: String, slot: usize },

    #[error("Field {0} does not hold text")]
    NotText(String),
}
