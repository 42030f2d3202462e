//! Validator gate run before the information tree

use crate::fields::{DEVICE, FINGERPRINT, URL};
use crate::types::OrderedRecord;

/// Decides whether a decoded record is worth annotating
pub trait RecordCheck {
    fn check(&self, record: &OrderedRecord) -> bool;
}

/// Passes when every listed field id is present
#[derive(Debug, Clone)]
pub struct RequiredFields {
    ids: Vec<String>,
}

impl RequiredFields {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }
}

impl Default for RequiredFields {
    /// The descriptors most of the information tree is read from
    fn default() -> Self {
        Self::new([URL, DEVICE, FINGERPRINT])
    }
}

impl RecordCheck for RequiredFields {
    fn check(&self, record: &OrderedRecord) -> bool {
        let missing: Vec<&str> = self
            .ids
            .iter()
            .filter(|id| !record.contains(id))
            .map(String::as_str)
            .collect();

        if !missing.is_empty() {
            log::warn!("record check failed, missing fields: {}", missing.join(", "));
        }
        missing.is_empty()
    }
}
