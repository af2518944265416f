//! Parsed log line

use std::collections::HashMap;

/// One ingested line: the exact bytes to persist plus its parsed fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMessage {
    /// Raw trimmed line
    pub data: Vec<u8>,
    /// Field name → field value
    pub pairs: HashMap<String, String>,
}

impl LogMessage {
    pub fn new(data: impl Into<Vec<u8>>, pairs: HashMap<String, String>) -> Self {
        Self {
            data: data.into(),
            pairs,
        }
    }

    /// Value of `field`, if present and non-empty
    pub fn value(&self, field: &str) -> Option<&str> {
        self.pairs
            .get(field)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}
