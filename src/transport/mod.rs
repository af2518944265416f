//! lvat Transport
//!
//! Turns a raw ingest body into a batch of [`LogMessage`]s:
//!
//! - **logplex**: octet-counted syslog frames
//! - **logfmt**: `key=value` pairs of one line

pub mod logfmt;
pub mod logplex;

use thiserror::Error;

use crate::index::LogMessage;

/// Errors while decoding an ingest body
#[derive(Error, Debug)]
pub enum TransportError {
    /// Length prefix missing, malformed, or longer than the body
    #[error("Invalid frame at byte {offset}")]
    Framing { offset: usize },

    /// Frame without a complete syslog header
    #[error("Invalid syslog header: {0}")]
    Header(String),

    /// Line is not valid UTF-8
    #[error("Line is not valid UTF-8")]
    Utf8,

    /// Line is not valid logfmt
    #[error("Invalid logfmt at byte {offset}: {line}")]
    Logfmt { line: String, offset: usize },
}

pub type TransportResult<T> = Result<T, TransportError>;

impl LogMessage {
    /// Parse one raw line; the stored bytes are the trimmed line
    pub fn parse(raw: &[u8]) -> TransportResult<Self> {
        let data = trim(raw);
        let line = std::str::from_utf8(data).map_err(|_| TransportError::Utf8)?;
        let pairs = logfmt::parse(line)?;
        Ok(LogMessage::new(data, pairs))
    }
}

fn trim(raw: &[u8]) -> &[u8] {
    let start = raw
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(raw.len());
    let end = raw
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &raw[start..end]
}

/// Decode a logplex body, dropping lines that fail to parse
pub fn parse_batch(body: &[u8]) -> Vec<LogMessage> {
    let mut batch = Vec::new();

    for frame in logplex::frames(body) {
        match frame.and_then(LogMessage::parse) {
            Ok(message) => batch.push(message),
            Err(e) => tracing::warn!("Dropping unparsable line: {}", e),
        }
    }

    batch
}
