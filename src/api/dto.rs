//! Data Transfer Objects
//!
//! Response bodies for the JSON endpoints.

use serde::Serialize;

use crate::ingest::IngestStatsSnapshot;

/// Response to `POST /messages`
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub status: String,
    /// Parsed lines handed to the worker pool
    pub lines: usize,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall status: healthy or degraded
    pub status: String,
    /// Store status
    pub store: String,
    /// Batches waiting in the ingest queue
    pub queued: usize,
    /// Ingest counters since start
    pub ingest: IngestStatsSnapshot,
    /// Server uptime in seconds
    pub uptime_seconds: u64,
    /// Application version
    pub version: String,
}
