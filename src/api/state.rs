//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use std::sync::Arc;
use std::time::Instant;

use crate::ingest::IngestHandle;
use crate::query::Retriever;
use crate::storage::OptimisticStore;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Producer side of the ingest worker pool
    pub ingest: IngestHandle,
    /// Read path over the configured indices
    pub retriever: Retriever,
    /// Backing store, for readiness checks
    pub store: Arc<dyn OptimisticStore>,
    /// API configuration
    pub config: Arc<ApiConfig>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        ingest: IngestHandle,
        retriever: Retriever,
        store: Arc<dyn OptimisticStore>,
        config: ApiConfig,
    ) -> Self {
        Self {
            ingest,
            retriever,
            store,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Basic-auth password for `/messages`
    pub api_key: String,
    /// Maximum request body size in bytes
    pub max_body_size: usize,
}

impl ApiConfig {
    /// Create config with custom host, port and key
    pub fn new(host: impl Into<String>, port: u16, api_key: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            api_key: api_key.into(),
            max_body_size: 10 * 1024 * 1024, // 10MB
        }
    }

    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
