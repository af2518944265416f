//! Message Routes
//!
//! - POST /messages - Ingest a logplex body
//! - GET /messages?query=V - Full history for a value
//! - GET /messages/recent?query=V - Recent lines for a value, newest first
//!
//! All of them sit behind the basic-auth gate.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::dto::IngestResponse;
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::storage::compression::decompress;
use crate::transport::parse_batch;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// `?query=` parameter
#[derive(Debug, Deserialize)]
pub struct LookupParams {
    pub query: Option<String>,
}

impl LookupParams {
    fn value(&self) -> ApiResult<&str> {
        match self.query.as_deref() {
            Some(q) if !q.is_empty() => Ok(q),
            _ => Err(ApiError::Validation("Need `query` parameter.".to_string())),
        }
    }
}

fn accepts_gzip(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::ACCEPT_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.contains("gzip"))
}

/// POST /messages
///
/// Parses the whole body into one batch and queues it. Waits while the
/// ingest queue is full.
pub async fn receive_messages(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<IngestResponse>)> {
    let batch = parse_batch(&body);
    let lines = batch.len();

    if !batch.is_empty() {
        state
            .ingest
            .submit(batch)
            .await
            .map_err(|e| ApiError::ServiceUnavailable(e.to_string()))?;
    }

    tracing::debug!(lines, queued = state.ingest.queued(), "Queued messages");

    Ok((
        StatusCode::ACCEPTED,
        Json(IngestResponse {
            status: "accepted".to_string(),
            lines,
        }),
    ))
}

/// GET /messages?query=V
///
/// Serves the stored gzip blob as-is when the client accepts gzip, the
/// decompressed text otherwise.
pub async fn lookup_messages(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LookupParams>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let value = params.value()?;

    let hit = state
        .retriever
        .find(value)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No messages for '{}'", value)))?;

    let vary = (header::VARY, HeaderValue::from_static("accept-encoding"));
    let content_type = (header::CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN));

    if accepts_gzip(&headers) {
        let encoding = (header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        return Ok(([content_type, encoding, vary], hit.blob).into_response());
    }

    let text = decompress(&hit.key, &hit.blob)?;
    Ok(([content_type, vary], text).into_response())
}

/// GET /messages/recent?query=V
pub async fn recent_messages(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LookupParams>,
) -> ApiResult<Response> {
    let value = params.value()?;

    let lines = state
        .retriever
        .recent(value)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No recent messages for '{}'", value)))?;

    let mut body = Vec::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
    for line in lines {
        body.extend_from_slice(&line);
        body.push(b'\n');
    }

    Ok(([(header::CONTENT_TYPE, TEXT_PLAIN)], body).into_response())
}
