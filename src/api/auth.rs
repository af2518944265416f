//! Basic-auth gate for `/messages`
//!
//! Only the password half of the credentials is checked; the user name is
//! ignored.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::api::state::AppState;

/// Password from an `Authorization: Basic ...` header
pub fn basic_auth_password(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if scheme != "Basic" {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;
    let (_, password) = credentials.split_once(':')?;
    Some(password.to_string())
}

/// Middleware rejecting requests whose password is not the API key
pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    match basic_auth_password(request.headers()) {
        Some(password) if password == state.config.api_key => Ok(next.run(request).await),
        _ => Err(ApiError::Unauthorized),
    }
}
