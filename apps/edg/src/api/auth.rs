//! # Bridge Authentication
//!
//! Optional shared-key check in front of every bridge route except
//! `/health`. The key comes from `EDG_API_KEY` at startup and is carried in
//! [`AppState`]; clients send it as `Authorization: Bearer <key>` (a bare
//! key is accepted too).

use super::{AppState, types::ErrorResponse};
use axum::{
    Json,
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;

/// Paths reachable without a key.
const OPEN_PATHS: [&str; 1] = ["/health"];

/// The configured key, if `EDG_API_KEY` is set and non-empty.
pub fn get_api_key_from_env() -> Option<String> {
    std::env::var("EDG_API_KEY").ok().filter(|k| !k.is_empty())
}

/// Token from the `Authorization` header, with any `Bearer ` prefix removed.
fn presented_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    Some(value.strip_prefix("Bearer ").unwrap_or(value))
}

/// Compare without an early exit on the first differing byte. The shorter
/// side is zero-extended so the comparison length does not depend on where
/// the inputs differ.
fn keys_match(presented: &[u8], expected: &[u8]) -> bool {
    let width = presented.len().max(expected.len());
    let extend = |key: &[u8]| {
        let mut buf = key.to_vec();
        buf.resize(width, 0);
        buf
    };
    let same_bytes: bool = extend(presented).ct_eq(&extend(expected)).into();
    same_bytes && presented.len() == expected.len()
}

fn unauthorized(reason: &'static str) -> Response {
    tracing::warn!(event = "auth_failure", reason, "rejected bridge request");
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse::new("unauthorized")),
    )
        .into_response()
}

/// Reject requests that do not carry the configured key.
pub async fn api_key_auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(expected) = state.api_key.as_deref() else {
        return next.run(request).await;
    };
    if OPEN_PATHS.contains(&request.uri().path()) {
        return next.run(request).await;
    }

    match presented_token(request.headers()) {
        None => unauthorized("missing_authorization_header"),
        Some(token) if !keys_match(token.as_bytes(), expected.as_bytes()) => {
            unauthorized("invalid_api_key")
        }
        Some(_) => next.run(request).await,
    }
}
