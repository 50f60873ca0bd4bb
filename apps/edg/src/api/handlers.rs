//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers. Store and
//! pipeline calls are synchronous and run on the blocking pool.

use super::{
    AppState,
    types::{ErrorResponse, HealthResponse, PublishResponse, StatusResponse},
};
use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use edg_core::{EdgError, Operation, primitives::SUBJECT_ASSET_DATA};
use std::borrow::Cow;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::{
    Stream, StreamExt,
    wrappers::{BroadcastStream, errors::BroadcastStreamRecvError},
};

/// Subjects are dot-separated tokens of `[A-Za-z0-9_-]`.
fn is_valid_subject(subject: &str) -> bool {
    !subject.is_empty()
        && subject.split('.').all(|token| {
            !token.is_empty()
                && token
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
        })
}

fn invalid_subject(subject: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::new(format!("invalid subject: {subject:?}"))),
    )
        .into_response()
}

fn internal_error(e: &EdgError) -> Response {
    tracing::error!(error = %e, "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new(e.to_string())),
    )
        .into_response()
}

async fn run_blocking<T, F>(f: F) -> Result<T, EdgError>
where
    F: FnOnce() -> Result<T, EdgError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| EdgError::IoError(format!("blocking task failed: {e}")))?
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// STATUS HANDLER
// =============================================================================

/// Registry counts and pipeline throughput.
pub async fn status_handler(State(state): State<AppState>) -> Response {
    let store = Arc::clone(&state.store);
    match run_blocking(move || store.stats()).await {
        Ok(stats) => (
            StatusCode::OK,
            Json(StatusResponse {
                total_assets: stats.total_assets,
                total_relations: stats.total_relations,
                templates: state.registry.count(),
                readings_processed: state.pipeline.processed_count(),
                messages_published: state.bus.published_count(),
            }),
        )
            .into_response(),
        Err(e) => internal_error(&e),
    }
}

// =============================================================================
// PUBLISH HANDLER
// =============================================================================

/// Publish a message on a subject.
///
/// Readings on `platform.data.asset` go through the ingestion pipeline;
/// anything else is relayed onto the bus unchanged.
pub async fn publish_handler(
    State(state): State<AppState>,
    Path(subject): Path<String>,
    body: Bytes,
) -> Response {
    if !is_valid_subject(&subject) {
        return invalid_subject(&subject);
    }

    if subject != SUBJECT_ASSET_DATA {
        let receivers = state.bus.send(&subject, &body);
        return (
            StatusCode::ACCEPTED,
            Json(PublishResponse::relayed(&subject, receivers)),
        )
            .into_response();
    }

    let pipeline = Arc::clone(&state.pipeline);
    match run_blocking(move || pipeline.handle(&body)).await {
        Ok(report) => (
            StatusCode::ACCEPTED,
            Json(PublishResponse::ingested(&subject, report)),
        )
            .into_response(),
        Err(e @ EdgError::InvalidEnvelope(_)) => (
            StatusCode::BAD_REQUEST,
            Json(PublishResponse::rejected(&subject, e.to_string())),
        )
            .into_response(),
        Err(e) => internal_error(&e),
    }
}

// =============================================================================
// REQUEST HANDLER
// =============================================================================

/// Request/reply on a `platform.meta.*` subject.
///
/// The body is the management reply as produced by the core; domain
/// failures are `200` with `success: false`.
pub async fn request_handler(
    State(state): State<AppState>,
    Path(subject): Path<String>,
    body: Bytes,
) -> Response {
    let Some(op) = Operation::from_subject(&subject) else {
        return (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(format!(
                "no handler for subject: {subject:?}"
            ))),
        )
            .into_response();
    };

    let management = state.management.clone();
    match run_blocking(move || Ok(management.handle(op, &body))).await {
        Ok(reply) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            reply,
        )
            .into_response(),
        Err(e) => internal_error(&e),
    }
}

// =============================================================================
// SUBSCRIBE HANDLER
// =============================================================================

/// Stream every message published on a subject as server-sent events.
pub async fn subscribe_handler(
    State(state): State<AppState>,
    Path(subject): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, Response> {
    if !is_valid_subject(&subject) {
        return Err(invalid_subject(&subject));
    }

    let stream = BroadcastStream::new(state.bus.subscribe(&subject)).filter_map(|msg| match msg {
        Ok(msg) => Some(Ok(Event::default()
            .event(&*msg.subject)
            .data(event_data(&msg.payload)))),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "subscriber lagged, messages skipped");
            None
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// SSE text for a bus payload.
///
/// UTF-8 payloads without carriage returns pass through unchanged; newlines
/// become extra `data:` lines that clients join back. Carriage returns cannot
/// be carried in an SSE field and are dropped, and invalid UTF-8 is replaced.
/// Bus subscribers always see the original bytes.
fn event_data(payload: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(payload) {
        Ok(text) if !text.contains('\r') => Cow::Borrowed(text),
        _ => {
            tracing::debug!(bytes = payload.len(), "payload altered for SSE delivery");
            Cow::Owned(String::from_utf8_lossy(payload).replace('\r', ""))
        }
    }
}
