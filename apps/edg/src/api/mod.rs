//! # EDG HTTP Bridge Module
//!
//! This module exposes the subject bus and the core handlers over HTTP
//! using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /status` - Registry counts and pipeline throughput
//! - `POST /publish/{subject}` - Publish a message (readings on `platform.data.asset`)
//! - `POST /request/{subject}` - Management request/reply (`platform.meta.*`)
//! - `GET /subscribe/{subject}` - Server-sent events of a bus subject
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `EDG_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)
//! - `EDG_API_KEY`: If set, requires Bearer token authentication

mod auth;
mod handlers;
mod types;

pub use auth::get_api_key_from_env;
pub use handlers::{
    health_handler, publish_handler, request_handler, status_handler, subscribe_handler,
};
pub use types::{
    ErrorResponse, HealthResponse, IngestSummary, PublishResponse, StatusResponse,
};

use crate::bus::SubjectBus;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use edg_core::{EdgError, IngestionPipeline, ManagementApi, MetadataStore, SchemaRegistry};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 1024 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state: the core components and the bus they publish on.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<MetadataStore>,
    pub registry: Arc<SchemaRegistry>,
    pub pipeline: Arc<IngestionPipeline>,
    pub management: ManagementApi,
    pub bus: Arc<SubjectBus>,
    /// Required bearer key; `None` disables authentication.
    pub api_key: Option<Arc<str>>,
}

impl AppState {
    /// Wire the pipeline and management handlers to one store and registry.
    ///
    /// With `forward` set, accepted readings are republished on the bus.
    #[must_use]
    pub fn new(
        store: Arc<MetadataStore>,
        registry: Arc<SchemaRegistry>,
        bus: Arc<SubjectBus>,
        forward: bool,
    ) -> Self {
        let mut pipeline = IngestionPipeline::new()
            .with_store(Arc::clone(&store))
            .with_registry(Arc::clone(&registry));
        if forward {
            pipeline = pipeline.with_forwarder(bus.clone());
        }

        Self {
            management: ManagementApi::new(Arc::clone(&store), Arc::clone(&registry)),
            pipeline: Arc::new(pipeline),
            store,
            registry,
            bus,
            api_key: None,
        }
    }

    #[must_use]
    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key.map(Arc::from);
        self
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Origins allowed when `EDG_CORS_ORIGINS` is unset or unusable.
const LOCAL_ORIGINS: [&str; 4] = [
    "http://localhost:3000",
    "http://localhost:4280",
    "http://127.0.0.1:3000",
    "http://127.0.0.1:4280",
];

/// Parse a comma-separated origin list, skipping entries that are not
/// valid header values.
fn parse_origins(list: &str) -> Vec<HeaderValue> {
    list.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(origin, error = %e, "ignoring invalid CORS origin");
                None
            }
        })
        .collect()
}

fn cors_for(origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// `EDG_CORS_ORIGINS`: `*` for any origin, a comma-separated list, or
/// unset for localhost only.
fn build_cors_layer() -> CorsLayer {
    let configured = std::env::var("EDG_CORS_ORIGINS").ok();
    if configured.as_deref() == Some("*") {
        tracing::warn!("CORS allows every origin (EDG_CORS_ORIGINS=*)");
        return CorsLayer::permissive();
    }

    let origins = configured.as_deref().map(parse_origins).unwrap_or_default();
    if origins.is_empty() {
        tracing::debug!("CORS restricted to localhost");
        return cors_for(LOCAL_ORIGINS.into_iter().map(HeaderValue::from_static).collect());
    }
    tracing::info!(count = origins.len(), "CORS origins configured");
    cors_for(origins)
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Build the bridge router.
///
/// Layers, outermost first: request tracing, CORS, body limit, and the key
/// check when `state.api_key` is set.
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer();
    let has_auth = state.api_key.is_some();
    if has_auth {
        tracing::info!("bridge requires an API key");
    } else {
        tracing::warn!("bridge is unauthenticated; set EDG_API_KEY to require a key");
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        .route("/publish/{subject}", post(handlers::publish_handler))
        .route("/request/{subject}", post(handlers::request_handler))
        .route("/subscribe/{subject}", get(handlers::subscribe_handler));

    if has_auth {
        router = router.layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth::api_key_auth_middleware,
        ));
    }

    router
        .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Serve the bridge on `addr` until Ctrl+C.
pub async fn run_server(addr: &str, state: AppState) -> Result<(), EdgError> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| EdgError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!("EDG gateway listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| EdgError::IoError(format!("Server error: {}", e)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
