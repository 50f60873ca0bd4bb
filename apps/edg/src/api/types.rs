//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP bridge. Management
//! replies are passed through as produced by the core and have no type here.

use edg_core::IngestReport;
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// STATUS RESPONSE
// =============================================================================

/// Gateway status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub total_assets: u64,
    pub total_relations: u64,
    pub templates: usize,
    pub readings_processed: usize,
    pub messages_published: u64,
}

// =============================================================================
// PUBLISH RESPONSE
// =============================================================================

/// Result of `POST /publish/{subject}`.
///
/// `ingest` is present only for readings on the ingestion subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishResponse {
    pub accepted: bool,
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receivers: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingest: Option<IngestSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PublishResponse {
    pub fn relayed(subject: &str, receivers: usize) -> Self {
        Self {
            accepted: true,
            subject: subject.to_string(),
            receivers: Some(receivers),
            ingest: None,
            error: None,
        }
    }

    pub fn ingested(subject: &str, report: IngestReport) -> Self {
        Self {
            accepted: true,
            subject: subject.to_string(),
            receivers: None,
            ingest: Some(report.into()),
            error: None,
        }
    }

    pub fn rejected(subject: &str, error: impl Into<String>) -> Self {
        Self {
            accepted: false,
            subject: subject.to_string(),
            receivers: None,
            ingest: None,
            error: Some(error.into()),
        }
    }
}

/// JSON form of the pipeline's per-reading report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestSummary {
    pub asset_id: String,
    pub registered: bool,
    pub forwarded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_error: Option<String>,
}

impl From<IngestReport> for IngestSummary {
    fn from(report: IngestReport) -> Self {
        Self {
            asset_id: report.asset_id,
            registered: report.registered,
            forwarded: report.forwarded,
            validation_error: report.validation_error,
        }
    }
}

// =============================================================================
// ERROR RESPONSE
// =============================================================================

/// Body of non-2xx replies that are not management replies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
