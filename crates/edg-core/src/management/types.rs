//! # Management Request/Response Types
//!
//! JSON bodies of the `platform.meta.*` request/reply operations.
//! Missing string fields decode as empty and are rejected by the handlers,
//! so a request with a missing field gets a field-level error instead of
//! `invalid request format`.

use crate::EdgError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

// =============================================================================
// RESPONSE
// =============================================================================

/// Reply envelope shared by every operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> Response<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

// =============================================================================
// ASSET REQUESTS
// =============================================================================

/// `asset.create`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAssetRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
}

/// `asset.get`: by id, or by name when no id is given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetAssetRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// `asset.delete`, `relation.get`, `relation.delete`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRequest {
    #[serde(default)]
    pub id: String,
}

// =============================================================================
// RELATION REQUESTS
// =============================================================================

/// `relation.create`
///
/// `relation_type` stays a string here so that a missing type and an
/// unrecognized one produce different errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRelationRequest {
    #[serde(default)]
    pub source_asset_id: String,
    #[serde(default)]
    pub target_asset_id: String,
    #[serde(default)]
    pub relation_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
}

/// `relation.list`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRelationsRequest {
    #[serde(default)]
    pub asset_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
}

/// Which edges of an asset a relation listing returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Relations whose source is the asset.
    Outgoing,
    /// Relations whose target is the asset.
    Incoming,
    /// Outgoing followed by incoming. Not deduplicated.
    #[default]
    Both,
}

impl FromStr for Direction {
    type Err = EdgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "outgoing" => Ok(Self::Outgoing),
            "incoming" => Ok(Self::Incoming),
            "both" | "" => Ok(Self::Both),
            other => Err(EdgError::InvalidDirection(other.to_string())),
        }
    }
}
