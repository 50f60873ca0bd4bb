//! # Record Format
//!
//! Binary row encoding for the metadata store tables.
//!
//! Format: 1 byte record version + postcard-serialized row.
//!
//! Rows mirror the relational layout of the registry: scalar columns are
//! stored as-is, while the variable-shaped columns (asset labels, relation
//! metadata) are JSON text inside the row. Any failure to decode either
//! layer is reported as `EdgError::CorruptRecord`; nothing is defaulted.

use crate::primitives::RECORD_VERSION;
use crate::{Asset, AssetRelation, EdgError, RelationType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// ROW LAYOUTS
// =============================================================================

/// `assets(id, name, template_name, labels, created_at)`
#[derive(Debug, Serialize, Deserialize)]
struct AssetRow {
    id: String,
    name: String,
    template_name: Option<String>,
    labels: String,
    created_at: DateTime<Utc>,
}

/// `asset_relations(id, source_asset_id, target_asset_id, relation_type, created_at, metadata)`
#[derive(Debug, Serialize, Deserialize)]
struct RelationRow {
    id: String,
    source_asset_id: String,
    target_asset_id: String,
    relation_type: String,
    created_at: DateTime<Utc>,
    metadata: Option<String>,
}

// =============================================================================
// FRAMING
// =============================================================================

fn frame<T: Serialize>(row: &T) -> Result<Vec<u8>, EdgError> {
    let payload =
        postcard::to_stdvec(row).map_err(|e| EdgError::SerializationError(e.to_string()))?;
    let mut bytes = Vec::with_capacity(payload.len() + 1);
    bytes.push(RECORD_VERSION);
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

fn unframe<'a, T: Deserialize<'a>>(bytes: &'a [u8], kind: &str) -> Result<T, EdgError> {
    let Some((&version, payload)) = bytes.split_first() else {
        return Err(EdgError::CorruptRecord(format!("empty {kind} record")));
    };
    if version != RECORD_VERSION {
        return Err(EdgError::CorruptRecord(format!(
            "unsupported {kind} record version: {version} (expected {RECORD_VERSION})"
        )));
    }
    postcard::from_bytes(payload)
        .map_err(|e| EdgError::CorruptRecord(format!("failed to decode {kind} record: {e}")))
}

// =============================================================================
// ASSETS
// =============================================================================

/// Encode an asset into its stored row bytes.
pub fn encode_asset(asset: &Asset) -> Result<Vec<u8>, EdgError> {
    let labels = serde_json::to_string(&asset.labels)
        .map_err(|e| EdgError::SerializationError(format!("failed to marshal asset labels: {e}")))?;
    frame(&AssetRow {
        id: asset.id.clone(),
        name: asset.name.clone(),
        template_name: asset.template_name.clone(),
        labels,
        created_at: asset.created_at,
    })
}

/// Decode a stored asset row.
pub fn decode_asset(bytes: &[u8]) -> Result<Asset, EdgError> {
    let row: AssetRow = unframe(bytes, "asset")?;
    let labels: Vec<String> = serde_json::from_str(&row.labels).map_err(|e| {
        EdgError::CorruptRecord(format!("failed to unmarshal labels of asset {}: {e}", row.id))
    })?;
    Ok(Asset {
        id: row.id,
        name: row.name,
        template_name: row.template_name,
        labels,
        created_at: row.created_at,
    })
}

// =============================================================================
// RELATIONS
// =============================================================================

/// Encode a relation into its stored row bytes.
pub fn encode_relation(relation: &AssetRelation) -> Result<Vec<u8>, EdgError> {
    let metadata = relation
        .metadata
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| EdgError::SerializationError(format!("failed to marshal metadata: {e}")))?;
    frame(&RelationRow {
        id: relation.id.clone(),
        source_asset_id: relation.source_asset_id.clone(),
        target_asset_id: relation.target_asset_id.clone(),
        relation_type: relation.relation_type.as_str().to_string(),
        created_at: relation.created_at,
        metadata,
    })
}

/// Decode a stored relation row.
pub fn decode_relation(bytes: &[u8]) -> Result<AssetRelation, EdgError> {
    let row: RelationRow = unframe(bytes, "relation")?;
    let relation_type: RelationType = row.relation_type.parse().map_err(|_| {
        EdgError::CorruptRecord(format!(
            "relation {} has unknown type '{}'",
            row.id, row.relation_type
        ))
    })?;
    let metadata = row
        .metadata
        .as_deref()
        .map(serde_json::from_str::<BTreeMap<String, String>>)
        .transpose()
        .map_err(|e| {
            EdgError::CorruptRecord(format!(
                "failed to unmarshal metadata of relation {}: {e}",
                row.id
            ))
        })?;
    Ok(AssetRelation {
        id: row.id,
        source_asset_id: row.source_asset_id,
        target_asset_id: row.target_asset_id,
        relation_type,
        created_at: row.created_at,
        metadata,
    })
}

// =============================================================================
// TESTS
// =============================================================================
