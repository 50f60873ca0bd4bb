//! # Core Type Definitions
//!
//! This module contains the data model shared by every component of the core:
//! - Registry entities (`Asset`, `AssetRelation`, `RelationType`)
//! - Declarative schemas (`AssetTemplate`, `AssetResource`, `ValueType`)
//! - Reading envelopes (`AssetData`, `TagValue`, `TagReading`)
//! - Error types (`EdgError`)
//!
//! Field names on the wire are snake_case, except the template resource
//! `valueType` key which keeps the casing of the definition files.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// ASSET
// =============================================================================

/// A registered physical or logical data source (sensor, PLC, line, ...).
///
/// `id` is immutable once stored. `template_name` may be changed with
/// `MetadataStore::update_asset_template`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Asset {
    /// Create an asset with no template and no labels.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            template_name: None,
            labels: Vec::new(),
            created_at,
        }
    }

    /// The minimal asset synthesized for an unknown reading source:
    /// `id` and `name` are both the source id.
    #[must_use]
    pub fn auto_registered(asset_id: &str) -> Self {
        Self::new(asset_id, asset_id, Utc::now())
    }

    #[must_use]
    pub fn with_template(mut self, template_name: impl Into<String>) -> Self {
        self.template_name = Some(template_name.into());
        self
    }

    #[must_use]
    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }
}

// =============================================================================
// RELATIONS
// =============================================================================

/// Type of a directed edge between two assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RelationType {
    /// Hierarchical membership (a sensor is part of a machine).
    #[serde(rename = "partOf")]
    PartOf,
    /// Peer or network link.
    #[serde(rename = "connectedTo")]
    ConnectedTo,
    /// Spatial containment.
    #[serde(rename = "locatedIn")]
    LocatedIn,
}

impl RelationType {
    /// Every recognized relation type, in declaration order.
    pub const ALL: [Self; 3] = [Self::PartOf, Self::ConnectedTo, Self::LocatedIn];

    /// The wire and storage spelling of this type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PartOf => "partOf",
            Self::ConnectedTo => "connectedTo",
            Self::LocatedIn => "locatedIn",
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationType {
    type Err = EdgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| EdgError::InvalidRelationType(s.to_string()))
    }
}

/// A directed, typed edge between two registered assets.
///
/// The triple `(source_asset_id, target_asset_id, relation_type)` is unique
/// in a store, and both endpoints must exist when the relation is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRelation {
    pub id: String,
    pub source_asset_id: String,
    pub target_asset_id: String,
    pub relation_type: RelationType,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
}

impl AssetRelation {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        source_asset_id: impl Into<String>,
        target_asset_id: impl Into<String>,
        relation_type: RelationType,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            source_asset_id: source_asset_id.into(),
            target_asset_id: target_asset_id.into(),
            relation_type,
            created_at,
            metadata: None,
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Whether `asset_id` is either endpoint of this relation.
    #[must_use]
    pub fn touches(&self, asset_id: &str) -> bool {
        self.source_asset_id == asset_id || self.target_asset_id == asset_id
    }
}

// =============================================================================
// TEMPLATES
// =============================================================================

/// Declared type of a template resource.
///
/// Type names other than `NUMBER`, `TEXT` and `FLAG` are kept as written
/// and are not checked during validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ValueType {
    Number,
    Text,
    Flag,
    Other(String),
}

impl ValueType {
    /// Whether readings can be checked against this type.
    #[must_use]
    pub const fn is_checked(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl From<String> for ValueType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "NUMBER" => Self::Number,
            "TEXT" => Self::Text,
            "FLAG" => Self::Flag,
            _ => Self::Other(name),
        }
    }
}

impl From<ValueType> for String {
    fn from(value_type: ValueType) -> Self {
        match value_type {
            ValueType::Other(name) => name,
            checked => checked.to_string(),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::Number => "NUMBER",
            Self::Text => "TEXT",
            Self::Flag => "FLAG",
            Self::Other(name) => name,
        })
    }
}

/// One data point a class of assets is expected to report.
/// `name` matches `TagValue::name` in readings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetResource {
    pub name: String,
    #[serde(rename = "valueType")]
    pub value_type: ValueType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// A named schema for a class of assets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetTemplate {
    pub name: String,
    #[serde(default)]
    pub resources: Vec<AssetResource>,
}

impl AssetTemplate {
    /// Find the resource declared under `name`, if any.
    #[must_use]
    pub fn resource(&self, name: &str) -> Option<&AssetResource> {
        self.resources.iter().find(|r| r.name == name)
    }
}

// =============================================================================
// READINGS
// =============================================================================

/// The populated value of a tag. Exactly one kind per tag.
#[derive(Debug, Clone, PartialEq)]
pub enum TagReading {
    Number(f64),
    Text(String),
    Flag(bool),
}

impl TagReading {
    /// The template type this value satisfies.
    #[must_use]
    pub const fn value_type(&self) -> ValueType {
        match self {
            Self::Number(_) => ValueType::Number,
            Self::Text(_) => ValueType::Text,
            Self::Flag(_) => ValueType::Flag,
        }
    }
}

/// A single named measurement or state value within a reading.
///
/// On the wire the value is carried in one of three optional keys
/// (`number`, `text`, `flag`); decoding fails unless exactly one is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireTagValue", into = "WireTagValue")]
pub struct TagValue {
    pub name: String,
    pub value: TagReading,
    pub unit: Option<String>,
    pub quality: Option<String>,
}

impl TagValue {
    #[must_use]
    pub fn new(name: impl Into<String>, value: TagReading) -> Self {
        Self {
            name: name.into(),
            value,
            unit: None,
            quality: None,
        }
    }

    #[must_use]
    pub fn number(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, TagReading::Number(value))
    }

    #[must_use]
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, TagReading::Text(value.into()))
    }

    #[must_use]
    pub fn flag(name: impl Into<String>, value: bool) -> Self {
        Self::new(name, TagReading::Flag(value))
    }

    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }
}

/// Wire shape of a tag value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct WireTagValue {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    number: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    flag: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    quality: Option<String>,
}

impl TryFrom<WireTagValue> for TagValue {
    type Error = String;

    fn try_from(wire: WireTagValue) -> Result<Self, Self::Error> {
        let value = match (wire.number, wire.text, wire.flag) {
            (Some(n), None, None) => TagReading::Number(n),
            (None, Some(t), None) => TagReading::Text(t),
            (None, None, Some(f)) => TagReading::Flag(f),
            (None, None, None) => {
                return Err(format!("tag '{}' has no value", wire.name));
            }
            _ => {
                return Err(format!("tag '{}' has more than one value", wire.name));
            }
        };
        Ok(Self {
            name: wire.name,
            value,
            unit: wire.unit,
            quality: wire.quality,
        })
    }
}

impl From<TagValue> for WireTagValue {
    fn from(tag: TagValue) -> Self {
        let mut wire = Self {
            name: tag.name,
            unit: tag.unit,
            quality: tag.quality,
            ..Self::default()
        };
        match tag.value {
            TagReading::Number(n) => wire.number = Some(n),
            TagReading::Text(t) => wire.text = Some(t),
            TagReading::Flag(f) => wire.flag = Some(f),
        }
        wire
    }
}

/// One envelope of tag values from an asset at a point in time.
/// Transient: validated, used for auto-registration, forwarded, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetData {
    pub asset_id: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub values: Vec<TagValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
}

impl AssetData {
    #[must_use]
    pub fn new(asset_id: impl Into<String>, values: Vec<TagValue>) -> Self {
        Self {
            asset_id: asset_id.into(),
            timestamp: 0,
            values,
            metadata: None,
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the EDG core.
///
/// - Not-found on lookups is `Ok(None)`, never an error
/// - Not-found on deletes and updates is an error
/// - Every per-request error is recoverable at the request boundary
#[derive(Debug, Error)]
pub enum EdgError {
    /// An inbound envelope could not be decoded.
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),

    /// A template definition file could not be loaded.
    #[error("failed to load template ({path}): {reason}")]
    TemplateLoad { path: String, reason: String },

    /// A required request field was absent or empty.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// The asset name is already registered.
    #[error("asset name already exists: {0}")]
    DuplicateAssetName(String),

    /// The asset id is already registered.
    #[error("asset id already exists: {0}")]
    DuplicateAssetId(String),

    /// The named template is not loaded.
    #[error("template not found: {0}")]
    UnknownTemplate(String),

    /// The relation type is not one of the recognized types.
    #[error("invalid relation_type: {0}")]
    InvalidRelationType(String),

    /// A relation listing named an unknown direction.
    #[error("invalid direction (use: outgoing, incoming, both): {0}")]
    InvalidDirection(String),

    /// The relation source asset does not exist.
    #[error("source asset not found: {0}")]
    SourceAssetNotFound(String),

    /// The relation target asset does not exist.
    #[error("target asset not found: {0}")]
    TargetAssetNotFound(String),

    /// A relation with the same endpoints and type already exists.
    #[error("relation already exists: {source_asset_id} -[{relation_type}]-> {target_asset_id}")]
    DuplicateRelation {
        source_asset_id: String,
        target_asset_id: String,
        relation_type: RelationType,
    },

    /// The asset to delete or update does not exist.
    #[error("asset not found: {0}")]
    AssetNotFound(String),

    /// The relation to delete does not exist.
    #[error("relation not found: {0}")]
    RelationNotFound(String),

    /// A reading value does not match its template resource type.
    #[error("tag '{tag}' must be {expected} type")]
    TypeMismatch { tag: String, expected: ValueType },

    /// A persisted record could not be decoded.
    #[error("corrupt record: {0}")]
    CorruptRecord(String),

    /// A value could not be serialized.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// The persistence layer reported a failure.
    #[error("storage error: {0}")]
    StorageError(String),

    /// Republishing to a downstream channel failed.
    #[error("forwarding to {subject} failed: {reason}")]
    ForwardFailed { subject: String, reason: String },

    /// Gateway configuration could not be read or is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================
