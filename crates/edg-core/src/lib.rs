//! # edg-core
//!
//! The metadata core of the EDG industrial edge gateway.
//!
//! This crate holds everything that decides what happens to a message, and
//! nothing that moves messages around:
//! - `schema`: named asset templates loaded from YAML/JSON files
//! - `storage`: the redb-backed registry of assets and relations
//! - `ingestor`: the per-reading pipeline (auto-registration, validation,
//!   forwarding)
//! - `management`: request/reply handlers for `platform.meta.*`
//!
//! ## Architectural Constraints
//!
//! - No async and no network dependencies. Transports live in the gateway
//!   binary and reach the core through [`Forwarder`] and
//!   [`ManagementApi::handle`].
//! - No global state. Store and registry are owned values handed to the
//!   components that use them, so tests can run isolated instances.

// =============================================================================
// MODULES
// =============================================================================

pub mod formats;
pub mod ingestor;
pub mod management;
pub mod primitives;
pub mod schema;
pub mod storage;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Asset, AssetData, AssetRelation, AssetResource, AssetTemplate, EdgError, RelationType,
    TagReading, TagValue, ValueType,
};

// =============================================================================
// RE-EXPORTS: Components
// =============================================================================

pub use ingestor::{Forwarder, IngestReport, IngestionPipeline};
pub use management::{ManagementApi, Operation, Response};
pub use schema::SchemaRegistry;
pub use storage::{MetadataStore, StoreStats};
