//! # Ingestor Module
//!
//! The reading pipeline: one call per inbound envelope on
//! `platform.data.asset`.
//!
//! Per reading, in order:
//! 1. Decode the envelope; malformed input is logged and dropped.
//! 2. Auto-register the source asset if a store is configured and the id
//!    is unknown (`id = name = asset_id`).
//! 3. Validate against the asset's template, if it has one and a registry
//!    is configured. A mismatch is logged; it does not stop the reading.
//! 4. Append to the in-process buffer.
//! 5. Republish the original bytes on `platform.data.validated` if a
//!    forwarder is configured. Best effort: failures are logged, never retried.
//!
//! A failure in steps 2, 3 or 5 never prevents the remaining steps.

use crate::primitives::SUBJECT_VALIDATED_DATA;
use crate::schema::SchemaRegistry;
use crate::storage::MetadataStore;
use crate::{Asset, AssetData, EdgError, TagReading};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

// =============================================================================
// FORWARDER
// =============================================================================

/// Downstream publishing seam.
///
/// Implemented by whatever messaging substrate hosts the core. The payload
/// must be published unchanged.
pub trait Forwarder: Send + Sync {
    fn publish(&self, subject: &str, payload: &[u8]) -> Result<(), EdgError>;
}

// =============================================================================
// REPORT
// =============================================================================

/// What happened to one accepted reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub asset_id: String,
    /// A new asset was registered for this reading.
    pub registered: bool,
    /// The original bytes were handed to the forwarder successfully.
    pub forwarded: bool,
    /// Template validation failure, if any.
    pub validation_error: Option<String>,
}

// =============================================================================
// PIPELINE
// =============================================================================

/// Ingestion pipeline shared by every producer.
///
/// Safe to call concurrently; the buffer is the only in-process shared
/// state and is guarded by a single mutex.
#[derive(Default)]
pub struct IngestionPipeline {
    store: Option<Arc<MetadataStore>>,
    registry: Option<Arc<SchemaRegistry>>,
    forwarder: Option<Arc<dyn Forwarder>>,
    buffer: Mutex<Vec<AssetData>>,
}

impl std::fmt::Debug for IngestionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionPipeline")
            .field("store", &self.store.is_some())
            .field("registry", &self.registry.is_some())
            .field("forwarder", &self.forwarder.is_some())
            .field("processed", &self.processed_count())
            .finish()
    }
}

impl IngestionPipeline {
    /// A pipeline with no collaborators: decode and buffer only.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_store(mut self, store: Arc<MetadataStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn with_registry(mut self, registry: Arc<SchemaRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    #[must_use]
    pub fn with_forwarder(mut self, forwarder: Arc<dyn Forwarder>) -> Self {
        self.forwarder = Some(forwarder);
        self
    }

    /// Process one inbound envelope.
    ///
    /// Returns `Err(InvalidEnvelope)` only for undecodable input, which is
    /// dropped without touching the store, buffer or forwarder.
    pub fn handle(&self, raw: &[u8]) -> Result<IngestReport, EdgError> {
        let data: AssetData = match serde_json::from_slice(raw) {
            Ok(data) => data,
            Err(e) => {
                warn!(error = %e, "dropping malformed reading");
                return Err(EdgError::InvalidEnvelope(e.to_string()));
            }
        };

        let (registered, template_name) = self.register_source(&data.asset_id);
        let validation_error = template_name.and_then(|t| self.check_template(&t, &data));

        log_reading(&data);
        let report_id = data.asset_id.clone();
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(data);

        let forwarded = self.forward(&report_id, raw);

        Ok(IngestReport {
            asset_id: report_id,
            registered,
            forwarded,
            validation_error,
        })
    }

    /// Number of readings accepted so far.
    pub fn processed_count(&self) -> usize {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Step 2. Returns whether a new asset was registered and the template
    /// of the known asset, if any.
    fn register_source(&self, asset_id: &str) -> (bool, Option<String>) {
        let Some(store) = &self.store else {
            return (false, None);
        };

        match store.get_asset(asset_id) {
            Ok(Some(asset)) => return (false, asset.template_name),
            Ok(None) => {}
            Err(e) => {
                warn!(asset_id = %asset_id, error = %e, "asset lookup failed");
                return (false, None);
            }
        }

        match store.create_asset(&Asset::auto_registered(asset_id)) {
            Ok(()) => {
                info!(asset_id = %asset_id, "auto-registered asset");
                (true, None)
            }
            Err(e) => {
                warn!(asset_id = %asset_id, error = %e, "auto-registration failed");
                (false, None)
            }
        }
    }

    /// Step 3.
    fn check_template(&self, template_name: &str, data: &AssetData) -> Option<String> {
        let registry = self.registry.as_ref()?;
        match registry.validate(template_name, data) {
            Ok(()) => None,
            Err(e) => {
                warn!(
                    asset_id = %data.asset_id,
                    template = %template_name,
                    error = %e,
                    "reading does not match template"
                );
                Some(e.to_string())
            }
        }
    }

    /// Step 5.
    fn forward(&self, asset_id: &str, raw: &[u8]) -> bool {
        let Some(forwarder) = &self.forwarder else {
            return false;
        };
        match forwarder.publish(SUBJECT_VALIDATED_DATA, raw) {
            Ok(()) => true,
            Err(e) => {
                warn!(asset_id = %asset_id, error = %e, "failed to forward reading");
                false
            }
        }
    }
}

fn log_reading(data: &AssetData) {
    debug!(asset_id = %data.asset_id, tags = data.values.len(), "reading accepted");
    for tag in &data.values {
        let unit = tag.unit.as_deref().unwrap_or("");
        let quality = tag.quality.as_deref().unwrap_or("");
        match &tag.value {
            TagReading::Number(n) => {
                debug!("  ├─ {} = {:.2} {} [{}]", tag.name, n, unit, quality);
            }
            TagReading::Text(t) => debug!("  ├─ {} = {:?} [{}]", tag.name, t, quality),
            TagReading::Flag(f) => debug!("  ├─ {} = {} [{}]", tag.name, f, quality),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
