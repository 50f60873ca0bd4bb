//! # Schema Registry
//!
//! Named validation schemas ("templates") for classes of assets.
//!
//! Templates are declared in one file per template, YAML or JSON:
//!
//! ```yaml
//! name: temperature-sensor
//! resources:
//!   - name: temperature
//!     valueType: NUMBER
//!     unit: C
//!   - name: status
//!     valueType: TEXT
//! ```
//!
//! The registry is read-mostly: it is filled at startup and then only read.
//! Loading a template with a name that is already present replaces it.

use crate::primitives::TEMPLATE_EXTENSIONS;
use crate::{AssetData, AssetTemplate, EdgError};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock};
use tracing::{debug, info};

/// In-memory registry of asset templates keyed by name.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    templates: RwLock<BTreeMap<String, AssetTemplate>>,
}

impl SchemaRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every template file in `dir`.
    ///
    /// Files are visited in file-name order; subdirectories and files with
    /// other extensions are skipped. The first file that cannot be read,
    /// parsed, or lacks a `name` aborts the load with `TemplateLoad`;
    /// templates from files visited before it stay registered.
    ///
    /// Returns the number of templates loaded by this call.
    pub fn load(&self, dir: impl AsRef<Path>) -> Result<usize, EdgError> {
        let dir = dir.as_ref();
        let load_err = |reason: String| EdgError::TemplateLoad {
            path: dir.display().to_string(),
            reason,
        };

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)
            .map_err(|e| load_err(format!("failed to read directory: {e}")))?
        {
            let path = entry
                .map_err(|e| load_err(format!("failed to read directory entry: {e}")))?
                .path();
            if path.is_file() && template_extension(&path).is_some() {
                paths.push(path);
            }
        }
        paths.sort();

        for path in &paths {
            self.load_file(path)?;
        }

        info!(directory = %dir.display(), loaded = paths.len(), "templates loaded");
        Ok(paths.len())
    }

    /// Load a single template definition file.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<(), EdgError> {
        let path = path.as_ref();
        let load_err = |reason: String| EdgError::TemplateLoad {
            path: path.display().to_string(),
            reason,
        };

        let content =
            std::fs::read_to_string(path).map_err(|e| load_err(format!("failed to read file: {e}")))?;

        let template: AssetTemplate = match template_extension(path) {
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| load_err(format!("failed to parse JSON: {e}")))?,
            _ => serde_yaml::from_str(&content)
                .map_err(|e| load_err(format!("failed to parse YAML: {e}")))?,
        };

        if template.name.is_empty() {
            return Err(load_err("template name is missing".to_string()));
        }

        debug!(template = %template.name, path = %path.display(), "template registered");
        self.insert(template);
        Ok(())
    }

    /// Register a template directly, replacing any template of the same name.
    pub fn insert(&self, template: AssetTemplate) {
        self.templates
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(template.name.clone(), template);
    }

    /// Look up a template by name.
    pub fn get(&self, name: &str) -> Option<AssetTemplate> {
        self.templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Snapshot of every loaded template, sorted by name.
    pub fn list(&self) -> Vec<AssetTemplate> {
        self.templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    pub fn count(&self) -> usize {
        self.templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check a reading against the named template.
    ///
    /// - unknown template: validation is skipped and reported as success
    /// - tag with no matching resource: accepted
    /// - resource with an unrecognized type name: accepted
    /// - tag whose value kind differs from the resource type: `TypeMismatch`
    pub fn validate(&self, template_name: &str, data: &AssetData) -> Result<(), EdgError> {
        let templates = self
            .templates
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(template) = templates.get(template_name) else {
            return Ok(());
        };

        for tag in &data.values {
            let Some(resource) = template.resource(&tag.name) else {
                continue;
            };
            if resource.value_type.is_checked() && tag.value.value_type() != resource.value_type {
                return Err(EdgError::TypeMismatch {
                    tag: tag.name.clone(),
                    expected: resource.value_type.clone(),
                });
            }
        }
        Ok(())
    }
}

/// The recognized template extension of `path`, if it has one.
fn template_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?;
    TEMPLATE_EXTENSIONS
        .into_iter()
        .find(|known| known.eq_ignore_ascii_case(ext))
}

// =============================================================================
// TESTS
// =============================================================================
