//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::api::{self, AppState};
use crate::bus::SubjectBus;
use crate::config::Config;
use edg_core::management::ListRelationsRequest;
use edg_core::{
    AssetTemplate, EdgError, ManagementApi, MetadataStore, Operation, SchemaRegistry,
    primitives::{SUBJECT_ASSET_DATA, SUBJECT_VALIDATED_DATA},
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_default()
    );
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the gateway.
///
/// Failing to open the store is fatal. Failing to load templates is not:
/// the gateway starts with whatever loaded before the failure.
pub async fn cmd_server(config: &Config) -> Result<(), EdgError> {
    let store = Arc::new(open_store(&config.storage.database)?);
    let registry = Arc::new(load_registry_lenient(&config.templates.directory));
    let bus = Arc::new(SubjectBus::new(config.gateway.channel_capacity));

    let state = AppState::new(store, registry, bus, config.gateway.forward)
        .with_api_key(api::get_api_key_from_env());

    println!("EDG Gateway Starting...");
    println!();
    println!("Configuration:");
    println!("  Address:   {}", config.bind_addr());
    println!("  Database:  {}", config.storage.database.display());
    println!("  Templates: {}", config.templates.directory.display());
    println!("  Forward:   {}", config.gateway.forward);
    println!();
    println!("Subjects:");
    println!("  {:<32} readings in", SUBJECT_ASSET_DATA);
    println!("  {:<32} readings out", SUBJECT_VALIDATED_DATA);
    for op in Operation::ALL {
        println!("  {:<32} request/reply", op.subject());
    }
    println!();
    println!("Endpoints:");
    println!("  POST /publish/{{subject}}   - Publish a message");
    println!("  POST /request/{{subject}}   - Management request/reply");
    println!("  GET  /subscribe/{{subject}} - Server-sent events");
    println!("  GET  /status              - Gateway status");
    println!("  GET  /health              - Health check");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    api::run_server(&config.bind_addr(), state).await
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show registry counts.
pub fn cmd_status(config: &Config, json_mode: bool) -> Result<(), EdgError> {
    let store = open_store(&config.storage.database)?;
    let stats = store.stats()?;
    let registry = load_registry_lenient(&config.templates.directory);

    if json_mode {
        print_json(&serde_json::json!({
            "database": config.storage.database.to_string_lossy(),
            "templates_directory": config.templates.directory.to_string_lossy(),
            "total_assets": stats.total_assets,
            "total_relations": stats.total_relations,
            "templates": registry.count(),
        }));
        return Ok(());
    }

    println!("EDG Registry Status");
    println!("===================");
    println!("Database:  {}", config.storage.database.display());
    println!("Templates: {}", config.templates.directory.display());
    println!();
    println!("Assets:    {}", stats.total_assets);
    println!("Relations: {}", stats.total_relations);
    println!("Templates: {}", registry.count());

    Ok(())
}

// =============================================================================
// TEMPLATES COMMAND
// =============================================================================

/// Load a template directory and list what it defines.
///
/// Unlike the server, any load failure is reported as an error here.
pub fn cmd_templates(dir: &Path, json_mode: bool) -> Result<(), EdgError> {
    let registry = SchemaRegistry::new();
    registry.load(dir)?;
    let templates = registry.list();

    if json_mode {
        print_json(&templates);
        return Ok(());
    }

    println!("Templates in {} ({})", dir.display(), templates.len());
    for template in &templates {
        print_template(template);
    }
    Ok(())
}

fn print_template(template: &AssetTemplate) {
    println!();
    println!("{}", template.name);
    for resource in &template.resources {
        match &resource.unit {
            Some(unit) => println!("  {:<24} {:<6} [{}]", resource.name, resource.value_type, unit),
            None => println!("  {:<24} {}", resource.name, resource.value_type),
        }
    }
}

// =============================================================================
// ASSETS COMMAND
// =============================================================================

/// List registered assets, newest first.
pub fn cmd_assets(config: &Config, json_mode: bool) -> Result<(), EdgError> {
    let store = open_store(&config.storage.database)?;
    let assets = store.list_assets()?;

    if json_mode {
        print_json(&assets);
        return Ok(());
    }

    println!("{:<38} {:<24} {:<20} CREATED", "ID", "NAME", "TEMPLATE");
    for asset in &assets {
        println!(
            "{:<38} {:<24} {:<20} {}",
            asset.id,
            asset.name,
            asset.template_name.as_deref().unwrap_or("-"),
            asset.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    println!();
    println!("{} asset(s)", assets.len());
    Ok(())
}

// =============================================================================
// RELATIONS COMMAND
// =============================================================================

/// List relations of one asset, using the same rules as `relation.list`.
pub fn cmd_relations(
    config: &Config,
    json_mode: bool,
    asset_id: String,
    direction: String,
    relation_type: Option<String>,
) -> Result<(), EdgError> {
    let store = Arc::new(open_store(&config.storage.database)?);
    let api = ManagementApi::new(store, Arc::new(SchemaRegistry::new()));
    let relations = api.list_relations(ListRelationsRequest {
        asset_id,
        relation_type,
        direction: Some(direction),
    })?;

    if json_mode {
        print_json(&relations);
        return Ok(());
    }

    for relation in &relations {
        println!(
            "{} -[{}]-> {}  ({})",
            relation.source_asset_id, relation.relation_type, relation.target_asset_id, relation.id
        );
    }
    println!();
    println!("{} relation(s)", relations.len());
    Ok(())
}

// =============================================================================
// COMPACT COMMAND
// =============================================================================

/// Compact the database file. The gateway must not be running.
pub fn cmd_compact(config: &Config) -> Result<(), EdgError> {
    let mut store = open_store(&config.storage.database)?;
    store.compact()?;
    println!("Compacted {}", config.storage.database.display());
    Ok(())
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

fn open_store(path: &Path) -> Result<MetadataStore, EdgError> {
    MetadataStore::open(path).inspect_err(|e| {
        tracing::error!(database = %path.display(), error = %e, "failed to open metadata store");
    })
}

/// Load templates, logging a failure instead of returning it.
fn load_registry_lenient(dir: &Path) -> SchemaRegistry {
    let registry = SchemaRegistry::new();
    if let Err(e) = registry.load(dir) {
        tracing::warn!(
            directory = %dir.display(),
            error = %e,
            loaded = registry.count(),
            "template load failed, continuing with loaded templates"
        );
    }
    registry
}
