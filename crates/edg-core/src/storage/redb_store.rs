//! # redb-backed Metadata Store
//!
//! The authoritative registry of assets and the typed relations between them,
//! stored in a redb embedded database:
//! - ACID transactions (every mutating call is exactly one write transaction)
//! - MVCC (concurrent readers, single writer)
//! - Crash safety (copy-on-write B-trees)
//!
//! ## Tables
//!
//! | table                 | key                          | value          |
//! |-----------------------|------------------------------|----------------|
//! | `assets`              | asset id                     | asset record   |
//! | `asset_names`         | asset name (UNIQUE)          | asset id       |
//! | `asset_relations`     | relation id                  | relation record|
//! | `relation_triples`    | (source, target, type) UNIQUE| relation id    |
//! | `relations_by_source` | source asset id (multimap)   | relation id    |
//! | `relations_by_target` | target asset id (multimap)   | relation id    |
//!
//! The store takes `&self` everywhere and is meant to be shared behind an
//! `Arc` by the ingestion pipeline and the management handlers.

use crate::formats::{decode_asset, decode_relation, encode_asset, encode_relation};
use crate::{Asset, AssetRelation, EdgError};
use redb::backends::InMemoryBackend;
use redb::{
    Database, MultimapTableDefinition, ReadableDatabase, ReadableMultimapTable, ReadableTable,
    ReadableTableMetadata, TableDefinition, WriteTransaction,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Display;
use std::path::Path;
use tracing::debug;

/// Table for assets: id -> encoded asset record
const ASSETS: TableDefinition<&str, &[u8]> = TableDefinition::new("assets");

/// Unique name index: name -> id
const ASSET_NAMES: TableDefinition<&str, &str> = TableDefinition::new("asset_names");

/// Table for relations: id -> encoded relation record
const RELATIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("asset_relations");

/// Unique edge constraint: (source, target, type) -> relation id
const RELATION_TRIPLES: TableDefinition<(&str, &str, &str), &str> =
    TableDefinition::new("relation_triples");

/// Outgoing edges: source asset id -> relation ids
const RELATIONS_BY_SOURCE: MultimapTableDefinition<&str, &str> =
    MultimapTableDefinition::new("relations_by_source");

/// Incoming edges: target asset id -> relation ids
const RELATIONS_BY_TARGET: MultimapTableDefinition<&str, &str> =
    MultimapTableDefinition::new("relations_by_target");

fn storage_err(e: impl Display) -> EdgError {
    EdgError::StorageError(e.to_string())
}

/// Row counts of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_assets: u64,
    pub total_relations: u64,
}

/// A disk-backed (or in-memory) asset and relation registry using redb.
pub struct MetadataStore {
    db: Database,
}

impl std::fmt::Debug for MetadataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataStore").finish_non_exhaustive()
    }
}

impl MetadataStore {
    /// Open or create a store at the given path, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, EdgError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| EdgError::IoError(format!("failed to create data directory: {e}")))?;
        }
        let db = Database::create(path).map_err(storage_err)?;
        Self::init(db)
    }

    /// Open an isolated, volatile store. Every call returns a fresh instance.
    pub fn in_memory() -> Result<Self, EdgError> {
        let db = Database::builder()
            .create_with_backend(InMemoryBackend::new())
            .map_err(storage_err)?;
        Self::init(db)
    }

    fn init(db: Database) -> Result<Self, EdgError> {
        let write_txn = db.begin_write().map_err(storage_err)?;
        let _ = write_txn.open_table(ASSETS).map_err(storage_err)?;
        let _ = write_txn.open_table(ASSET_NAMES).map_err(storage_err)?;
        let _ = write_txn.open_table(RELATIONS).map_err(storage_err)?;
        let _ = write_txn.open_table(RELATION_TRIPLES).map_err(storage_err)?;
        let _ = write_txn
            .open_multimap_table(RELATIONS_BY_SOURCE)
            .map_err(storage_err)?;
        let _ = write_txn
            .open_multimap_table(RELATIONS_BY_TARGET)
            .map_err(storage_err)?;
        write_txn.commit().map_err(storage_err)?;
        Ok(Self { db })
    }

    /// Compact the database file.
    pub fn compact(&mut self) -> Result<(), EdgError> {
        self.db.compact().map_err(storage_err)?;
        Ok(())
    }

    // =========================================================================
    // ASSETS
    // =========================================================================

    /// Register a new asset.
    ///
    /// Fails with `DuplicateAssetName` if the name is taken and
    /// `DuplicateAssetId` if the id is taken; the store is unchanged then.
    pub fn create_asset(&self, asset: &Asset) -> Result<(), EdgError> {
        let bytes = encode_asset(asset)?;

        let write_txn = self.db.begin_write().map_err(storage_err)?;
        {
            let mut assets = write_txn.open_table(ASSETS).map_err(storage_err)?;
            let mut names = write_txn.open_table(ASSET_NAMES).map_err(storage_err)?;

            if names
                .get(asset.name.as_str())
                .map_err(storage_err)?
                .is_some()
            {
                return Err(EdgError::DuplicateAssetName(asset.name.clone()));
            }
            if assets.get(asset.id.as_str()).map_err(storage_err)?.is_some() {
                return Err(EdgError::DuplicateAssetId(asset.id.clone()));
            }

            assets
                .insert(asset.id.as_str(), bytes.as_slice())
                .map_err(storage_err)?;
            names
                .insert(asset.name.as_str(), asset.id.as_str())
                .map_err(storage_err)?;
        }
        write_txn.commit().map_err(storage_err)?;

        debug!(asset_id = %asset.id, name = %asset.name, "asset stored");
        Ok(())
    }

    /// Fetch an asset by id. `Ok(None)` when absent.
    pub fn get_asset(&self, id: &str) -> Result<Option<Asset>, EdgError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let assets = read_txn.open_table(ASSETS).map_err(storage_err)?;

        match assets.get(id).map_err(storage_err)? {
            Some(data) => Ok(Some(decode_asset(data.value())?)),
            None => Ok(None),
        }
    }

    /// Fetch an asset by its unique name. `Ok(None)` when absent.
    pub fn get_asset_by_name(&self, name: &str) -> Result<Option<Asset>, EdgError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let names = read_txn.open_table(ASSET_NAMES).map_err(storage_err)?;
        let assets = read_txn.open_table(ASSETS).map_err(storage_err)?;

        let Some(id) = names
            .get(name)
            .map_err(storage_err)?
            .map(|v| v.value().to_string())
        else {
            return Ok(None);
        };

        match assets.get(id.as_str()).map_err(storage_err)? {
            Some(data) => Ok(Some(decode_asset(data.value())?)),
            None => Err(EdgError::CorruptRecord(format!(
                "name index entry '{name}' points to missing asset {id}"
            ))),
        }
    }

    /// All assets, newest first. A single undecodable row fails the listing.
    pub fn list_assets(&self) -> Result<Vec<Asset>, EdgError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let assets_table = read_txn.open_table(ASSETS).map_err(storage_err)?;

        let mut assets = Vec::new();
        for entry in assets_table.iter().map_err(storage_err)? {
            let (_, value) = entry.map_err(storage_err)?;
            assets.push(decode_asset(value.value())?);
        }
        assets.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(assets)
    }

    /// Fast existence probe.
    pub fn asset_exists(&self, id: &str) -> Result<bool, EdgError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let assets = read_txn.open_table(ASSETS).map_err(storage_err)?;
        Ok(assets.get(id).map_err(storage_err)?.is_some())
    }

    /// Replace (or clear) the template reference of an asset.
    pub fn update_asset_template(
        &self,
        id: &str,
        template_name: Option<&str>,
    ) -> Result<(), EdgError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        {
            let mut assets = write_txn.open_table(ASSETS).map_err(storage_err)?;
            let mut asset = match assets.get(id).map_err(storage_err)? {
                Some(data) => decode_asset(data.value())?,
                None => return Err(EdgError::AssetNotFound(id.to_string())),
            };
            asset.template_name = template_name.map(str::to_string);
            let bytes = encode_asset(&asset)?;
            assets.insert(id, bytes.as_slice()).map_err(storage_err)?;
        }
        write_txn.commit().map_err(storage_err)?;
        Ok(())
    }

    /// Delete an asset and, in the same transaction, every relation that
    /// has it as source or target.
    pub fn delete_asset(&self, id: &str) -> Result<(), EdgError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;

        {
            let mut assets = write_txn.open_table(ASSETS).map_err(storage_err)?;
            let asset = match assets.remove(id).map_err(storage_err)? {
                Some(data) => decode_asset(data.value())?,
                None => return Err(EdgError::AssetNotFound(id.to_string())),
            };
            let mut names = write_txn.open_table(ASSET_NAMES).map_err(storage_err)?;
            names.remove(asset.name.as_str()).map_err(storage_err)?;
        }

        let mut relation_ids = BTreeSet::new();
        {
            let by_source = write_txn
                .open_multimap_table(RELATIONS_BY_SOURCE)
                .map_err(storage_err)?;
            let by_target = write_txn
                .open_multimap_table(RELATIONS_BY_TARGET)
                .map_err(storage_err)?;
            for entry in by_source.get(id).map_err(storage_err)? {
                relation_ids.insert(entry.map_err(storage_err)?.value().to_string());
            }
            for entry in by_target.get(id).map_err(storage_err)? {
                relation_ids.insert(entry.map_err(storage_err)?.value().to_string());
            }
        }

        for relation_id in &relation_ids {
            remove_relation_in(&write_txn, relation_id)?;
        }
        write_txn.commit().map_err(storage_err)?;

        debug!(
            asset_id = %id,
            cascaded_relations = relation_ids.len(),
            "asset deleted"
        );
        Ok(())
    }

    // =========================================================================
    // RELATIONS
    // =========================================================================

    /// Insert a relation.
    ///
    /// Checks, in order and inside the inserting transaction: source exists,
    /// target exists, `(source, target, type)` not already present.
    pub fn create_relation(&self, relation: &AssetRelation) -> Result<(), EdgError> {
        let bytes = encode_relation(relation)?;
        let source = relation.source_asset_id.as_str();
        let target = relation.target_asset_id.as_str();
        let triple = (source, target, relation.relation_type.as_str());

        let write_txn = self.db.begin_write().map_err(storage_err)?;
        {
            let assets = write_txn.open_table(ASSETS).map_err(storage_err)?;
            if assets.get(source).map_err(storage_err)?.is_none() {
                return Err(EdgError::SourceAssetNotFound(source.to_string()));
            }
            if assets.get(target).map_err(storage_err)?.is_none() {
                return Err(EdgError::TargetAssetNotFound(target.to_string()));
            }
        }
        {
            let mut triples = write_txn.open_table(RELATION_TRIPLES).map_err(storage_err)?;
            if triples.get(triple).map_err(storage_err)?.is_some() {
                return Err(EdgError::DuplicateRelation {
                    source_asset_id: source.to_string(),
                    target_asset_id: target.to_string(),
                    relation_type: relation.relation_type,
                });
            }

            let mut relations = write_txn.open_table(RELATIONS).map_err(storage_err)?;
            if relations
                .get(relation.id.as_str())
                .map_err(storage_err)?
                .is_some()
            {
                return Err(EdgError::StorageError(format!(
                    "relation id already exists: {}",
                    relation.id
                )));
            }
            relations
                .insert(relation.id.as_str(), bytes.as_slice())
                .map_err(storage_err)?;
            triples
                .insert(triple, relation.id.as_str())
                .map_err(storage_err)?;

            let mut by_source = write_txn
                .open_multimap_table(RELATIONS_BY_SOURCE)
                .map_err(storage_err)?;
            by_source
                .insert(source, relation.id.as_str())
                .map_err(storage_err)?;
            let mut by_target = write_txn
                .open_multimap_table(RELATIONS_BY_TARGET)
                .map_err(storage_err)?;
            by_target
                .insert(target, relation.id.as_str())
                .map_err(storage_err)?;
        }
        write_txn.commit().map_err(storage_err)?;

        debug!(
            relation_id = %relation.id,
            source = %source,
            target = %target,
            relation_type = %relation.relation_type,
            "relation stored"
        );
        Ok(())
    }

    /// Fetch a relation by id. `Ok(None)` when absent.
    pub fn get_relation(&self, id: &str) -> Result<Option<AssetRelation>, EdgError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let relations = read_txn.open_table(RELATIONS).map_err(storage_err)?;

        match relations.get(id).map_err(storage_err)? {
            Some(data) => Ok(Some(decode_relation(data.value())?)),
            None => Ok(None),
        }
    }

    /// Relations whose source is `asset_id`, newest first.
    pub fn get_relations_by_source(&self, asset_id: &str) -> Result<Vec<AssetRelation>, EdgError> {
        self.relations_via(RELATIONS_BY_SOURCE, asset_id)
    }

    /// Relations whose target is `asset_id`, newest first.
    pub fn get_relations_by_target(&self, asset_id: &str) -> Result<Vec<AssetRelation>, EdgError> {
        self.relations_via(RELATIONS_BY_TARGET, asset_id)
    }

    fn relations_via(
        &self,
        index: MultimapTableDefinition<&str, &str>,
        asset_id: &str,
    ) -> Result<Vec<AssetRelation>, EdgError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let index_table = read_txn.open_multimap_table(index).map_err(storage_err)?;
        let relations_table = read_txn.open_table(RELATIONS).map_err(storage_err)?;

        let mut relations = Vec::new();
        for entry in index_table.get(asset_id).map_err(storage_err)? {
            let relation_id = entry.map_err(storage_err)?.value().to_string();
            match relations_table
                .get(relation_id.as_str())
                .map_err(storage_err)?
            {
                Some(data) => relations.push(decode_relation(data.value())?),
                None => {
                    return Err(EdgError::CorruptRecord(format!(
                        "relation index of {asset_id} points to missing relation {relation_id}"
                    )));
                }
            }
        }
        relations.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(relations)
    }

    /// Delete a relation. Fails with `RelationNotFound` if absent.
    pub fn delete_relation(&self, id: &str) -> Result<(), EdgError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        if remove_relation_in(&write_txn, id)?.is_none() {
            return Err(EdgError::RelationNotFound(id.to_string()));
        }
        write_txn.commit().map_err(storage_err)?;

        debug!(relation_id = %id, "relation deleted");
        Ok(())
    }

    // =========================================================================
    // STATS
    // =========================================================================

    /// Count assets and relations.
    pub fn stats(&self) -> Result<StoreStats, EdgError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let assets = read_txn.open_table(ASSETS).map_err(storage_err)?;
        let relations = read_txn.open_table(RELATIONS).map_err(storage_err)?;
        Ok(StoreStats {
            total_assets: assets.len().map_err(storage_err)?,
            total_relations: relations.len().map_err(storage_err)?,
        })
    }

    #[cfg(test)]
    fn put_raw_asset(&self, id: &str, name: &str, bytes: &[u8]) -> Result<(), EdgError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        {
            let mut assets = write_txn.open_table(ASSETS).map_err(storage_err)?;
            assets.insert(id, bytes).map_err(storage_err)?;
            let mut names = write_txn.open_table(ASSET_NAMES).map_err(storage_err)?;
            names.insert(name, id).map_err(storage_err)?;
        }
        write_txn.commit().map_err(storage_err)
    }

    #[cfg(test)]
    fn put_raw_relation(
        &self,
        id: &str,
        source: &str,
        target: &str,
        bytes: &[u8],
    ) -> Result<(), EdgError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        {
            let mut relations = write_txn.open_table(RELATIONS).map_err(storage_err)?;
            relations.insert(id, bytes).map_err(storage_err)?;
            let mut by_source = write_txn
                .open_multimap_table(RELATIONS_BY_SOURCE)
                .map_err(storage_err)?;
            by_source.insert(source, id).map_err(storage_err)?;
            let mut by_target = write_txn
                .open_multimap_table(RELATIONS_BY_TARGET)
                .map_err(storage_err)?;
            by_target.insert(target, id).map_err(storage_err)?;
        }
        write_txn.commit().map_err(storage_err)
    }
}

/// Remove one relation and its index entries inside an open write transaction.
/// Returns the removed relation, or `None` if no relation has this id.
fn remove_relation_in(
    write_txn: &WriteTransaction,
    id: &str,
) -> Result<Option<AssetRelation>, EdgError> {
    let mut relations = write_txn.open_table(RELATIONS).map_err(storage_err)?;
    let relation = match relations.remove(id).map_err(storage_err)? {
        Some(data) => decode_relation(data.value())?,
        None => return Ok(None),
    };

    let mut triples = write_txn.open_table(RELATION_TRIPLES).map_err(storage_err)?;
    triples
        .remove((
            relation.source_asset_id.as_str(),
            relation.target_asset_id.as_str(),
            relation.relation_type.as_str(),
        ))
        .map_err(storage_err)?;

    let mut by_source = write_txn
        .open_multimap_table(RELATIONS_BY_SOURCE)
        .map_err(storage_err)?;
    by_source
        .remove(relation.source_asset_id.as_str(), id)
        .map_err(storage_err)?;
    let mut by_target = write_txn
        .open_multimap_table(RELATIONS_BY_TARGET)
        .map_err(storage_err)?;
    by_target
        .remove(relation.target_asset_id.as_str(), id)
        .map_err(storage_err)?;

    Ok(Some(relation))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RelationType;
    use crate::formats::records::tests::{asset_bytes_with_labels, relation_bytes_with_metadata};
    use chrono::{Duration, Utc};
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn store() -> MetadataStore {
        MetadataStore::in_memory().expect("in-memory store")
    }

    fn asset(id: &str, name: &str) -> Asset {
        Asset::new(id, name, Utc::now())
    }

    fn relation(id: &str, source: &str, target: &str, t: RelationType) -> AssetRelation {
        AssetRelation::new(id, source, target, t, Utc::now())
    }

    // -------------------------------------------------------------------------
    // assets
    // -------------------------------------------------------------------------

    #[test]
    fn create_then_get_returns_equal_asset() {
        let store = store();
        let a = Asset::new("asset-001", "test-sensor", Utc::now())
            .with_template("temperature-sensor")
            .with_labels(vec!["building-a".into(), "floor-1".into()]);

        store.create_asset(&a).expect("create");
        assert_eq!(store.get_asset("asset-001").expect("get"), Some(a));
    }

    #[test]
    fn duplicate_name_is_rejected_and_store_unchanged() {
        let store = store();
        store
            .create_asset(&asset("asset-001", "duplicate-name"))
            .expect("create");

        let err = store
            .create_asset(&asset("asset-002", "duplicate-name"))
            .expect_err("duplicate");
        assert!(matches!(err, EdgError::DuplicateAssetName(n) if n == "duplicate-name"));
        assert!(!store.asset_exists("asset-002").expect("exists"));
        assert_eq!(store.list_assets().expect("list").len(), 1);
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let store = store();
        store.create_asset(&asset("a1", "one")).expect("create");
        let err = store.create_asset(&asset("a1", "two")).expect_err("dup id");
        assert!(matches!(err, EdgError::DuplicateAssetId(id) if id == "a1"));
        assert!(store.get_asset_by_name("two").expect("get").is_none());
    }

    #[test]
    fn missing_asset_is_none_not_error() {
        let store = store();
        assert!(store.get_asset("non-existent").expect("get").is_none());
        assert!(store.get_asset_by_name("non-existent").expect("get").is_none());
        assert!(!store.asset_exists("non-existent").expect("exists"));
    }

    #[test]
    fn get_by_name_resolves_through_index() {
        let store = store();
        store.create_asset(&asset("asset-001", "unique-name")).expect("create");
        let found = store
            .get_asset_by_name("unique-name")
            .expect("get")
            .expect("present");
        assert_eq!(found.id, "asset-001");
    }

    #[test]
    fn list_is_newest_first() {
        let store = store();
        let now = Utc::now();
        store
            .create_asset(&Asset::new("old", "old", now - Duration::minutes(2)))
            .expect("create");
        store
            .create_asset(&Asset::new("new", "new", now))
            .expect("create");
        store
            .create_asset(&Asset::new("mid", "mid", now - Duration::minutes(1)))
            .expect("create");

        let ids: Vec<_> = store
            .list_assets()
            .expect("list")
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[test]
    fn delete_missing_asset_fails() {
        let store = store();
        assert!(matches!(
            store.delete_asset("ghost"),
            Err(EdgError::AssetNotFound(id)) if id == "ghost"
        ));
    }

    #[test]
    fn delete_frees_the_name() {
        let store = store();
        store.create_asset(&asset("a1", "reused")).expect("create");
        store.delete_asset("a1").expect("delete");
        assert!(store.get_asset("a1").expect("get").is_none());
        store.create_asset(&asset("a2", "reused")).expect("name is free again");
    }

    #[test]
    fn update_template_changes_only_template() {
        let store = store();
        let a = asset("a1", "s1");
        store.create_asset(&a).expect("create");
        store
            .update_asset_template("a1", Some("press"))
            .expect("update");

        let updated = store.get_asset("a1").expect("get").expect("present");
        assert_eq!(updated.template_name.as_deref(), Some("press"));
        assert_eq!(updated.created_at, a.created_at);

        assert!(matches!(
            store.update_asset_template("ghost", None),
            Err(EdgError::AssetNotFound(_))
        ));
    }

    #[test]
    fn corrupt_labels_surface_on_every_read_path() {
        let store = store();
        store.create_asset(&asset("good", "good")).expect("create");
        store
            .put_raw_asset("bad", "bad", &asset_bytes_with_labels("bad", "bad", "{broken"))
            .expect("raw insert");

        assert!(matches!(store.get_asset("bad"), Err(EdgError::CorruptRecord(_))));
        assert!(matches!(
            store.get_asset_by_name("bad"),
            Err(EdgError::CorruptRecord(_))
        ));
        assert!(matches!(store.list_assets(), Err(EdgError::CorruptRecord(_))));
        assert!(store.get_asset("good").expect("healthy row").is_some());
    }

    // -------------------------------------------------------------------------
    // relations
    // -------------------------------------------------------------------------

    fn two_assets() -> MetadataStore {
        let store = store();
        store.create_asset(&asset("a1", "s1")).expect("create");
        store.create_asset(&asset("a2", "s2")).expect("create");
        store
    }

    #[test]
    fn create_and_get_relation_with_metadata() {
        let store = two_assets();
        let mut metadata = BTreeMap::new();
        metadata.insert("port".to_string(), "eth0".to_string());
        let r = relation("r1", "a1", "a2", RelationType::ConnectedTo).with_metadata(metadata);

        store.create_relation(&r).expect("create");
        assert_eq!(store.get_relation("r1").expect("get"), Some(r));
    }

    #[test]
    fn relation_to_missing_endpoint_is_distinguishable() {
        let store = two_assets();
        assert!(matches!(
            store.create_relation(&relation("r1", "ghost", "a2", RelationType::PartOf)),
            Err(EdgError::SourceAssetNotFound(id)) if id == "ghost"
        ));
        assert!(matches!(
            store.create_relation(&relation("r1", "a1", "ghost", RelationType::PartOf)),
            Err(EdgError::TargetAssetNotFound(id)) if id == "ghost"
        ));
        assert!(store.get_relation("r1").expect("get").is_none());
    }

    #[test]
    fn duplicate_triple_is_rejected_but_other_types_are_allowed() {
        let store = two_assets();
        store
            .create_relation(&relation("r1", "a1", "a2", RelationType::PartOf))
            .expect("first");

        assert!(matches!(
            store.create_relation(&relation("r2", "a1", "a2", RelationType::PartOf)),
            Err(EdgError::DuplicateRelation { .. })
        ));
        store
            .create_relation(&relation("r3", "a1", "a2", RelationType::LocatedIn))
            .expect("different type");
        store
            .create_relation(&relation("r4", "a2", "a1", RelationType::PartOf))
            .expect("reverse direction");
    }

    #[test]
    fn relations_by_source_and_target() {
        let store = two_assets();
        store.create_asset(&asset("a3", "s3")).expect("create");
        store
            .create_relation(&relation("r1", "a1", "a2", RelationType::PartOf))
            .expect("create");
        store
            .create_relation(&relation("r2", "a1", "a3", RelationType::ConnectedTo))
            .expect("create");
        store
            .create_relation(&relation("r3", "a3", "a2", RelationType::LocatedIn))
            .expect("create");

        let outgoing: BTreeSet<_> = store
            .get_relations_by_source("a1")
            .expect("by source")
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(outgoing, BTreeSet::from(["r1".to_string(), "r2".to_string()]));

        let incoming: BTreeSet<_> = store
            .get_relations_by_target("a2")
            .expect("by target")
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(incoming, BTreeSet::from(["r1".to_string(), "r3".to_string()]));

        assert!(store.get_relations_by_source("a2").expect("none").is_empty());
    }

    #[test]
    fn delete_relation_and_missing_relation() {
        let store = two_assets();
        store
            .create_relation(&relation("r1", "a1", "a2", RelationType::PartOf))
            .expect("create");
        store.delete_relation("r1").expect("delete");
        assert!(store.get_relation("r1").expect("get").is_none());
        assert!(store.get_relations_by_source("a1").expect("list").is_empty());
        assert!(matches!(
            store.delete_relation("r1"),
            Err(EdgError::RelationNotFound(_))
        ));

        // triple is free again
        store
            .create_relation(&relation("r2", "a1", "a2", RelationType::PartOf))
            .expect("recreate");
    }

    #[test]
    fn deleting_an_endpoint_cascades_both_directions() {
        let store = two_assets();
        store.create_asset(&asset("a3", "s3")).expect("create");
        store
            .create_relation(&relation("out", "a1", "a2", RelationType::PartOf))
            .expect("create");
        store
            .create_relation(&relation("in", "a3", "a1", RelationType::ConnectedTo))
            .expect("create");
        store
            .create_relation(&relation("loop", "a1", "a1", RelationType::LocatedIn))
            .expect("create");
        store
            .create_relation(&relation("keep", "a3", "a2", RelationType::PartOf))
            .expect("create");

        store.delete_asset("a1").expect("delete");

        for id in ["out", "in", "loop"] {
            assert!(store.get_relation(id).expect("get").is_none(), "{id} survived");
        }
        assert!(store.get_relation("keep").expect("get").is_some());
        assert!(store.get_relations_by_target("a2").expect("list").len() == 1);
        assert!(store.get_relations_by_source("a3").expect("list").len() == 1);
        assert_eq!(
            store.stats().expect("stats"),
            StoreStats {
                total_assets: 2,
                total_relations: 1
            }
        );
    }

    #[test]
    fn corrupt_metadata_surfaces_as_error() {
        let store = two_assets();
        let r = relation("r1", "a1", "a2", RelationType::PartOf);
        store
            .put_raw_relation("r1", "a1", "a2", &relation_bytes_with_metadata(&r, "not-a-map"))
            .expect("raw insert");
        assert!(matches!(store.get_relation("r1"), Err(EdgError::CorruptRecord(_))));
    }

    #[test]
    fn one_corrupt_relation_fails_both_listings() {
        let store = two_assets();
        store
            .create_relation(&relation("good", "a1", "a2", RelationType::ConnectedTo))
            .expect("create");
        let bad = relation("bad", "a1", "a2", RelationType::PartOf);
        store
            .put_raw_relation("bad", "a1", "a2", &relation_bytes_with_metadata(&bad, "[1,2]"))
            .expect("raw insert");

        assert!(matches!(
            store.get_relations_by_source("a1"),
            Err(EdgError::CorruptRecord(_))
        ));
        assert!(matches!(
            store.get_relations_by_target("a2"),
            Err(EdgError::CorruptRecord(_))
        ));
        // the healthy row is still readable on its own
        assert!(store.get_relation("good").expect("get").is_some());
    }

    // -------------------------------------------------------------------------
    // persistence and sharing
    // -------------------------------------------------------------------------

    #[test]
    fn data_survives_reopen() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("nested").join("metadata.redb");

        {
            let store = MetadataStore::open(&db_path).expect("open");
            store.create_asset(&asset("a1", "s1")).expect("create");
            store.create_asset(&asset("a2", "s2")).expect("create");
            store
                .create_relation(&relation("r1", "a1", "a2", RelationType::PartOf))
                .expect("relation");
        }

        let mut store = MetadataStore::open(&db_path).expect("reopen");
        store.compact().expect("compact");
        assert!(store.asset_exists("a1").expect("exists"));
        assert_eq!(
            store.get_relations_by_target("a2").expect("list")[0].id,
            "r1"
        );
    }

    #[test]
    fn in_memory_instances_are_isolated() {
        let first = store();
        let second = store();
        first.create_asset(&asset("a1", "s1")).expect("create");
        assert!(!second.asset_exists("a1").expect("exists"));
    }

    #[test]
    fn concurrent_registration_of_same_name_admits_one() {
        let store = Arc::new(store());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store
                        .create_asset(&Asset::new(format!("id-{i}"), "shared", Utc::now()))
                        .is_ok()
                })
            })
            .collect();

        let successes = handles
            .into_iter()
            .map(|h| h.join().expect("join"))
            .filter(|ok| *ok)
            .count();
        assert_eq!(successes, 1);
        assert_eq!(store.stats().expect("stats").total_assets, 1);
    }
}
