//! # Storage Module
//!
//! The persistent registry of assets and relations.

mod redb_store;

pub use redb_store::{MetadataStore, StoreStats};
