//! # Formats Module
//!
//! Byte layouts for persisted rows. File and database I/O live in `storage`.

pub mod records;

pub use records::{decode_asset, decode_relation, encode_asset, encode_relation};
