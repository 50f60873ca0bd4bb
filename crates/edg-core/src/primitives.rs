//! # Fixed Primitives
//!
//! Subject names and defaults compiled into the core.
//!
//! Subjects are the only contract between the core and the messaging
//! substrate: the core never opens connections itself, it is handed the
//! bytes that arrived on a subject and returns the bytes to reply with.

/// Subject on which devices publish reading envelopes.
pub const SUBJECT_ASSET_DATA: &str = "platform.data.asset";

/// Durable subject on which accepted readings are republished unchanged.
pub const SUBJECT_VALIDATED_DATA: &str = "platform.data.validated";

/// Prefix shared by every management request subject.
pub const SUBJECT_META_PREFIX: &str = "platform.meta.";

/// Reply sent when encoding a management response fails.
///
/// Kept as raw bytes so the fallback itself cannot fail to encode.
pub const FALLBACK_RESPONSE: &[u8] =
    br#"{"success":false,"error":"internal error: response marshal failed"}"#;

/// Template definition file extensions, in the order they are tried.
pub const TEMPLATE_EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

/// Record format version stored in front of every persisted row.
///
/// Increment this when making breaking changes to the record layout.
pub const RECORD_VERSION: u8 = 1;
