//! The JSON payload handed from `collect` to `digest`, plus file output.

mod payload;
mod types;

pub use payload::{build_payload, build_payload_at, load_entries, write_atomic, write_payload};
pub use types::{Document, FailedSource, LoadError, PayloadEntry, RunMeta, StorageError};

/// Category used for entries whose source declares none.
pub const DEFAULT_CATEGORY: &str = "uncategorized";
/// Source name for entries whose source has a blank name.
pub const DEFAULT_SOURCE: &str = "unknown source";
/// Source key for entries built without one.
pub const DEFAULT_SOURCE_KEY: &str = "unknown";
/// Title for entries whose feed item has none.
pub const DEFAULT_TITLE: &str = "untitled";
