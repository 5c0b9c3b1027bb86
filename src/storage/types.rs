use crate::config::SourceConfig;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Failure to persist an output file.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to write '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Failure to load a payload document for rendering.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Payload file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read payload file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON in payload file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unexpected payload shape: expected an array or an object with 'entries'")]
    UnexpectedShape,

    #[error("Payload object is missing the 'entries' field")]
    MissingEntries,

    #[error("'entries' must be an array")]
    EntriesNotArray,

    #[error("Entry #{0} is not an object")]
    EntryNotObject(usize),

    #[error("Entry #{index} is missing fields: {}", .fields.join(", "))]
    MissingFields {
        index: usize,
        fields: Vec<&'static str>,
    },

    #[error("Entry #{index} is malformed: {source}")]
    InvalidEntry {
        index: usize,
        source: serde_json::Error,
    },

    #[error("Payload 'meta' is malformed: {0}")]
    InvalidMeta(String),
}

// ============================================================================
// Persisted Types
// ============================================================================

/// One entry of the persisted payload.
///
/// Older payloads may lack `source_key`, `tags` and `fetched_at`; those load
/// with empty defaults. A `null` in any text or tag field loads the same way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadEntry {
    #[serde(default, deserialize_with = "null_as_default")]
    pub source_key: String,
    #[serde(deserialize_with = "null_as_default")]
    pub source: String,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub summary_raw: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    pub category: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub fetched_at: String,
    #[serde(deserialize_with = "null_as_default")]
    pub published_at: String,
}

/// A source that produced no entries in a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedSource {
    pub name: String,
    pub key: String,
}

impl From<&SourceConfig> for FailedSource {
    fn from(source: &SourceConfig) -> Self {
        Self {
            name: source.name.clone(),
            key: source.key.clone(),
        }
    }
}

/// Aggregate numbers for one collect run.
///
/// Loading never fails on a field of the wrong type: scalar fields become
/// `None` and collections keep only their well-formed items, so the digest
/// can skip whatever it cannot render.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunMeta {
    #[serde(deserialize_with = "count_or_none")]
    pub raw_entries: Option<usize>,
    /// Absent in some older payloads; the digest then uses the entry count.
    #[serde(deserialize_with = "count_or_none")]
    pub unique_entries: Option<usize>,
    /// `1 - unique / raw`; `None` when nothing was fetched.
    #[serde(deserialize_with = "number_or_none")]
    pub dedup_rate: Option<f64>,
    #[serde(deserialize_with = "counts_or_empty")]
    pub category_counts: BTreeMap<String, usize>,
    #[serde(deserialize_with = "count_or_none")]
    pub total_sources: Option<usize>,
    #[serde(deserialize_with = "count_or_none")]
    pub failed_source_count: Option<usize>,
    #[serde(deserialize_with = "failed_sources_or_empty")]
    pub failed_sources: Vec<FailedSource>,
}

impl RunMeta {
    pub fn from_run(
        raw_entries: usize,
        entries: &[PayloadEntry],
        total_sources: usize,
        failed_sources: Vec<FailedSource>,
    ) -> Self {
        let unique_entries = entries.len();
        let dedup_rate =
            (raw_entries > 0).then(|| 1.0 - unique_entries as f64 / raw_entries as f64);

        let mut category_counts = BTreeMap::new();
        for entry in entries {
            let category = entry.category.as_deref().unwrap_or(super::DEFAULT_CATEGORY);
            *category_counts.entry(category.to_string()).or_insert(0) += 1;
        }

        Self {
            raw_entries: Some(raw_entries),
            unique_entries: Some(unique_entries),
            dedup_rate,
            category_counts,
            total_sources: Some(total_sources),
            failed_source_count: Some(failed_sources.len()),
            failed_sources,
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts any JSON value, keeping it only if it is a number.
fn number_or_none<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_f64())
}

/// Accepts any JSON value, keeping it only if it is a non-negative integer.
fn count_or_none<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(as_count(&value))
}

fn as_count(value: &Value) -> Option<usize> {
    value.as_u64().and_then(|n| usize::try_from(n).ok())
}

/// Keeps the categories whose count is a non-negative integer. Anything but
/// an object yields no counts.
fn counts_or_empty<'de, D>(deserializer: D) -> Result<BTreeMap<String, usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::Object(map) = Value::deserialize(deserializer)? else {
        return Ok(BTreeMap::new());
    };
    Ok(map
        .into_iter()
        .filter_map(|(category, count)| as_count(&count).map(|n| (category, n)))
        .collect())
}

/// Keeps the object items of a list; a non-string `name` or `key` reads as
/// empty. Anything but a list yields no failed sources.
fn failed_sources_or_empty<'de, D>(deserializer: D) -> Result<Vec<FailedSource>, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    let text = |item: &serde_json::Map<String, Value>, field: &str| {
        item.get(field)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    Ok(items
        .iter()
        .filter_map(Value::as_object)
        .map(|item| FailedSource {
            name: text(item, "name"),
            key: text(item, "key"),
        })
        .collect())
}

/// The on-disk payload: run metadata plus entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub meta: RunMeta,
    pub entries: Vec<PayloadEntry>,
}
