use crate::merge::UniqueEntry;
use crate::storage::types::{Document, LoadError, PayloadEntry, RunMeta, StorageError};
use crate::storage::{DEFAULT_CATEGORY, DEFAULT_SOURCE, DEFAULT_SOURCE_KEY, DEFAULT_TITLE};
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use std::io::Write;
use std::path::Path;

/// Fields every entry must carry for the digest to render it.
const REQUIRED_FIELDS: [&str; 6] = [
    "category",
    "published_at",
    "source",
    "summary_raw",
    "title",
    "url",
];

/// Maps merged entries to the persisted shape, stamping all of them with the
/// current UTC time.
pub fn build_payload(entries: &[UniqueEntry]) -> Vec<PayloadEntry> {
    let fetched_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false);
    build_payload_at(entries, &fetched_at)
}

/// Deterministic core of [`build_payload`].
pub fn build_payload_at(entries: &[UniqueEntry], fetched_at: &str) -> Vec<PayloadEntry> {
    entries
        .iter()
        .map(|entry| PayloadEntry {
            source_key: or_default(&entry.source_key, DEFAULT_SOURCE_KEY),
            source: or_default(&entry.source_name, DEFAULT_SOURCE),
            title: or_default(entry.title.as_deref().unwrap_or(""), DEFAULT_TITLE),
            url: entry.link.clone(),
            summary_raw: entry.summary.clone(),
            tags: entry.tags.clone(),
            category: Some(or_default(
                entry.category.as_deref().unwrap_or(""),
                DEFAULT_CATEGORY,
            )),
            fetched_at: fetched_at.to_string(),
            published_at: entry.published.clone(),
        })
        .collect()
}

fn or_default(value: &str, default: &str) -> String {
    if value.trim().is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

/// Writes the document as indented UTF-8 JSON, replacing `path` atomically.
pub fn write_payload(document: &Document, path: &Path) -> Result<(), StorageError> {
    let text = serde_json::to_string_pretty(document)?;
    write_atomic(path, text.as_bytes())?;
    tracing::info!(
        path = %path.display(),
        entries = document.entries.len(),
        "Wrote payload"
    );
    Ok(())
}

/// Atomically replace `path` using write-to-temp-then-rename, creating parent
/// directories as needed. The destination is never left half-written.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StorageError> {
    let io_err = |source: std::io::Error| StorageError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }

    use std::time::{SystemTime, UNIX_EPOCH};
    let random_suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = path.with_extension(format!("tmp.{:016x}", random_suffix));

    let mut temp_file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)
        .map_err(io_err)?;

    let written = temp_file
        .write_all(contents)
        .and_then(|()| temp_file.sync_all());
    drop(temp_file);

    if let Err(e) = written {
        let _ = std::fs::remove_file(&temp_path);
        return Err(io_err(e));
    }

    std::fs::rename(&temp_path, path).map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        io_err(e)
    })
}

/// Loads a payload for rendering.
///
/// Accepts the current `{meta, entries}` object or the legacy bare array.
/// An absent, null, empty or non-object `meta` yields `None`; a `meta`
/// field of the wrong type is dropped rather than failing the load.
pub fn load_entries(path: &Path) -> Result<(Vec<PayloadEntry>, Option<RunMeta>), LoadError> {
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(LoadError::NotFound(path.to_path_buf()));
        }
        Err(e) => return Err(LoadError::Io(e)),
    };

    let (entries, meta) = match serde_json::from_str::<Value>(&text)? {
        Value::Object(mut map) => {
            let entries = map.remove("entries").ok_or(LoadError::MissingEntries)?;
            (entries, parse_meta(map.remove("meta"))?)
        }
        array @ Value::Array(_) => (array, None),
        _ => return Err(LoadError::UnexpectedShape),
    };

    let Value::Array(items) = entries else {
        return Err(LoadError::EntriesNotArray);
    };

    let entries = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| parse_entry(index, item))
        .collect::<Result<Vec<_>, _>>()?;

    tracing::info!(
        path = %path.display(),
        entries = entries.len(),
        has_meta = meta.is_some(),
        "Loaded payload"
    );
    Ok((entries, meta))
}

fn parse_meta(meta: Option<Value>) -> Result<Option<RunMeta>, LoadError> {
    match meta {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) if map.is_empty() => Ok(None),
        Some(value @ Value::Object(_)) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| LoadError::InvalidMeta(e.to_string())),
        Some(other) => {
            tracing::warn!(meta = %other, "Payload 'meta' is not an object, ignoring it");
            Ok(None)
        }
    }
}

fn parse_entry(index: usize, item: Value) -> Result<PayloadEntry, LoadError> {
    let Value::Object(ref fields) = item else {
        return Err(LoadError::EntryNotObject(index));
    };

    let missing: Vec<&'static str> = REQUIRED_FIELDS
        .into_iter()
        .filter(|field| !fields.contains_key(*field))
        .collect();
    if !missing.is_empty() {
        return Err(LoadError::MissingFields {
            index,
            fields: missing,
        });
    }

    serde_json::from_value(item).map_err(|source| LoadError::InvalidEntry { index, source })
}
