//! Feed source configuration parser for `feeds.yml`.
//!
//! Loading is fail-fast: sources are checked in file order and the first
//! violation aborts the whole load. An optional `fetch` block tunes network
//! behavior; any subset of its keys may be given.
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Top-level keys understood in the feeds file.
const KNOWN_KEYS: [&str; 2] = ["sources", "fetch"];

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid YAML in config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Config file is missing the 'sources' key")]
    MissingSources,

    #[error("Source #{index} is missing required fields: {}", .fields.join(", "))]
    MissingFields {
        index: usize,
        fields: Vec<&'static str>,
    },

    #[error("Source '{name}' has unsupported type '{kind}' (expected rss, atom or producthunt)")]
    InvalidType { name: String, kind: String },

    #[error("Duplicate source key '{0}'")]
    DuplicateKey(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// How a source is fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Rss,
    Atom,
    /// Product Hunt GraphQL API
    ProductHunt,
}

impl SourceKind {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "rss" => Some(Self::Rss),
            "atom" => Some(Self::Atom),
            "producthunt" => Some(Self::ProductHunt),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rss => "rss",
            Self::Atom => "atom",
            Self::ProductHunt => "producthunt",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One validated source entry. Immutable once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceConfig {
    pub key: String,
    pub name: String,
    pub url: String,
    pub kind: SourceKind,
    pub tags: Vec<String>,
    pub category: Option<String>,
    pub enabled: bool,
    /// Per-source cap on entries (page size for Product Hunt).
    pub limit: Option<usize>,
}

/// Network tuning for the fetch stage.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub request_timeout_secs: u64,
    /// Total attempts per source, including the first one.
    pub max_attempts: u32,
    pub retry_delay_secs: u64,
    pub max_entries_per_source: usize,
    pub producthunt_page_size: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            max_attempts: 3,
            retry_delay_secs: 2,
            max_entries_per_source: 50,
            producthunt_page_size: 20,
        }
    }
}

impl FetchSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

/// The full contents of the feeds file.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedsConfig {
    pub sources: Vec<SourceConfig>,
    pub fetch: FetchSettings,
}

#[derive(Deserialize)]
struct RawConfig {
    sources: Option<Vec<RawSource>>,
    #[serde(default)]
    fetch: FetchSettings,
}

/// A source as written in YAML, before validation.
#[derive(Deserialize)]
struct RawSource {
    key: Option<String>,
    name: Option<String>,
    url: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    tags: Option<Vec<String>>,
    category: Option<String>,
    enabled: Option<bool>,
    limit: Option<usize>,
}

impl RawSource {
    fn validate(self, index: usize) -> Result<SourceConfig, ConfigError> {
        match (self.key, self.name, self.url, self.kind) {
            (Some(key), Some(name), Some(url), Some(kind)) => {
                let Some(kind) = SourceKind::parse(&kind) else {
                    return Err(ConfigError::InvalidType { name, kind });
                };
                Ok(SourceConfig {
                    key,
                    name,
                    url,
                    kind,
                    tags: self.tags.unwrap_or_default(),
                    category: self.category,
                    enabled: self.enabled.unwrap_or(true),
                    limit: self.limit,
                })
            }
            (key, name, url, kind) => {
                let fields = [
                    ("key", key.is_none()),
                    ("name", name.is_none()),
                    ("url", url.is_none()),
                    ("type", kind.is_none()),
                ]
                .into_iter()
                .filter_map(|(field, missing)| missing.then_some(field))
                .collect();
                Err(ConfigError::MissingFields { index, fields })
            }
        }
    }
}

impl FeedsConfig {
    /// Load and validate the feeds file.
    ///
    /// - Missing file → `Err(ConfigError::NotFound)`
    /// - Invalid YAML → `Err(ConfigError::Parse)`
    /// - Empty document or no `sources` key → `Err(ConfigError::MissingSources)`
    /// - `sources: []` → `Ok` with no sources
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        let config = Self::from_yaml(&content)?;
        tracing::info!(
            path = %path.display(),
            sources = config.sources.len(),
            "Loaded feed configuration"
        );
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let value: serde_yaml::Value = serde_yaml::from_str(content)?;
        if value.is_null() {
            return Err(ConfigError::MissingSources);
        }

        if let Some(map) = value.as_mapping() {
            for key in map.keys().filter_map(|k| k.as_str()) {
                if !KNOWN_KEYS.contains(&key) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let raw: RawConfig = serde_yaml::from_value(value)?;
        let raw_sources = raw.sources.ok_or(ConfigError::MissingSources)?;

        let mut seen_keys = HashSet::with_capacity(raw_sources.len());
        let mut sources = Vec::with_capacity(raw_sources.len());
        for (index, entry) in raw_sources.into_iter().enumerate() {
            let source = entry.validate(index)?;
            if !seen_keys.insert(source.key.clone()) {
                return Err(ConfigError::DuplicateKey(source.key));
            }
            sources.push(source);
        }

        Ok(Self {
            sources,
            fetch: raw.fetch,
        })
    }

    /// Sources with `enabled` set (the default), in file order.
    pub fn enabled_sources(&self) -> Vec<&SourceConfig> {
        self.sources.iter().filter(|s| s.enabled).collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
