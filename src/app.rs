//! The `collect` and `digest` runs, and how their failures map to exit codes.
use crate::config::{ConfigError, FeedsConfig};
use crate::digest::generate_markdown;
use crate::feed::{FetchError, Fetcher};
use crate::merge::merge_entries;
use crate::storage::{
    build_payload, load_entries, write_atomic, write_payload, Document, FailedSource, LoadError,
    RunMeta, StorageError,
};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Number of payload entries echoed at debug level on a collect dry run.
const PREVIEW_ENTRIES: usize = 3;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] FetchError),

    #[error("No enabled sources in {}", .0.display())]
    NoEnabledSources(PathBuf),

    #[error("All {0} sources failed")]
    AllSourcesFailed(usize),

    #[error("No entries to render in {}", .0.display())]
    NoEntries(PathBuf),

    #[error(transparent)]
    Write(#[from] StorageError),
}

impl AppError {
    /// Process exit status for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Config(_) | AppError::Load(_) | AppError::Client(_) => 1,
            AppError::NoEnabledSources(_) | AppError::AllSourcesFailed(_) | AppError::NoEntries(_) => 2,
            AppError::Write(_) => 3,
        }
    }
}

pub fn default_payload_path(date: &str) -> PathBuf {
    PathBuf::from("out").join(format!("raw-{date}.json"))
}

pub fn default_digest_path(date: &str) -> PathBuf {
    PathBuf::from("out").join(format!("digest-{date}.md"))
}

#[derive(Debug, Clone)]
pub struct CollectOptions {
    pub config_path: PathBuf,
    pub output: PathBuf,
    pub dry_run: bool,
}

/// Outcome of a successful collect run.
#[derive(Debug)]
pub struct CollectReport {
    pub document: Document,
    /// `None` on a dry run.
    pub written: Option<PathBuf>,
}

/// Loads the feeds file, fetches every enabled source and writes the payload.
pub async fn collect(opts: &CollectOptions) -> Result<CollectReport, AppError> {
    let config = FeedsConfig::load(&opts.config_path)?;
    let fetcher = Fetcher::from_settings(&config.fetch)?;
    collect_with(&config, &fetcher, opts).await
}

/// [`collect`] with an already loaded config and a caller-supplied fetcher.
pub async fn collect_with(
    config: &FeedsConfig,
    fetcher: &Fetcher,
    opts: &CollectOptions,
) -> Result<CollectReport, AppError> {
    let sources = config.enabled_sources();
    if sources.is_empty() {
        return Err(AppError::NoEnabledSources(opts.config_path.clone()));
    }

    let mut batches = Vec::with_capacity(sources.len());
    let mut failed = Vec::new();
    for source in &sources {
        let entries = fetcher.fetch_source(source).await;
        if entries.is_empty() {
            failed.push(FailedSource::from(*source));
        }
        batches.push(entries);
    }

    if failed.len() == sources.len() {
        return Err(AppError::AllSourcesFailed(sources.len()));
    }

    let raw_entries: usize = batches.iter().map(Vec::len).sum();
    let entries = build_payload(&merge_entries(batches));
    let meta = RunMeta::from_run(raw_entries, &entries, sources.len(), failed);

    tracing::info!(
        sources = sources.len(),
        failed = meta.failed_sources.len(),
        raw = raw_entries,
        unique = entries.len(),
        "Collected entries"
    );
    for source in &meta.failed_sources {
        tracing::warn!(source = %source.key, name = %source.name, "Source produced no entries");
    }

    let document = Document { meta, entries };

    if opts.dry_run {
        tracing::info!(
            entries = document.entries.len(),
            output = %opts.output.display(),
            "Dry run, payload not written"
        );
        for entry in document.entries.iter().take(PREVIEW_ENTRIES) {
            tracing::debug!(entry = ?entry, "Payload preview");
        }
        return Ok(CollectReport {
            document,
            written: None,
        });
    }

    write_payload(&document, &opts.output)?;
    Ok(CollectReport {
        document,
        written: Some(opts.output.clone()),
    })
}

#[derive(Debug, Clone)]
pub struct DigestOptions {
    pub date: String,
    pub input: PathBuf,
    pub output: PathBuf,
    pub dry_run: bool,
}

#[derive(Debug)]
pub struct DigestReport {
    pub markdown: String,
    pub entries: usize,
    /// `None` on a dry run.
    pub written: Option<PathBuf>,
}

/// Renders a payload file to Markdown, writing it unless this is a dry run.
pub fn digest(opts: &DigestOptions) -> Result<DigestReport, AppError> {
    let (entries, meta) = load_entries(&opts.input)?;
    if entries.is_empty() {
        return Err(AppError::NoEntries(opts.input.clone()));
    }

    let markdown = generate_markdown(&entries, &opts.date, meta.as_ref());
    let written = if opts.dry_run {
        None
    } else {
        write_markdown(&opts.output, &markdown)?;
        Some(opts.output.clone())
    };

    Ok(DigestReport {
        markdown,
        entries: entries.len(),
        written,
    })
}

fn write_markdown(path: &Path, markdown: &str) -> Result<(), StorageError> {
    write_atomic(path, markdown.as_bytes())?;
    tracing::info!(path = %path.display(), "Wrote digest");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceKind;
    use crate::storage::PayloadEntry;

    fn digest_opts(dir: &Path, input: &str) -> DigestOptions {
        DigestOptions {
            date: "2025-12-25".into(),
            input: dir.join(input),
            output: dir.join("out").join("digest.md"),
            dry_run: false,
        }
    }

    fn payload_entry(title: &str) -> PayloadEntry {
        PayloadEntry {
            source_key: "k".into(),
            source: "Source".into(),
            title: title.into(),
            url: format!("https://example.com/{title}"),
            summary_raw: "Summary".into(),
            tags: Vec::new(),
            category: Some("news".into()),
            fetched_at: String::new(),
            published_at: "2025-12-25".into(),
        }
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(AppError::Config(ConfigError::MissingSources).exit_code(), 1);
        assert_eq!(AppError::Load(LoadError::MissingEntries).exit_code(), 1);
        assert_eq!(AppError::NoEnabledSources(PathBuf::new()).exit_code(), 2);
        assert_eq!(AppError::AllSourcesFailed(3).exit_code(), 2);
        assert_eq!(AppError::NoEntries(PathBuf::new()).exit_code(), 2);
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let write = AppError::Write(StorageError::Io {
            path: PathBuf::from("out"),
            source: io,
        });
        assert_eq!(write.exit_code(), 3);
    }

    #[test]
    fn test_default_paths() {
        assert_eq!(
            default_payload_path("2025-12-25"),
            PathBuf::from("out/raw-2025-12-25.json")
        );
        assert_eq!(
            default_digest_path("2025-12-25"),
            PathBuf::from("out/digest-2025-12-25.md")
        );
    }

    #[tokio::test]
    async fn test_collect_without_enabled_sources() {
        let config = FeedsConfig::from_yaml(
            "sources:\n  - {key: a, name: A, url: 'https://example.com', type: rss, enabled: false}\n",
        )
        .unwrap();
        assert_eq!(config.sources[0].kind, SourceKind::Rss);

        let fetcher = Fetcher::from_settings(&config.fetch).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let opts = CollectOptions {
            config_path: dir.path().join("feeds.yml"),
            output: dir.path().join("raw.json"),
            dry_run: false,
        };

        let err = collect_with(&config, &fetcher, &opts).await.unwrap_err();
        assert!(matches!(err, AppError::NoEnabledSources(_)));
        assert!(!opts.output.exists());
    }

    #[test]
    fn test_digest_writes_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let entries = vec![payload_entry("one"), payload_entry("two")];
        std::fs::write(
            dir.path().join("raw.json"),
            serde_json::to_string(&entries).unwrap(),
        )
        .unwrap();

        let opts = digest_opts(dir.path(), "raw.json");
        let report = digest(&opts).unwrap();

        assert_eq!(report.entries, 2);
        assert_eq!(report.written.as_deref(), Some(opts.output.as_path()));
        let written = std::fs::read_to_string(&opts.output).unwrap();
        assert_eq!(written, report.markdown);
        assert!(written.starts_with("# Tech digest - 2025-12-25\n"));
    }

    #[test]
    fn test_digest_dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("raw.json"),
            serde_json::to_string(&vec![payload_entry("one")]).unwrap(),
        )
        .unwrap();

        let mut opts = digest_opts(dir.path(), "raw.json");
        opts.dry_run = true;
        let report = digest(&opts).unwrap();

        assert!(report.written.is_none());
        assert!(report.markdown.contains("#### [one](https://example.com/one)"));
        assert!(!opts.output.exists());
    }

    #[test]
    fn test_digest_empty_payload() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("raw.json"), r#"{"meta": {}, "entries": []}"#).unwrap();

        let err = digest(&digest_opts(dir.path(), "raw.json")).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_digest_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = digest(&digest_opts(dir.path(), "missing.json")).unwrap_err();
        assert!(matches!(err, AppError::Load(LoadError::NotFound(_))));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_digest_unwritable_output() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("raw.json"),
            serde_json::to_string(&vec![payload_entry("one")]).unwrap(),
        )
        .unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();

        let mut opts = digest_opts(dir.path(), "raw.json");
        opts.output = blocker.join("digest.md");

        assert_eq!(digest(&opts).unwrap_err().exit_code(), 3);
    }
}
