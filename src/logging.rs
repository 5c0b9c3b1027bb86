//! Per-run tracing setup: console plus an optional log file.
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to open log file '{}': {source}", path.display())]
    File {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Logging already initialized: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogDestination {
    Console,
    File(PathBuf),
}

/// Where a run logs and how verbosely the console does.
///
/// File destinations always record at DEBUG.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: Level,
    pub destinations: Vec<LogDestination>,
}

impl LogConfig {
    pub fn for_run(verbose: bool, log_file: Option<PathBuf>) -> Self {
        let mut destinations = vec![LogDestination::Console];
        destinations.extend(log_file.map(LogDestination::File));
        Self {
            level: if verbose { Level::DEBUG } else { Level::INFO },
            destinations,
        }
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Installs the global subscriber. Fails if one is already set.
pub fn init(config: &LogConfig) -> Result<(), LoggingError> {
    let mut layers: Vec<BoxedLayer> = Vec::with_capacity(config.destinations.len());

    for destination in &config.destinations {
        match destination {
            LogDestination::Console => {
                // RUST_LOG wins over the verbosity flag
                let filter = EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| crate_filter(config.level));
                layers.push(
                    tracing_subscriber::fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_filter(filter)
                        .boxed(),
                );
            }
            LogDestination::File(path) => {
                let file = open_log_file(path)?;
                layers.push(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file))
                        .with_filter(crate_filter(Level::DEBUG))
                        .boxed(),
                );
            }
        }
    }

    tracing_subscriber::registry().with(layers).try_init()?;
    Ok(())
}

fn crate_filter(level: Level) -> EnvFilter {
    EnvFilter::new(format!(
        "warn,{}={}",
        env!("CARGO_CRATE_NAME"),
        level.as_str().to_ascii_lowercase()
    ))
}

fn open_log_file(path: &Path) -> Result<File, LoggingError> {
    let file_err = |source: std::io::Error| LoggingError::File {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(file_err)?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(file_err)
}
