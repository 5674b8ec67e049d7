//! Tools to set up a [tracing_subscriber] for the teardown binary.
//!
//! Output always goes to stderr; when a log directory is configured a
//! non-blocking file layer is added so an unattended uninstall leaves an
//! audit trail behind.

use std::path::PathBuf;
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

const LOG_FILE_NAME: &str = "teardown.log";
const DEFAULT_LEVEL: &str = "info";

/// Represents errors while setting up tracing.
#[derive(Error, Debug)]
pub enum TracingError {
    #[error("invalid log filter: {0}")]
    Filter(String),
    #[error("could not start tracing: {0}")]
    Init(String),
}

/// Holds the information required to set up tracing.
#[derive(Debug, Default)]
pub struct TracingConfig {
    level: Option<String>,
    log_dir: Option<PathBuf>,
}

impl TracingConfig {
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    fn filter(&self) -> Result<EnvFilter, TracingError> {
        let directives = self.level.as_deref().unwrap_or(DEFAULT_LEVEL);
        EnvFilter::try_new(directives).map_err(|err| TracingError::Filter(err.to_string()))
    }
}

/// Keeps the non-blocking file writer alive. Dropping the guard flushes and
/// stops the background writer, so it must outlive all instrumented work.
pub struct TracingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initializes the global subscriber as set up in the provided configuration.
pub fn try_init_tracing(config: TracingConfig) -> Result<TracingGuard, TracingError> {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .boxed();

    let (file_layer, file_guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::never(dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    Registry::default()
        .with(config.filter()?)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|err| TracingError::Init(err.to_string()))?;

    Ok(TracingGuard {
        _file_guard: file_guard,
    })
}
