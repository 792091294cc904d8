//! Logging setup for processes embedding the administrative layer
//!
//! Console output is filtered by `RUST_LOG` (falling back to the configured
//! level). File output goes to a rolling `sysdb.log` under `log_dir`.

use std::path::PathBuf;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

const LOG_FILE_NAME: &str = "sysdb.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRotation {
    Daily,
    Hourly,
    Never,
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Daily => Rotation::DAILY,
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Never => Rotation::NEVER,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub log_dir: PathBuf,
    pub console_output: bool,
    pub console_level: Level,
    pub file_logging: bool,
    pub file_level: Level,
    pub rotation: LogRotation,
}

fn default_log_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(format!("{}/sysdb/logs", home))
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            console_output: true,
            console_level: Level::INFO,
            file_logging: false,
            file_level: Level::INFO,
            rotation: LogRotation::Daily,
        }
    }
}

impl LoggingConfig {
    /// Read `SYSDB_LOG_*` variables, defaulting anything unset
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let flag = |key: &str, default: bool| {
            var(key)
                .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1"))
                .unwrap_or(default)
        };
        let console_level = var("SYSDB_LOG_LEVEL")
            .and_then(|v| v.parse().ok())
            .unwrap_or(Level::INFO);
        let rotation = match var("SYSDB_LOG_ROTATION").as_deref() {
            Some("hourly") => LogRotation::Hourly,
            Some("never") => LogRotation::Never,
            _ => LogRotation::Daily,
        };

        Self {
            log_dir: var("SYSDB_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(default_log_dir),
            console_output: flag("SYSDB_LOG_CONSOLE", true),
            console_level,
            file_logging: flag("SYSDB_LOG_FILE", false),
            file_level: var("SYSDB_LOG_FILE_LEVEL")
                .and_then(|v| v.parse().ok())
                .unwrap_or(console_level),
            rotation,
        }
    }
}

/// Keeps the file writer alive; dropping it flushes buffered output
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Install the global `tracing` subscriber
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<LoggingGuard> {
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    if config.console_output {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.console_level.to_string()));
        layers.push(Box::new(
            fmt::layer()
                .with_target(true)
                .with_thread_names(true)
                .with_filter(filter),
        ));
    }

    let mut file_guard = None;
    if config.file_logging {
        std::fs::create_dir_all(&config.log_dir)?;
        let appender =
            RollingFileAppender::new(config.rotation.into(), &config.log_dir, LOG_FILE_NAME);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        file_guard = Some(guard);
        layers.push(Box::new(
            fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false)
                .with_filter(EnvFilter::new(config.file_level.to_string())),
        ));
    }

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    if config.file_logging {
        tracing::info!(log_dir = %config.log_dir.display(), "file logging initialized");
    }
    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}
