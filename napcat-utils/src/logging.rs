//! Logging infrastructure for napcat
//!
//! Provides unified logging setup using the tracing ecosystem.

use std::path::PathBuf;

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::{paths, NapcatError, Result};

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "NAPCAT_LOG";

/// Log output destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    /// Log to stderr
    Stderr,
    /// Log to file (long-running reverse server)
    File,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Output destination
    pub output: LogOutput,
    /// Log level filter (e.g., "info", "napcat_client=debug")
    pub filter: String,
    /// Include span events (enter/exit)
    pub span_events: bool,
    /// Include file/line in logs
    pub file_line: bool,
    /// Directory for file output (defaults to the XDG log dir)
    pub log_dir: Option<PathBuf>,
    /// Optional custom log file name (defaults to "napcat.log")
    pub file_name: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            output: LogOutput::Stderr,
            filter: "info".into(),
            span_events: false,
            file_line: false,
            log_dir: None,
            file_name: None,
        }
    }
}

impl LogConfig {
    /// Config for one-shot CLI commands (stderr, quiet by default)
    pub fn cli() -> Self {
        Self {
            output: LogOutput::Stderr,
            filter: std::env::var(LOG_ENV).unwrap_or_else(|_| "warn".into()),
            ..Self::default()
        }
    }

    /// Config for the reverse server (file logging)
    pub fn server() -> Self {
        Self {
            output: LogOutput::File,
            filter: std::env::var(LOG_ENV).unwrap_or_else(|_| "info".into()),
            span_events: false,
            file_line: true,
            log_dir: None,
            file_name: Some("napcat-server.log".into()),
        }
    }

    fn log_path(&self) -> (PathBuf, PathBuf) {
        let dir = self.log_dir.clone().unwrap_or_else(paths::log_dir);
        let file = dir.join(self.file_name.as_deref().unwrap_or("napcat.log"));
        (dir, file)
    }
}

/// Initialize logging with custom configuration
pub fn init_logging_with_config(config: LogConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.filter)
        .map_err(|e| NapcatError::config(format!("Invalid log filter: {}", e)))?;

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false);

    let fmt_layer = if config.span_events {
        fmt_layer.with_span_events(FmtSpan::ENTER | FmtSpan::EXIT)
    } else {
        fmt_layer
    };

    let fmt_layer = if config.file_line {
        fmt_layer.with_file(true).with_line_number(true)
    } else {
        fmt_layer.with_file(false).with_line_number(false)
    };

    match config.output {
        LogOutput::Stderr => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer.with_writer(std::io::stderr))
                .try_init()
                .map_err(|e| NapcatError::internal(format!("Failed to init logging: {}", e)))?;
        }
        LogOutput::File => {
            let (log_dir, log_path) = config.log_path();
            std::fs::create_dir_all(&log_dir).map_err(|e| NapcatError::FileWrite {
                path: log_dir.clone(),
                source: e,
            })?;

            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)
                .map_err(|e| NapcatError::FileWrite {
                    path: log_path,
                    source: e,
                })?;

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer.with_writer(file).with_ansi(false))
                .try_init()
                .map_err(|e| NapcatError::internal(format!("Failed to init logging: {}", e)))?;
        }
    }

    Ok(())
}
