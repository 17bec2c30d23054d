//! Logging system configuration and initialization
//!
//! This module provides the logging setup with:
//! - Console output (stderr, so stdout stays free for the run summary)
//! - Optional daily-rolling file output in the log directory
//! - Optional structured JSON formatting
//! - Local-time timestamps

use anyhow::{Result, anyhow};
use chrono::Local;
use lazy_static::lazy_static;
use std::path::Path;
use std::sync::Mutex;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    Layer,
};

pub use crate::infrastructure::config::LoggingConfig;

/// Log file name prefix; the appender adds the date.
pub const LOG_FILE_PREFIX: &str = "photo-harvest.log";

// Global guard to keep the log file writer alive
lazy_static! {
    static ref LOG_GUARDS: Mutex<Vec<tracing_appender::non_blocking::WorkerGuard>> = Mutex::new(Vec::new());
}

/// Local time formatter with millisecond precision
struct LocalTimeFormatter;

impl FormatTime for LocalTimeFormatter {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

/// Build the filter, honouring `RUST_LOG` when present.
///
/// Unless the level is `trace`, chatty dependency targets are capped so that
/// per-request and per-token parser logs do not drown the harvest progress.
pub fn build_env_filter(level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let mut filter = EnvFilter::try_new(level).map_err(|e| anyhow!("Invalid log level '{}': {}", level, e))?;
    if !level.to_lowercase().contains("trace") {
        for directive in ["reqwest=info", "hyper=warn", "hyper_util=warn", "h2=warn", "html5ever=warn", "selectors=warn"] {
            filter = filter.add_directive(directive.parse().map_err(|e| anyhow!("Invalid directive {}: {}", directive, e))?);
        }
        let own = format!("photo_harvest_lib={level}");
        filter = filter.add_directive(own.parse().map_err(|e| anyhow!("Invalid directive {}: {}", own, e))?);
    }
    Ok(filter)
}

/// Initialize logging with the given configuration
///
/// `log_dir` is only touched when file output is enabled.
pub fn init_logging_with_config(config: &LoggingConfig, log_dir: &Path) -> Result<()> {
    let env_filter = build_env_filter(&config.level)?;

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    if config.file_output {
        std::fs::create_dir_all(log_dir).map_err(|e| anyhow!("Failed to create log directory {:?}: {}", log_dir, e))?;

        let file_appender = rolling::daily(log_dir, LOG_FILE_PREFIX);
        let (file_writer, file_guard) = non_blocking(file_appender);

        // Store the guard globally to prevent it from being dropped
        LOG_GUARDS
            .lock()
            .map_err(|_| anyhow!("Log guard registry is poisoned"))?
            .push(file_guard);

        let file_layer = fmt::Layer::new()
            .with_writer(file_writer)
            .with_timer(LocalTimeFormatter)
            .with_ansi(false);
        if config.json_format {
            layers.push(file_layer.json().with_target(true).with_file(true).with_line_number(true).boxed());
        } else {
            layers.push(file_layer.with_target(false).boxed());
        }
    }

    if config.console_output {
        let console_layer = fmt::Layer::new()
            .with_writer(std::io::stderr)
            .with_timer(LocalTimeFormatter)
            .with_target(false);
        if config.json_format {
            layers.push(console_layer.json().boxed());
        } else {
            layers.push(console_layer.boxed());
        }
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    tracing::info!(
        level = %config.level,
        file_output = config.file_output,
        json = config.json_format,
        "Logging initialized"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_accepts_levels() {
        for level in ["error", "warn", "info", "debug", "trace"] {
            assert!(build_env_filter(level).is_ok(), "level {level} should parse");
        }
    }
}
