//! Tracing setup for the guardpost binary.

use std::fs::{self, OpenOptions};
use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::logs_dir;

const DEFAULT_LOG_FILTER: &str = "guardpost=info";
const VERBOSE_LOG_FILTER: &str = "guardpost=debug";

/// Logging configuration for the binary.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    pub verbose: bool,
    pub log_to_file: bool,
}

/// Initialize tracing with a stderr layer and an optional append-to-file
/// layer under the guardpost logs directory. Filter override via
/// `GUARDPOST_LOG`.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let console_filter = EnvFilter::try_from_env("GUARDPOST_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if config.verbose {
            VERBOSE_LOG_FILTER
        } else {
            DEFAULT_LOG_FILTER
        })
    });

    let file_layer = if config.log_to_file {
        let dir = logs_dir();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create logs directory: {}", dir.display()))?;
        let path = dir.join(format!("{}.log", config.app_name));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;
        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(Arc::new(file))
                .with_ansi(false)
                .with_filter(EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(file_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_filter(console_filter),
        )
        .init();

    Ok(())
}
