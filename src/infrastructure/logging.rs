//! Logging system initialization
//!
//! Console logging through `tracing-subscriber` with an `EnvFilter`
//! (RUST_LOG wins over the configured level), plus an optional non-blocking
//! file layer for unattended runs.

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::infrastructure::config::LoggingConfig;

// Keeps the file writer alive for the process lifetime.
static LOG_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Initialize the logging system from configuration. Safe to call once per
/// process; later calls fail quietly inside `try_init`.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .context("Invalid log level in configuration")?;

    let console_layer = config.console_output.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    let file_layer = if config.file_output {
        std::fs::create_dir_all(&config.log_dir)
            .with_context(|| format!("Failed to create log directory {}", config.log_dir.display()))?;
        let appender = tracing_appender::rolling::daily(&config.log_dir, "wine-catalog-importer.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = LOG_GUARD.set(guard);
        Some(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer))
    } else {
        None
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();
    Ok(())
}
