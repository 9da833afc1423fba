//! Process-wide log setup for binaries and shells embedding the crate.
//!
//! Library code logs through the `log` facade; [`init`] routes those records
//! into a `tracing` subscriber so they share one filter and one format with
//! the orchestrator's spans.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use crate::config::LoggingConfig;
use crate::error::{AtelierError, Result};

/// Builds the filter: `RUST_LOG` when set and valid, else the configured level.
pub fn build_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Installs the global subscriber and the `log` bridge. Fails if either is
/// already installed.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(config);

    if config.json {
        let subscriber = Registry::default()
            .with(filter)
            .with(fmt::layer().json().with_current_span(true));
        tracing::subscriber::set_global_default(subscriber)
            .map_err(|e| AtelierError::Logging(e.to_string()))?;
    } else {
        let subscriber = Registry::default().with(filter).with(fmt::layer());
        tracing::subscriber::set_global_default(subscriber)
            .map_err(|e| AtelierError::Logging(e.to_string()))?;
    }

    tracing_log::LogTracer::init().map_err(|e| AtelierError::Logging(e.to_string()))?;

    log::debug!(
        "Logging initialized (level {}, {})",
        config.level,
        if config.json { "json" } else { "plain" }
    );
    Ok(())
}
