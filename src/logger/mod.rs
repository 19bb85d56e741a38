//! Process-wide `tracing` subscriber setup.

use std::io::IsTerminal as _;

use tracing_subscriber::EnvFilter;

use crate::core::config::{LogFormat, LoggingConfig};
use crate::core::errors::{KernelError, Result};

/// Build the filter: `RUST_LOG` when set, the configured level otherwise.
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(config.level.trim()).map_err(|err| KernelError::InvalidConfig {
        details: format!("invalid logging.level '{}': {err}", config.level),
    })
}

/// Install the global subscriber, writing to stderr.
///
/// Returns `Ok(false)` if a subscriber was already installed; the existing
/// one stays in place.
pub fn init_logging(config: &LoggingConfig) -> Result<bool> {
    let filter = build_filter(config)?;
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true);

    let installed = match config.format {
        LogFormat::Text => builder.try_init().is_ok(),
        LogFormat::Json => builder.json().with_current_span(false).try_init().is_ok(),
    };
    Ok(installed)
}
