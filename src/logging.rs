//! Structured logging bootstrap.

use tracing_subscriber::EnvFilter;

use crate::config::{EnvConfig, DEFAULT_LOG_FILTER};

/// Installs the global `fmt` subscriber writing to stderr.
///
/// Returns false when a subscriber is already installed; the existing one is
/// kept. An unparsable filter falls back to `info`.
pub fn init(config: &EnvConfig) -> bool {
    let filter = EnvFilter::try_new(&config.log_filter)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(config.log_ansi)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}
