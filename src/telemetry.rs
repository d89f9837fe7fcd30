//! Telemetry helpers for structured logging and tracing.

use crate::config::LogLevel;

/// Initialize tracing/telemetry. Users can install their own subscriber; this
/// helper installs a default subscriber if none is set, filtered at `level`, unless
/// `RUST_LOG` is already set in the environment (which always wins).
pub fn init_tracing(level: LogLevel) {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.as_filter_directive()));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
