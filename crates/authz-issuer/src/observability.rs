//! Tracing initialization with a configurable and reloadable log level.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

static LOG_RELOAD_HANDLE: OnceLock<reload::Handle<EnvFilter, tracing_subscriber::Registry>> =
    OnceLock::new();

/// Initializes tracing at `info`, or as `RUST_LOG` says.
pub fn init_tracing() {
    init_tracing_with_level("info");
}

/// Initializes tracing with `level` unless `RUST_LOG` is set.
///
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init_tracing_with_level(level: &str) {
    let base_filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(level));

    let (reload_layer, handle) = reload::Layer::new(base_filter);
    let _ = LOG_RELOAD_HANDLE.set(handle);

    let _ = tracing_subscriber::registry()
        .with(reload_layer)
        .with(fmt::layer())
        .try_init();
}

/// Applies a new logging level at runtime.
///
/// Returns `false` if tracing was not initialized through this module.
pub fn apply_logging_level(level: &str) -> bool {
    LOG_RELOAD_HANDLE
        .get()
        .is_some_and(|handle| handle.modify(|f| *f = EnvFilter::new(level)).is_ok())
}
