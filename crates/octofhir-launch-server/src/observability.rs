//! Tracing setup for the launch server.
//!
//! The subscriber starts at `info` so configuration loading is visible, then
//! switches to the configured [`LoggingConfig::level`]. `RUST_LOG`, when set,
//! wins over both. HTTP client internals stay at `warn` unless logging is off.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

use crate::config::LoggingConfig;

const STARTUP_LEVEL: &str = "info";

/// Directives appended to every configured level.
const QUIET_DEPENDENCIES: &str = "hyper_util=warn,reqwest=warn";

static FILTER_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

fn filter_for(level: &str) -> EnvFilter {
    if level.eq_ignore_ascii_case("off") {
        return EnvFilter::new("off");
    }
    EnvFilter::new(format!("{level},{QUIET_DEPENDENCIES}"))
}

fn rust_log_set() -> bool {
    std::env::var_os("RUST_LOG").is_some()
}

/// Installs the global subscriber. Later calls do nothing.
pub fn init_tracing() {
    if FILTER_HANDLE.get().is_some() {
        return;
    }

    let filter = if rust_log_set() {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| filter_for(STARTUP_LEVEL))
    } else {
        filter_for(STARTUP_LEVEL)
    };
    let (reload_layer, handle) = reload::Layer::new(filter);

    if tracing_subscriber::registry()
        .with(reload_layer)
        .with(fmt::layer())
        .try_init()
        .is_ok()
    {
        let _ = FILTER_HANDLE.set(handle);
    }
}

/// Switches the running subscriber to the configured level.
///
/// Returns `false` when `RUST_LOG` governs filtering or [`init_tracing`] did
/// not install the subscriber.
pub fn apply_logging(logging: &LoggingConfig) -> bool {
    if rust_log_set() {
        return false;
    }
    let Some(handle) = FILTER_HANDLE.get() else {
        return false;
    };

    match handle.reload(filter_for(&logging.level)) {
        Ok(()) => {
            tracing::debug!(level = %logging.level, "Log level applied");
            true
        }
        Err(e) => {
            eprintln!("Warning: failed to apply log level: {e}");
            false
        }
    }
}
