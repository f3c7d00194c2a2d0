//! Logging bootstrap.
//!
//! `RUST_LOG` overrides the default `info` filter. Set `EMPORIA_LOG_JSON=1`
//! for one JSON object per line.

use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable that switches output to JSON.
pub const JSON_ENV: &str = "EMPORIA_LOG_JSON";

/// Install the global subscriber. Calling it again is a no-op.
pub fn init_logging() {
    let json = std::env::var(JSON_ENV).is_ok_and(|v| v == "1");
    let builder = fmt()
        .with_env_filter(default_filter())
        .with_target(false);
    // Err only means a subscriber is already installed.
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}
