//! Diagnostic logging setup shared by the `rtox` and `untox` binaries.
//!
//! Logs go to stderr so stdout carries only the remote tox output. The filter
//! is read from `RTOX_LOG` using `tracing-subscriber`'s `EnvFilter` syntax.

use std::io;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "RTOX_LOG";

/// Filter applied when `RTOX_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info";

/// Installs the global subscriber. Calling it twice is harmless.
pub fn init() {
    let filter = filter_from(std::env::var(LOG_ENV).ok().as_deref());
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .with(filter)
        .try_init()
        .ok();
}

fn filter_from(raw: Option<&str>) -> EnvFilter {
    raw.map(str::trim)
        .filter(|directives| !directives.is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}
