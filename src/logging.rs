//! Tracing subscriber installation for the binary.

use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{BenchError, Result};

/// Maps the `--debug` switch onto a default filter directive.
pub fn default_level(debug: bool) -> &'static str {
    if debug {
        "debug"
    } else {
        "info"
    }
}

/// Installs a global `fmt` subscriber.
///
/// `RUST_LOG` takes precedence over `level` when it is set and parses.
pub fn init_logging(level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .map_err(|e| BenchError::Configuration(format!("invalid log level: {e}")))?,
    };
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|_| BenchError::Configuration("logging already initialized".into()))
}
