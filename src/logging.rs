//! Log output for applications built on the client.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::Error;

/// Installs a global subscriber logging at `level`, to `log_file` if given or stderr otherwise.
///
/// `RUST_LOG`, when set, takes precedence over `level`.
pub fn init_logging(level: &str, log_file: Option<&Path>) -> Result<(), Error> {
    let level: tracing::Level = level
        .parse()
        .map_err(|_| Error::InvalidLogLevel(level.to_string()))?;

    let default_filter = format!("additive={}", level.as_str().to_lowercase());
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&default_filter));

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(true),
            )
        }
        None => None,
    };
    let stderr_layer = match file_layer {
        Some(_) => None,
        None => Some(fmt::layer().with_writer(std::io::stderr)),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))?;

    tracing::debug!(%level, "logging initialized");
    Ok(())
}
