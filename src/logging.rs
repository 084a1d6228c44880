use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{BiofilterError, Result};

/// Installs a global fmt subscriber filtered by `level` (an `EnvFilter` directive).
///
/// Returns `Ok(false)` when a subscriber was already installed.
pub fn init_logging(level: &str) -> Result<bool> {
    let filter = EnvFilter::try_new(level)
        .map_err(|e| BiofilterError::Config(format!("invalid log level: {e}")))?;
    Ok(fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok())
}
