//! Logging setup.
//!
//! Library code only emits `tracing` events; the embedding tool decides
//! whether and how they are rendered by calling [`init`] once.

use certgen_types::config::{LogConfig, LogFormat};
use certgen_types::{CertgenError, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the logging system with default configuration.
pub fn init_default() -> Result<()> {
    init(&LogConfig::default())
}

/// Initialize logging from configuration.
///
/// `RUST_LOG` takes precedence over the configured level when set.
pub fn init(config: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_filter()));

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.format {
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
        LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
    };

    result.map_err(|e| CertgenError::Config(format!("Failed to initialize logging: {}", e)))
}
