// Logging setup for the CLI host

use bigexport_config::{LogFormat, LoggingConfig};

/// Initialize tracing from the feed file's `[logging]` table.
///
/// Logs go to stderr; stdout carries the run summaries.
pub fn init_tracing(config: &LoggingConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter =
        EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    // Ignore the error when a subscriber is already installed
    let _ = match config.format {
        LogFormat::Json => tracing::subscriber::set_global_default(
            registry.with(fmt::layer().json().with_writer(std::io::stderr)),
        ),
        LogFormat::Text => tracing::subscriber::set_global_default(
            registry.with(fmt::layer().with_writer(std::io::stderr)),
        ),
    };
}
