//! Logging initialization for trafficwatch.
//!
//! Diagnostics go to stderr so that stdout carries only notifier output
//! (traffic summaries and alerts).

use anyhow::Result;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use trafficwatch_core::config::GeneralConfig;

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `config.log_level`. Output goes to
/// stderr in either `json` lines or the human-readable `pretty` layout.
///
/// # Errors
///
/// Fails on an unknown `log_format` or if a global subscriber is already set.
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let format_layer = match config.log_format.as_str() {
        "json" => fmt::layer().json().with_writer(std::io::stderr).boxed(),
        "pretty" => fmt::layer().pretty().with_writer(std::io::stderr).boxed(),
        other => anyhow::bail!("unknown log format '{}', expected 'json' or 'pretty'", other),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(format_layer)
        .try_init()
        .map_err(|e| {
            anyhow::anyhow!(
                "failed to initialize {} tracing subscriber: {}",
                config.log_format,
                e
            )
        })
}
