//! CLI argument definitions for trafficwatch.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.
//! Every flag is optional; unset flags fall back to the environment,
//! then the configuration file, then built-in defaults.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use trafficwatch_core::config::TrafficwatchConfig;

/// HTTP access log monitor.
///
/// Tails a growing access log, prints per-section traffic summaries on a
/// fixed interval and raises an alert when total traffic over a sliding
/// window exceeds a threshold.
#[derive(Parser, Debug, Default)]
#[command(name = "trafficwatch")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Access log file to tail [default: access.log].
    #[arg(long)]
    pub file: Option<String>,

    /// Seconds between traffic summaries [default: 10].
    #[arg(long, value_name = "SECS")]
    pub monitor: Option<u64>,

    /// Sliding alert window in seconds [default: 120].
    #[arg(long, value_name = "SECS")]
    pub duration: Option<u64>,

    /// Requests within the window that trigger an alert [default: 1000].
    #[arg(long, value_name = "REQUESTS")]
    pub traffic: Option<u64>,

    /// Path to a trafficwatch.toml configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Group statistics by request path section or by host (path, host).
    #[arg(long)]
    pub group_by: Option<String>,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration and exit without tailing the file.
    #[arg(long)]
    pub validate: bool,
}

impl DaemonCli {
    /// Build the effective configuration.
    ///
    /// Precedence: CLI flags > `TRAFFICWATCH_*` environment variables >
    /// configuration file > defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be read or parsed,
    /// or if the merged configuration fails validation.
    pub async fn resolve_config(&self) -> Result<TrafficwatchConfig> {
        let mut config = match &self.config {
            Some(path) => TrafficwatchConfig::from_file(path).await.map_err(|e| {
                anyhow::anyhow!("failed to load config '{}': {}", path.display(), e)
            })?,
            None => TrafficwatchConfig::default(),
        };

        config.apply_env_overrides();
        self.apply_overrides(&mut config);

        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;
        Ok(config)
    }

    /// Apply the flags that were given on the command line.
    pub fn apply_overrides(&self, config: &mut TrafficwatchConfig) {
        if let Some(file) = &self.file {
            config.source.path.clone_from(file);
        }
        if let Some(secs) = self.monitor {
            config.statistics.interval_secs = secs;
        }
        if let Some(secs) = self.duration {
            config.alert.window_secs = secs;
        }
        if let Some(threshold) = self.traffic {
            config.alert.threshold = threshold;
        }
        if let Some(group_by) = &self.group_by {
            config.statistics.group_by.clone_from(group_by);
        }
        if let Some(level) = &self.log_level {
            config.general.log_level.clone_from(level);
        }
        if let Some(format) = &self.log_format {
            config.general.log_format.clone_from(format);
        }
    }
}
