//! Process orchestration -- pipeline assembly, signal handling and lifecycle.
//!
//! The [`Orchestrator`] turns a validated [`TrafficwatchConfig`] into a running
//! [`TrafficPipeline`], opens the log source (fatal on failure), and runs the
//! pipeline until the source ends or a shutdown signal arrives.

use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use trafficwatch_core::config::TrafficwatchConfig;
use trafficwatch_core::pipeline::{ConsoleNotifier, Notifier};
use trafficwatch_log_pipeline::{PipelineConfig, TrafficPipeline, TrafficPipelineBuilder};

use crate::metrics_server;

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: TrafficwatchConfig,
    /// The traffic pipeline (statistics + alert).
    pipeline: TrafficPipeline,
}

impl Orchestrator {
    /// Build from an already-resolved configuration, printing to stdout.
    pub fn build_from_config(config: TrafficwatchConfig) -> Result<Self> {
        Self::build_with_notifier(config, Arc::new(ConsoleNotifier))
    }

    /// Build with a custom notifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the metrics
    /// recorder cannot be installed.
    pub fn build_with_notifier(
        config: TrafficwatchConfig,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
        }

        let pipeline_config = PipelineConfig::from_core(&config)
            .map_err(|e| anyhow::anyhow!("invalid pipeline config: {}", e))?;
        let pipeline = TrafficPipelineBuilder::new()
            .config(pipeline_config)
            .notifier(notifier)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build traffic pipeline: {}", e))?;

        tracing::info!(
            file = %config.source.path,
            monitor_secs = config.statistics.interval_secs,
            window_secs = config.alert.window_secs,
            threshold = config.alert.threshold,
            group_by = %config.statistics.group_by,
            "orchestrator initialized"
        );

        Ok(Self { config, pipeline })
    }

    /// Open the log source and run until it ends or SIGINT/SIGTERM arrives.
    ///
    /// # Errors
    ///
    /// Returns an error if the log file cannot be opened or signal handlers
    /// cannot be installed. Per-line failures never end the run.
    pub async fn run(&mut self) -> Result<()> {
        let source = self
            .pipeline
            .open_source()
            .await
            .map_err(|e| anyhow::anyhow!("failed to open log source: {}", e))?;

        let token = self.pipeline.shutdown_token();
        let signal_task = tokio::spawn(async move {
            tokio::select! {
                signal = wait_for_shutdown_signal() => {
                    match signal {
                        Ok(name) => {
                            tracing::info!(signal = name, "shutdown signal received");
                            token.cancel();
                        }
                        Err(e) => tracing::error!(error = %e, "signal handling failed"),
                    }
                }
                _ = token.cancelled() => {}
            }
        });

        let result = self.pipeline.run(source).await;
        signal_task.abort();

        result.map_err(|e| anyhow::anyhow!("traffic pipeline failed: {}", e))?;
        tracing::info!(
            processed = self.pipeline.processed_count(),
            "trafficwatch shut down"
        );
        Ok(())
    }

    /// Ask a running orchestrator to stop.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.pipeline.shutdown_token()
    }

    /// Current pipeline state (`initialized`, `running`, `stopped`).
    pub fn state_name(&self) -> &str {
        self.pipeline.state_name()
    }

    /// Events delivered to the statistics and alert monitors.
    pub fn processed_count(&self) -> u64 {
        self.pipeline.processed_count()
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &TrafficwatchConfig {
        &self.config
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("failed to install Ctrl+C handler: {}", e))?;
    Ok("SIGINT")
}
