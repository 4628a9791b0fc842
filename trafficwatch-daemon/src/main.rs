use anyhow::Result;
use clap::Parser;

use trafficwatch_daemon::cli::DaemonCli;
use trafficwatch_daemon::logging;
use trafficwatch_daemon::orchestrator::Orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    // CLI > env > file > defaults
    let config = cli.resolve_config().await?;

    if cli.validate {
        println!("configuration is valid");
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "trafficwatch starting");

    let mut orchestrator = Orchestrator::build_from_config(config)?;
    if let Err(e) = orchestrator.run().await {
        tracing::error!(error = %e, "trafficwatch failed");
        return Err(e);
    }

    Ok(())
}
