use anyhow::{Context, Result};
use clap::Parser;
use ladder_maker::config::DEFAULT_CONFIG_FILE;
use ladder_maker::{load_config, logging, signals, LadderService};
use std::path::PathBuf;
use tracing::{error, info};

/// Constant-interval ladder market maker
#[derive(Debug, Parser)]
#[command(name = "ladder-maker", version, about)]
struct Args {
    /// Configuration file
    #[arg(short, long, env = "LADDER_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Run a single tick of every ladder and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config.display()))?;

    logging::initialize_logging(&config.logging)?;

    info!("Starting ladder-maker v{}", env!("CARGO_PKG_VERSION"));
    info!("Exchange: {}, markets: {}", config.exchange.name, config.markets.len());

    let service = LadderService::new(config).await?;

    if args.once {
        let failures = service.run_once().await.into_iter().filter(|o| o.is_err()).count();
        if failures > 0 {
            error!("{} ladders failed their tick", failures);
            std::process::exit(1);
        }
        return Ok(());
    }

    let shutdown = signals::setup_signal_handlers()?;
    service.run(shutdown).await?;

    info!("ladder-maker stopped");
    Ok(())
}
