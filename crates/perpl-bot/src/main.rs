//! PerplBot entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Trading agent toolkit for a perpetual-futures DEX.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (also settable via PERPL_CONFIG).
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    perpl_bot::init_logging();
    info!("Starting PerplBot v{}", env!("CARGO_PKG_VERSION"));

    let config = match args.config {
        Some(path) => perpl_bot::BotConfig::from_file(&path)?,
        None => perpl_bot::BotConfig::load()?,
    };
    info!(
        chain_id = config.chain_id,
        markets = config.markets.len(),
        "Configuration loaded"
    );

    let app = perpl_bot::Application::build(config).await?;
    app.run().await?;
    Ok(())
}
