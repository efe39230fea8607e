//! Crypto kiosk - entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Live crypto prices, miner and Bitcoin network dashboard
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via KIOSK_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Must run before any TLS connection
    kiosk_ws::init_crypto();

    let args = Args::parse();

    kiosk_telemetry::init_logging()?;

    info!("Starting crypto kiosk v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > KIOSK_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("KIOSK_CONFIG").ok())
        .unwrap_or_else(|| "config.json".to_string());

    info!(config_path = %config_path, "Loading configuration");
    let config = kiosk_app::AppConfig::load_or_default(&config_path);
    info!(
        main = ?config.main_symbols,
        marquee = config.marquee_symbols.len(),
        miners = config.miners_ips.len(),
        "Configuration loaded"
    );

    let app = kiosk_app::Application::new(config)?;
    app.run().await?;

    Ok(())
}
