//! PixHook keep-alive - pings a deployed server so the host does not idle it.
//!
//! Usage: `pixhook-keepalive https://pixhook.example.com [--frequent]`

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pixhook::keepalive::{KeepAlive, DEFAULT_INTERVAL, FREQUENT_INTERVAL};
use pixhook::shutdown::shutdown_signal;

#[derive(Parser, Debug)]
#[command(name = "pixhook-keepalive", about = "Keep a PixHook server awake")]
struct Cli {
    /// Base URL of the server; `/health` is appended.
    #[arg(default_value = "http://localhost:3000")]
    url: String,

    /// Ping every minute instead of every five minutes.
    #[arg(long)]
    frequent: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    let cli = Cli::parse();
    let interval = if cli.frequent {
        FREQUENT_INTERVAL
    } else {
        DEFAULT_INTERVAL
    };

    let prober = KeepAlive::new(&cli.url, interval)?;
    info!(
        target_url = %prober.target(),
        frequent = cli.frequent,
        "keepalive_starting"
    );

    prober.run(shutdown_signal()).await;

    Ok(())
}
