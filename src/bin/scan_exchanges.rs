//! Scan Exchanges Binary
//!
//! One-shot batch discovery over the configured factories. Prints the
//! discovered exchanges as an `[[exchanges]]` block that can be pasted into
//! the service configuration (weights default to zero).
//!
//! Usage:
//!   scan-exchanges --config config.toml
//!   scan-exchanges --config config.toml --out exchanges.toml

use anyhow::{Context, Result};
use clap::Parser;
use lp_distributor::config::load_config;
use lp_distributor::registry::{ExchangeRegistry, RegistryBuilder};
use lp_distributor::{AlloyTransport, ResilientClient};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "scan-exchanges", about = "Enumerate factory exchanges and print a config block")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "LP_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// Override the gateway RPC endpoint
    #[arg(long)]
    rpc_url: Option<String>,

    /// Write the block to this file instead of stdout
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    // Logs go to stderr so stdout carries only the config block
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&args.config)?.with_rpc_override(args.rpc_url.clone());
    let factories = config.factory_addresses()?;

    let transport = AlloyTransport::connect(&config.gateway.api_address)
        .await
        .context("Failed to connect to RPC")?;
    let client = ResilientClient::new(
        Arc::new(transport),
        config.protocol,
        config.client_settings(),
    );

    let builder = RegistryBuilder::new(Arc::new(client), ExchangeRegistry::new(), factories);
    let stats = builder.discover_all().await;

    let block = builder
        .registry()
        .render_config_block()
        .context("Failed to render exchanges block")?;

    match &args.out {
        Some(path) => {
            std::fs::write(path, &block)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(
                "Wrote {} exchanges ({} skipped) to {}",
                stats.registered,
                stats.skipped,
                path.display()
            );
        }
        None => print!("{}", block),
    }

    Ok(())
}
