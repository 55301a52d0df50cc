//! LP Distributor service
//!
//! Discovers every exchange of the configured factories, snapshots their
//! liquidity, hands the snapshot to the distributor, then keeps watching the
//! factories for new exchanges.
//!
//! Usage:
//!   lp-distributor --config config.toml
//!   lp-distributor --config config.toml --sync-only

use anyhow::{Context, Result};
use clap::Parser;
use lp_distributor::config::load_config;
use lp_distributor::orchestrator::{Orchestrator, OrchestratorSettings};
use lp_distributor::registry::{ExchangeRegistry, RegistryBuilder};
use lp_distributor::rpc::retry_forever;
use lp_distributor::rpc::transport::redact_url;
use lp_distributor::store::{seed_registry, JsonStateStore, RegistryStore};
use lp_distributor::{AlloyTransport, ResilientClient, SnapshotDistributor};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

const DIAL_RETRY_INTERVAL: Duration = Duration::from_secs(3);

/// Exchange registry and liquidity reward service for V1/V2 factories
#[derive(Parser)]
#[command(name = "lp-distributor")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "LP_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// Stop after exchange discovery
    #[arg(long)]
    sync_only: bool,

    /// Override the gateway RPC endpoint
    #[arg(long)]
    rpc_url: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, env = "JSON_LOGS")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if args.json_logs {
        fmt().json().with_env_filter(filter).init();
    } else {
        fmt().with_env_filter(filter).with_target(false).init();
    }

    info!("===========================================");
    info!("   LP Distributor");
    info!("===========================================");

    let config = load_config(&args.config)?.with_rpc_override(args.rpc_url.clone());
    let factories = config.factory_addresses()?;
    info!(
        "Configuration loaded: protocol {}, {} factories, {} configured exchanges",
        config.protocol,
        factories.len(),
        config.exchanges.len()
    );

    // Dial until the node answers
    let url = config.gateway.api_address.as_str();
    let what = format!("dial {}", redact_url(url));
    let transport = retry_forever(DIAL_RETRY_INTERVAL, &what, || AlloyTransport::connect(url)).await;
    let client = Arc::new(ResilientClient::new(
        Arc::new(transport),
        config.protocol,
        config.client_settings(),
    ));

    // Persisted state seeds the registry before discovery
    let store = Arc::new(match &config.store.state_file {
        Some(path) => JsonStateStore::open(path)
            .with_context(|| format!("Failed to open state file {}", path.display()))?,
        None => JsonStateStore::in_memory(),
    });
    let registry = ExchangeRegistry::new();
    let seeded = seed_registry(&store.load()?, &registry);
    if seeded > 0 {
        info!("Seeded registry with {} stored records", seeded);
    }

    let store: Arc<dyn RegistryStore> = store;
    let builder = Arc::new(
        RegistryBuilder::new(client, registry, factories).with_store(Arc::clone(&store)),
    );
    let distributor = Arc::new(
        SnapshotDistributor::from_config(&config.exchanges).with_store(Arc::clone(&store)),
    );

    let settings = OrchestratorSettings {
        check_exchanges: config.sync.check_exchanges,
        get_exchanges: config.sync.get_exchanges,
        watch_exchanges: config.sync.watch_exchanges,
        sync_only: args.sync_only,
        log_poll_interval: config.log_poll_interval(),
        max_block_range: config.sync.max_block_range,
    };
    let orchestrator = Orchestrator::new(settings, builder, distributor)
        .with_expected_exchanges(config.exchanges.clone())
        .with_store(store);

    if let Err(e) = orchestrator.run().await {
        error!("Fatal: {:#}", e);
        return Err(e);
    }

    info!("Sync-only run finished");
    Ok(())
}
