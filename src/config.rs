//! Configuration management
//!
//! Settings come from a TOML file; `.env` is loaded first so `RPC_URL` can
//! override the gateway address without editing the file.

use crate::rpc::ClientSettings;
use crate::types::ProtocolVersion;
use alloy::primitives::Address;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Top-level TOML configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub protocol: ProtocolVersion,
    #[serde(default)]
    pub factories: Vec<String>,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub store: StoreConfig,
    /// Expected exchange list, checked against the chain at startup
    #[serde(default)]
    pub exchanges: Vec<ExchangeConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_api_address")]
    pub api_address: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self { api_address: default_api_address() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_retry_interval")]
    pub retry_interval_ms: u64,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            retry_interval_ms: default_retry_interval(),
            retry_count: default_retry_count(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_true")]
    pub get_exchanges: bool,
    #[serde(default)]
    pub check_exchanges: bool,
    #[serde(default)]
    pub watch_exchanges: bool,
    #[serde(default = "default_log_poll_interval")]
    pub log_poll_interval_ms: u64,
    #[serde(default = "default_max_block_range")]
    pub max_block_range: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            get_exchanges: true,
            check_exchanges: false,
            watch_exchanges: false,
            log_poll_interval_ms: default_log_poll_interval(),
            max_block_range: default_max_block_range(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    pub state_file: Option<PathBuf>,
}

/// One `[[exchanges]]` table.
///
/// V1 entries set `token`, V2 entries set `token0`/`token1`. Addresses stay
/// strings here; they are parsed (and rejected) during verification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pairs: Option<String>,
    pub exchange: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token0: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token1: Option<String>,
    #[serde(default)]
    pub creation_height: u64,
    #[serde(default)]
    pub liquid_weight: u64,
    #[serde(default)]
    pub trade_weight: u64,
}

/// Wrapper used to emit and re-read a bare `[[exchanges]]` block
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExchangesSection {
    #[serde(default)]
    pub exchanges: Vec<ExchangeConfig>,
}

fn default_api_address() -> String { "ws://127.0.0.1:8546".to_string() }
fn default_retry_interval() -> u64 { 1000 }
fn default_retry_count() -> u32 { 3 }
fn default_true() -> bool { true }
fn default_log_poll_interval() -> u64 { 5000 }
fn default_max_block_range() -> u64 { 2000 }

impl AppConfig {
    /// Parse a TOML file without touching the environment
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).with_context(|| "Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.factory_addresses()?;
        if self.rpc.retry_count == 0 {
            bail!("rpc.retry_count must be at least 1");
        }
        if self.sync.max_block_range == 0 {
            bail!("sync.max_block_range must be at least 1");
        }
        if (self.sync.get_exchanges || self.sync.watch_exchanges) && self.factories.is_empty() {
            bail!("no factories configured but exchange discovery is enabled");
        }
        Ok(())
    }

    /// Replace the gateway address when an override is present
    pub fn with_rpc_override(mut self, rpc_url: Option<String>) -> Self {
        if let Some(url) = rpc_url.filter(|u| !u.trim().is_empty()) {
            self.gateway.api_address = url;
        }
        self
    }

    pub fn factory_addresses(&self) -> Result<Vec<Address>> {
        self.factories
            .iter()
            .map(|f| {
                Address::from_str(f.trim())
                    .with_context(|| format!("Invalid factory address: {}", f))
            })
            .collect()
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            retry_interval: Duration::from_millis(self.rpc.retry_interval_ms),
            retry_count: self.rpc.retry_count,
        }
    }

    pub fn log_poll_interval(&self) -> Duration {
        Duration::from_millis(self.sync.log_poll_interval_ms)
    }
}

/// Load `.env`, then the TOML file, then apply `RPC_URL`
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    dotenv::dotenv().ok();

    let config = AppConfig::load(path)?;
    Ok(config.with_rpc_override(std::env::var("RPC_URL").ok()))
}
