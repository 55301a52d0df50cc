//! Reward Distribution
//!
//! `RewardDistributor` is the seam where reward allocation plugs in; it is
//! invoked once per `Distribute` phase with the registry and the latest
//! liquidity snapshot. `SnapshotDistributor` records which exchanges took
//! part and their configured weights, without computing payouts.

use crate::config::ExchangeConfig;
use crate::registry::ExchangeRegistry;
use crate::store::RegistryStore;
use crate::types::{DistributionRecord, LiquiditySnapshot};
use alloy::primitives::Address;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

#[async_trait]
pub trait RewardDistributor: Send + Sync {
    async fn distribute(
        &self,
        registry: &ExchangeRegistry,
        snapshot: &LiquiditySnapshot,
    ) -> Result<DistributionRecord>;
}

/// Records a `DistributionRecord` per call
pub struct SnapshotDistributor {
    /// exchange → (liquid weight, trade weight)
    weights: HashMap<Address, (u64, u64)>,
    store: Option<Arc<dyn RegistryStore>>,
}

impl SnapshotDistributor {
    pub fn new() -> Self {
        Self {
            weights: HashMap::new(),
            store: None,
        }
    }

    /// Weights from the `[[exchanges]]` config section. Entries with an
    /// unparsable exchange address are skipped.
    pub fn from_config(exchanges: &[ExchangeConfig]) -> Self {
        let mut weights = HashMap::new();
        for ex in exchanges {
            match Address::from_str(ex.exchange.trim()) {
                Ok(exchange) => {
                    weights.insert(exchange, (ex.liquid_weight, ex.trade_weight));
                }
                Err(e) => warn!("Ignoring weights for exchange '{}': {}", ex.exchange, e),
            }
        }
        Self {
            weights,
            store: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn RegistryStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Configured weights first, then the registry's pair metadata
    fn weights_for(&self, registry: &ExchangeRegistry, exchange: Address) -> (u64, u64) {
        if let Some(w) = self.weights.get(&exchange) {
            return *w;
        }
        registry
            .pair(exchange)
            .map(|p| (p.liquid_weight, p.trade_weight))
            .unwrap_or((0, 0))
    }
}

impl Default for SnapshotDistributor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RewardDistributor for SnapshotDistributor {
    async fn distribute(
        &self,
        registry: &ExchangeRegistry,
        snapshot: &LiquiditySnapshot,
    ) -> Result<DistributionRecord> {
        let weights: Vec<(Address, u64, u64)> = snapshot
            .exchanges
            .iter()
            .map(|e| {
                let (liquid, trade) = self.weights_for(registry, e.exchange);
                (e.exchange, liquid, trade)
            })
            .collect();

        let record = DistributionRecord {
            block_number: snapshot.block.number,
            recorded_at: Utc::now(),
            exchange_count: weights.len(),
            weights,
        };

        if let Some(store) = &self.store {
            store
                .record_distribution(&record)
                .context("Failed to persist distribution record")?;
        }

        let weighted = record
            .weights
            .iter()
            .filter(|(_, liquid, trade)| *liquid > 0 || *trade > 0)
            .count();
        info!(
            "Distribution recorded at block {}: {} exchanges ({} weighted)",
            record.block_number, record.exchange_count, weighted
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::JsonStateStore;
    use crate::types::{BlockHeader, ExchangeLiquidity, PairEntry};
    use alloy::primitives::{address, B256, U256};

    const T1: Address = address!("0x1000000000000000000000000000000000000001");
    const T2: Address = address!("0x1000000000000000000000000000000000000002");
    const E1: Address = address!("0xe000000000000000000000000000000000000001");
    const E2: Address = address!("0xe000000000000000000000000000000000000002");
    const E3: Address = address!("0xe000000000000000000000000000000000000003");

    fn snapshot(exchanges: &[Address]) -> LiquiditySnapshot {
        LiquiditySnapshot {
            block: BlockHeader {
                number: 42,
                hash: B256::ZERO,
                timestamp: 0,
            },
            taken_at: Utc::now(),
            exchanges: exchanges
                .iter()
                .map(|e| ExchangeLiquidity {
                    exchange: *e,
                    liquidity: U256::from(1),
                    coin_balance: U256::ZERO,
                    token_balances: vec![],
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_weights_come_from_config_then_registry() {
        let config = vec![
            ExchangeConfig {
                exchange: E1.to_string(),
                liquid_weight: 3,
                trade_weight: 1,
                ..Default::default()
            },
            ExchangeConfig {
                exchange: "garbage".to_string(),
                liquid_weight: 9,
                ..Default::default()
            },
        ];
        let registry = ExchangeRegistry::new();
        let mut pair = PairEntry::new(T1, T2, E2, "A/B".to_string(), 1);
        pair.trade_weight = 4;
        registry.add_pair(pair);

        let store = Arc::new(JsonStateStore::in_memory());
        let distributor = SnapshotDistributor::from_config(&config)
            .with_store(Arc::clone(&store) as Arc<dyn RegistryStore>);

        let record = distributor
            .distribute(&registry, &snapshot(&[E1, E2, E3]))
            .await
            .unwrap();

        assert_eq!(record.block_number, 42);
        assert_eq!(record.exchange_count, 3);
        assert_eq!(record.weights, vec![(E1, 3, 1), (E2, 0, 4), (E3, 0, 0)]);
        assert_eq!(store.load().unwrap().distributions, vec![record]);
    }
}
