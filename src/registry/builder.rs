//! Registry Builder
//!
//! Fills the `ExchangeRegistry` from two sources that must agree:
//! - batch: enumerate every configured factory by index
//! - streaming: creation event logs, one at a time
//!
//! Every newly inserted record is written through to the store, which is
//! flushed once per discovery pass.
//! A V2 pair is committed only after both token symbols resolved; a failed
//! symbol lookup drops that pair for this pass.

use crate::error::RpcError;
use crate::registry::events::{classify, CreationEvent};
use crate::registry::ExchangeRegistry;
use crate::rpc::{ChainTransport, ResilientClient};
use crate::store::RegistryStore;
use crate::types::{EventLog, ExchangeEntry, PairEntry, ProtocolVersion};
use alloy::primitives::Address;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Creation height of a streamed pair whose log carries no pair index.
/// Real heights are 1-based.
pub const UNKNOWN_CREATION_HEIGHT: u64 = 0;

/// Counters for one discovery pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoveryStats {
    pub factories: usize,
    /// Indices / ids queried
    pub scanned: u64,
    /// Exchanges (V1) or pairs (V2) newly registered
    pub registered: u64,
    /// Already known
    pub duplicates: u64,
    /// Zero lookups and unresolved symbols
    pub skipped: u64,
}

impl DiscoveryStats {
    fn merge(&mut self, other: DiscoveryStats) {
        self.factories += other.factories;
        self.scanned += other.scanned;
        self.registered += other.registered;
        self.duplicates += other.duplicates;
        self.skipped += other.skipped;
    }
}

pub struct RegistryBuilder<T> {
    client: Arc<ResilientClient<T>>,
    registry: ExchangeRegistry,
    factories: Vec<Address>,
    store: Option<Arc<dyn RegistryStore>>,
}

impl<T: ChainTransport> RegistryBuilder<T> {
    pub fn new(
        client: Arc<ResilientClient<T>>,
        registry: ExchangeRegistry,
        factories: Vec<Address>,
    ) -> Self {
        Self {
            client,
            registry,
            factories,
            store: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn RegistryStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn client(&self) -> &Arc<ResilientClient<T>> {
        &self.client
    }

    pub fn registry(&self) -> &ExchangeRegistry {
        &self.registry
    }

    pub fn factories(&self) -> &[Address] {
        &self.factories
    }

    pub fn protocol(&self) -> ProtocolVersion {
        self.client.protocol()
    }

    // ── Batch discovery ──────────────────────────────────────────────

    /// Scan every configured factory, in configuration order
    pub async fn discover_all(&self) -> DiscoveryStats {
        let mut total = DiscoveryStats::default();
        for factory in &self.factories {
            let stats = match self.protocol() {
                ProtocolVersion::V1 => self.discover_v1_factory(*factory).await,
                ProtocolVersion::V2 => self.discover_v2_factory(*factory).await,
            };
            total.merge(stats);
        }
        self.flush_store();

        let (entries, tokens, pairs) = self.registry.stats();
        info!(
            "Discovery complete: {} factories, {} scanned, {} new, {} known, {} skipped | registry: {} entries, {} tokens, {} pairs",
            total.factories,
            total.scanned,
            total.registered,
            total.duplicates,
            total.skipped,
            entries,
            tokens,
            pairs
        );
        total
    }

    /// Token ids run from 1 to the token count, inclusive
    pub async fn discover_v1_factory(&self, factory: Address) -> DiscoveryStats {
        let mut stats = DiscoveryStats {
            factories: 1,
            ..Default::default()
        };

        let count = self.client.get_factory_token_count(factory).await;
        info!("V1 factory {}: {} tokens", factory, count);

        for id in 1..=count {
            stats.scanned += 1;
            let token = self.client.get_factory_token_with_id(factory, id).await;
            if token == Address::ZERO {
                warn!("V1 factory {}: token id {} resolved to zero, skipping", factory, id);
                stats.skipped += 1;
                continue;
            }

            let exchange = self.client.get_factory_exchange(factory, token).await;
            if exchange == Address::ZERO {
                warn!("V1 factory {}: token {} has no exchange, skipping", factory, token);
                stats.skipped += 1;
                continue;
            }

            if self.register_exchange(token, exchange) {
                stats.registered += 1;
            } else {
                stats.duplicates += 1;
            }
        }
        stats
    }

    /// Pair indices run from 0 to the pair count, exclusive
    pub async fn discover_v2_factory(&self, factory: Address) -> DiscoveryStats {
        let mut stats = DiscoveryStats {
            factories: 1,
            ..Default::default()
        };

        let count = self.client.get_factory_token_count(factory).await;
        info!("V2 factory {}: {} pairs", factory, count);

        for index in 0..count {
            stats.scanned += 1;
            let exchange = self.client.get_factory_exchange_v2(factory, index).await;
            if exchange == Address::ZERO {
                warn!("V2 factory {}: pair index {} resolved to zero, skipping", factory, index);
                stats.skipped += 1;
                continue;
            }

            let token0 = self.client.get_pair_token0(exchange).await;
            let token1 = self.client.get_pair_token1(exchange).await;

            match self
                .register_resolved_pair(token0, token1, exchange, index + 1)
                .await
            {
                Ok(true) => stats.registered += 1,
                Ok(false) => stats.duplicates += 1,
                Err(e) => {
                    warn!(
                        "V2 factory {}: skipping pair {} at index {}: {}",
                        factory, exchange, index, e
                    );
                    stats.skipped += 1;
                }
            }
        }
        stats
    }

    // ── Streaming discovery ──────────────────────────────────────────

    /// Register the exchange a creation log announces.
    ///
    /// Returns true when something new was registered. Unrecognised logs
    /// are ignored.
    pub async fn handle_log(&self, log: &EventLog) -> bool {
        match classify(log) {
            Some(CreationEvent::Exchange { token, exchange }) => {
                self.register_exchange(token, exchange)
            }
            Some(CreationEvent::Pair {
                token0,
                token1,
                exchange,
                index,
            }) => {
                let creation_height = index.unwrap_or(UNKNOWN_CREATION_HEIGHT);
                match self
                    .register_resolved_pair(token0, token1, exchange, creation_height)
                    .await
                {
                    Ok(added) => added,
                    Err(e) => {
                        warn!("Skipping streamed pair {}: {}", exchange, e);
                        false
                    }
                }
            }
            None => {
                debug!(
                    "Ignoring log from {} with {} topics",
                    log.address,
                    log.topics.len()
                );
                false
            }
        }
    }

    // ── Registration ─────────────────────────────────────────────────

    /// "SYM0/SYM1", or the first symbol lookup error
    pub async fn resolve_pair_symbol(
        &self,
        token0: Address,
        token1: Address,
    ) -> Result<String, RpcError> {
        let symbol0 = self.client.get_erc20_symbol(token0).await?;
        let symbol1 = self.client.get_erc20_symbol(token1).await?;
        Ok(format!("{}/{}", symbol0, symbol1))
    }

    /// Resolve symbols, then register the pair and both of its tokens
    async fn register_resolved_pair(
        &self,
        token0: Address,
        token1: Address,
        exchange: Address,
        creation_height: u64,
    ) -> Result<bool, RpcError> {
        // Known pairs need no symbol lookups
        if self.registry.pair(exchange).is_some() {
            return Ok(false);
        }
        if let Some(existing) = self.registry.exchange_for_pair(token0, token1) {
            debug!(
                "Pair ({}, {}) already registered at {}, ignoring exchange {}",
                token0, token1, existing, exchange
            );
            return Ok(false);
        }

        let symbol = self.resolve_pair_symbol(token0, token1).await?;
        let pair = PairEntry::new(token0, token1, exchange, symbol, creation_height);
        Ok(self.register_pair(pair))
    }

    /// Persist the store's buffered upserts. Failures are logged only.
    pub fn flush_store(&self) {
        if let Some(store) = &self.store {
            if let Err(e) = store.flush() {
                error!("Failed to persist registry state: {}", e);
            }
        }
    }

    fn register_exchange(&self, token: Address, exchange: Address) -> bool {
        if !self.registry.add_exchange(token, exchange) {
            return false;
        }
        if let Some(store) = &self.store {
            if let Err(e) = store.upsert_exchange(&ExchangeEntry::new(token, exchange)) {
                error!("Failed to persist exchange {} for token {}: {}", exchange, token, e);
            }
        }
        true
    }

    fn register_pair(&self, pair: PairEntry) -> bool {
        if !self.registry.add_pair(pair.clone()) {
            return false;
        }
        info!(
            "New pair {} at {} (creation height {})",
            pair.symbol, pair.exchange, pair.creation_height
        );
        if let Some(store) = &self.store {
            let result = store
                .upsert_exchange(&ExchangeEntry::new(pair.token0, pair.exchange))
                .and_then(|_| store.upsert_exchange(&ExchangeEntry::new(pair.token1, pair.exchange)))
                .and_then(|_| store.upsert_pair(&pair));
            if let Err(e) = result {
                error!("Failed to persist pair {}: {}", pair.exchange, e);
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::{MethodSet, ERC20_SYMBOL, V1_GET_TOKEN_WITH_ID};
    use crate::registry::events::{new_exchange_log, pair_created_log};
    use crate::rpc::codec::CallArg;
    use crate::rpc::mock::MockChain;
    use crate::rpc::ClientSettings;
    use crate::store::JsonStateStore;
    use alloy::primitives::address;
    use std::time::Duration;

    const FACTORY: Address = address!("0xf000000000000000000000000000000000000001");
    const FACTORY2: Address = address!("0xf000000000000000000000000000000000000002");
    const T1: Address = address!("0x1000000000000000000000000000000000000001");
    const T2: Address = address!("0x1000000000000000000000000000000000000002");
    const T3: Address = address!("0x1000000000000000000000000000000000000003");
    const E1: Address = address!("0xe000000000000000000000000000000000000001");
    const E2: Address = address!("0xe000000000000000000000000000000000000002");
    const E3: Address = address!("0xe000000000000000000000000000000000000003");

    fn builder(chain: &Arc<MockChain>, protocol: ProtocolVersion) -> RegistryBuilder<MockChain> {
        builder_for(chain, protocol, vec![FACTORY])
    }

    fn builder_for(
        chain: &Arc<MockChain>,
        protocol: ProtocolVersion,
        factories: Vec<Address>,
    ) -> RegistryBuilder<MockChain> {
        let client = ResilientClient::new(
            Arc::clone(chain),
            protocol,
            ClientSettings {
                retry_interval: Duration::from_millis(100),
                retry_count: 3,
            },
        );
        RegistryBuilder::new(Arc::new(client), ExchangeRegistry::new(), factories)
    }

    fn v2_chain() -> Arc<MockChain> {
        let chain = Arc::new(MockChain::new());
        chain.mock_v2_factory(FACTORY, &[(E1, T1, T2), (E2, T2, T3), (E3, T1, T3)]);
        chain.set_symbol(T1, "USDC");
        chain.set_symbol(T2, "WETH");
        chain.set_symbol(T3, "DAI");
        chain
    }

    #[tokio::test(start_paused = true)]
    async fn test_v1_discovery_registers_every_token() {
        let chain = Arc::new(MockChain::new());
        chain.mock_v1_factory(FACTORY, &[(T1, E1), (T2, E2), (T3, E3)]);
        let builder = builder(&chain, ProtocolVersion::V1);

        let stats = builder.discover_all().await;
        assert_eq!(stats.scanned, 3);
        assert_eq!(stats.registered, 3);
        assert_eq!(
            builder.registry().entries(),
            vec![
                ExchangeEntry::new(T1, E1),
                ExchangeEntry::new(T2, E2),
                ExchangeEntry::new(T3, E3),
            ]
        );

        // Second pass adds nothing
        let again = builder.discover_all().await;
        assert_eq!(again.registered, 0);
        assert_eq!(again.duplicates, 3);
        assert_eq!(builder.registry().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_v1_discovery_queries_only_ids_in_range() {
        let chain = Arc::new(MockChain::new());
        chain.mock_v1_factory(FACTORY, &[(T1, E1), (T2, E2), (T3, E3)]);
        builder(&chain, ProtocolVersion::V1).discover_all().await;

        for id in 1..=3 {
            let call = V1_GET_TOKEN_WITH_ID.encode(&[CallArg::uint(id)]);
            assert_eq!(chain.call_count(FACTORY, &call), 1, "id {}", id);
        }
        for id in [0, 4] {
            let call = V1_GET_TOKEN_WITH_ID.encode(&[CallArg::uint(id)]);
            assert_eq!(chain.call_count(FACTORY, &call), 0, "id {}", id);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_v1_unresolvable_exchange_is_skipped() {
        let chain = Arc::new(MockChain::new());
        chain.mock_v1_factory(FACTORY, &[(T1, E1), (T2, Address::ZERO)]);
        let builder = builder(&chain, ProtocolVersion::V1);

        let stats = builder.discover_all().await;
        assert_eq!(stats.registered, 1);
        assert_eq!(stats.skipped, 1);
        assert!(builder.registry().exchange_for_token(T2).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_v2_discovery_builds_pair_symbols() {
        let chain = v2_chain();
        let builder = builder(&chain, ProtocolVersion::V2);

        let stats = builder.discover_all().await;
        assert_eq!(stats.registered, 3);

        let registry = builder.registry();
        assert_eq!(registry.pair_count(), 3);
        assert_eq!(registry.pair(E1).unwrap().symbol, "USDC/WETH");
        assert_eq!(registry.pair(E2).unwrap().symbol, "WETH/DAI");
        assert_eq!(registry.pair(E3).unwrap().creation_height, 3);
        assert_eq!(registry.exchange_for_pair(T3, T2), Some(E2));
        // Both tokens of every pair are registered against its exchange
        assert_eq!(registry.len(), 6);
        assert!(registry.contains(T3, E3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_v2_scan_stops_before_count() {
        let chain = v2_chain();
        builder(&chain, ProtocolVersion::V2).discover_all().await;

        let all_pairs = MethodSet::for_protocol(ProtocolVersion::V2).factory_exchange;
        assert_eq!(chain.call_count(FACTORY, &all_pairs.encode(&[CallArg::uint(2)])), 1);
        assert_eq!(chain.call_count(FACTORY, &all_pairs.encode(&[CallArg::uint(3)])), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_v2_pair_skipped_when_symbol_fails() {
        let chain = v2_chain();
        chain.fail_always(T3, ERC20_SYMBOL.encode(&[]));
        let builder = builder(&chain, ProtocolVersion::V2);

        let stats = builder.discover_all().await;
        assert_eq!(stats.registered, 1);
        assert_eq!(stats.skipped, 2);

        let registry = builder.registry();
        assert!(registry.pair(E2).is_none());
        assert!(registry.pair(E3).is_none());
        // No partial registration of the skipped pairs' tokens either
        assert!(!registry.contains(T3, E2));
        assert!(!registry.contains(T2, E2));
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_pair_on_second_factory_registers_nothing() {
        let chain = Arc::new(MockChain::new());
        chain.mock_v2_factory(FACTORY, &[(E1, T1, T2)]);
        chain.mock_v2_factory(FACTORY2, &[(E2, T2, T1)]);
        chain.set_symbol(T1, "USDC");
        chain.set_symbol(T2, "WETH");
        let store = Arc::new(JsonStateStore::in_memory());
        let builder = builder_for(&chain, ProtocolVersion::V2, vec![FACTORY, FACTORY2])
            .with_store(Arc::clone(&store) as Arc<dyn RegistryStore>);

        let stats = builder.discover_all().await;
        assert_eq!(stats.registered, 1);
        assert_eq!(stats.duplicates, 1);

        let registry = builder.registry();
        assert!(registry.pair(E2).is_none());
        assert!(!registry.contains(T1, E2));
        assert!(!registry.contains(T2, E2));
        assert_eq!(registry.exchange_for_pair(T1, T2), Some(E1));

        // Only V2-shaped tables in the emitted block
        let parsed: crate::config::ExchangesSection =
            toml::from_str(&registry.render_config_block().unwrap()).unwrap();
        assert_eq!(parsed.exchanges.len(), 1);
        assert!(parsed.exchanges.iter().all(|e| e.token.is_none() && e.token0.is_some()));

        let state = store.load().unwrap();
        assert_eq!(state.exchanges.len(), 2);
        assert!(state.exchanges.iter().all(|e| e.exchange == E1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_streamed_pair_without_index_has_unknown_height() {
        let chain = v2_chain();
        let builder = builder(&chain, ProtocolVersion::V2);

        let mut log = pair_created_log(FACTORY, T1, T2, E1, 1);
        log.data = alloy::primitives::Bytes::copy_from_slice(&log.data[..32]);
        assert!(builder.handle_log(&log).await);

        let pair = builder.registry().pair(E1).unwrap();
        assert_eq!(pair.creation_height, UNKNOWN_CREATION_HEIGHT);
        assert_eq!(pair.symbol, "USDC/WETH");
    }

    #[tokio::test(start_paused = true)]
    async fn test_streaming_matches_batch_v1() {
        let chain = Arc::new(MockChain::new());
        chain.mock_v1_factory(FACTORY, &[(T1, E1), (T2, E2), (T3, E3)]);

        let batch = builder(&chain, ProtocolVersion::V1);
        batch.discover_all().await;

        let streaming = builder(&chain, ProtocolVersion::V1);
        for (token, exchange) in [(T1, E1), (T2, E2), (T3, E3)] {
            assert!(streaming.handle_log(&new_exchange_log(FACTORY, token, exchange)).await);
        }
        // Replayed event is a no-op
        assert!(!streaming.handle_log(&new_exchange_log(FACTORY, T1, E1)).await);

        assert_eq!(batch.registry().entries(), streaming.registry().entries());
    }

    #[tokio::test(start_paused = true)]
    async fn test_streaming_matches_batch_v2() {
        let chain = v2_chain();
        chain.fail_always(T3, ERC20_SYMBOL.encode(&[]));

        let batch = builder(&chain, ProtocolVersion::V2);
        batch.discover_all().await;

        let streaming = builder(&chain, ProtocolVersion::V2);
        let logs = [
            pair_created_log(FACTORY, T1, T2, E1, 1),
            pair_created_log(FACTORY, T2, T3, E2, 2),
            pair_created_log(FACTORY, T1, T3, E3, 3),
        ];
        for log in &logs {
            streaming.handle_log(log).await;
        }

        assert_eq!(batch.registry().entries(), streaming.registry().entries());
        assert_eq!(batch.registry().pairs(), streaming.registry().pairs());
    }

    #[tokio::test(start_paused = true)]
    async fn test_streaming_ignores_unknown_logs() {
        let chain = v2_chain();
        let builder = builder(&chain, ProtocolVersion::V2);

        let mut log = pair_created_log(FACTORY, T1, T2, E1, 1);
        log.topics.push(E2.into_word());
        assert!(!builder.handle_log(&log).await);
        assert!(builder.registry().is_empty());
        assert_eq!(chain.total_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_entries_written_through_to_store() {
        let chain = v2_chain();
        let store = Arc::new(JsonStateStore::in_memory());
        let builder = builder(&chain, ProtocolVersion::V2)
            .with_store(Arc::clone(&store) as Arc<dyn RegistryStore>);

        builder.discover_all().await;
        builder.discover_all().await;

        let state = store.load().unwrap();
        assert_eq!(state.pairs.len(), 3);
        assert_eq!(state.exchanges.len(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_discovery_pass_flushes_state_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        let chain = v2_chain();
        let store = Arc::new(JsonStateStore::open(&path).unwrap());
        let builder = builder(&chain, ProtocolVersion::V2)
            .with_store(Arc::clone(&store) as Arc<dyn RegistryStore>);

        builder.discover_all().await;

        let on_disk = JsonStateStore::open(&path).unwrap().load().unwrap();
        assert_eq!(on_disk.pairs.len(), 3);
        assert_eq!(on_disk.exchanges.len(), 6);
    }
}
