//! Exchange Registry
//!
//! Shared mapping of discovered tokens and pairs to their exchange
//! contracts, using DashMap for lock-free reads. Inserts go through a single
//! writer lock so the multi-table update of one entry is atomic and the
//! one-entry-per-key invariant holds with several writers.

use crate::config::{ExchangeConfig, ExchangesSection};
use crate::types::{pair_key, ExchangeEntry, PairEntry};
use alloy::primitives::Address;
use dashmap::{DashMap, DashSet};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Thread-safe exchange registry handle
///
/// Cloning shares the underlying tables.
#[derive(Debug)]
pub struct ExchangeRegistry {
    /// Every (token, exchange) record
    entries: Arc<DashSet<ExchangeEntry>>,
    /// Token → first exchange registered for it
    token_exchange: Arc<DashMap<Address, Address>>,
    /// Exchange → V2 pair metadata
    pairs: Arc<DashMap<Address, PairEntry>>,
    /// Sorted (token0, token1) → exchange
    pair_index: Arc<DashMap<(Address, Address), Address>>,
    writer: Arc<Mutex<()>>,
}

impl ExchangeRegistry {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashSet::new()),
            token_exchange: Arc::new(DashMap::new()),
            pairs: Arc::new(DashMap::new()),
            pair_index: Arc::new(DashMap::new()),
            writer: Arc::new(Mutex::new(())),
        }
    }

    fn write_guard(&self) -> std::sync::MutexGuard<'_, ()> {
        // Guards no data, poisoning is ignored
        self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register (token, exchange). Returns false when already known.
    pub fn add_exchange(&self, token: Address, exchange: Address) -> bool {
        let _guard = self.write_guard();
        let entry = ExchangeEntry::new(token, exchange);
        if !self.entries.insert(entry) {
            return false;
        }
        self.token_exchange.entry(token).or_insert(exchange);
        debug!("Registered exchange {} for token {}", exchange, token);
        true
    }

    /// Register a V2 pair together with its (token0, exchange) and
    /// (token1, exchange) records.
    ///
    /// Returns false when the exchange or the unordered token pair is already
    /// known; nothing is inserted then and the existing entry is untouched.
    pub fn add_pair(&self, pair: PairEntry) -> bool {
        let _guard = self.write_guard();
        let key = pair.pair_key();
        if self.pairs.contains_key(&pair.exchange) || self.pair_index.contains_key(&key) {
            return false;
        }
        for token in [pair.token0, pair.token1] {
            self.entries.insert(ExchangeEntry::new(token, pair.exchange));
            self.token_exchange.entry(token).or_insert(pair.exchange);
        }
        debug!(
            "Registered pair {} ({}, {}) at exchange {}",
            pair.symbol, pair.token0, pair.token1, pair.exchange
        );
        self.pair_index.insert(key, pair.exchange);
        self.pairs.insert(pair.exchange, pair);
        true
    }

    // ── Lookups ──────────────────────────────────────────────────────

    pub fn exchange_for_token(&self, token: Address) -> Option<Address> {
        self.token_exchange.get(&token).map(|e| *e.value())
    }

    /// Exchange of the unordered pair (a, b)
    pub fn exchange_for_pair(&self, a: Address, b: Address) -> Option<Address> {
        self.pair_index.get(&pair_key(a, b)).map(|e| *e.value())
    }

    pub fn pair(&self, exchange: Address) -> Option<PairEntry> {
        self.pairs.get(&exchange).map(|e| e.value().clone())
    }

    pub fn contains(&self, token: Address, exchange: Address) -> bool {
        self.entries.contains(&ExchangeEntry::new(token, exchange))
    }

    /// All (token, exchange) records, sorted
    pub fn entries(&self) -> Vec<ExchangeEntry> {
        let mut entries: Vec<ExchangeEntry> = self.entries.iter().map(|e| *e.key()).collect();
        entries.sort();
        entries
    }

    /// All pairs, ordered by creation height then exchange
    pub fn pairs(&self) -> Vec<PairEntry> {
        let mut pairs: Vec<PairEntry> = self.pairs.iter().map(|e| e.value().clone()).collect();
        pairs.sort_by_key(|p| (p.creation_height, p.exchange));
        pairs
    }

    /// Distinct exchanges with the tokens registered against each
    pub fn exchanges(&self) -> Vec<(Address, Vec<Address>)> {
        let mut by_exchange: BTreeMap<Address, BTreeSet<Address>> = BTreeMap::new();
        for entry in self.entries.iter() {
            by_exchange
                .entry(entry.exchange)
                .or_default()
                .insert(entry.token);
        }
        by_exchange
            .into_iter()
            .map(|(exchange, tokens)| (exchange, tokens.into_iter().collect()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }

    /// Statistics: (entries, distinct tokens, pairs)
    pub fn stats(&self) -> (usize, usize, usize) {
        (self.entries.len(), self.token_exchange.len(), self.pairs.len())
    }

    // ── Config emission ──────────────────────────────────────────────

    /// `[[exchanges]]` tables for every known exchange, pairs first in
    /// creation-height order, then single-token exchanges. Weights are zero.
    pub fn config_exchanges(&self) -> Vec<ExchangeConfig> {
        let pairs = self.pairs();
        let mut out: Vec<ExchangeConfig> = pairs
            .iter()
            .map(|p| ExchangeConfig {
                pairs: Some(p.symbol.clone()),
                exchange: p.exchange.to_string(),
                token0: Some(p.token0.to_string()),
                token1: Some(p.token1.to_string()),
                creation_height: p.creation_height,
                ..Default::default()
            })
            .collect();

        for entry in self.entries() {
            if self.pairs.contains_key(&entry.exchange) {
                continue;
            }
            out.push(ExchangeConfig {
                exchange: entry.exchange.to_string(),
                token: Some(entry.token.to_string()),
                ..Default::default()
            });
        }
        out
    }

    /// Render `config_exchanges` as TOML, ready to paste into a config file
    pub fn render_config_block(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(&ExchangesSection {
            exchanges: self.config_exchanges(),
        })
    }
}

impl Default for ExchangeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ExchangeRegistry {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            token_exchange: Arc::clone(&self.token_exchange),
            pairs: Arc::clone(&self.pairs),
            pair_index: Arc::clone(&self.pair_index),
            writer: Arc::clone(&self.writer),
        }
    }
}
