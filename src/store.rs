//! Registry Persistence
//!
//! Durable record of discovered exchanges and pairs, the latest liquidity
//! snapshot, and every distribution. Upserts are keyed the same way the
//! registry dedups, so replaying a discovery pass rewrites nothing new.
//!
//! Registry upserts are buffered until `flush`; snapshots and distribution
//! records are written immediately (and carry any buffered upserts along).

use crate::error::StoreError;
use crate::registry::ExchangeRegistry;
use crate::types::{DistributionRecord, ExchangeEntry, LiquiditySnapshot, PairEntry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Everything the store keeps
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredState {
    #[serde(default)]
    pub exchanges: Vec<ExchangeEntry>,
    #[serde(default)]
    pub pairs: Vec<PairEntry>,
    #[serde(default)]
    pub last_snapshot: Option<LiquiditySnapshot>,
    #[serde(default)]
    pub distributions: Vec<DistributionRecord>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Upsert-by-key persistence collaborator
pub trait RegistryStore: Send + Sync {
    fn upsert_exchange(&self, entry: &ExchangeEntry) -> Result<(), StoreError>;

    /// Keyed by exchange address
    fn upsert_pair(&self, pair: &PairEntry) -> Result<(), StoreError>;

    /// Replaces the previous snapshot
    fn record_snapshot(&self, snapshot: &LiquiditySnapshot) -> Result<(), StoreError>;

    fn record_distribution(&self, record: &DistributionRecord) -> Result<(), StoreError>;

    /// Persist buffered upserts
    fn flush(&self) -> Result<(), StoreError>;

    fn load(&self) -> Result<StoredState, StoreError>;
}

/// Re-insert stored entries into `registry`. Returns how many were new.
pub fn seed_registry(state: &StoredState, registry: &ExchangeRegistry) -> usize {
    let mut added = 0;
    for entry in &state.exchanges {
        added += registry.add_exchange(entry.token, entry.exchange) as usize;
    }
    for pair in &state.pairs {
        added += registry.add_pair(pair.clone()) as usize;
    }
    added
}

#[derive(Debug, Default)]
struct Cached {
    state: StoredState,
    /// Changed since the last write
    dirty: bool,
}

/// JSON-file store. Without a path it only keeps state in memory.
#[derive(Debug)]
pub struct JsonStateStore {
    path: Option<PathBuf>,
    cache: Mutex<Cached>,
}

impl JsonStateStore {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            cache: Mutex::new(Cached::default()),
        }
    }

    /// Open `path`, starting empty when the file does not exist yet
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let json = std::fs::read_to_string(&path)?;
            let state: StoredState = serde_json::from_str(&json)?;
            info!(
                "Loaded registry state from {}: {} exchanges, {} pairs",
                path.display(),
                state.exchanges.len(),
                state.pairs.len()
            );
            state
        } else {
            StoredState::default()
        };

        Ok(Self {
            path: Some(path),
            cache: Mutex::new(Cached {
                state,
                dirty: false,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Cached> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Apply `change` and mark the state dirty when it reports a
    /// modification. Writes the file right away when `write_now` is set.
    fn update<F>(&self, write_now: bool, change: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut StoredState) -> bool,
    {
        let mut cache = self.lock();
        if change(&mut cache.state) {
            cache.state.last_updated = Some(Utc::now());
            cache.dirty = true;
        }
        if write_now {
            self.write_if_dirty(&mut cache)?;
        }
        Ok(())
    }

    fn write_if_dirty(&self, cache: &mut Cached) -> Result<(), StoreError> {
        if !cache.dirty {
            return Ok(());
        }
        if let Some(path) = &self.path {
            write_atomic(path, &cache.state)?;
        }
        cache.dirty = false;
        Ok(())
    }
}

/// Write to a temp file first, then rename
fn write_atomic(path: &Path, state: &StoredState) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(state)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let temp_path = path.with_extension("tmp");
    std::fs::write(&temp_path, &json)?;
    std::fs::rename(&temp_path, path)?;
    debug!("Wrote registry state to {}", path.display());
    Ok(())
}

impl RegistryStore for JsonStateStore {
    fn upsert_exchange(&self, entry: &ExchangeEntry) -> Result<(), StoreError> {
        self.update(false, |state| {
            if state.exchanges.contains(entry) {
                return false;
            }
            state.exchanges.push(*entry);
            true
        })
    }

    fn upsert_pair(&self, pair: &PairEntry) -> Result<(), StoreError> {
        self.update(false, |state| {
            match state.pairs.iter_mut().find(|p| p.exchange == pair.exchange) {
                Some(existing) if existing == pair => false,
                Some(existing) => {
                    *existing = pair.clone();
                    true
                }
                None => {
                    state.pairs.push(pair.clone());
                    true
                }
            }
        })
    }

    fn record_snapshot(&self, snapshot: &LiquiditySnapshot) -> Result<(), StoreError> {
        self.update(true, |state| {
            state.last_snapshot = Some(snapshot.clone());
            true
        })
    }

    fn record_distribution(&self, record: &DistributionRecord) -> Result<(), StoreError> {
        self.update(true, |state| {
            state.distributions.push(record.clone());
            true
        })
    }

    fn flush(&self) -> Result<(), StoreError> {
        let mut cache = self.lock();
        self.write_if_dirty(&mut cache)
    }

    fn load(&self) -> Result<StoredState, StoreError> {
        Ok(self.lock().state.clone())
    }
}
