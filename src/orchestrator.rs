//! Phase Orchestrator
//!
//! Drives the service through its phases, strictly forward and each at most
//! once:
//!
//! Init → Discover → SnapshotLiquidity → Distribute → Idle
//!
//! `Discover` optionally verifies the configured exchange list, runs batch
//! discovery and spawns the log watcher. A sync-only run stops after it.
//! `Idle` never returns.

use crate::config::ExchangeConfig;
use crate::distribution::RewardDistributor;
use crate::registry::{ExchangeWatcher, RegistryBuilder};
use crate::rpc::ChainTransport;
use crate::snapshot::take_snapshot;
use crate::store::RegistryStore;
use crate::types::{DistributionRecord, LiquiditySnapshot};
use crate::verify::verify_exchanges;
use anyhow::{Context, Result};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Init,
    Discover,
    SnapshotLiquidity,
    Distribute,
    Idle,
}

impl Phase {
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Init => Some(Phase::Discover),
            Phase::Discover => Some(Phase::SnapshotLiquidity),
            Phase::SnapshotLiquidity => Some(Phase::Distribute),
            Phase::Distribute => Some(Phase::Idle),
            Phase::Idle => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Phase::Init => "init",
            Phase::Discover => "discover",
            Phase::SnapshotLiquidity => "snapshot-liquidity",
            Phase::Distribute => "distribute",
            Phase::Idle => "idle",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error("cannot enter phase {to} from {from}")]
    PhaseOrder { from: Phase, to: Phase },

    #[error("no liquidity snapshot taken before distribution")]
    MissingSnapshot,
}

/// Switches taken from `[sync]` and the command line
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub check_exchanges: bool,
    pub get_exchanges: bool,
    pub watch_exchanges: bool,
    pub sync_only: bool,
    pub log_poll_interval: Duration,
    pub max_block_range: u64,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            check_exchanges: false,
            get_exchanges: true,
            watch_exchanges: false,
            sync_only: false,
            log_poll_interval: Duration::from_secs(5),
            max_block_range: 2000,
        }
    }
}

pub struct Orchestrator<T> {
    settings: OrchestratorSettings,
    builder: Arc<RegistryBuilder<T>>,
    expected_exchanges: Vec<ExchangeConfig>,
    distributor: Arc<dyn RewardDistributor>,
    store: Option<Arc<dyn RegistryStore>>,
    phase: Phase,
    watcher: Option<JoinHandle<()>>,
    snapshot: Option<LiquiditySnapshot>,
}

impl<T: ChainTransport + 'static> Orchestrator<T> {
    pub fn new(
        settings: OrchestratorSettings,
        builder: Arc<RegistryBuilder<T>>,
        distributor: Arc<dyn RewardDistributor>,
    ) -> Self {
        Self {
            settings,
            builder,
            expected_exchanges: Vec::new(),
            distributor,
            store: None,
            phase: Phase::Init,
            watcher: None,
            snapshot: None,
        }
    }

    /// Exchange list checked when `check_exchanges` is set
    pub fn with_expected_exchanges(mut self, exchanges: Vec<ExchangeConfig>) -> Self {
        self.expected_exchanges = exchanges;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn RegistryStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn snapshot(&self) -> Option<&LiquiditySnapshot> {
        self.snapshot.as_ref()
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.as_ref().is_some_and(|h| !h.is_finished())
    }

    fn enter(&mut self, to: Phase) -> Result<(), OrchestratorError> {
        if self.phase.next() != Some(to) {
            return Err(OrchestratorError::PhaseOrder {
                from: self.phase,
                to,
            });
        }
        info!("Entering phase {} (from {})", to, self.phase);
        self.phase = to;
        Ok(())
    }

    // ── Phases ───────────────────────────────────────────────────────

    pub async fn discover(&mut self) -> Result<()> {
        self.enter(Phase::Discover)?;
        let client = Arc::clone(self.builder.client());

        if self.settings.check_exchanges {
            let verified = verify_exchanges(
                client.as_ref(),
                &self.expected_exchanges,
                self.builder.factories(),
            )
            .await
            .context("Configured exchanges do not match chain state")?;
            info!("Verified {} configured exchanges", verified);
        }

        // Read before the scan so the watcher covers anything created during it
        let watch_from = if self.settings.watch_exchanges {
            Some(client.get_latest_block_number().await)
        } else {
            None
        };

        if self.settings.get_exchanges {
            self.builder.discover_all().await;
        }

        if let Some(start_block) = watch_from {
            let watcher = ExchangeWatcher::new(
                Arc::clone(&self.builder),
                start_block,
                self.settings.log_poll_interval,
                self.settings.max_block_range,
            );
            self.watcher = Some(tokio::spawn(watcher.run()));
        }
        Ok(())
    }

    pub async fn snapshot_liquidity(&mut self) -> Result<&LiquiditySnapshot> {
        self.enter(Phase::SnapshotLiquidity)?;
        let client = self.builder.client().as_ref();
        let snapshot = take_snapshot(client, self.builder.registry()).await;

        if let Some(store) = &self.store {
            if let Err(e) = store.record_snapshot(&snapshot) {
                error!("Failed to persist liquidity snapshot: {}", e);
            }
        }
        Ok(&*self.snapshot.insert(snapshot))
    }

    pub async fn distribute(&mut self) -> Result<DistributionRecord> {
        self.enter(Phase::Distribute)?;
        let snapshot = self
            .snapshot
            .as_ref()
            .ok_or(OrchestratorError::MissingSnapshot)?;
        self.distributor
            .distribute(self.builder.registry(), snapshot)
            .await
            .context("Reward distribution failed")
    }

    /// Run every phase up to `Idle`, or up to `Discover` when sync-only.
    /// Returns the phase reached.
    pub async fn run_until_idle(&mut self) -> Result<Phase> {
        self.discover().await?;
        if self.settings.sync_only {
            info!("Sync-only run: stopping after discovery");
            return Ok(self.phase);
        }

        self.snapshot_liquidity().await?;
        self.distribute().await?;
        self.enter(Phase::Idle)?;
        Ok(self.phase)
    }

    /// Run to `Idle` and block there forever. Returns only for a sync-only
    /// run or on error.
    pub async fn run(mut self) -> Result<()> {
        if self.run_until_idle().await? != Phase::Idle {
            return Ok(());
        }
        info!("Setup complete, idling");
        futures::future::pending::<()>().await;
        Ok(())
    }
}
