//! LP Distributor Library
//!
//! Mirrors the exchanges deployed by V1 (one exchange per token) and V2
//! (one pair per token pair) factories into an in-process registry, and
//! drives the discover → snapshot → distribute pipeline on top of it.

pub mod config;
pub mod contracts;
pub mod distribution;
pub mod error;
pub mod orchestrator;
pub mod registry;
pub mod rpc;
pub mod snapshot;
pub mod store;
pub mod types;
pub mod verify;

// Re-export commonly used types
pub use config::{load_config, AppConfig, ExchangeConfig};
pub use distribution::{RewardDistributor, SnapshotDistributor};
pub use error::{CodecError, RpcError, StoreError, VerifyError};
pub use orchestrator::{Orchestrator, OrchestratorError, OrchestratorSettings, Phase};
pub use registry::{ExchangeRegistry, ExchangeWatcher, RegistryBuilder};
pub use rpc::{AlloyTransport, ChainTransport, ClientSettings, ResilientClient};
pub use store::{JsonStateStore, RegistryStore};
pub use types::{ExchangeEntry, PairEntry, ProtocolVersion};
