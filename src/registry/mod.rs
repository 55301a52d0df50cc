//! Exchange registry and the components that fill it.

pub mod builder;
pub mod events;
pub mod state;
pub mod watcher;

pub use builder::{DiscoveryStats, RegistryBuilder};
pub use events::{classify, CreationEvent};
pub use state::ExchangeRegistry;
pub use watcher::ExchangeWatcher;
