//! Chain access: transport, call codec, retry policy and the retrying client.

pub mod client;
pub mod codec;
pub mod retry;
pub mod transport;

#[cfg(test)]
pub(crate) mod mock;

pub use client::{ClientSettings, ResilientClient};
pub use retry::{retry, retry_forever, RetryExhausted, RetryPolicy};
pub use transport::{AlloyTransport, ChainTransport, LogQuery};
