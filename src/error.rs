//! Typed errors for the chain-access and verification layers.

use alloy::primitives::Address;
use thiserror::Error;

/// Failure decoding contract return data
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("empty return data")]
    Empty,

    #[error("ABI decoding failed: {0}")]
    Abi(String),

    #[error("invalid string encoding: {0}")]
    InvalidString(String),
}

/// Failure of a single RPC attempt, or of a bounded retry loop
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("block {0} not found")]
    BlockNotFound(String),

    #[error("decode error: {0}")]
    Decode(#[from] CodecError),

    #[error("giving up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: Box<RpcError> },
}

impl RpcError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        RpcError::Transport(err.to_string())
    }
}

/// Configured exchange list does not match chain state
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("invalid address '{value}' in exchange config: {reason}")]
    InvalidAddress { value: String, reason: String },

    #[error("exchange {exchange} is missing '{field}' in config")]
    MissingField { exchange: String, field: &'static str },

    #[error("exchange token mismatch: exchange {exchange} has token {on_chain}, config says {configured}")]
    TokenMismatch {
        exchange: Address,
        on_chain: Address,
        configured: Address,
    },

    #[error(
        "exchange pair mismatch: exchange {exchange} has ({on_chain0}, {on_chain1}), config says ({configured0}, {configured1})"
    )]
    PairMismatch {
        exchange: Address,
        on_chain0: Address,
        on_chain1: Address,
        configured0: Address,
        configured1: Address,
    },

    #[error("exchange {exchange}'s factory {factory} is not configured")]
    UnknownFactory { exchange: Address, factory: Address },

    #[error("factory {factory} maps exchange {exchange} to token {registered}, config says {configured}")]
    FactoryMismatch {
        exchange: Address,
        factory: Address,
        registered: Address,
        configured: Address,
    },
}

/// Failure reading or writing persisted registry state
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("state file (de)serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}
