//! Core data structures shared by the registry, the RPC layer and the
//! downstream snapshot/distribution phases.

use alloy::primitives::{Address, Bytes, B256, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Factory protocol generation.
///
/// V1 factories host one exchange per token, V2 factories one exchange
/// (pair) per unordered token pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolVersion {
    V1,
    V2,
}

impl ProtocolVersion {
    pub fn is_v2(&self) -> bool {
        matches!(self, ProtocolVersion::V2)
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProtocolVersion::V1 => write!(f, "v1"),
            ProtocolVersion::V2 => write!(f, "v2"),
        }
    }
}

impl FromStr for ProtocolVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "v1" | "1" => Ok(ProtocolVersion::V1),
            "v2" | "2" => Ok(ProtocolVersion::V2),
            other => Err(format!("unknown protocol version '{}' (expected v1 or v2)", other)),
        }
    }
}

/// Read-only snapshot of a block header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub number: u64,
    pub hash: B256,
    pub timestamp: u64,
}

/// Target + payload of a read-only contract call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallMessage {
    pub to: Address,
    pub data: Bytes,
}

impl CallMessage {
    pub fn new(to: Address, data: Bytes) -> Self {
        Self { to, data }
    }
}

/// A contract-emitted log record, detached from any transport type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub block_number: Option<u64>,
}

impl From<&alloy::rpc::types::Log> for EventLog {
    fn from(log: &alloy::rpc::types::Log) -> Self {
        Self {
            address: log.address(),
            topics: log.topics().to_vec(),
            data: log.inner.data.data.clone(),
            block_number: log.block_number,
        }
    }
}

/// V1 registry record: one exchange per token per factory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExchangeEntry {
    pub token: Address,
    pub exchange: Address,
}

impl ExchangeEntry {
    pub fn new(token: Address, exchange: Address) -> Self {
        Self { token, exchange }
    }
}

/// V2 registry record: one exchange per unordered token pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairEntry {
    pub token0: Address,
    pub token1: Address,
    pub exchange: Address,
    /// Display string "SYM0/SYM1"
    pub symbol: String,
    /// 1-based discovery index, emitted as a pseudo creation height
    pub creation_height: u64,
    pub liquid_weight: u64,
    pub trade_weight: u64,
}

impl PairEntry {
    pub fn new(
        token0: Address,
        token1: Address,
        exchange: Address,
        symbol: String,
        creation_height: u64,
    ) -> Self {
        Self {
            token0,
            token1,
            exchange,
            symbol,
            creation_height,
            liquid_weight: 0,
            trade_weight: 0,
        }
    }

    /// Order-independent key of the token pair
    pub fn pair_key(&self) -> (Address, Address) {
        pair_key(self.token0, self.token1)
    }
}

/// Sort two token addresses so (a, b) and (b, a) share one key
pub fn pair_key(a: Address, b: Address) -> (Address, Address) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Liquidity of a single exchange at the snapshot block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeLiquidity {
    pub exchange: Address,
    /// Total supply of the exchange's liquidity token
    pub liquidity: U256,
    /// Native coin held by the exchange
    pub coin_balance: U256,
    /// Balance of every registered token held by the exchange
    pub token_balances: Vec<(Address, U256)>,
}

/// All exchange liquidities pinned to one block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquiditySnapshot {
    pub block: BlockHeader,
    pub taken_at: DateTime<Utc>,
    pub exchanges: Vec<ExchangeLiquidity>,
}

impl LiquiditySnapshot {
    pub fn total_liquidity(&self) -> U256 {
        self.exchanges
            .iter()
            .fold(U256::ZERO, |acc, e| acc.saturating_add(e.liquidity))
    }
}

/// Outcome of one distribution phase, persisted for auditing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionRecord {
    pub block_number: u64,
    pub recorded_at: DateTime<Utc>,
    pub exchange_count: usize,
    /// (exchange, liquid weight, trade weight) from the configured exchange list
    pub weights: Vec<(Address, u64, u64)>,
}
