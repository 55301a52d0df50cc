//! Chain Transport
//!
//! The minimal set of JSON-RPC primitives the registry needs, behind a
//! trait so the retry layer can be driven by a scripted chain in tests.
//! `AlloyTransport` is the production implementation over any alloy
//! `Provider` (HTTP or WebSocket).

use crate::error::RpcError;
use crate::types::{BlockHeader, CallMessage, EventLog};
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{BlockId, BlockNumberOrTag, Filter, TransactionInput, TransactionRequest};
use async_trait::async_trait;
use tracing::info;

/// eth_getLogs query over an inclusive block range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogQuery {
    pub addresses: Vec<Address>,
    /// Accepted topic0 values
    pub topics: Vec<B256>,
    pub from_block: u64,
    pub to_block: u64,
}

#[async_trait]
pub trait ChainTransport: Send + Sync {
    /// Header at `number`, or the latest header when `None`
    async fn header_by_number(&self, number: Option<u64>) -> Result<BlockHeader, RpcError>;

    async fn block_number(&self) -> Result<u64, RpcError>;

    /// Native coin balance
    async fn balance_at(&self, account: Address, block: Option<u64>) -> Result<U256, RpcError>;

    /// eth_call returning raw return data
    async fn call_contract(&self, msg: &CallMessage, block: Option<u64>)
        -> Result<Bytes, RpcError>;

    async fn logs(&self, query: &LogQuery) -> Result<Vec<EventLog>, RpcError>;
}

fn block_id(block: Option<u64>) -> BlockId {
    match block {
        Some(number) => BlockId::number(number),
        None => BlockId::latest(),
    }
}

/// `ChainTransport` over an alloy provider
pub struct AlloyTransport<P> {
    provider: P,
}

impl<P> AlloyTransport<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

impl AlloyTransport<DynProvider> {
    /// Connect to `url` (http(s):// or ws(s)://).
    ///
    /// A WebSocket handshake can fail; the caller decides whether to retry.
    pub async fn connect(url: &str) -> Result<Self, RpcError> {
        let provider = ProviderBuilder::new()
            .connect(url)
            .await
            .map_err(RpcError::transport)?;
        let provider = provider.erased();

        let block = provider.get_block_number().await.map_err(RpcError::transport)?;
        info!("Connected to {} (block {})", redact_url(url), block);

        Ok(Self::new(provider))
    }
}

/// Keep the scheme and host, drop path segments that usually carry API keys
pub fn redact_url(url: &str) -> String {
    match url.find("://") {
        Some(scheme_end) => {
            let rest = &url[scheme_end + 3..];
            let host_end = rest.find('/').unwrap_or(rest.len());
            let suffix = if host_end < rest.len() { "/..." } else { "" };
            format!("{}{}", &url[..scheme_end + 3 + host_end], suffix)
        }
        None => url.to_string(),
    }
}

#[async_trait]
impl<P: Provider + Send + Sync> ChainTransport for AlloyTransport<P> {
    async fn header_by_number(&self, number: Option<u64>) -> Result<BlockHeader, RpcError> {
        let tag = match number {
            Some(n) => BlockNumberOrTag::Number(n),
            None => BlockNumberOrTag::Latest,
        };
        let block = self
            .provider
            .get_block_by_number(tag)
            .await
            .map_err(RpcError::transport)?
            .ok_or_else(|| RpcError::BlockNotFound(tag.to_string()))?;

        Ok(BlockHeader {
            number: block.header.number,
            hash: block.header.hash,
            timestamp: block.header.timestamp,
        })
    }

    async fn block_number(&self) -> Result<u64, RpcError> {
        self.provider
            .get_block_number()
            .await
            .map_err(RpcError::transport)
    }

    async fn balance_at(&self, account: Address, block: Option<u64>) -> Result<U256, RpcError> {
        self.provider
            .get_balance(account)
            .block_id(block_id(block))
            .await
            .map_err(RpcError::transport)
    }

    async fn call_contract(
        &self,
        msg: &CallMessage,
        block: Option<u64>,
    ) -> Result<Bytes, RpcError> {
        let tx = TransactionRequest::default()
            .to(msg.to)
            .input(TransactionInput::new(msg.data.clone()));

        self.provider
            .call(tx)
            .block(block_id(block))
            .await
            .map_err(RpcError::transport)
    }

    async fn logs(&self, query: &LogQuery) -> Result<Vec<EventLog>, RpcError> {
        let filter = Filter::new()
            .from_block(query.from_block)
            .to_block(query.to_block)
            .address(query.addresses.clone())
            .event_signature(query.topics.clone());

        let logs = self
            .provider
            .get_logs(&filter)
            .await
            .map_err(RpcError::transport)?;

        Ok(logs.iter().map(EventLog::from).collect())
    }
}
