//! Resilient RPC Client
//!
//! Wraps a `ChainTransport` so that every read retries until it succeeds.
//! Two disciplines coexist:
//! - unbounded: headers, balances, total supply, exchange/token lookups,
//!   raw calls and logs. These never return an error; a stalled node
//!   stalls the caller.
//! - bounded: factory token count and token-by-id. After `retry_count`
//!   failed attempts they return the zero value, which callers cannot tell
//!   apart from a genuine zero.
//!
//! ERC-20 `symbol()` is bounded too but reports failure as an error, since
//! pair discovery must skip pairs whose symbols cannot be resolved.

use crate::contracts::{
    CallSpec, MethodSet, ERC20_BALANCE_OF, ERC20_SYMBOL, ERC20_TOTAL_SUPPLY, V1_GET_TOKEN,
    V1_GET_TOKEN_WITH_ID, V1_TOKEN_ADDRESS, V2_TOKEN0, V2_TOKEN1,
};
use crate::error::RpcError;
use crate::rpc::codec::{decode_address, decode_string, decode_u64, decode_uint, CallArg};
use crate::rpc::retry::{retry, retry_forever, RetryPolicy};
use crate::rpc::transport::{ChainTransport, LogQuery};
use crate::types::{BlockHeader, CallMessage, EventLog, ProtocolVersion};
use alloy::primitives::{Address, Bytes, U256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Retry settings shared by every call site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientSettings {
    pub retry_interval: Duration,
    pub retry_count: u32,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_secs(1),
            retry_count: 3,
        }
    }
}

/// Retrying read-only view of the chain
pub struct ResilientClient<T> {
    transport: Arc<T>,
    methods: &'static MethodSet,
    settings: ClientSettings,
}

impl<T: ChainTransport> ResilientClient<T> {
    /// The protocol's selector set is fixed here for the client's lifetime
    pub fn new(transport: Arc<T>, protocol: ProtocolVersion, settings: ClientSettings) -> Self {
        Self {
            transport,
            methods: MethodSet::for_protocol(protocol),
            settings,
        }
    }

    pub fn protocol(&self) -> ProtocolVersion {
        self.methods.protocol
    }

    fn bounded_policy(&self) -> RetryPolicy {
        RetryPolicy::bounded(self.settings.retry_interval, self.settings.retry_count)
    }

    // ── Blocks ───────────────────────────────────────────────────────

    pub async fn get_block_header(&self, number: u64) -> BlockHeader {
        let what = format!("get block header number={}", number);
        retry_forever(self.settings.retry_interval, &what, || {
            self.transport.header_by_number(Some(number))
        })
        .await
    }

    pub async fn get_latest_block_header(&self) -> BlockHeader {
        let header = retry_forever(self.settings.retry_interval, "get latest block header", || {
            self.transport.header_by_number(None)
        })
        .await;
        info!(
            "[rpc] latest block header: number={} hash={} timestamp={}",
            header.number, header.hash, header.timestamp
        );
        header
    }

    pub async fn get_latest_block_number(&self) -> u64 {
        retry_forever(self.settings.retry_interval, "get block number", || {
            self.transport.block_number()
        })
        .await
    }

    // ── Raw calls ────────────────────────────────────────────────────

    pub async fn call_contract(&self, msg: &CallMessage, block: Option<u64>) -> Bytes {
        let what = format!("call contract to={} data={}", msg.to, msg.data);
        retry_forever(self.settings.retry_interval, &what, || {
            self.transport.call_contract(msg, block)
        })
        .await
    }

    async fn call_forever(
        &self,
        to: Address,
        spec: &CallSpec,
        args: &[CallArg],
        block: Option<u64>,
        what: &str,
    ) -> Bytes {
        let msg = CallMessage::new(to, spec.encode(args));
        retry_forever(self.settings.retry_interval, what, || {
            self.transport.call_contract(&msg, block)
        })
        .await
    }

    async fn call_bounded(
        &self,
        to: Address,
        spec: &CallSpec,
        args: &[CallArg],
        what: &str,
    ) -> Result<Bytes, RpcError> {
        let msg = CallMessage::new(to, spec.encode(args));
        retry(&self.bounded_policy(), what, || {
            self.transport.call_contract(&msg, None)
        })
        .await
        .map_err(|e| RpcError::Exhausted {
            attempts: e.attempts,
            last: Box::new(e.last_error),
        })
    }

    // ── Balances and supply ──────────────────────────────────────────

    pub async fn get_token_total_supply(&self, token: Address, block: Option<u64>) -> U256 {
        let what = format!("get token total supply token={} block={:?}", token, block);
        let ret = self
            .call_forever(token, &ERC20_TOTAL_SUPPLY, &[], block, &what)
            .await;
        decode_uint(&ret)
    }

    /// Liquidity of an exchange = total supply of its liquidity token
    pub async fn get_exchange_liquidity(&self, exchange: Address, block: Option<u64>) -> U256 {
        self.get_token_total_supply(exchange, block).await
    }

    pub async fn get_coin_balance(&self, account: Address, block: Option<u64>) -> U256 {
        let what = format!("get coin balance account={} block={:?}", account, block);
        retry_forever(self.settings.retry_interval, &what, || {
            self.transport.balance_at(account, block)
        })
        .await
    }

    pub async fn get_token_balance(
        &self,
        token: Address,
        account: Address,
        block: Option<u64>,
    ) -> U256 {
        let what = format!(
            "get token balance token={} account={} block={:?}",
            token, account, block
        );
        let ret = self
            .call_forever(
                token,
                &ERC20_BALANCE_OF,
                &[CallArg::Address(account)],
                block,
                &what,
            )
            .await;
        decode_uint(&ret)
    }

    /// Balance of `token` held by `exchange`
    pub async fn get_exchange_token_balance(
        &self,
        exchange: Address,
        token: Address,
        block: Option<u64>,
    ) -> U256 {
        self.get_token_balance(token, exchange, block).await
    }

    /// Liquidity tokens of `exchange` held by `account`
    pub async fn get_liquidity_balance(
        &self,
        exchange: Address,
        account: Address,
        block: Option<u64>,
    ) -> U256 {
        self.get_token_balance(exchange, account, block).await
    }

    // ── Factory lookups ──────────────────────────────────────────────

    /// Exchange of `token` on a V1 factory
    pub async fn get_factory_exchange(&self, factory: Address, token: Address) -> Address {
        let what = format!("get factory exchange factory={} token={}", factory, token);
        let ret = self
            .call_forever(
                factory,
                &self.methods.factory_exchange,
                &[CallArg::Address(token)],
                None,
                &what,
            )
            .await;
        decode_address(&ret)
    }

    /// Token of `exchange` on a V1 factory
    pub async fn get_factory_token(&self, factory: Address, exchange: Address) -> Address {
        let what = format!("get factory token factory={} exchange={}", factory, exchange);
        let ret = self
            .call_forever(
                factory,
                &V1_GET_TOKEN,
                &[CallArg::Address(exchange)],
                None,
                &what,
            )
            .await;
        decode_address(&ret)
    }

    /// Pair at `index` of a V2 factory
    pub async fn get_factory_exchange_v2(&self, factory: Address, index: u64) -> Address {
        let what = format!("get factory exchange v2 factory={} index={}", factory, index);
        let ret = self
            .call_forever(
                factory,
                &self.methods.factory_exchange,
                &[CallArg::uint(index)],
                None,
                &what,
            )
            .await;
        decode_address(&ret)
    }

    /// Token count (V1) or pair count (V2). Zero when every attempt failed.
    pub async fn get_factory_token_count(&self, factory: Address) -> u64 {
        let what = format!("get factory token count factory={}", factory);
        match self
            .call_bounded(factory, &self.methods.factory_token_count, &[], &what)
            .await
        {
            Ok(ret) => decode_u64(&ret),
            Err(e) => {
                warn!(
                    "[rpc] factory {} token count unavailable, using 0 (ambiguous): {}",
                    factory, e
                );
                0
            }
        }
    }

    /// Token with `id` on a V1 factory. Zero address when every attempt failed.
    pub async fn get_factory_token_with_id(&self, factory: Address, id: u64) -> Address {
        let what = format!("get factory token with id factory={} id={}", factory, id);
        match self
            .call_bounded(factory, &V1_GET_TOKEN_WITH_ID, &[CallArg::uint(id)], &what)
            .await
        {
            Ok(ret) => decode_address(&ret),
            Err(e) => {
                warn!(
                    "[rpc] factory {} token id {} unavailable, using zero address (ambiguous): {}",
                    factory, id, e
                );
                Address::ZERO
            }
        }
    }

    // ── Exchange lookups ─────────────────────────────────────────────

    /// Token of a V1 exchange
    pub async fn get_exchange_token_address(&self, exchange: Address) -> Address {
        let what = format!("get exchange token exchange={}", exchange);
        let ret = self
            .call_forever(exchange, &V1_TOKEN_ADDRESS, &[], None, &what)
            .await;
        decode_address(&ret)
    }

    /// Factory that deployed `exchange`
    pub async fn get_exchange_factory_address(&self, exchange: Address) -> Address {
        let what = format!("get exchange factory exchange={}", exchange);
        let ret = self
            .call_forever(exchange, &self.methods.exchange_factory, &[], None, &what)
            .await;
        decode_address(&ret)
    }

    pub async fn get_pair_token0(&self, exchange: Address) -> Address {
        let what = format!("get pair token0 exchange={}", exchange);
        let ret = self
            .call_forever(exchange, &V2_TOKEN0, &[], None, &what)
            .await;
        decode_address(&ret)
    }

    pub async fn get_pair_token1(&self, exchange: Address) -> Address {
        let what = format!("get pair token1 exchange={}", exchange);
        let ret = self
            .call_forever(exchange, &V2_TOKEN1, &[], None, &what)
            .await;
        decode_address(&ret)
    }

    /// ERC-20 symbol; an error once attempts are exhausted or the result
    /// cannot be decoded
    pub async fn get_erc20_symbol(&self, token: Address) -> Result<String, RpcError> {
        let what = format!("get erc20 symbol token={}", token);
        let ret = self.call_bounded(token, &ERC20_SYMBOL, &[], &what).await?;
        Ok(decode_string(&ret)?)
    }

    // ── Logs ─────────────────────────────────────────────────────────

    pub async fn get_logs(&self, query: &LogQuery) -> Vec<EventLog> {
        let what = format!(
            "get logs blocks={}-{} addresses={}",
            query.from_block,
            query.to_block,
            query.addresses.len()
        );
        retry_forever(self.settings.retry_interval, &what, || self.transport.logs(query)).await
    }
}
