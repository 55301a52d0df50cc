//! Scripted in-memory chain for tests.
//!
//! Calls are answered from a map keyed by (contract, payload). Anything not
//! scripted returns empty data, which the codec decodes to zero. Failures
//! can be injected per call or for every header read.

use crate::contracts::{
    MethodSet, ERC20_SYMBOL, V1_GET_TOKEN, V1_GET_TOKEN_WITH_ID, V1_TOKEN_ADDRESS, V2_TOKEN0,
    V2_TOKEN1,
};
use crate::error::RpcError;
use crate::rpc::codec::CallArg;
use crate::rpc::transport::{ChainTransport, LogQuery};
use crate::types::{BlockHeader, CallMessage, EventLog, ProtocolVersion};
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol_types::SolValue;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

type CallKey = (Address, Bytes);

#[derive(Default)]
struct MockState {
    calls: HashMap<CallKey, Bytes>,
    fail_next: HashMap<CallKey, u32>,
    fail_always: Vec<CallKey>,
    call_counts: HashMap<CallKey, u32>,
    failures: u32,
    latest_block: u64,
    header_failures: u32,
    coin_balances: HashMap<Address, U256>,
    logs: Vec<EventLog>,
    log_queries: Vec<LogQuery>,
}

#[derive(Default)]
pub struct MockChain {
    state: Mutex<MockState>,
}

/// Return data for a uint result
pub fn uint_ret(value: u64) -> Bytes {
    Bytes::copy_from_slice(CallArg::uint(value).to_word().as_slice())
}

/// Return data for an address result
pub fn address_ret(addr: Address) -> Bytes {
    Bytes::copy_from_slice(CallArg::Address(addr).to_word().as_slice())
}

/// Return data for a `string` result
pub fn string_ret(value: &str) -> Bytes {
    Bytes::from(value.to_string().abi_encode())
}

/// Deterministic hash for block `number`
pub fn block_hash(number: u64) -> B256 {
    B256::from(U256::from(number).to_be_bytes::<32>())
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_call(&self, to: Address, data: Bytes, ret: Bytes) {
        self.state.lock().unwrap().calls.insert((to, data), ret);
    }

    pub fn fail_next(&self, to: Address, data: Bytes, times: u32) {
        self.state.lock().unwrap().fail_next.insert((to, data), times);
    }

    pub fn fail_always(&self, to: Address, data: Bytes) {
        self.state.lock().unwrap().fail_always.push((to, data));
    }

    pub fn call_count(&self, to: Address, data: &Bytes) -> u32 {
        let state = self.state.lock().unwrap();
        state
            .call_counts
            .get(&(to, data.clone()))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.state.lock().unwrap().call_counts.values().sum()
    }

    pub fn failure_count(&self) -> u32 {
        self.state.lock().unwrap().failures
    }

    pub fn set_latest_block(&self, number: u64) {
        self.state.lock().unwrap().latest_block = number;
    }

    pub fn fail_next_headers(&self, times: u32) {
        self.state.lock().unwrap().header_failures = times;
    }

    pub fn set_coin_balance(&self, account: Address, balance: U256) {
        self.state.lock().unwrap().coin_balances.insert(account, balance);
    }

    pub fn set_symbol(&self, token: Address, symbol: &str) {
        self.set_call(token, ERC20_SYMBOL.encode(&[]), string_ret(symbol));
    }

    pub fn set_token_balance(&self, token: Address, account: Address, balance: u64) {
        self.set_call(
            token,
            crate::contracts::ERC20_BALANCE_OF.encode(&[CallArg::Address(account)]),
            uint_ret(balance),
        );
    }

    pub fn set_total_supply(&self, token: Address, supply: u64) {
        self.set_call(
            token,
            crate::contracts::ERC20_TOTAL_SUPPLY.encode(&[]),
            uint_ret(supply),
        );
    }

    pub fn push_log(&self, log: EventLog) {
        self.state.lock().unwrap().logs.push(log);
    }

    pub fn log_queries(&self) -> Vec<LogQuery> {
        self.state.lock().unwrap().log_queries.clone()
    }

    /// V1 factory listing `entries` as (token, exchange), ids starting at 1
    pub fn mock_v1_factory(&self, factory: Address, entries: &[(Address, Address)]) {
        let methods = MethodSet::for_protocol(ProtocolVersion::V1);
        self.set_call(
            factory,
            methods.factory_token_count.encode(&[]),
            uint_ret(entries.len() as u64),
        );
        for (i, (token, exchange)) in entries.iter().enumerate() {
            self.set_call(
                factory,
                V1_GET_TOKEN_WITH_ID.encode(&[CallArg::uint(i as u64 + 1)]),
                address_ret(*token),
            );
            self.set_call(
                factory,
                methods.factory_exchange.encode(&[CallArg::Address(*token)]),
                address_ret(*exchange),
            );
            self.set_call(
                factory,
                V1_GET_TOKEN.encode(&[CallArg::Address(*exchange)]),
                address_ret(*token),
            );
            self.set_call(*exchange, V1_TOKEN_ADDRESS.encode(&[]), address_ret(*token));
            self.set_call(
                *exchange,
                methods.exchange_factory.encode(&[]),
                address_ret(factory),
            );
        }
    }

    /// V2 factory listing `pairs` as (pair, token0, token1), indices from 0
    pub fn mock_v2_factory(&self, factory: Address, pairs: &[(Address, Address, Address)]) {
        let methods = MethodSet::for_protocol(ProtocolVersion::V2);
        self.set_call(
            factory,
            methods.factory_token_count.encode(&[]),
            uint_ret(pairs.len() as u64),
        );
        for (i, (pair, token0, token1)) in pairs.iter().enumerate() {
            self.set_call(
                factory,
                methods.factory_exchange.encode(&[CallArg::uint(i as u64)]),
                address_ret(*pair),
            );
            self.set_call(*pair, V2_TOKEN0.encode(&[]), address_ret(*token0));
            self.set_call(*pair, V2_TOKEN1.encode(&[]), address_ret(*token1));
            self.set_call(*pair, methods.exchange_factory.encode(&[]), address_ret(factory));
        }
    }
}

#[async_trait]
impl ChainTransport for MockChain {
    async fn header_by_number(&self, number: Option<u64>) -> Result<BlockHeader, RpcError> {
        let mut state = self.state.lock().unwrap();
        if state.header_failures > 0 {
            state.header_failures -= 1;
            state.failures += 1;
            return Err(RpcError::transport("header unavailable"));
        }
        let number = number.unwrap_or(state.latest_block);
        Ok(BlockHeader {
            number,
            hash: block_hash(number),
            timestamp: 1_600_000_000 + number * 12,
        })
    }

    async fn block_number(&self) -> Result<u64, RpcError> {
        Ok(self.state.lock().unwrap().latest_block)
    }

    async fn balance_at(&self, account: Address, _block: Option<u64>) -> Result<U256, RpcError> {
        let state = self.state.lock().unwrap();
        Ok(state.coin_balances.get(&account).copied().unwrap_or_default())
    }

    async fn call_contract(
        &self,
        msg: &CallMessage,
        _block: Option<u64>,
    ) -> Result<Bytes, RpcError> {
        let mut state = self.state.lock().unwrap();
        let key = (msg.to, msg.data.clone());
        *state.call_counts.entry(key.clone()).or_insert(0) += 1;

        if state.fail_always.contains(&key) {
            state.failures += 1;
            return Err(RpcError::transport("execution timeout"));
        }
        if let Some(remaining) = state.fail_next.get_mut(&key) {
            if *remaining > 0 {
                *remaining -= 1;
                state.failures += 1;
                return Err(RpcError::transport("connection reset"));
            }
        }
        Ok(state.calls.get(&key).cloned().unwrap_or_default())
    }

    async fn logs(&self, query: &LogQuery) -> Result<Vec<EventLog>, RpcError> {
        let mut state = self.state.lock().unwrap();
        state.log_queries.push(query.clone());
        let matched = state
            .logs
            .iter()
            .filter(|log| query.addresses.is_empty() || query.addresses.contains(&log.address))
            .filter(|log| {
                query.topics.is_empty()
                    || log.topics.first().is_some_and(|t| query.topics.contains(t))
            })
            .filter(|log| {
                log.block_number
                    .map_or(true, |n| n >= query.from_block && n <= query.to_block)
            })
            .cloned()
            .collect();
        Ok(matched)
    }
}
