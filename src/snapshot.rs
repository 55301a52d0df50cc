//! Liquidity Snapshot
//!
//! Reads every registered exchange's liquidity at a single block: LP token
//! supply, native coin balance and the balance of each of its tokens.

use crate::registry::ExchangeRegistry;
use crate::rpc::{ChainTransport, ResilientClient};
use crate::types::{ExchangeLiquidity, LiquiditySnapshot};
use chrono::Utc;
use tracing::{debug, info};

/// Snapshot at the current chain head
pub async fn take_snapshot<T: ChainTransport>(
    client: &ResilientClient<T>,
    registry: &ExchangeRegistry,
) -> LiquiditySnapshot {
    let header = client.get_latest_block_header().await;
    let block = Some(header.number);

    let mut exchanges = Vec::new();
    for (exchange, tokens) in registry.exchanges() {
        let liquidity = client.get_exchange_liquidity(exchange, block).await;
        let coin_balance = client.get_coin_balance(exchange, block).await;

        let mut token_balances = Vec::with_capacity(tokens.len());
        for token in tokens {
            let balance = client.get_exchange_token_balance(exchange, token, block).await;
            token_balances.push((token, balance));
        }

        debug!(
            "Exchange {} at block {}: liquidity={} coin={}",
            exchange, header.number, liquidity, coin_balance
        );
        exchanges.push(ExchangeLiquidity {
            exchange,
            liquidity,
            coin_balance,
            token_balances,
        });
    }

    let snapshot = LiquiditySnapshot {
        block: header,
        taken_at: Utc::now(),
        exchanges,
    };
    info!(
        "Liquidity snapshot at block {}: {} exchanges, total liquidity {}",
        header.number,
        snapshot.exchanges.len(),
        snapshot.total_liquidity()
    );
    snapshot
}
