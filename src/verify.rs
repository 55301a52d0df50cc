//! Startup verification of the configured exchange list.
//!
//! Each `[[exchanges]]` entry must match chain state: the exchange's
//! token(s) equal the configured ones and its factory is configured. A V1
//! factory must also map the exchange back to the configured token.
//! The first mismatch is returned; the service treats it as fatal.

use crate::config::ExchangeConfig;
use crate::error::VerifyError;
use crate::rpc::{ChainTransport, ResilientClient};
use crate::types::ProtocolVersion;
use alloy::primitives::Address;
use std::str::FromStr;
use tracing::info;

fn parse_address(value: &str) -> Result<Address, VerifyError> {
    Address::from_str(value.trim()).map_err(|e| VerifyError::InvalidAddress {
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn required<'a>(
    field: &'a Option<String>,
    exchange: &str,
    name: &'static str,
) -> Result<&'a str, VerifyError> {
    field.as_deref().ok_or_else(|| VerifyError::MissingField {
        exchange: exchange.to_string(),
        field: name,
    })
}

/// Check every configured exchange. Returns how many were verified.
pub async fn verify_exchanges<T: ChainTransport>(
    client: &ResilientClient<T>,
    exchanges: &[ExchangeConfig],
    factories: &[Address],
) -> Result<usize, VerifyError> {
    for ex in exchanges {
        let v1_token = match client.protocol() {
            ProtocolVersion::V1 => Some(verify_v1(client, ex).await?),
            ProtocolVersion::V2 => {
                verify_v2(client, ex).await?;
                None
            }
        };

        let exchange = parse_address(&ex.exchange)?;
        let factory = client.get_exchange_factory_address(exchange).await;
        if !factories.contains(&factory) {
            return Err(VerifyError::UnknownFactory { exchange, factory });
        }

        if let Some(configured) = v1_token {
            let registered = client.get_factory_token(factory, exchange).await;
            if registered != configured {
                return Err(VerifyError::FactoryMismatch {
                    exchange,
                    factory,
                    registered,
                    configured,
                });
            }
        }
        info!("Verified exchange {} (factory {})", exchange, factory);
    }
    Ok(exchanges.len())
}

/// Returns the configured token once the exchange agrees with it
async fn verify_v1<T: ChainTransport>(
    client: &ResilientClient<T>,
    ex: &ExchangeConfig,
) -> Result<Address, VerifyError> {
    let exchange = parse_address(&ex.exchange)?;
    let configured = parse_address(required(&ex.token, &ex.exchange, "token")?)?;

    let on_chain = client.get_exchange_token_address(exchange).await;
    if on_chain != configured {
        return Err(VerifyError::TokenMismatch {
            exchange,
            on_chain,
            configured,
        });
    }
    Ok(configured)
}

async fn verify_v2<T: ChainTransport>(
    client: &ResilientClient<T>,
    ex: &ExchangeConfig,
) -> Result<(), VerifyError> {
    let exchange = parse_address(&ex.exchange)?;
    let configured0 = parse_address(required(&ex.token0, &ex.exchange, "token0")?)?;
    let configured1 = parse_address(required(&ex.token1, &ex.exchange, "token1")?)?;

    let on_chain0 = client.get_pair_token0(exchange).await;
    let on_chain1 = client.get_pair_token1(exchange).await;
    if on_chain0 != configured0 || on_chain1 != configured1 {
        return Err(VerifyError::PairMismatch {
            exchange,
            on_chain0,
            on_chain1,
            configured0,
            configured1,
        });
    }
    Ok(())
}
