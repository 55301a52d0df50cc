//! Creation event classification.
//!
//! V1 factories emit `NewExchange(token, exchange)`, V2 factories emit
//! `PairCreated(token0, token1, pair, index)`. A log is recognised by its
//! event signature and its shape; anything else is not an event we track.

use crate::contracts::{NEW_EXCHANGE_TOPIC, PAIR_CREATED_TOPIC};
use crate::rpc::codec::{decode_address, decode_u64, word};
use crate::types::EventLog;
use alloy::primitives::{Address, B256};

/// A recognised exchange-creation event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreationEvent {
    Exchange {
        token: Address,
        exchange: Address,
    },
    Pair {
        token0: Address,
        token1: Address,
        exchange: Address,
        /// 1-based position in the factory's pair list, when the log carries it
        index: Option<u64>,
    },
}

fn topic_address(topic: &B256) -> Address {
    Address::from_word(*topic)
}

/// Classify a log, or `None` when it is not a creation event
pub fn classify(log: &EventLog) -> Option<CreationEvent> {
    let signature = log.topics.first()?;

    if *signature == *NEW_EXCHANGE_TOPIC {
        return match log.topics.len() {
            3 => Some(CreationEvent::Exchange {
                token: topic_address(&log.topics[1]),
                exchange: topic_address(&log.topics[2]),
            }),
            // Exchange address unindexed
            2 if log.data.len() >= 32 => Some(CreationEvent::Exchange {
                token: topic_address(&log.topics[1]),
                exchange: decode_address(&log.data),
            }),
            _ => None,
        };
    }

    if *signature == *PAIR_CREATED_TOPIC && log.topics.len() == 3 && log.data.len() >= 32 {
        let index = (log.data.len() >= 64).then(|| decode_u64(word(&log.data, 1).as_slice()));
        return Some(CreationEvent::Pair {
            token0: topic_address(&log.topics[1]),
            token1: topic_address(&log.topics[2]),
            exchange: decode_address(&log.data),
            index,
        });
    }

    None
}

/// The log a V1 factory emits
#[cfg(test)]
pub(crate) fn new_exchange_log(factory: Address, token: Address, exchange: Address) -> EventLog {
    EventLog {
        address: factory,
        topics: vec![*NEW_EXCHANGE_TOPIC, token.into_word(), exchange.into_word()],
        data: Default::default(),
        block_number: None,
    }
}

/// The log a V2 factory emits for pair `index` (1-based)
#[cfg(test)]
pub(crate) fn pair_created_log(
    factory: Address,
    token0: Address,
    token1: Address,
    pair: Address,
    index: u64,
) -> EventLog {
    let mut data = Vec::with_capacity(64);
    data.extend_from_slice(pair.into_word().as_slice());
    data.extend_from_slice(&alloy::primitives::U256::from(index).to_be_bytes::<32>());
    EventLog {
        address: factory,
        topics: vec![*PAIR_CREATED_TOPIC, token0.into_word(), token1.into_word()],
        data: data.into(),
        block_number: None,
    }
}
