//! Factory log watcher.
//!
//! Polls `eth_getLogs` for the configured factories' creation event and
//! hands every log to the builder. Block ranges are split into chunks of
//! at most `max_block_range` blocks.

use crate::contracts::creation_topic;
use crate::registry::RegistryBuilder;
use crate::rpc::{ChainTransport, LogQuery};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

pub struct ExchangeWatcher<T> {
    builder: Arc<RegistryBuilder<T>>,
    poll_interval: Duration,
    max_block_range: u64,
    /// First block not yet scanned
    next_block: u64,
}

impl<T: ChainTransport> ExchangeWatcher<T> {
    pub fn new(
        builder: Arc<RegistryBuilder<T>>,
        start_block: u64,
        poll_interval: Duration,
        max_block_range: u64,
    ) -> Self {
        Self {
            builder,
            poll_interval,
            max_block_range: max_block_range.max(1),
            next_block: start_block,
        }
    }

    pub fn next_block(&self) -> u64 {
        self.next_block
    }

    /// Scan from `next_block` to the chain head. Returns how many new
    /// exchanges or pairs were registered.
    pub async fn poll_once(&mut self) -> u64 {
        let client = self.builder.client();
        let latest = client.get_latest_block_number().await;
        if self.next_block > latest {
            return 0;
        }

        let topic = creation_topic(client.protocol());
        let mut registered = 0;
        let mut from = self.next_block;
        while from <= latest {
            let to = latest.min(from.saturating_add(self.max_block_range - 1));
            let query = LogQuery {
                addresses: self.builder.factories().to_vec(),
                topics: vec![topic],
                from_block: from,
                to_block: to,
            };

            let logs = client.get_logs(&query).await;
            debug!("Blocks {}-{}: {} creation logs", from, to, logs.len());
            for log in &logs {
                if self.builder.handle_log(log).await {
                    registered += 1;
                }
            }
            from = to + 1;
        }
        self.next_block = latest + 1;

        if registered > 0 {
            self.builder.flush_store();
            info!(
                "Watcher registered {} new exchanges up to block {}",
                registered, latest
            );
        }
        registered
    }

    /// Poll forever
    pub async fn run(mut self) {
        info!(
            "Watching {} factories from block {} every {:?}",
            self.builder.factories().len(),
            self.next_block,
            self.poll_interval
        );
        loop {
            self.poll_once().await;
            sleep(self.poll_interval).await;
        }
    }
}
