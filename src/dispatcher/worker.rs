use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::trace;
use tracing::warn;

use super::DispatcherOptions;
use crate::errors::StoreError;
use crate::stats::StatsAggregator;
use crate::store::Operation;
use crate::store::OperationResult;
use crate::store::PoolClient;
use crate::store::StoreConnector;
use crate::Error;
use crate::Result;

pub(crate) type SharedQueue = Arc<Mutex<mpsc::Receiver<Operation>>>;

/// Executes queued operations on one logical client
pub(crate) struct Worker {
    client: Arc<PoolClient>,
    connector: Arc<dyn StoreConnector>,
    queue: SharedQueue,
    stats: Arc<StatsAggregator>,
    cancel: CancellationToken,
    options: DispatcherOptions,
}

impl Worker {
    pub(crate) fn new(
        client: Arc<PoolClient>,
        connector: Arc<dyn StoreConnector>,
        queue: SharedQueue,
        stats: Arc<StatsAggregator>,
        cancel: CancellationToken,
        options: DispatcherOptions,
    ) -> Self {
        Self {
            client,
            connector,
            queue,
            stats,
            cancel,
            options,
        }
    }

    pub(crate) async fn run(self) -> Result<()> {
        loop {
            let op = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!(client = self.client.index(), "Worker cancelled");
                    break;
                }
                op = next(&self.queue) => match op {
                    Some(op) => op,
                    None => break,
                },
            };

            if let Err(e) = self.reconnect_if_due().await {
                error!(client = self.client.index(), "{}", e);
                // Without a connection this client cannot make progress
                self.cancel.cancel();
                return Err(e);
            }
            self.execute(op).await;
        }
        trace!(client = self.client.index(), "Worker stopped");
        Ok(())
    }

    async fn reconnect_if_due(&self) -> Result<()> {
        let reconnected = self
            .client
            .acquire(self.options.reconnect_every, self.connector.as_ref())
            .await
            .map_err(|source| Error::Reconnect {
                client: self.client.index(),
                source,
            })?;
        if let Some(elapsed) = reconnected {
            debug!(
                client = self.client.index(),
                every = self.options.reconnect_every,
                latency_us = elapsed.as_micros() as u64,
                "Client reconnected"
            );
            self.stats.record_reconnect(elapsed);
        }
        Ok(())
    }

    async fn execute(
        &self,
        op: Operation,
    ) {
        let kind = op.kind();
        let key = op.key().to_string();
        let store = self.client.store();

        let started = Instant::now();
        let result = match self.options.timeout {
            Some(limit) => timeout(limit, store.execute(op))
                .await
                .unwrap_or(Err(StoreError::Timeout(limit))),
            None => store.execute(op).await,
        };
        let latency = started.elapsed();

        match result {
            Ok(outcome) => self.record(outcome, latency),
            Err(e) => {
                warn!(
                    client = self.client.index(),
                    kind,
                    key,
                    latency_us = latency.as_micros() as u64,
                    "Operation failed: {}",
                    e
                );
                self.stats.record_error(kind);
            }
        }
    }

    fn record(
        &self,
        outcome: OperationResult,
        latency: Duration,
    ) {
        match outcome {
            OperationResult::Put { bytes } => self.stats.record_put(latency, bytes),
            OperationResult::Delete { deleted } => self.stats.record_delete(latency, deleted),
            OperationResult::Get { prefix, count, bytes } => {
                let bytes = if self.options.full_read { bytes } else { 0 };
                self.stats.record_get(prefix, latency, count, bytes)
            }
        }
        trace!(
            client = self.client.index(),
            ?outcome,
            latency_us = latency.as_micros() as u64,
            "Operation completed"
        );
    }
}

async fn next(queue: &SharedQueue) -> Option<Operation> {
    queue.lock().await.recv().await
}
