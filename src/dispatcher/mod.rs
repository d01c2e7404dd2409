//! Operation dispatch.
//!
//! Activities produce [`Operation`]s into a bounded queue; one worker per
//! logical client drains it. Producers are paced by a [`RateTicker`],
//! workers run as fast as the store answers.

mod rate;
mod worker;

pub use rate::*;


use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::ClientConfig;
use crate::config::GetConfig;
use crate::stats::StatsAggregator;
use crate::store::ClientPool;
use crate::store::Operation;
use crate::Result;
use worker::Worker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherOptions {
    /// Per operation deadline
    pub timeout: Option<Duration>,
    /// Operations per connection before the worker reconnects (0 = never)
    pub reconnect_every: u64,
    /// Account the bytes returned by reads
    pub full_read: bool,
}

impl Default for DispatcherOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            reconnect_every: 0,
            full_read: true,
        }
    }
}

impl DispatcherOptions {
    pub fn from_config(
        client: &ClientConfig,
        get: &GetConfig,
    ) -> Self {
        Self {
            timeout: (client.request_timeout_ms > 0).then(|| Duration::from_millis(client.request_timeout_ms)),
            reconnect_every: client.reconnect_every,
            full_read: get.full_read,
        }
    }
}

/// Producer side of a dispatcher queue.
///
/// The queue closes once every clone is dropped, which lets the workers
/// drain what is left and exit.
#[derive(Debug, Clone)]
pub struct OpSender {
    tx: mpsc::Sender<Operation>,
    cancel: CancellationToken,
}

impl OpSender {
    /// Queues `op`, waiting for room.
    ///
    /// Returns `false` when the run was cancelled or every worker is gone;
    /// the producer should stop.
    pub async fn send(
        &self,
        op: Operation,
    ) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            sent = self.tx.send(op) => sent.is_ok(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Worker tasks of one dispatcher
pub struct DispatcherHandle {
    name: &'static str,
    workers: Vec<JoinHandle<Result<()>>>,
}

impl DispatcherHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn workers(&self) -> usize {
        self.workers.len()
    }

    /// Waits for every worker; returns the first failure after all have ended
    pub async fn join(self) -> Result<()> {
        let mut first_error = None;
        for worker in self.workers {
            let outcome = match worker.await {
                Ok(outcome) => outcome,
                Err(e) => Err(e.into()),
            };
            if let Err(e) = outcome {
                first_error.get_or_insert(e);
            }
        }
        debug!(dispatcher = self.name, "Dispatcher joined");
        first_error.map_or(Ok(()), Err)
    }
}

pub struct Dispatcher;

impl Dispatcher {
    /// Starts one worker per client of `pool` over a shared queue sized to
    /// the pool.
    pub fn spawn(
        name: &'static str,
        pool: &ClientPool,
        stats: Arc<StatsAggregator>,
        cancel: CancellationToken,
        options: DispatcherOptions,
    ) -> (OpSender, DispatcherHandle) {
        let (tx, rx) = mpsc::channel(pool.len().max(1));
        let queue = Arc::new(Mutex::new(rx));

        let workers = pool
            .clients()
            .iter()
            .map(|client| {
                let worker = Worker::new(
                    client.clone(),
                    pool.connector(),
                    queue.clone(),
                    stats.clone(),
                    cancel.clone(),
                    options,
                );
                tokio::spawn(worker.run())
            })
            .collect::<Vec<_>>();
        debug!(dispatcher = name, workers = workers.len(), ?options, "Dispatcher started");

        (OpSender { tx, cancel }, DispatcherHandle { name, workers })
    }
}
