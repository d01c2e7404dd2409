//! Watch tree.
//!
//! Opens watchers on keys selected per level of the key tree and counts the
//! events they receive. Optionally replays periodic prefix reads on every
//! watched key.

mod plan;
mod replay;
mod subscription;

pub use plan::*;
pub use replay::*;
pub use subscription::WatchCounters;

#[cfg(test)]
mod watch_test;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use rand::Rng;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;

use crate::config::WatchConfig;
use crate::dispatcher::Dispatcher;
use crate::dispatcher::DispatcherHandle;
use crate::dispatcher::DispatcherOptions;
use crate::keyspace::KeySpace;
use crate::stats::StatsAggregator;
use crate::store::ClientPool;
use crate::utils::StopSignals;
use crate::Error;
use crate::Result;
use subscription::Subscription;

/// Running watchers and their replay reads
pub struct WatchManager {
    configured: usize,
    counters: Arc<WatchCounters>,
    subscriptions: Vec<JoinHandle<()>>,
    replays: Vec<JoinHandle<u64>>,
    replay_dispatcher: Option<DispatcherHandle>,
}

impl WatchManager {
    /// Plans the watched keys and opens one subscription per key.
    ///
    /// Subscription `i` uses client `i % clients`. Returns once every
    /// subscription made its first open attempt.
    #[allow(clippy::too_many_arguments)]
    pub async fn start(
        keyspace: &KeySpace,
        config: &WatchConfig,
        pool: &ClientPool,
        stats: Arc<StatsAggregator>,
        cancel: CancellationToken,
        stop_signals: &StopSignals,
        options: DispatcherOptions,
        rng: &mut (impl Rng + Send),
    ) -> Result<Self> {
        let counts = match &config.counts_per_level {
            Some(spec) => WatchCounts::parse(spec, config.strict_levels)?,
            None => return Ok(Self::idle()),
        };
        let plan = WatchPlan::build(keyspace, &counts, config.sequential_keys, &mut *rng)?;
        if plan.is_empty() {
            return Ok(Self::idle());
        }
        if pool.is_empty() {
            return Err(Error::InvalidConfig("watches need at least one client".into()));
        }

        stats.set_watchers_configured(plan.len() as u64);
        let counters = Arc::new(WatchCounters::default());
        let mut subscriptions = Vec::with_capacity(plan.len());
        let mut ready = Vec::with_capacity(plan.len());
        for (id, target) in plan.targets().iter().enumerate() {
            let subscription = Subscription {
                id,
                key: target.key.clone(),
                with_prefix: config.with_prefix,
                client: pool.clients()[id % pool.len()].clone(),
                stats: stats.clone(),
                counters: counters.clone(),
            };
            let (tx, rx) = oneshot::channel();
            subscriptions.push(tokio::spawn(subscription.run(cancel.clone(), tx)));
            ready.push(rx);
        }
        join_all(ready).await;
        info!(
            watchers = plan.len(),
            established = counters.established.load(Ordering::SeqCst),
            "Watches established"
        );

        let mut replays = Vec::new();
        let mut replay_dispatcher = None;
        if config.prefix_get_interval_ms > 0 {
            let interval = Duration::from_millis(config.prefix_get_interval_ms);
            let (sender, handle) = Dispatcher::spawn("watch_replay", pool, stats, cancel, options);
            for target in plan.targets() {
                let replay = PrefixReplay::new(target.key.clone(), interval, &mut *rng);
                replays.push(tokio::spawn(replay.run(sender.clone(), stop_signals.subscribe())));
            }
            debug!(replays = replays.len(), ?interval, "Prefix get replay started");
            replay_dispatcher = Some(handle);
        }

        Ok(Self {
            configured: plan.len(),
            counters,
            subscriptions,
            replays,
            replay_dispatcher,
        })
    }

    fn idle() -> Self {
        Self {
            configured: 0,
            counters: Arc::new(WatchCounters::default()),
            subscriptions: Vec::new(),
            replays: Vec::new(),
            replay_dispatcher: None,
        }
    }

    /// Watchers in the plan
    pub fn configured(&self) -> usize {
        self.configured
    }

    /// Watchers still receiving
    pub fn active(&self) -> usize {
        self.counters.active.load(Ordering::SeqCst)
    }

    /// Watchers whose first open succeeded
    pub fn established(&self) -> usize {
        self.counters.established.load(Ordering::SeqCst)
    }

    /// Watches reopened after the store canceled them
    pub fn reacquired(&self) -> usize {
        self.counters.reacquired.load(Ordering::SeqCst)
    }

    /// Waits for every subscription and replay to end.
    ///
    /// Subscriptions end on cancellation; replays end on their stop signal.
    pub async fn close(self) -> Result<()> {
        for handle in self.subscriptions {
            handle.await?;
        }
        let mut replayed = 0;
        for handle in self.replays {
            replayed += handle.await?;
        }
        if let Some(dispatcher) = self.replay_dispatcher {
            dispatcher.join().await?;
        }
        debug!(replayed, "Watches closed");
        Ok(())
    }
}
