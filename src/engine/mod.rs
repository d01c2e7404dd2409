//! Run orchestration.
//!
//! [`PatternEngine`] owns everything one run shares: the compiled key space,
//! the statistics, the cancellation tokens and the stop signals. A run
//! loads the key space, then keeps churning, reading and watching until the
//! test end key is written.

mod sentinel;
mod split;

pub use split::*;


use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::SmallRng;
use rand::Rng;
use rand::SeedableRng;
use tokio::task::JoinHandle;
use tokio::time::interval_at;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::churn::run_activity;
use crate::churn::Activity;
use crate::churn::GetLevel;
use crate::churn::LevelChurnActivity;
use crate::churn::ValueChurn;
use crate::config::WorkloadConfig;
use crate::dispatcher::Dispatcher;
use crate::dispatcher::DispatcherHandle;
use crate::dispatcher::DispatcherOptions;
use crate::dispatcher::RateTicker;
use crate::errors::DefinitionError;
use crate::keyspace::KeySpace;
use crate::pattern::PatternCompiler;
use crate::pattern::ValueSpec;
use crate::stats::ChurnStats;
use crate::stats::StatsAggregator;
use crate::stats::StatsReport;
use crate::store::ClientPool;
use crate::store::Operation;
use crate::store::StoreConnector;
use crate::utils::async_task::spawn_task;
use crate::utils::async_task::task_with_timeout_and_exponential_backoff;
use crate::utils::StopSignals;
use crate::watch::WatchManager;
use crate::Result;
use sentinel::wait_for_sentinel;

/// Reports produced by [`PatternEngine::run`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Initial load, absent when it was skipped
    pub ramp: Option<StatsReport>,
    /// Steady state, absent when no activity was configured
    pub summary: Option<StatsReport>,
    /// Whether the test end key was observed
    pub test_end_seen: bool,
}

/// Tasks started for the steady state
struct RunningActivities {
    tasks: Vec<(&'static str, JoinHandle<u64>)>,
    dispatchers: Vec<DispatcherHandle>,
    watches: WatchManager,
}

impl RunningActivities {
    /// Waits for everything to wind down; returns the first worker failure
    async fn finish(self) -> Result<()> {
        for (name, task) in self.tasks {
            let steps = task.await?;
            debug!(activity = name, steps, "Activity joined");
        }

        let mut first_error = None;
        for dispatcher in self.dispatchers {
            if let Err(e) = dispatcher.join().await {
                first_error.get_or_insert(e);
            }
        }
        self.watches.close().await?;
        first_error.map_or(Ok(()), Err)
    }
}

pub struct PatternEngine {
    config: WorkloadConfig,
    keyspace: Arc<KeySpace>,
    stats: Arc<StatsAggregator>,
    /// Process wide shutdown, parent of `cancel`
    shutdown: CancellationToken,
    /// Stops every activity of the current run
    cancel: CancellationToken,
    stop_signals: Arc<StopSignals>,
    seed: Option<u64>,
    rng_streams: AtomicU64,
}

impl PatternEngine {
    /// Compiles the configured patterns into a key space.
    ///
    /// Builder rule instances and random segments are drawn here, so two
    /// engines built with the same seed enumerate the same keys.
    pub fn new(config: WorkloadConfig) -> Result<Self> {
        let seed = config.workload.seed;
        let mut rng = seeded_rng(seed, 0);

        let value_spec = config
            .workload
            .value_spec
            .as_deref()
            .map(ValueSpec::parse)
            .transpose()?;
        let compiler = PatternCompiler::new(&config.workload.builder_rules, &mut rng)?.with_value_spec(value_spec);
        let patterns = config
            .workload
            .patterns
            .iter()
            .map(|p| compiler.compile(p, &mut rng))
            .collect::<std::result::Result<Vec<_>, DefinitionError>>()?;
        let keyspace = KeySpace::new(patterns, rng.gen())?;
        info!(
            patterns = keyspace.patterns().len(),
            depth = keyspace.max_depth(),
            key_space = keyspace.key_space(),
            "Patterns compiled"
        );

        let shutdown = CancellationToken::new();
        Ok(Self {
            config,
            keyspace: Arc::new(keyspace),
            stats: Arc::new(StatsAggregator::new()),
            cancel: shutdown.child_token(),
            shutdown,
            stop_signals: Arc::new(StopSignals::new()),
            seed,
            rng_streams: AtomicU64::new(1),
        })
    }

    pub fn config(&self) -> &WorkloadConfig {
        &self.config
    }

    pub fn keyspace(&self) -> &Arc<KeySpace> {
        &self.keyspace
    }

    pub fn stats(&self) -> &Arc<StatsAggregator> {
        &self.stats
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Keys the run addresses: the pattern key space, capped by the load total
    pub fn key_space(&self) -> usize {
        let key_space = self.keyspace.key_space();
        let total = self.config.initial_total();
        if total > 0 && total < key_space {
            total
        } else {
            key_space
        }
    }

    /// Every key or prefix at `level`, one per line
    pub fn key_list(
        &self,
        level: usize,
    ) -> String {
        self.keyspace.key_list(level)
    }

    pub fn snapshot(&self) -> ChurnStats {
        self.stats.snapshot()
    }

    pub fn interval_snapshot(&self) -> ChurnStats {
        self.stats.interval_snapshot()
    }

    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    /// A fresh random source; seeded runs derive one stream per call
    pub fn rng(&self) -> SmallRng {
        let stream = self.rng_streams.fetch_add(1, Ordering::Relaxed);
        seeded_rng(self.seed, stream)
    }

    /// Ends the current run: cancels every producer and worker and fires
    /// every stop signal.
    pub fn stop_all_activity(&self) {
        self.cancel.cancel();
        let stopped = self.stop_signals.fire();
        info!(stopped, "All activity stopped");
    }

    /// Stops the run and any wait on the keep-alive key
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.stop_all_activity();
    }

    /// Creates the client pool, retrying as `client.connect_retry` allows.
    ///
    /// Clients that reconnect periodically each get a private connection.
    pub async fn connect(
        &self,
        connector: Arc<dyn StoreConnector>,
    ) -> Result<ClientPool> {
        let client = &self.config.client;
        let private_connections = client.reconnect_every > 0;
        task_with_timeout_and_exponential_backoff(
            || {
                let connector = connector.clone();
                async move {
                    let pool = ClientPool::connect(connector, client.conns, client.clients, private_connections).await?;
                    Ok(pool)
                }
            },
            client.connect_retry,
        )
        .await
    }

    fn dispatcher_options(&self) -> DispatcherOptions {
        DispatcherOptions::from_config(&self.config.client, &self.config.get)
    }

    /// Puts `total` keys (0 = the whole key space once) at the configured
    /// put rate; returns the number of puts sent.
    pub async fn generate_keys(
        &self,
        pool: &ClientPool,
        total: usize,
    ) -> Result<usize> {
        let (sender, handle) = Dispatcher::spawn(
            "load",
            pool,
            self.stats.clone(),
            self.cancel.clone(),
            self.dispatcher_options(),
        );
        let mut ticker = RateTicker::new(self.config.workload.put_rate);
        info!(total, rate = self.config.workload.put_rate, "Generating and adding key/values");

        let mut sent = 0;
        for entry in self.keyspace.keys(total, self.rng()) {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            if !sender.send(Operation::put(entry.key, entry.value.unwrap_or_default())).await {
                break;
            }
            sent += 1;
        }

        drop(sender);
        handle.join().await?;
        info!(sent, "Added key/values");
        Ok(sent)
    }

    fn spawn_activity<A: Activity>(
        &self,
        activity: A,
        pool: &ClientPool,
        running: &mut RunningActivities,
    ) {
        let name = activity.name();
        let (sender, handle) =
            Dispatcher::spawn(name, pool, self.stats.clone(), self.cancel.clone(), self.dispatcher_options());
        running
            .tasks
            .push((name, tokio::spawn(run_activity(activity, sender, self.rng()))));
        running.dispatchers.push(handle);
    }

    /// Starts every configured steady state activity on its share of `pool`.
    ///
    /// All activities are defined before any of them starts, so a bad
    /// definition leaves nothing running.
    async fn start_activities(
        &self,
        pool: &ClientPool,
    ) -> Result<RunningActivities> {
        let churn = &self.config.churn;
        let get = &self.config.get;

        let value_churn = churn
            .value_rate
            .map(|rate| ValueChurn::new(&self.keyspace, rate))
            .transpose()?;
        let level_churn = churn
            .level_rate
            .map(|rate| LevelChurnActivity::new(&self.keyspace, churn.level, churn.level_pct, rate))
            .transpose()?;
        let get_level = get.rate.map(|rate| GetLevel::new(&self.keyspace, get, rate)).transpose()?;

        let split = ClientSplit::plan(
            pool.len(),
            ActiveSet {
                get: get_level.is_some(),
                value_churn: value_churn.is_some(),
                level_churn: level_churn.is_some(),
                watch: self.config.watch.counts_per_level.is_some(),
            },
        );
        debug!(?split, clients = pool.len(), "Client split");

        let watches = WatchManager::start(
            &self.keyspace,
            &self.config.watch,
            &pool.subset(split.watch.clone()),
            self.stats.clone(),
            self.cancel.clone(),
            &self.stop_signals,
            self.dispatcher_options(),
            &mut self.rng(),
        )
        .await?;

        let mut running = RunningActivities {
            tasks: Vec::new(),
            dispatchers: Vec::new(),
            watches,
        };
        if let Some(activity) = level_churn {
            self.spawn_activity(activity, &pool.subset(split.level_churn), &mut running);
        }
        if let Some(activity) = value_churn {
            self.spawn_activity(activity, &pool.subset(split.value_churn), &mut running);
        }
        if let Some(activity) = get_level {
            self.spawn_activity(activity, &pool.subset(split.get), &mut running);
        }
        Ok(running)
    }

    fn spawn_interval_reporter(
        &self,
        handles: &mut Vec<JoinHandle<()>>,
    ) {
        let secs = self.config.run.stats_interval_secs;
        if secs == 0 {
            return;
        }
        let period = Duration::from_secs(secs);
        let stats = self.stats.clone();
        let key_space = self.key_space();
        let mut stop = self.stop_signals.subscribe();

        spawn_task(
            "interval_reporter",
            move || async move {
                let mut ticker = interval_at(Instant::now() + period, period);
                let mut last = Instant::now();
                loop {
                    tokio::select! {
                        biased;
                        _ = stop.changed() => break,
                        _ = ticker.tick() => {}
                    }
                    let now = Instant::now();
                    StatsReport::new("interval", &stats.take_interval(), now - last, key_space).log();
                    last = now;
                }
                Ok(())
            },
            Some(handles),
        );
    }

    /// Blocks until the test end key is written, then stops all activity.
    ///
    /// Returns `false` when the run was cancelled before that.
    pub async fn wait_for_test_end(
        &self,
        pool: &ClientPool,
    ) -> Result<bool> {
        let key = &self.config.run.test_end_key;
        let store = pool.dedicated().await?;
        info!(%key, "Created test end watch");

        let seen = wait_for_sentinel(store.clone(), key, &self.cancel).await;
        store.close().await;
        let seen = seen?;
        if seen {
            info!("Test end detected");
            self.stop_all_activity();
        }
        Ok(seen)
    }

    /// Blocks until the keep-alive key is written or the process shuts down
    async fn wait_for_do_not_exit(
        &self,
        pool: &ClientPool,
    ) -> Result<()> {
        let key = &self.config.run.do_not_exit_key;
        let store = pool.dedicated().await?;
        info!(%key, "Waiting for the keep-alive key before exiting");
        let seen = wait_for_sentinel(store.clone(), key, &self.shutdown).await;
        store.close().await;
        seen.map(|_| ())
    }

    /// Runs the whole workload on `pool`.
    ///
    /// The initial load is followed by a "ramp" report. When any steady state
    /// activity is configured the statistics are reset, the activities run
    /// until the test end key is written, and a "summary" report closes the
    /// run.
    pub async fn run(
        &self,
        pool: &ClientPool,
    ) -> Result<RunSummary> {
        let started = Instant::now();
        let mut summary = RunSummary::default();

        if self.config.workload.skip_init {
            info!("Skipping initial key load");
        } else {
            self.generate_keys(pool, self.config.initial_total()).await?;
            let report = StatsReport::new("ramp", &self.stats.snapshot(), started.elapsed(), self.key_space());
            report.log();
            summary.ramp = Some(report);
        }

        if !self.config.has_steady_state() {
            return Ok(summary);
        }

        self.stats.reset();
        let churn_started = Instant::now();
        let running = self.start_activities(pool).await?;
        let mut reporters = Vec::new();
        self.spawn_interval_reporter(&mut reporters);

        let waited = self.wait_for_test_end(pool).await;
        if !self.cancel.is_cancelled() {
            // The sentinel watch could not be opened
            warn!("Stopping activities without a test end signal");
        }
        self.stop_all_activity();
        let outcome = running.finish().await;
        for reporter in reporters {
            reporter.await?;
        }

        let report = StatsReport::new("summary", &self.stats.snapshot(), churn_started.elapsed(), self.key_space());
        report.log();
        if let Some(window) = self.stats.watch_window() {
            info!(
                watch_events_per_sec = format!("{:.2}", self.stats.watch_throughput()),
                window_s = format!("{:.2}", window.duration().as_secs_f64()),
                "Watch throughput between first and last event"
            );
        }
        summary.summary = Some(report);
        summary.test_end_seen = waited?;
        outcome?;

        if self.config.run.do_not_exit {
            self.wait_for_do_not_exit(pool).await?;
        }
        Ok(summary)
    }
}

fn seeded_rng(
    seed: Option<u64>,
    stream: u64,
) -> SmallRng {
    match seed {
        Some(seed) => SmallRng::seed_from_u64(seed.wrapping_add(stream)),
        None => SmallRng::from_entropy(),
    }
}
