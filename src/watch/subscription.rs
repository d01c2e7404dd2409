use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use crate::metrics::ACTIVE_WATCHERS;
use crate::stats::StatsAggregator;
use crate::store::PoolClient;
use crate::store::WatchUpdate;

/// Counters shared by every subscription of one manager
#[derive(Debug, Default)]
pub struct WatchCounters {
    pub(crate) active: AtomicUsize,
    pub(crate) established: AtomicUsize,
    pub(crate) reacquired: AtomicUsize,
}

/// One watched key, bound to one client for its lifetime
pub(crate) struct Subscription {
    pub(crate) id: usize,
    pub(crate) key: String,
    pub(crate) with_prefix: bool,
    pub(crate) client: Arc<PoolClient>,
    pub(crate) stats: Arc<StatsAggregator>,
    pub(crate) counters: Arc<WatchCounters>,
}

impl Subscription {
    /// Receives events until the run is cancelled or the watch fails.
    ///
    /// A watch canceled by the store is reopened on the same client. `ready`
    /// fires after the first open attempt.
    pub(crate) async fn run(
        self,
        cancel: CancellationToken,
        ready: oneshot::Sender<()>,
    ) {
        let mut ready = Some(ready);
        self.counters.active.fetch_add(1, Ordering::SeqCst);
        ACTIVE_WATCHERS.inc();

        'acquire: loop {
            let opened = self.client.store().watch(&self.key, self.with_prefix).await;
            if let Some(ready) = ready.take() {
                if opened.is_ok() {
                    self.counters.established.fetch_add(1, Ordering::SeqCst);
                }
                let _ = ready.send(());
            }
            let mut stream = match opened {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(watcher = self.id, key = %self.key, "Could not open watch: {}", e);
                    break;
                }
            };
            trace!(watcher = self.id, key = %self.key, client = self.client.index(), "Watching");

            loop {
                let update = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break 'acquire,
                    update = stream.next() => update,
                };
                match update {
                    Some(Ok(WatchUpdate::Events(events))) => {
                        if !events.is_empty() {
                            self.stats.record_watch_events(events.len() as u64);
                        }
                    }
                    Some(Ok(WatchUpdate::Canceled { reason })) => {
                        warn!(watcher = self.id, key = %self.key, %reason, "Watch canceled, will reacquire");
                        self.counters.reacquired.fetch_add(1, Ordering::SeqCst);
                        continue 'acquire;
                    }
                    Some(Err(e)) => {
                        warn!(watcher = self.id, key = %self.key, "Watch error: {}", e);
                        break 'acquire;
                    }
                    None => {
                        debug!(watcher = self.id, key = %self.key, "Watch stream ended");
                        break 'acquire;
                    }
                }
            }
        }

        if !cancel.is_cancelled() {
            self.stats.record_watcher_lost();
        }
        self.counters.active.fetch_sub(1, Ordering::SeqCst);
        ACTIVE_WATCHERS.dec();
    }
}
