use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use parking_lot::Mutex;

use super::ChurnStats;
use super::LatencyStat;
use super::OpStats;
use crate::metrics;

/// Lifetime and interval views of one category, updated under one lock so
/// both always see the same observations.
#[derive(Debug, Default)]
struct Window<T> {
    lifetime: T,
    interval: T,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchWindow {
    pub first: Instant,
    pub last: Instant,
}

impl WatchWindow {
    pub fn duration(&self) -> Duration {
        self.last.saturating_duration_since(self.first)
    }
}

#[derive(Debug, Default)]
struct Counter {
    lifetime: AtomicU64,
    interval: AtomicU64,
}

impl Counter {
    fn add(
        &self,
        n: u64,
    ) {
        self.lifetime.fetch_add(n, Ordering::Relaxed);
        self.interval.fetch_add(n, Ordering::Relaxed);
    }
}

/// Shared statistics sink for every activity.
///
/// Each category has its own lock so puts, reads and deletes recorded by
/// different workers never contend with each other.
#[derive(Debug, Default)]
pub struct StatsAggregator {
    put: Mutex<Window<OpStats>>,
    delete: Mutex<Window<OpStats>>,
    get: Mutex<Window<OpStats>>,
    prefix_get: Mutex<Window<OpStats>>,
    reconnect: Mutex<Window<LatencyStat>>,
    errors: Counter,
    watch_events: Counter,
    watch_window: Mutex<Option<WatchWindow>>,
    watchers_configured: AtomicU64,
    watchers_lost: AtomicU64,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_put(
        &self,
        latency: Duration,
        bytes: u64,
    ) {
        record(&self.put, latency, 1, bytes);
        metrics::observe_operation("put", latency, bytes);
    }

    pub fn record_delete(
        &self,
        latency: Duration,
        deleted: u64,
    ) {
        record(&self.delete, latency, deleted, 0);
        metrics::observe_operation("delete", latency, 0);
    }

    pub fn record_get(
        &self,
        prefix: bool,
        latency: Duration,
        count: u64,
        bytes: u64,
    ) {
        if prefix {
            record(&self.prefix_get, latency, count, bytes);
            metrics::observe_operation("prefix_get", latency, bytes);
        } else {
            record(&self.get, latency, count, bytes);
            metrics::observe_operation("get", latency, bytes);
        }
    }

    pub fn record_reconnect(
        &self,
        latency: Duration,
    ) {
        let mut w = self.reconnect.lock();
        w.lifetime.record(latency);
        w.interval.record(latency);
        metrics::RECONNECTS_TOTAL.inc();
    }

    pub fn record_error(
        &self,
        kind: &str,
    ) {
        self.errors.add(1);
        metrics::observe_error(kind);
    }

    /// Counts `events` watch events and extends the first/last event window
    pub fn record_watch_events(
        &self,
        events: u64,
    ) {
        let now = Instant::now();
        {
            let mut window = self.watch_window.lock();
            match window.as_mut() {
                Some(w) => w.last = now,
                None => *window = Some(WatchWindow { first: now, last: now }),
            }
        }
        self.watch_events.add(events);
        metrics::WATCH_EVENTS_TOTAL.inc_by(events);
    }

    /// Starts accounting for a new watch plan of `watchers` watchers
    pub fn set_watchers_configured(
        &self,
        watchers: u64,
    ) {
        self.watchers_configured.store(watchers, Ordering::Relaxed);
        self.watchers_lost.store(0, Ordering::Relaxed);
    }

    /// A watcher stopped receiving before the run ended
    pub fn record_watcher_lost(&self) {
        self.watchers_lost.fetch_add(1, Ordering::Relaxed);
    }

    pub fn watchers_active(&self) -> u64 {
        let configured = self.watchers_configured.load(Ordering::Relaxed);
        configured.saturating_sub(self.watchers_lost.load(Ordering::Relaxed))
    }

    pub fn watch_window(&self) -> Option<WatchWindow> {
        *self.watch_window.lock()
    }

    /// Watch events per second between the first and the last event
    pub fn watch_throughput(&self) -> f64 {
        let events = self.watch_events.lifetime.load(Ordering::Relaxed);
        match self.watch_window() {
            Some(w) if !w.duration().is_zero() => events as f64 / w.duration().as_secs_f64(),
            _ => 0.0,
        }
    }

    /// Lifetime view
    pub fn snapshot(&self) -> ChurnStats {
        ChurnStats {
            put: self.put.lock().lifetime,
            delete: self.delete.lock().lifetime,
            get: self.get.lock().lifetime,
            prefix_get: self.prefix_get.lock().lifetime,
            reconnect: self.reconnect.lock().lifetime,
            errors: self.errors.lifetime.load(Ordering::Relaxed),
            watch_events: self.watch_events.lifetime.load(Ordering::Relaxed),
            watchers_configured: self.watchers_configured.load(Ordering::Relaxed),
            watchers_active: self.watchers_active(),
        }
    }

    /// Interval view
    pub fn interval_snapshot(&self) -> ChurnStats {
        ChurnStats {
            put: self.put.lock().interval,
            delete: self.delete.lock().interval,
            get: self.get.lock().interval,
            prefix_get: self.prefix_get.lock().interval,
            reconnect: self.reconnect.lock().interval,
            errors: self.errors.interval.load(Ordering::Relaxed),
            watch_events: self.watch_events.interval.load(Ordering::Relaxed),
            watchers_configured: self.watchers_configured.load(Ordering::Relaxed),
            watchers_active: self.watchers_active(),
        }
    }

    /// Returns the interval view and clears it, category by category
    pub fn take_interval(&self) -> ChurnStats {
        ChurnStats {
            put: std::mem::take(&mut self.put.lock().interval),
            delete: std::mem::take(&mut self.delete.lock().interval),
            get: std::mem::take(&mut self.get.lock().interval),
            prefix_get: std::mem::take(&mut self.prefix_get.lock().interval),
            reconnect: std::mem::take(&mut self.reconnect.lock().interval),
            errors: self.errors.interval.swap(0, Ordering::Relaxed),
            watch_events: self.watch_events.interval.swap(0, Ordering::Relaxed),
            watchers_configured: self.watchers_configured.load(Ordering::Relaxed),
            watchers_active: self.watchers_active(),
        }
    }

    pub fn reset_interval(&self) {
        let _ = self.take_interval();
    }

    /// Clears both views and the watch window
    pub fn reset(&self) {
        *self.put.lock() = Window::default();
        *self.delete.lock() = Window::default();
        *self.get.lock() = Window::default();
        *self.prefix_get.lock() = Window::default();
        *self.reconnect.lock() = Window::default();
        for c in [&self.errors, &self.watch_events] {
            c.lifetime.store(0, Ordering::Relaxed);
            c.interval.store(0, Ordering::Relaxed);
        }
        *self.watch_window.lock() = None;
        self.watchers_configured.store(0, Ordering::Relaxed);
        self.watchers_lost.store(0, Ordering::Relaxed);
    }
}

fn record(
    window: &Mutex<Window<OpStats>>,
    latency: Duration,
    keys: u64,
    bytes: u64,
) {
    let mut w = window.lock();
    w.lifetime.record(latency, keys, bytes);
    w.interval.record(latency, keys, bytes);
}
