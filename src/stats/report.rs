use std::time::Duration;

use tracing::info;
use tracing::warn;

use super::ChurnStats;
use super::OpStats;

/// Rates and means for one category over a report window
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RateSummary {
    pub calls: u64,
    pub keys: u64,
    pub calls_per_sec: f64,
    pub keys_per_sec: f64,
    pub mean_us: f64,
    pub min_us: u64,
    pub max_us: u64,
    pub bytes_per_sec: f64,
}

impl RateSummary {
    fn new(
        op: &OpStats,
        secs: f64,
    ) -> Self {
        Self {
            calls: op.calls(),
            keys: op.keys,
            calls_per_sec: per_sec(op.calls(), secs),
            keys_per_sec: per_sec(op.keys, secs),
            mean_us: op.latency.mean_us(),
            min_us: op.latency.min_us,
            max_us: op.latency.max_us,
            bytes_per_sec: per_sec(op.bytes, secs),
        }
    }
}

/// Derived view of a [`ChurnStats`] snapshot over `elapsed`.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsReport {
    pub label: &'static str,
    pub elapsed: Duration,
    /// Keys the run addresses: the pattern key space capped by the load total
    pub key_space: usize,
    pub put: RateSummary,
    pub delete: RateSummary,
    pub get: RateSummary,
    pub prefix_get: RateSummary,
    pub reconnects: u64,
    pub reconnect_mean_us: f64,
    pub reconnect_max_us: u64,
    pub errors: u64,
    pub watch_events: u64,
    pub watch_events_per_sec: f64,
    pub watchers_configured: u64,
    pub watchers_active: u64,
}

impl StatsReport {
    pub fn new(
        label: &'static str,
        stats: &ChurnStats,
        elapsed: Duration,
        key_space: usize,
    ) -> Self {
        let secs = elapsed.as_secs_f64();
        Self {
            label,
            elapsed,
            key_space,
            put: RateSummary::new(&stats.put, secs),
            delete: RateSummary::new(&stats.delete, secs),
            get: RateSummary::new(&stats.get, secs),
            prefix_get: RateSummary::new(&stats.prefix_get, secs),
            reconnects: stats.reconnect.count,
            reconnect_mean_us: stats.reconnect.mean_us(),
            reconnect_max_us: stats.reconnect.max_us,
            errors: stats.errors,
            watch_events: stats.watch_events,
            watch_events_per_sec: per_sec(stats.watch_events, secs),
            watchers_configured: stats.watchers_configured,
            watchers_active: stats.watchers_active,
        }
    }

    pub fn log(&self) {
        info!(
            report = self.label,
            elapsed_s = format!("{:.2}", self.elapsed.as_secs_f64()),
            key_space = self.key_space,
            errors = self.errors,
            "Workload statistics"
        );
        for (kind, s) in [
            ("put", &self.put),
            ("delete", &self.delete),
            ("get", &self.get),
            ("prefix_get", &self.prefix_get),
        ] {
            if s.calls == 0 {
                continue;
            }
            info!(
                report = self.label,
                kind,
                calls = s.calls,
                keys = s.keys,
                calls_per_sec = format!("{:.2}", s.calls_per_sec),
                keys_per_sec = format!("{:.2}", s.keys_per_sec),
                mean_us = format!("{:.1}", s.mean_us),
                min_us = s.min_us,
                max_us = s.max_us,
                bytes_per_sec = format!("{:.1}", s.bytes_per_sec),
            );
        }
        if self.reconnects > 0 {
            info!(
                report = self.label,
                reconnects = self.reconnects,
                mean_us = format!("{:.1}", self.reconnect_mean_us),
                max_us = self.reconnect_max_us,
            );
        }
        if self.watch_events > 0 {
            info!(
                report = self.label,
                watch_events = self.watch_events,
                watch_events_per_sec = format!("{:.2}", self.watch_events_per_sec),
            );
        }
        if self.watchers_active < self.watchers_configured {
            warn!(
                report = self.label,
                watchers_active = self.watchers_active,
                watchers_configured = self.watchers_configured,
                "Watchers lost"
            );
        } else if self.watchers_configured > 0 {
            info!(
                report = self.label,
                watchers_active = self.watchers_active,
                watchers_configured = self.watchers_configured,
            );
        }
    }
}

fn per_sec(
    n: u64,
    secs: f64,
) -> f64 {
    if secs > 0.0 {
        n as f64 / secs
    } else {
        0.0
    }
}
