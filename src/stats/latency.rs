use std::time::Duration;

/// Latency accumulator in microseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LatencyStat {
    pub count: u64,
    pub total_us: u64,
    pub min_us: u64,
    pub max_us: u64,
}

impl LatencyStat {
    pub fn record(
        &mut self,
        latency: Duration,
    ) {
        let us = latency.as_micros() as u64;
        if self.count == 0 || us < self.min_us {
            self.min_us = us;
        }
        if us > self.max_us {
            self.max_us = us;
        }
        self.count += 1;
        self.total_us += us;
    }

    pub fn mean_us(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_us as f64 / self.count as f64
        }
    }
}

/// Totals for one operation category.
///
/// `latency.count` is the number of client calls; `keys` is the number of
/// keys they touched (equal for puts, the deleted or returned count for
/// deletes and reads).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpStats {
    pub latency: LatencyStat,
    pub keys: u64,
    pub bytes: u64,
}

impl OpStats {
    pub(crate) fn record(
        &mut self,
        latency: Duration,
        keys: u64,
        bytes: u64,
    ) {
        self.latency.record(latency);
        self.keys += keys;
        self.bytes += bytes;
    }

    pub fn calls(&self) -> u64 {
        self.latency.count
    }
}

/// Point in time copy of all counters for one view (lifetime or interval)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChurnStats {
    pub put: OpStats,
    pub delete: OpStats,
    pub get: OpStats,
    pub prefix_get: OpStats,
    pub reconnect: LatencyStat,
    pub errors: u64,
    pub watch_events: u64,
    /// Watchers in the watch plan
    pub watchers_configured: u64,
    /// Planned watchers that have not failed; those stopped by the end of
    /// the run still count
    pub watchers_active: u64,
}

impl ChurnStats {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Total successful client calls of every kind
    pub fn operations(&self) -> u64 {
        self.put.calls() + self.delete.calls() + self.get.calls() + self.prefix_get.calls()
    }
}
