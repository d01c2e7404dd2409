use std::time::Duration;

use tokio::time::interval_at;
use tokio::time::Instant;
use tokio::time::Interval;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::constants::RATE_PERIOD;

/// Paces a producing activity at a number of requests per hour.
///
/// A rate of 0 never waits. Ticks missed while the producer was blocked are
/// skipped rather than replayed in a burst.
#[derive(Debug)]
pub struct RateTicker {
    interval: Option<Interval>,
}

impl RateTicker {
    pub fn new(rate_per_hour: u64) -> Self {
        let interval = Self::period(rate_per_hour).map(|period| {
            debug!(rate_per_hour, ?period, "Rate ticker created");
            // First request goes out after one period
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        });
        Self { interval }
    }

    /// Time between two requests; `None` when unlimited
    pub fn period(rate_per_hour: u64) -> Option<Duration> {
        if rate_per_hour == 0 {
            return None;
        }
        let nanos = (RATE_PERIOD.as_nanos() / rate_per_hour as u128).max(1);
        Some(Duration::from_nanos(nanos as u64))
    }

    pub fn is_unlimited(&self) -> bool {
        self.interval.is_none()
    }

    pub async fn tick(&mut self) {
        if let Some(interval) = self.interval.as_mut() {
            interval.tick().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_from_hourly_rate() {
        assert_eq!(RateTicker::period(0), None);
        assert_eq!(RateTicker::period(3600), Some(Duration::from_secs(1)));
        assert_eq!(RateTicker::period(7200), Some(Duration::from_millis(500)));
        assert_eq!(RateTicker::period(1), Some(Duration::from_secs(3600)));
    }

    #[test]
    fn test_huge_rate_keeps_a_non_zero_period() {
        assert_eq!(RateTicker::period(u64::MAX), Some(Duration::from_nanos(1)));
    }
}
