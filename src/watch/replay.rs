use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;
use tokio::time::interval_at;
use tokio::time::sleep;
use tokio::time::Instant;
use tokio::time::MissedTickBehavior;
use tracing::trace;

use crate::dispatcher::OpSender;
use crate::store::Operation;

/// Periodic prefix reads of one watched key.
///
/// Start delays are spread over `1..=interval` whole seconds so replays of
/// different keys don't fire together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixReplay {
    key: String,
    interval: Duration,
    start_delay: Duration,
}

impl PrefixReplay {
    pub fn new(
        key: impl Into<String>,
        interval: Duration,
        rng: &mut impl Rng,
    ) -> Self {
        let secs = interval.as_secs().max(1);
        Self {
            key: key.into(),
            interval,
            start_delay: Duration::from_secs(rng.gen_range(1..=secs)),
        }
    }

    pub fn start_delay(&self) -> Duration {
        self.start_delay
    }

    pub fn operation(&self) -> Operation {
        Operation::Get {
            key: self.key.clone(),
            prefix: true,
            serializable: false,
            keys_only: false,
        }
    }

    /// Sends reads until stopped or cancelled; returns how many were sent
    pub async fn run(
        self,
        sender: OpSender,
        mut stop: watch::Receiver<()>,
    ) -> u64 {
        let cancel = sender.cancel_token().clone();
        tokio::select! {
            biased;
            _ = stop.changed() => return 0,
            _ = cancel.cancelled() => return 0,
            _ = sleep(self.start_delay) => {}
        }

        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut sent = 0;
        loop {
            tokio::select! {
                biased;
                _ = stop.changed() => break,
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    trace!(key = %self.key, "Replaying prefix get");
                    if !sender.send(self.operation()).await {
                        break;
                    }
                    sent += 1;
                }
            }
        }
        sent
    }
}
