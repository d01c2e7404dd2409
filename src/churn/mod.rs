//! Steady state activities over an existing key space.
//!
//! Every activity produces operations into a dispatcher at its own rate
//! until the run is cancelled:
//! - [`ValueChurn`]: rewrites values of random leaf keys
//! - [`LevelChurnActivity`]: deletes and recreates whole subtrees
//! - [`GetLevel`]: reads random prefixes at one level

mod get_level;
mod level;
mod value;

pub use get_level::*;
pub use level::*;
pub use value::*;


use rand::rngs::SmallRng;
use tonic::async_trait;
use tracing::info;

use crate::dispatcher::OpSender;
use crate::dispatcher::RateTicker;

#[async_trait]
pub trait Activity: Send + 'static {
    fn name(&self) -> &'static str;

    /// Steps per hour, 0 = unlimited
    fn rate(&self) -> u64;

    /// Produces the operations of one tick.
    ///
    /// Returns `false` once nothing more can be sent.
    async fn step(
        &mut self,
        sender: &OpSender,
        rng: &mut SmallRng,
    ) -> bool;
}

/// Drives `activity` at its rate until cancellation; returns the steps taken
pub async fn run_activity<A: Activity>(
    mut activity: A,
    sender: OpSender,
    mut rng: SmallRng,
) -> u64 {
    let name = activity.name();
    let mut ticker = RateTicker::new(activity.rate());
    info!(activity = name, rate = activity.rate(), "Activity started");

    let mut steps = 0u64;
    loop {
        tokio::select! {
            biased;
            _ = sender.cancel_token().cancelled() => break,
            _ = ticker.tick() => {}
        }
        if !activity.step(&sender, &mut rng).await {
            break;
        }
        steps += 1;
    }

    info!(activity = name, steps, "Activity stopped");
    steps
}
