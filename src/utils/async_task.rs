use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio::time::timeout;
use tracing::error;
use tracing::warn;

use crate::config::BackoffPolicy;
use crate::errors::StoreError;
use crate::Error;
use crate::Result;

/// Runs `task` until it succeeds, each attempt bounded by the policy timeout.
///
/// The delay between attempts doubles up to `max_delay_ms`. The last error
/// is returned once `max_retries` attempts failed.
pub(crate) async fn task_with_timeout_and_exponential_backoff<F, T, P>(
    task: F,
    policy: BackoffPolicy,
) -> Result<P>
where
    F: Fn() -> T,
    T: Future<Output = Result<P>>,
{
    let attempt_timeout = Duration::from_millis(policy.timeout_ms);
    let max_delay = Duration::from_millis(policy.max_delay_ms);
    let mut delay = Duration::from_millis(policy.base_delay_ms);
    let mut attempts = 0;

    loop {
        let e = match timeout(attempt_timeout, task()).await {
            Ok(Ok(r)) => return Ok(r),
            Ok(Err(e)) => e,
            Err(_) => Error::Store(StoreError::Timeout(attempt_timeout)),
        };

        attempts += 1;
        if policy.max_retries > 0 && attempts >= policy.max_retries {
            warn!(attempts, "Task failed after max retries: {}", e);
            return Err(e);
        }
        warn!(attempts, ?delay, "Attempt failed, retrying: {}", e);

        sleep(delay).await;
        delay = (delay * 2).min(max_delay);
    }
}

/// Spawns a named task, logging its failure, and tracks its handle
pub(crate) fn spawn_task<F, Fut>(
    name: &'static str,
    task_fn: F,
    handles: Option<&mut Vec<JoinHandle<()>>>,
) where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let handle = tokio::spawn(async move {
        if let Err(e) = task_fn().await {
            error!(task = name, "Spawned task stopped with error: {}", e);
        }
    });

    if let Some(h) = handles {
        h.push(handle);
    }
}
