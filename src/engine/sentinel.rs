use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

use crate::constants::TEST_END_VALUE;
use crate::store::KvStore;
use crate::store::WatchEventKind;
use crate::store::WatchUpdate;
use crate::Result;

const REOPEN_DELAY: Duration = Duration::from_secs(1);

/// Waits until `key` is written with [`TEST_END_VALUE`].
///
/// Returns `true` when the value was seen and `false` when `stop` fired
/// first. A watch that the store cancels or ends is reopened; only failing
/// to open it is an error.
pub(crate) async fn wait_for_sentinel(
    store: Arc<dyn KvStore>,
    key: &str,
    stop: &CancellationToken,
) -> Result<bool> {
    loop {
        let mut stream = tokio::select! {
            biased;
            _ = stop.cancelled() => return Ok(false),
            opened = store.watch(key, false) => opened?,
        };
        debug!(key, "Sentinel watch opened");

        loop {
            let update = tokio::select! {
                biased;
                _ = stop.cancelled() => return Ok(false),
                update = stream.next() => update,
            };
            match update {
                Some(Ok(WatchUpdate::Events(events))) => {
                    let ended = events
                        .iter()
                        .any(|e| e.kind == WatchEventKind::Put && e.value == TEST_END_VALUE);
                    if ended {
                        return Ok(true);
                    }
                }
                Some(Ok(WatchUpdate::Canceled { reason })) => {
                    warn!(key, %reason, "Sentinel watch canceled and will be recreated");
                    break;
                }
                Some(Err(e)) => {
                    warn!(key, "Sentinel watch failed, reopening: {}", e);
                    sleep(REOPEN_DELAY).await;
                    break;
                }
                None => {
                    debug!(key, "Sentinel watch ended, reopening");
                    sleep(REOPEN_DELAY).await;
                    break;
                }
            }
        }
    }
}
