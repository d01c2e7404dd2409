use std::collections::BTreeMap;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tonic::async_trait;
use tracing::trace;

use super::KvStore;
use super::Operation;
use super::OperationResult;
use super::StoreConnector;
use super::WatchEvent;
use super::WatchEventKind;
use super::WatchStream;
use super::WatchUpdate;
use crate::errors::StoreError;

const WATCH_BUFFER: usize = 4096;

#[derive(Debug, Clone)]
enum Notice {
    Event(WatchEvent),
    Cancel,
}

/// Ordered in-process key/value store with etcd-like prefix semantics.
///
/// Supports fault injection: failing the next N puts and canceling every
/// open watch.
#[derive(Debug)]
pub struct MemStore {
    data: RwLock<BTreeMap<String, Vec<u8>>>,
    notices: broadcast::Sender<Notice>,
    failing_puts: AtomicUsize,
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemStore {
    pub fn new() -> Self {
        let (notices, _) = broadcast::channel(WATCH_BUFFER);
        Self {
            data: RwLock::new(BTreeMap::new()),
            notices,
            failing_puts: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    pub fn value(
        &self,
        key: &str,
    ) -> Option<Vec<u8>> {
        self.data.read().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.data.read().keys().cloned().collect()
    }

    pub fn count_prefix(
        &self,
        prefix: &str,
    ) -> usize {
        self.data.read().range(prefix.to_string()..).take_while(|(k, _)| k.starts_with(prefix)).count()
    }

    /// Makes the next `n` puts fail
    pub fn fail_next_puts(
        &self,
        n: usize,
    ) {
        self.failing_puts.store(n, Ordering::SeqCst);
    }

    /// Cancels every open watch, as a store does when compacting or restarting
    pub fn cancel_watches(&self) {
        let _ = self.notices.send(Notice::Cancel);
    }

    /// Number of open watch streams
    pub fn watch_count(&self) -> usize {
        self.notices.receiver_count()
    }

    pub fn put(
        &self,
        key: &str,
        value: &[u8],
    ) {
        self.data.write().insert(key.to_string(), value.to_vec());
        self.notify(WatchEventKind::Put, key.to_string(), value.to_vec());
    }

    fn notify(
        &self,
        kind: WatchEventKind,
        key: String,
        value: Vec<u8>,
    ) {
        // No receivers is not an error
        let _ = self.notices.send(Notice::Event(WatchEvent { kind, key, value }));
    }

    fn take_put_failure(&self) -> bool {
        self.failing_puts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl KvStore for MemStore {
    async fn execute(
        &self,
        op: Operation,
    ) -> Result<OperationResult, StoreError> {
        trace!(kind = op.kind(), key = op.key(), "MemStore execute");
        match op {
            Operation::Put { key, value } => {
                if self.take_put_failure() {
                    return Err(StoreError::Backend(format!("injected put failure for {key}")));
                }
                let bytes = (key.len() + value.len()) as u64;
                self.put(&key, value.as_bytes());
                Ok(OperationResult::Put { bytes })
            }
            Operation::Get {
                key,
                prefix,
                keys_only,
                ..
            } => {
                let data = self.data.read();
                let (count, bytes) = if prefix {
                    data.range(key.clone()..)
                        .take_while(|(k, _)| k.starts_with(&key))
                        .fold((0u64, 0u64), |(c, b), (k, v)| {
                            let v_len = if keys_only { 0 } else { v.len() };
                            (c + 1, b + (k.len() + v_len) as u64)
                        })
                } else {
                    match data.get(&key) {
                        Some(v) => (1, (key.len() + if keys_only { 0 } else { v.len() }) as u64),
                        None => (0, 0),
                    }
                };
                Ok(OperationResult::Get { prefix, count, bytes })
            }
            Operation::Delete { key, prefix } => {
                let removed: Vec<String> = {
                    let mut data = self.data.write();
                    let keys: Vec<String> = if prefix {
                        data.range(key.clone()..)
                            .take_while(|(k, _)| k.starts_with(&key))
                            .map(|(k, _)| k.clone())
                            .collect()
                    } else if data.contains_key(&key) {
                        vec![key.clone()]
                    } else {
                        vec![]
                    };
                    for k in &keys {
                        data.remove(k);
                    }
                    keys
                };
                let deleted = removed.len() as u64;
                for k in removed {
                    self.notify(WatchEventKind::Delete, k, Vec::new());
                }
                Ok(OperationResult::Delete { deleted })
            }
        }
    }

    async fn watch(
        &self,
        key: &str,
        with_prefix: bool,
    ) -> Result<WatchStream, StoreError> {
        let watched = key.to_string();
        let stream = BroadcastStream::new(self.notices.subscribe()).filter_map(move |notice| match notice {
            Ok(Notice::Event(event)) => {
                let matches = if with_prefix {
                    event.key.starts_with(&watched)
                } else {
                    event.key == watched
                };
                matches.then(|| Ok(WatchUpdate::Events(vec![event])))
            }
            Ok(Notice::Cancel) => Some(Ok(WatchUpdate::Canceled {
                reason: "canceled by store".to_string(),
            })),
            // Lagged receivers skip the missed events
            Err(_) => None,
        });
        Ok(Box::pin(stream))
    }

    async fn close(&self) {}
}

/// Hands out one shared [`MemStore`] for every connection
#[derive(Debug, Default)]
pub struct MemConnector {
    store: Arc<MemStore>,
    connects: AtomicUsize,
}

impl MemConnector {
    pub fn new(store: Arc<MemStore>) -> Self {
        Self {
            store,
            connects: AtomicUsize::new(0),
        }
    }

    pub fn store(&self) -> Arc<MemStore> {
        self.store.clone()
    }

    /// Connections opened so far
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StoreConnector for MemConnector {
    async fn connect(
        &self,
        _index: usize,
    ) -> Result<Arc<dyn KvStore>, StoreError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(self.store.clone())
    }
}
