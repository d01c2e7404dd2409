use std::sync::Arc;
use std::time::Duration;

use etcd_client::Client;
use etcd_client::ConnectOptions;
use etcd_client::DeleteOptions;
use etcd_client::EventType;
use etcd_client::GetOptions;
use etcd_client::WatchOptions;
use etcd_client::WatchResponse;
use tonic::async_trait;
use tracing::debug;

use super::KvStore;
use super::Operation;
use super::OperationResult;
use super::StoreConnector;
use super::WatchEvent;
use super::WatchEventKind;
use super::WatchStream;
use super::WatchUpdate;
use crate::errors::StoreError;

/// One etcd v3 connection
#[derive(Clone)]
pub struct EtcdStore {
    client: Client,
    endpoint: String,
}

impl EtcdStore {
    pub fn new(
        client: Client,
        endpoint: String,
    ) -> Self {
        Self { client, endpoint }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl KvStore for EtcdStore {
    async fn execute(
        &self,
        op: Operation,
    ) -> Result<OperationResult, StoreError> {
        let mut kv = self.client.kv_client();
        match op {
            Operation::Put { key, value } => {
                let bytes = (key.len() + value.len()) as u64;
                kv.put(key, value, None).await?;
                Ok(OperationResult::Put { bytes })
            }
            Operation::Get {
                key,
                prefix,
                serializable,
                keys_only,
            } => {
                let mut options = GetOptions::new();
                if prefix {
                    options = options.with_prefix();
                }
                if serializable {
                    options = options.with_serializable();
                }
                if keys_only {
                    options = options.with_keys_only();
                }
                let resp = kv.get(key, Some(options)).await?;
                let bytes: usize = resp.kvs().iter().map(|kv| kv.key().len() + kv.value().len()).sum();
                Ok(OperationResult::Get {
                    prefix,
                    count: resp.count().max(0) as u64,
                    bytes: bytes as u64,
                })
            }
            Operation::Delete { key, prefix } => {
                let options = prefix.then(|| DeleteOptions::new().with_prefix());
                let resp = kv.delete(key, options).await?;
                Ok(OperationResult::Delete {
                    deleted: resp.deleted().max(0) as u64,
                })
            }
        }
    }

    async fn watch(
        &self,
        key: &str,
        with_prefix: bool,
    ) -> Result<WatchStream, StoreError> {
        let options = with_prefix.then(|| WatchOptions::new().with_prefix());
        let (watcher, stream) = self.client.watch_client().watch(key, options).await?;
        debug!(key, with_prefix, endpoint = %self.endpoint, "Watch stream established");

        // The watcher owns the request side of the stream and must live as
        // long as the responses are consumed.
        let updates = futures::stream::unfold((watcher, stream), |(watcher, mut stream)| async move {
            match stream.message().await {
                Ok(Some(resp)) => Some((Ok(to_update(&resp)), (watcher, stream))),
                Ok(None) => None,
                Err(e) => Some((Err(StoreError::from(e)), (watcher, stream))),
            }
        });
        Ok(Box::pin(updates))
    }

    /// etcd-client has no explicit close; the channel is released once the
    /// last clone of the `Client` is dropped, which happens when the pool
    /// swaps this store out and in-flight operations finish.
    async fn close(&self) {
        debug!(endpoint = %self.endpoint, "Releasing etcd connection");
    }
}

fn to_update(resp: &WatchResponse) -> WatchUpdate {
    if resp.canceled() {
        return WatchUpdate::Canceled {
            reason: resp.cancel_reason().to_string(),
        };
    }
    let events = resp
        .events()
        .iter()
        .filter_map(|event| {
            let kv = event.kv()?;
            let kind = match event.event_type() {
                EventType::Put => WatchEventKind::Put,
                EventType::Delete => WatchEventKind::Delete,
            };
            Some(WatchEvent {
                kind,
                key: String::from_utf8_lossy(kv.key()).into_owned(),
                value: kv.value().to_vec(),
            })
        })
        .collect();
    WatchUpdate::Events(events)
}

/// Connects to etcd endpoints, one endpoint per connection in round-robin order
#[derive(Debug, Clone)]
pub struct EtcdConnector {
    endpoints: Vec<String>,
    connect_timeout: Duration,
}

impl EtcdConnector {
    pub fn new(
        endpoints: Vec<String>,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            endpoints,
            connect_timeout,
        }
    }
}

#[async_trait]
impl StoreConnector for EtcdConnector {
    async fn connect(
        &self,
        index: usize,
    ) -> Result<Arc<dyn KvStore>, StoreError> {
        if self.endpoints.is_empty() {
            return Err(StoreError::Backend("no etcd endpoints configured".to_string()));
        }
        let endpoint = self.endpoints[index % self.endpoints.len()].clone();
        let options = ConnectOptions::new().with_connect_timeout(self.connect_timeout);
        let client = Client::connect([endpoint.as_str()], Some(options)).await?;
        debug!(index, %endpoint, "Connected to etcd");
        Ok(Arc::new(EtcdStore::new(client, endpoint)))
    }
}
