use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use arc_swap::ArcSwap;
use tokio::sync::Mutex;
use tracing::debug;
use tracing::info;

use super::KvStore;
use super::StoreConnector;
use crate::errors::StoreError;

/// A logical client bound to one physical connection.
///
/// The connection can be swapped at runtime; readers always see either the
/// old or the new connection, never a closed gap. Several dispatchers may
/// share one client, so reconnects are serialized and the use budget is
/// counted per client.
pub struct PoolClient {
    index: usize,
    conn: usize,
    store: ArcSwap<Arc<dyn KvStore>>,
    uses: AtomicU64,
    reconnecting: Mutex<()>,
}

impl PoolClient {
    pub fn new(
        index: usize,
        conn: usize,
        store: Arc<dyn KvStore>,
    ) -> Self {
        Self {
            index,
            conn,
            store: ArcSwap::from_pointee(store),
            uses: AtomicU64::new(0),
            reconnecting: Mutex::new(()),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Current connection
    pub fn store(&self) -> Arc<dyn KvStore> {
        (**self.store.load()).clone()
    }

    /// Operations issued since the last reconnect
    pub fn uses(&self) -> u64 {
        self.uses.load(Ordering::SeqCst)
    }

    /// Counts one use of the client, reconnecting first once `reconnect_every`
    /// uses have been spent on the current connection.
    ///
    /// Returns the reconnect latency when a reconnect happened.
    pub async fn acquire(
        &self,
        reconnect_every: u64,
        connector: &dyn StoreConnector,
    ) -> Result<Option<Duration>, StoreError> {
        if reconnect_every == 0 {
            return Ok(None);
        }
        let _guard = self.reconnecting.lock().await;
        let mut elapsed = None;
        if self.uses.load(Ordering::SeqCst) >= reconnect_every {
            elapsed = Some(self.swap_connection(connector).await?);
            self.uses.store(0, Ordering::SeqCst);
        }
        self.uses.fetch_add(1, Ordering::SeqCst);
        Ok(elapsed)
    }

    /// Releases the current connection and opens a new one on the same endpoint.
    ///
    /// Returns the time spent closing and reconnecting.
    pub async fn reconnect(
        &self,
        connector: &dyn StoreConnector,
    ) -> Result<Duration, StoreError> {
        let _guard = self.reconnecting.lock().await;
        let elapsed = self.swap_connection(connector).await?;
        self.uses.store(0, Ordering::SeqCst);
        Ok(elapsed)
    }

    async fn swap_connection(
        &self,
        connector: &dyn StoreConnector,
    ) -> Result<Duration, StoreError> {
        let started = Instant::now();
        self.store().close().await;
        let store = connector.connect(self.conn).await?;
        self.store.store(Arc::new(store));
        Ok(started.elapsed())
    }
}

/// The pool of logical clients shared by all activities.
///
/// `clients` logical clients map onto `conns` physical connections
/// (`client i -> conn i % conns`). When clients reconnect periodically
/// every client gets a private connection so closing it never disturbs
/// another client.
#[derive(Clone)]
pub struct ClientPool {
    connector: Arc<dyn StoreConnector>,
    clients: Vec<Arc<PoolClient>>,
}

impl ClientPool {
    pub async fn connect(
        connector: Arc<dyn StoreConnector>,
        conns: usize,
        clients: usize,
        private_connections: bool,
    ) -> Result<Self, StoreError> {
        let conns = if private_connections { clients } else { conns.clamp(1, clients.max(1)) };

        let mut connections = Vec::with_capacity(conns);
        for i in 0..conns {
            connections.push(connector.connect(i).await?);
        }

        let clients = (0..clients)
            .map(|i| {
                let conn = i % conns;
                Arc::new(PoolClient::new(i, conn, connections[conn].clone()))
            })
            .collect::<Vec<_>>();
        info!(conns, clients = clients.len(), "Created client pool");

        Ok(Self { connector, clients })
    }

    pub fn from_clients(
        connector: Arc<dyn StoreConnector>,
        clients: Vec<Arc<PoolClient>>,
    ) -> Self {
        Self { connector, clients }
    }

    pub fn clients(&self) -> &[Arc<PoolClient>] {
        &self.clients
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn connector(&self) -> Arc<dyn StoreConnector> {
        self.connector.clone()
    }

    /// A pool over a subset of clients, sharing the connector
    pub fn subset(
        &self,
        range: std::ops::Range<usize>,
    ) -> Self {
        Self {
            connector: self.connector.clone(),
            clients: self.clients[range].to_vec(),
        }
    }

    /// A fresh connection outside the pool, used for sentinel watches
    pub async fn dedicated(&self) -> Result<Arc<dyn KvStore>, StoreError> {
        self.connector.connect(0).await
    }

    pub async fn close(&self) {
        for client in &self.clients {
            client.store().close().await;
        }
        debug!(clients = self.clients.len(), "Closed client pool");
    }
}
