//! Store abstraction.
//!
//! The workload engine only needs three things from a key/value store:
//! execute a put/get/delete, open a watch, and (re)connect. [`KvStore`] and
//! [`StoreConnector`] are the seams; [`EtcdStore`] talks to a real cluster
//! and [`MemStore`] is an in-process stand-in for tests and dry runs.

mod etcd;
mod mem;
mod pool;

pub use etcd::*;
pub use mem::*;
pub use pool::*;

#[cfg(test)]
mod mem_test;
#[cfg(test)]
mod pool_test;

use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;
#[cfg(test)]
use mockall::automock;
use tonic::async_trait;

use crate::errors::StoreError;

/// A single store request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Put {
        key: String,
        value: String,
    },
    Get {
        key: String,
        prefix: bool,
        serializable: bool,
        keys_only: bool,
    },
    Delete {
        key: String,
        prefix: bool,
    },
}

impl Operation {
    pub fn put(
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Operation::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete_prefix(key: impl Into<String>) -> Self {
        Operation::Delete {
            key: key.into(),
            prefix: true,
        }
    }

    /// Label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::Put { .. } => "put",
            Operation::Get { prefix: true, .. } => "prefix_get",
            Operation::Get { .. } => "get",
            Operation::Delete { .. } => "delete",
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Operation::Put { key, .. } | Operation::Get { key, .. } | Operation::Delete { key, .. } => key,
        }
    }
}

/// Outcome of a successful [`Operation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationResult {
    /// `bytes` is the key plus value size written
    Put { bytes: u64 },
    /// `bytes` is the key plus value size of every returned pair
    Get { prefix: bool, count: u64, bytes: u64 },
    Delete { deleted: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Put,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: WatchEventKind,
    pub key: String,
    pub value: Vec<u8>,
}

/// One message received on a watch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchUpdate {
    Events(Vec<WatchEvent>),
    /// The store dropped the watch; a new one may be opened
    Canceled { reason: String },
}

pub type WatchStream = Pin<Box<dyn Stream<Item = Result<WatchUpdate, StoreError>> + Send>>;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait KvStore: Send + Sync + 'static {
    async fn execute(
        &self,
        op: Operation,
    ) -> Result<OperationResult, StoreError>;

    /// Watches `key`, or every key starting with it when `with_prefix` is set
    async fn watch(
        &self,
        key: &str,
        with_prefix: bool,
    ) -> Result<WatchStream, StoreError>;

    /// Releases the connection. Backends that share the underlying channel
    /// between clones free it only when the last clone is dropped.
    async fn close(&self);
}

/// Opens store connections; `index` selects the endpoint round-robin.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StoreConnector: Send + Sync + 'static {
    async fn connect(
        &self,
        index: usize,
    ) -> Result<Arc<dyn KvStore>, StoreError>;
}
