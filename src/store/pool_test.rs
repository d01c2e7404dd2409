use std::sync::Arc;

use super::*;
use crate::errors::StoreError;

#[tokio::test]
async fn test_clients_map_round_robin_onto_connections() {
    let mut connector = MockStoreConnector::new();
    connector.expect_connect().times(2).returning(|_| {
        let store: Arc<dyn KvStore> = Arc::new(MemStore::new());
        Ok(store)
    });

    let pool = ClientPool::connect(Arc::new(connector), 2, 5, false).await.unwrap();

    assert_eq!(pool.len(), 5);
    let stores: Vec<Arc<dyn KvStore>> = pool.clients().iter().map(|c| c.store()).collect();
    assert!(Arc::ptr_eq(&stores[0], &stores[2]));
    assert!(Arc::ptr_eq(&stores[0], &stores[4]));
    assert!(Arc::ptr_eq(&stores[1], &stores[3]));
    assert!(!Arc::ptr_eq(&stores[0], &stores[1]));
}

#[tokio::test]
async fn test_private_connections_per_client() {
    let connector = Arc::new(MemConnector::default());
    let pool = ClientPool::connect(connector.clone(), 1, 4, true).await.unwrap();

    assert_eq!(pool.len(), 4);
    assert_eq!(connector.connects(), 4);
}

#[tokio::test]
async fn test_connect_failure_is_reported() {
    let mut connector = MockStoreConnector::new();
    connector
        .expect_connect()
        .returning(|_| Err(StoreError::Backend("refused".to_string())));

    assert!(ClientPool::connect(Arc::new(connector), 1, 1, false).await.is_err());
}

#[tokio::test]
async fn test_reconnect_swaps_connection() {
    let connector = MemConnector::default();
    let first: Arc<dyn KvStore> = Arc::new(MemStore::new());
    let client = PoolClient::new(0, 0, first.clone());

    let elapsed = client.reconnect(&connector).await.unwrap();

    assert!(!Arc::ptr_eq(&client.store(), &first));
    assert_eq!(connector.connects(), 1);
    assert!(elapsed.as_secs() < 5);
}

#[tokio::test]
async fn test_subset_shares_clients() {
    let connector = Arc::new(MemConnector::default());
    let pool = ClientPool::connect(connector, 1, 6, false).await.unwrap();

    let sub = pool.subset(2..4);
    assert_eq!(sub.len(), 2);
    assert_eq!(sub.clients()[0].index(), 2);
}

#[tokio::test]
async fn test_reconnect_releases_the_old_connection() {
    let mut old = MockKvStore::new();
    old.expect_close().times(1).returning(|| ());
    let connector = MemConnector::default();
    let client = PoolClient::new(0, 0, Arc::new(old));

    client.reconnect(&connector).await.unwrap();

    assert_eq!(connector.connects(), 1);
    assert_eq!(client.uses(), 0);
}
