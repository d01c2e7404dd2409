use std::sync::Arc;

use pattern_workload::engine::PatternEngine;
use pattern_workload::store::MemConnector;
use pattern_workload::store::MemStore;
use tokio_util::sync::CancellationToken;

use crate::commons::enable_logger;
use crate::commons::mem_pool;
use crate::commons::tree_config;
use crate::commons::write_sentinels;
use crate::commons::RUN_TIMEOUT;

#[tokio::test]
async fn test_bounded_load_is_restartable() {
    enable_logger();
    let mut config = tree_config();
    config.workload.total = 5;
    let engine = PatternEngine::new(config).unwrap();
    let store = Arc::new(MemStore::new());
    let pool = mem_pool(&store, 2).await;

    assert_eq!(engine.generate_keys(&pool, 5).await.unwrap(), 5);
    let first = store.keys();
    assert_eq!(engine.generate_keys(&pool, 5).await.unwrap(), 5);

    // A second pass starts over at the first key
    assert_eq!(store.keys(), first);
    assert_eq!(engine.snapshot().put.calls(), 10);
}

#[tokio::test]
async fn test_failed_puts_are_counted_and_the_load_continues() {
    let engine = PatternEngine::new(tree_config()).unwrap();
    let store = Arc::new(MemStore::new());
    store.fail_next_puts(3);

    let summary = engine.run(&mem_pool(&store, 2).await).await.unwrap();
    let ramp = summary.ramp.unwrap();
    assert_eq!(ramp.errors, 3);
    assert_eq!(ramp.put.calls, 17);
    assert_eq!(store.len(), 17);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_every_activity_runs_until_test_end() {
    let mut config = tree_config();
    config.churn.value_rate = Some(36_000);
    config.churn.level_rate = Some(36_000);
    config.churn.level = 1;
    config.churn.level_pct = 25;
    config.get.rate = Some(36_000);
    config.get.level = 1;
    config.watch.counts_per_level = Some("1,n,3".to_string());
    config.watch.with_prefix = true;
    config.client.clients = 8;
    config.client.conns = 2;
    let sentinel = config.run.test_end_key.clone();

    let engine = PatternEngine::new(config).unwrap();
    let store = Arc::new(MemStore::new());
    let pool = mem_pool(&store, 8).await;

    let done = CancellationToken::new();
    let writer = write_sentinels(store.clone(), vec![sentinel], done.clone());
    let summary = tokio::time::timeout(RUN_TIMEOUT, engine.run(&pool))
        .await
        .expect("run did not reach the test end")
        .unwrap();
    done.cancel();
    writer.await.unwrap();

    assert!(summary.test_end_seen);
    assert_eq!(summary.ramp.unwrap().put.calls, 20);
    let steady = summary.summary.unwrap();
    assert_eq!(steady.errors, 0);
    assert_eq!(steady.key_space, 20);
    assert!(engine.cancel_token().is_cancelled());

    // Churn only ever rewrites keys of the tree
    let leaves = engine.keyspace().prefixes(2);
    assert!(store
        .keys()
        .iter()
        .all(|k| k == &engine.config().run.test_end_key || leaves.contains(k)));
}

#[tokio::test]
async fn test_run_waits_for_the_keep_alive_key() {
    let mut config = tree_config();
    config.workload.skip_init = true;
    config.get.rate = Some(3_600_000);
    config.run.do_not_exit = true;
    let keys = vec![config.run.test_end_key.clone(), config.run.do_not_exit_key.clone()];

    let engine = PatternEngine::new(config).unwrap();
    let store = Arc::new(MemStore::new());
    let pool = mem_pool(&store, 1).await;

    let done = CancellationToken::new();
    let writer = write_sentinels(store.clone(), keys, done.clone());
    let summary = tokio::time::timeout(RUN_TIMEOUT, engine.run(&pool))
        .await
        .expect("run did not exit")
        .unwrap();
    done.cancel();
    writer.await.unwrap();

    assert!(summary.ramp.is_none());
    assert!(summary.test_end_seen);
    assert!(summary.summary.unwrap().prefix_get.calls > 0);
}

#[tokio::test]
async fn test_reconnecting_clients_get_private_connections() {
    let mut config = tree_config();
    config.client.clients = 4;
    config.client.conns = 1;
    config.client.reconnect_every = 10;
    let engine = PatternEngine::new(config).unwrap();
    let connector = Arc::new(MemConnector::default());

    let pool = engine.connect(connector.clone()).await.unwrap();
    assert_eq!(pool.len(), 4);
    assert_eq!(connector.connects(), 4);

    engine.generate_keys(&pool, 0).await.unwrap();
    let stats = engine.snapshot();
    assert_eq!(stats.put.calls(), 20);
    // 20 puts over 4 clients, each reconnecting after 10 uses
    assert!(stats.reconnect.count <= 4);
}
