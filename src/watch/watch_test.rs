use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::SmallRng;
use rand::SeedableRng;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::errors::DefinitionError;
use crate::errors::StoreError;
use crate::pattern::PatternCompiler;
use crate::store::KvStore;
use crate::store::MemConnector;
use crate::store::MemStore;
use crate::store::MockKvStore;
use crate::store::Operation;
use crate::store::PoolClient;
use crate::store::WatchStream;

const PATTERN: &str = "/r/%reg-%d[4]/%c-%02d[5];[a-z]{4}";

fn rng() -> SmallRng {
    SmallRng::seed_from_u64(5)
}

fn key_space() -> KeySpace {
    let compiler = PatternCompiler::new(&HashMap::new(), &mut rng()).unwrap();
    KeySpace::new(vec![compiler.compile(PATTERN, &mut rng()).unwrap()], 1).unwrap()
}

fn pool(
    store: Arc<dyn KvStore>,
    clients: usize,
) -> ClientPool {
    let clients = (0..clients)
        .map(|i| Arc::new(PoolClient::new(i, 0, store.clone())))
        .collect();
    ClientPool::from_clients(Arc::new(MemConnector::default()), clients)
}

fn watch_config(counts: &str) -> WatchConfig {
    WatchConfig {
        counts_per_level: Some(counts.to_string()),
        strict_levels: false,
        ..Default::default()
    }
}

async fn eventually(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[test]
fn test_parse_counts() {
    let counts = WatchCounts::parse("1, 5,n", true).unwrap();
    assert_eq!(counts.levels(), 3);
    assert_eq!(
        counts.for_depth(3).unwrap(),
        vec![WatchCount::Count(1), WatchCount::Count(5), WatchCount::All]
    );
}

#[test]
fn test_non_integer_count() {
    assert_eq!(
        WatchCounts::parse("1,x", true).unwrap_err(),
        DefinitionError::InvalidWatchCount("x".to_string())
    );

    let lenient = WatchCounts::parse("1,x", false).unwrap();
    assert_eq!(
        lenient.for_depth(2).unwrap(),
        vec![WatchCount::Count(1), WatchCount::Count(0)]
    );
}

#[test]
fn test_level_mismatch() {
    let strict = WatchCounts::parse("1,2", true).unwrap();
    assert_eq!(
        strict.for_depth(3).unwrap_err(),
        DefinitionError::WatchLevelMismatch { levels: 2, depth: 3 }
    );

    let lenient = WatchCounts::parse("1,2,3,4", false).unwrap();
    assert_eq!(lenient.for_depth(2).unwrap(), vec![WatchCount::Count(1), WatchCount::Count(2)]);
    let lenient = WatchCounts::parse("7", false).unwrap();
    assert_eq!(lenient.for_depth(2).unwrap(), vec![WatchCount::Count(7), WatchCount::Count(0)]);
}

#[test]
fn test_plan_takes_all_random_and_sequential_keys() {
    let ks = key_space();

    let counts = WatchCounts::parse("1,n,3", true).unwrap();
    let plan = WatchPlan::build(&ks, &counts, false, &mut rng()).unwrap();
    assert_eq!(plan.len(), 8);
    let levels: Vec<usize> = plan.targets().iter().map(|t| t.level).collect();
    assert_eq!(levels, vec![0, 1, 1, 1, 1, 2, 2, 2]);
    assert_eq!(plan.targets()[0].key, "/r");
    let leaves = ks.prefixes(2);
    assert!(plan.targets()[5..].iter().all(|t| leaves.contains(&t.key)));

    let counts = WatchCounts::parse("0,6,0", true).unwrap();
    let plan = WatchPlan::build(&ks, &counts, true, &mut rng()).unwrap();
    let keys: Vec<&str> = plan.targets().iter().map(|t| t.key.as_str()).collect();
    assert_eq!(
        keys,
        vec!["/r/reg-0", "/r/reg-1", "/r/reg-2", "/r/reg-3", "/r/reg-0", "/r/reg-1"]
    );
}

#[test]
fn test_replay_start_delay_within_interval() {
    let mut r = rng();
    for _ in 0..100 {
        let replay = PrefixReplay::new("/r", Duration::from_millis(3500), &mut r);
        assert!(replay.start_delay() >= Duration::from_secs(1));
        assert!(replay.start_delay() <= Duration::from_secs(3));
    }
    let replay = PrefixReplay::new("/r", Duration::from_secs(2), &mut r);
    assert!(matches!(replay.operation(), Operation::Get { prefix: true, .. }));
}

#[tokio::test]
async fn test_canceled_watches_are_reacquired() {
    let ks = key_space();
    let store = Arc::new(MemStore::new());
    let stats = Arc::new(StatsAggregator::new());
    let cancel = CancellationToken::new();
    let config = WatchConfig {
        with_prefix: true,
        ..watch_config("0,n,0")
    };

    let manager = WatchManager::start(
        &ks,
        &config,
        &pool(store.clone(), 2),
        stats.clone(),
        cancel.clone(),
        &StopSignals::new(),
        DispatcherOptions::default(),
        &mut rng(),
    )
    .await
    .unwrap();
    assert_eq!(manager.configured(), 4);
    assert_eq!(manager.established(), 4);
    assert_eq!(manager.active(), 4);

    store.put("/r/reg-0/c-00", b"a");
    eventually(|| stats.snapshot().watch_events == 1).await;

    store.cancel_watches();
    eventually(|| manager.reacquired() == 4).await;
    eventually(|| store.watch_count() == 4).await;

    store.put("/r/reg-1/c-01", b"b");
    eventually(|| stats.snapshot().watch_events == 2).await;
    assert_eq!(manager.active(), 4);
    assert!(stats.watch_window().is_some());

    cancel.cancel();
    let counters = manager.counters.clone();
    manager.close().await.unwrap();
    assert_eq!(counters.active.load(std::sync::atomic::Ordering::SeqCst), 0);
    // Stopping the run does not count as losing a watcher
    assert_eq!(stats.snapshot().watchers_active, 4);
}

#[tokio::test]
async fn test_watch_error_ends_the_subscription() {
    let ks = key_space();
    let mut store = MockKvStore::new();
    store.expect_watch().returning(|_, _| {
        let stream: WatchStream = Box::pin(futures::stream::iter(vec![Err(StoreError::Closed)]));
        Ok(stream)
    });

    let stats = Arc::new(StatsAggregator::new());
    let manager = WatchManager::start(
        &ks,
        &watch_config("1,0,0"),
        &pool(Arc::new(store), 1),
        stats.clone(),
        CancellationToken::new(),
        &StopSignals::new(),
        DispatcherOptions::default(),
        &mut rng(),
    )
    .await
    .unwrap();

    assert_eq!(manager.configured(), 1);
    eventually(|| manager.active() == 0).await;
    manager.close().await.unwrap();

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.watchers_configured, 1);
    assert_eq!(snapshot.watchers_active, 0);
}

#[tokio::test]
async fn test_no_counts_means_no_watchers() {
    let manager = WatchManager::start(
        &key_space(),
        &WatchConfig::default(),
        &pool(Arc::new(MemStore::new()), 1),
        Arc::new(StatsAggregator::new()),
        CancellationToken::new(),
        &StopSignals::new(),
        DispatcherOptions::default(),
        &mut rng(),
    )
    .await
    .unwrap();
    assert_eq!(manager.configured(), 0);
    manager.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_replay_reads_until_stopped() {
    let ks = key_space();
    let store = Arc::new(MemStore::new());
    store.put("/r/reg-0/c-00", b"v");
    let stats = Arc::new(StatsAggregator::new());
    let signals = StopSignals::new();
    let config = WatchConfig {
        prefix_get_interval_ms: 2000,
        ..watch_config("1,0,0")
    };

    let manager = WatchManager::start(
        &ks,
        &config,
        &pool(store, 1),
        stats.clone(),
        CancellationToken::new(),
        &signals,
        DispatcherOptions::default(),
        &mut rng(),
    )
    .await
    .unwrap();
    assert_eq!(signals.len(), 1);

    tokio::time::sleep(Duration::from_millis(10_500)).await;
    signals.fire();
    let reads = stats.snapshot().prefix_get;

    // First read after the start delay plus one interval, then every 2s
    assert!((3..=5).contains(&reads.calls()), "unexpected reads {}", reads.calls());
    assert!(reads.keys >= 3);
    drop(manager);
}
