use std::time::Duration;

use futures::StreamExt;
use tokio::time::timeout;

use super::*;

fn get(
    key: &str,
    prefix: bool,
) -> Operation {
    Operation::Get {
        key: key.to_string(),
        prefix,
        serializable: false,
        keys_only: false,
    }
}

#[tokio::test]
async fn test_put_then_get_exact_and_prefix() {
    let store = MemStore::new();
    store.execute(Operation::put("/a/1", "xx")).await.unwrap();
    store.execute(Operation::put("/a/2", "yyy")).await.unwrap();
    store.execute(Operation::put("/b/1", "z")).await.unwrap();

    assert_eq!(
        store.execute(get("/a/1", false)).await.unwrap(),
        OperationResult::Get {
            prefix: false,
            count: 1,
            bytes: 6
        }
    );
    assert_eq!(
        store.execute(get("/a", true)).await.unwrap(),
        OperationResult::Get {
            prefix: true,
            count: 2,
            bytes: 13
        }
    );
    assert_eq!(store.count_prefix("/a/"), 2);
}

#[tokio::test]
async fn test_put_reports_key_and_value_bytes() {
    let store = MemStore::new();
    let result = store.execute(Operation::put("/k", "value")).await.unwrap();
    assert_eq!(result, OperationResult::Put { bytes: 7 });
}

#[tokio::test]
async fn test_prefix_delete_counts_removed_keys() {
    let store = MemStore::new();
    for k in ["/r/0/a", "/r/0/b", "/r/1/a"] {
        store.put(k, b"v");
    }

    let result = store.execute(Operation::delete_prefix("/r/0")).await.unwrap();
    assert_eq!(result, OperationResult::Delete { deleted: 2 });
    assert_eq!(store.keys(), vec!["/r/1/a".to_string()]);
}

#[tokio::test]
async fn test_injected_put_failures() {
    let store = MemStore::new();
    store.fail_next_puts(2);

    assert!(store.execute(Operation::put("/a", "1")).await.is_err());
    assert!(store.execute(Operation::put("/a", "1")).await.is_err());
    assert!(store.execute(Operation::put("/a", "1")).await.is_ok());
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_watch_receives_matching_events() {
    let store = MemStore::new();
    let mut exact = store.watch("/a/1", false).await.unwrap();
    let mut prefixed = store.watch("/a", true).await.unwrap();

    store.put("/b/1", b"ignored");
    store.put("/a/2", b"two");
    store.put("/a/1", b"one");

    let update = timeout(Duration::from_secs(1), prefixed.next()).await.unwrap().unwrap().unwrap();
    assert!(matches!(update, WatchUpdate::Events(ref e) if e[0].key == "/a/2"));

    let update = timeout(Duration::from_secs(1), exact.next()).await.unwrap().unwrap().unwrap();
    match update {
        WatchUpdate::Events(events) => {
            assert_eq!(events.len(), 1);
            assert_eq!(events[0].key, "/a/1");
            assert_eq!(events[0].value, b"one".to_vec());
            assert_eq!(events[0].kind, WatchEventKind::Put);
        }
        other => panic!("unexpected update {other:?}"),
    }
}

#[tokio::test]
async fn test_cancel_watches_notifies_every_stream() {
    let store = MemStore::new();
    let mut w = store.watch("/a", true).await.unwrap();
    assert_eq!(store.watch_count(), 1);

    store.cancel_watches();
    let update = timeout(Duration::from_secs(1), w.next()).await.unwrap().unwrap().unwrap();
    assert!(matches!(update, WatchUpdate::Canceled { .. }));

    drop(w);
    assert_eq!(store.watch_count(), 0);
}
