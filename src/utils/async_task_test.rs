use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use super::async_task::spawn_task;
use super::async_task::task_with_timeout_and_exponential_backoff;
use crate::config::BackoffPolicy;
use crate::errors::StoreError;
use crate::Error;

fn policy(
    max_retries: usize,
    timeout_ms: u64,
) -> BackoffPolicy {
    BackoffPolicy {
        max_retries,
        timeout_ms,
        base_delay_ms: 10,
        max_delay_ms: 100,
    }
}

#[tokio::test]
async fn test_task_with_timeout_and_exponential_backoff_success() {
    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = counter.clone();

    let task = move || {
        let counter = counter_clone.clone();
        async move {
            let current = counter.fetch_add(1, Ordering::SeqCst);
            if current == 0 {
                Err(Error::Fatal("First attempt fails".to_string()))
            } else {
                Ok::<_, crate::Error>(current)
            }
        }
    };

    let result = task_with_timeout_and_exponential_backoff(task, policy(3, 1000)).await;

    assert_eq!(result.unwrap(), 1);
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_task_with_timeout_and_exponential_backoff_max_retries() {
    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = counter.clone();

    let task = move || {
        let counter = counter_clone.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err::<u32, _>(Error::Fatal("Always fails".to_string()))
        }
    };

    let result = task_with_timeout_and_exponential_backoff(task, policy(3, 1000)).await;

    assert!(matches!(result, Err(Error::Fatal(_))));
    assert_eq!(counter.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_task_with_timeout_and_exponential_backoff_timeout() {
    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = counter.clone();

    let task = move || {
        let counter = counter_clone.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok::<u32, _>(42)
        }
    };

    let result = task_with_timeout_and_exponential_backoff(task, policy(2, 100)).await;

    assert!(matches!(result, Err(Error::Store(StoreError::Timeout(_)))));
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_spawn_task() {
    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = counter.clone();

    let task_fn = move || {
        let counter = counter_clone.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    };

    let mut handles = Vec::new();
    spawn_task("test_task", task_fn, Some(&mut handles));
    assert_eq!(handles.len(), 1);

    join_all(handles).await;
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_spawn_task_with_error() {
    let task_fn = move || async move { Err::<(), _>(Error::Fatal("Task error".to_string())) };

    let mut handles = Vec::new();
    spawn_task("error_task", task_fn, Some(&mut handles));

    for result in join_all(handles).await {
        assert!(result.is_ok());
    }
}
