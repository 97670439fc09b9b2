use std::time::{Duration, Instant};

use siteagent::errors::AgentError;
use siteagent::lock::LockFile;
use siteagent_test_utils::{init_tracing, with_timeout, TempSite};

fn fast_lock(site: &TempSite, name: &str) -> LockFile {
    LockFile::with_poll_interval(site.lock_dir(), name, Duration::from_millis(25))
        .expect("failed to create lock handle")
}

#[tokio::test]
async fn free_lock_acquires_immediately() {
    init_tracing();
    let site = TempSite::new();
    let lock = fast_lock(&site, "deploy");

    assert!(!lock.is_held());
    let guard = with_timeout(lock.acquire(Duration::from_secs(1))).await.unwrap();
    assert!(lock.is_held());
    assert!(lock.held_by_this_handle());

    drop(guard);
    assert!(!lock.is_held());
}

#[tokio::test]
async fn marker_records_owner_identity() {
    init_tracing();
    let site = TempSite::new();
    let lock = fast_lock(&site, "deploy");

    let _guard = lock.acquire(Duration::from_secs(1)).await.unwrap();
    let marker = lock.read_marker().unwrap().expect("marker should exist");
    assert!(marker.contains(&format!("pid: {}", std::process::id())));
    assert!(marker.contains("acquired_at_unix:"));
}

#[tokio::test]
async fn second_owner_times_out_while_first_holds() {
    init_tracing();
    let site = TempSite::new();
    let holder = fast_lock(&site, "deploy");
    let contender = fast_lock(&site, "deploy");

    let guard = holder.acquire(Duration::from_secs(1)).await.unwrap();

    let start = Instant::now();
    let err = contender
        .acquire(Duration::from_millis(300))
        .await
        .expect_err("contender must not acquire a held lock");
    match err {
        AgentError::LockNotAcquired { name, waited } => {
            assert_eq!(name, "deploy");
            assert!(waited >= Duration::from_millis(300));
        }
        other => panic!("expected LockNotAcquired, got {other:?}"),
    }
    assert!(start.elapsed() < Duration::from_secs(2));

    // Once the holder releases, the same contender succeeds.
    drop(guard);
    let _guard = with_timeout(contender.acquire(Duration::from_secs(1)))
        .await
        .unwrap();
}

#[tokio::test]
async fn reentrant_acquisition_by_same_handle() {
    init_tracing();
    let site = TempSite::new();
    let lock = fast_lock(&site, "deploy");

    let outer = lock.acquire(Duration::from_secs(1)).await.unwrap();
    // Same logical owner: must not deadlock or time out.
    let inner = with_timeout(lock.acquire(Duration::from_millis(100)))
        .await
        .expect("reentrant acquire should succeed");

    drop(outer);
    // Still held until the innermost guard is gone.
    assert!(lock.is_held());
    drop(inner);
    assert!(!lock.is_held());
}

#[tokio::test]
async fn lock_operation_releases_on_success_and_failure() {
    init_tracing();
    let site = TempSite::new();
    let lock = fast_lock(&site, "deploy");

    let value = lock
        .lock_operation(Duration::from_secs(1), async { Ok(7) })
        .await
        .unwrap();
    assert_eq!(value, 7);
    assert!(!lock.is_held());

    let err = lock
        .lock_operation::<(), _>(Duration::from_secs(1), async {
            Err(AgentError::ConfigError("boom".to_string()))
        })
        .await
        .expect_err("action error must propagate");
    assert!(matches!(err, AgentError::ConfigError(_)));

    // The failed action must not leave the lock held.
    let _guard = with_timeout(lock.acquire(Duration::from_millis(200)))
        .await
        .expect("lock must be free after failed lock_operation");
}

#[tokio::test]
async fn repeated_acquire_release_leaves_no_residue() {
    init_tracing();
    let site = TempSite::new();
    let lock = fast_lock(&site, "deploy");

    for _ in 0..5 {
        let guard = with_timeout(lock.acquire(Duration::from_millis(200)))
            .await
            .expect("uncontended acquire should always succeed");
        assert!(lock.is_held());
        drop(guard);
        assert!(!lock.is_held());
    }
}

#[tokio::test]
async fn independent_locks_do_not_contend() {
    init_tracing();
    let site = TempSite::new();
    let deploy = fast_lock(&site, "deploy");
    let keys = fast_lock(&site, "keys");

    let _deploy_guard = deploy.acquire(Duration::from_secs(1)).await.unwrap();
    let _keys_guard = with_timeout(keys.acquire(Duration::from_millis(200)))
        .await
        .expect("different lock names must not contend");
}

#[tokio::test]
async fn shared_handle_across_tasks_is_one_owner() {
    init_tracing();
    let site = TempSite::new();
    let lock = fast_lock(&site, "deploy");

    let _outer = lock.acquire(Duration::from_secs(1)).await.unwrap();

    // A clone shares the depth counter: same logical owner from another task.
    let clone = lock.clone();
    let handle = tokio::spawn(async move {
        let guard = clone.acquire(Duration::from_millis(200)).await;
        guard.is_ok()
    });
    assert!(handle.await.unwrap());
}
