use std::time::Duration;

use siteagent::lock::LockFile;
use siteagent::status::{DeploymentState, DeploymentStatus, StatusStore};
use siteagent_test_utils::{init_tracing, with_timeout, TempSite};

fn store(site: &TempSite) -> StatusStore {
    let lock = LockFile::with_poll_interval(
        site.lock_dir(),
        "status",
        Duration::from_millis(25),
    )
    .expect("failed to create status lock");
    StatusStore::new(site.status_path(), lock, Duration::from_secs(1))
}

#[tokio::test]
async fn empty_store_reads_none() {
    init_tracing();
    let site = TempSite::new();
    let store = store(&site);

    assert!(with_timeout(store.read()).await.unwrap().is_none());
}

#[tokio::test]
async fn write_then_read_round_trips() {
    init_tracing();
    let site = TempSite::new();
    let store = store(&site);

    let mut status = DeploymentStatus::new("abc123");
    status.message = "received push".to_string();
    with_timeout(store.write(&status)).await.unwrap();

    let read_back = with_timeout(store.read())
        .await
        .unwrap()
        .expect("status should exist after write");
    assert_eq!(read_back, status);
}

#[tokio::test]
async fn update_mutates_under_one_acquisition() {
    init_tracing();
    let site = TempSite::new();
    let store = store(&site);

    with_timeout(store.write(&DeploymentStatus::new("abc123")))
        .await
        .unwrap();

    let updated = with_timeout(store.update(|s| {
        s.state = DeploymentState::Success;
        s.message = "deployed".to_string();
    }))
    .await
    .unwrap()
    .expect("record should exist");

    assert_eq!(updated.state, DeploymentState::Success);
    let read_back = with_timeout(store.read()).await.unwrap().unwrap();
    assert_eq!(read_back.state, DeploymentState::Success);
    assert_eq!(read_back.message, "deployed");
}

#[tokio::test]
async fn update_on_empty_store_is_none() {
    init_tracing();
    let site = TempSite::new();
    let store = store(&site);

    let updated = with_timeout(store.update(|s| s.state = DeploymentState::Failed))
        .await
        .unwrap();
    assert!(updated.is_none());
}

#[tokio::test]
async fn status_lock_is_free_after_each_operation() {
    init_tracing();
    let site = TempSite::new();
    let store = store(&site);
    let probe = LockFile::with_poll_interval(
        site.lock_dir(),
        "status",
        Duration::from_millis(25),
    )
    .unwrap();

    with_timeout(store.write(&DeploymentStatus::new("abc123")))
        .await
        .unwrap();
    let _guard = with_timeout(probe.acquire(Duration::from_millis(200)))
        .await
        .expect("status lock must be released after write");
}
