mod support;

use std::sync::Arc;
use std::time::Duration;

use depot_session::{RouterConfig, SessionSweeper};

use support::memory_router;

async fn wait_until<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn expired_sessions_are_swept_in_the_background() {
    let router = Arc::new(memory_router(RouterConfig::new(Duration::ZERO)));
    router.register("bob", "longpassword").await.unwrap();
    router.login("bob", "longpassword").await.unwrap();

    let handle = SessionSweeper::spawn(Arc::clone(&router), Duration::from_millis(10));
    let swept = wait_until(|| {
        let router = Arc::clone(&router);
        async move { !router.is_logged_in("bob").await }
    })
    .await;
    assert!(swept);
    assert!(handle.sweeps() >= 1);
    handle.shutdown().await;
}

#[tokio::test]
async fn live_sessions_survive_sweeps() {
    let router = Arc::new(memory_router(RouterConfig::new(Duration::from_secs(300))));
    router.register("bob", "longpassword").await.unwrap();
    router.login("bob", "longpassword").await.unwrap();

    let handle = SessionSweeper::spawn(Arc::clone(&router), Duration::from_millis(5));
    let h = &handle;
    assert!(wait_until(|| async move { h.sweeps() >= 3 }).await);
    assert!(router.is_logged_in("bob").await);
    handle.shutdown().await;
}

#[tokio::test]
async fn shutdown_stops_the_sweeper() {
    let router = Arc::new(memory_router(RouterConfig::new(Duration::ZERO)));
    let handle = SessionSweeper::spawn(Arc::clone(&router), Duration::from_millis(5));
    handle.shutdown().await;

    // Nothing sweeps any more once the task has stopped.
    router.register("bob", "longpassword").await.unwrap();
    router.login("bob", "longpassword").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(router.is_logged_in("bob").await);
}
