use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::router::SessionRouter;

/// Handle to stop and join a running sweeper.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<()>>,
    sweeps: Arc<AtomicU64>,
}

impl SweeperHandle {
    /// Number of completed sweep passes.
    pub fn sweeps(&self) -> u64 {
        self.sweeps.load(Ordering::SeqCst)
    }

    /// Request graceful shutdown and wait for the task to stop.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(join) = self.join.take() {
            if let Err(err) = join.await {
                warn!(error = %err, "session sweeper task ended abnormally");
            }
        }
    }
}

/// Periodically logs out expired sessions.
///
/// - Ticks every `interval`, the first pass runs immediately
/// - A failed logout is logged and the pass carries on
/// - Runs until [`SweeperHandle::shutdown`] or the handle is dropped
#[derive(Debug)]
pub struct SessionSweeper;

impl SessionSweeper {
    /// Spawn the sweeper on the current tokio runtime.
    pub fn spawn(router: Arc<SessionRouter>, interval: Duration) -> SweeperHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let sweeps = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&sweeps);
        // tokio's interval panics on a zero period.
        let period = interval.max(Duration::from_millis(1));

        let join = tokio::spawn(sweep_loop(router, period, shutdown_rx, counter));

        SweeperHandle {
            shutdown: Some(shutdown_tx),
            join: Some(join),
            sweeps,
        }
    }
}

async fn sweep_loop(
    router: Arc<SessionRouter>,
    period: Duration,
    mut shutdown_rx: oneshot::Receiver<()>,
    sweeps: Arc<AtomicU64>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            // Fires on an explicit shutdown and when the handle is dropped.
            _ = &mut shutdown_rx => break,
            _ = ticker.tick() => {
                let report = router.evict_expired(Utc::now()).await;
                for failure in &report.failures {
                    warn!(alias = %failure.alias, error = %failure.error, "failed to log out expired session");
                }
                if !report.evicted.is_empty() {
                    debug!(evicted = report.evicted.len(), "expired sessions swept");
                }
                sweeps.fetch_add(1, Ordering::SeqCst);
            }
        }
    }
    debug!("session sweeper stopped");
}
