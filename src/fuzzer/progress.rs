use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Shared request accounting. `approx_total` only grows: the wordlist count
/// adds its share once and every scheduled retry adds one more.
#[derive(Debug, Default)]
pub struct RequestCounters {
    done: AtomicU64,
    approx_total: AtomicU64,
    emitted: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub done: u64,
    pub approx_total: u64,
}

impl RequestCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_attempt(&self) {
        self.done.fetch_add(1, Ordering::SeqCst);
    }

    pub fn schedule_retry(&self) {
        self.approx_total.fetch_add(1, Ordering::SeqCst);
    }

    pub fn add_expected(&self, n: u64) {
        self.approx_total.fetch_add(n, Ordering::SeqCst);
    }

    pub fn record_emitted(&self) {
        self.emitted.fetch_add(1, Ordering::SeqCst);
    }

    pub fn done(&self) -> u64 {
        self.done.load(Ordering::SeqCst)
    }

    pub fn approx_total(&self) -> u64 {
        self.approx_total.load(Ordering::SeqCst)
    }

    pub fn emitted(&self) -> u64 {
        self.emitted.load(Ordering::SeqCst)
    }

    // done is read before total so a retry landing in between can only make
    // the snapshot look further from completion, never past it
    pub fn snapshot(&self) -> ProgressSnapshot {
        let done = self.done();
        let approx_total = self.approx_total();
        ProgressSnapshot { done, approx_total }
    }
}

/// Publishes a snapshot every `interval` once `ready` fires, and one last
/// snapshot when `shutdown` fires. Stops early if nobody listens anymore.
pub async fn run_estimator(
    counters: Arc<RequestCounters>,
    interval: Duration,
    ready: oneshot::Receiver<()>,
    mut shutdown: oneshot::Receiver<()>,
    tx: mpsc::Sender<ProgressSnapshot>,
) {
    tokio::select! {
        _ = ready => {}
        _ = &mut shutdown => {
            let _ = tx.send(counters.snapshot()).await;
            return;
        }
    }

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if tx.send(counters.snapshot()).await.is_err() {
                    debug!("progress receiver dropped, estimator exiting");
                    return;
                }
            }
            _ = &mut shutdown => {
                let _ = tx.send(counters.snapshot()).await;
                return;
            }
        }
    }
}
