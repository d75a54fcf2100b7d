use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use super::{response, DispatchError, FuzzResult, HideFilters, RequestCounters, RequestDescriptor};

#[derive(Clone)]
pub struct WorkerContext {
    pub client: reqwest::Client,
    pub filters: Arc<HideFilters>,
    pub counters: Arc<RequestCounters>,
    pub max_retries: u8,
    pub sleep: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    Emitted,
    Hidden,
    Abandoned,
    // the result receiver is gone
    Disconnected,
}

async fn attempt(ctx: &WorkerContext, desc: &RequestDescriptor) -> Result<FuzzResult, DispatchError> {
    let resolved = desc.template.resolve(&desc.entry, &desc.extension)?;
    response::fetch(&ctx.client, &resolved, desc.position).await
}

/// Drives one descriptor to completion. Failures are retried in place until
/// `max_retries` is used up.
pub async fn process_descriptor(
    ctx: &WorkerContext,
    mut desc: RequestDescriptor,
    results: &mpsc::Sender<FuzzResult>,
) -> DispatchOutcome {
    loop {
        let outcome = attempt(ctx, &desc).await;
        ctx.counters.record_attempt();

        match outcome {
            Ok(result) => {
                if !ctx.filters.is_visible(&result) {
                    return DispatchOutcome::Hidden;
                }
                if results.send(result).await.is_err() {
                    return DispatchOutcome::Disconnected;
                }
                ctx.counters.record_emitted();
                return DispatchOutcome::Emitted;
            }
            Err(e) if desc.retries < ctx.max_retries => {
                desc.retries += 1;
                ctx.counters.schedule_retry();
                debug!(
                    "retrying {}{} ({}/{}): {}",
                    desc.entry, desc.extension, desc.retries, ctx.max_retries, e
                );
            }
            Err(e) => {
                warn!(
                    "giving up on {}{} after {} attempts: {}",
                    desc.entry,
                    desc.extension,
                    desc.retries as u32 + 1,
                    e
                );
                return DispatchOutcome::Abandoned;
            }
        }
    }
}

pub async fn run_worker(
    id: usize,
    ctx: WorkerContext,
    queue: Arc<Mutex<mpsc::Receiver<RequestDescriptor>>>,
    results: mpsc::Sender<FuzzResult>,
) {
    debug!("worker {} started", id);
    loop {
        // the lock is released as soon as a descriptor is taken
        let next = { queue.lock().await.recv().await };
        let Some(desc) = next else {
            break;
        };

        if process_descriptor(&ctx, desc, &results).await == DispatchOutcome::Disconnected {
            debug!("worker {}: result receiver dropped", id);
            break;
        }

        if !ctx.sleep.is_zero() {
            tokio::time::sleep(ctx.sleep).await;
        }
    }
    debug!("worker {} finished", id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fuzzer::{HideConfig, RequestTemplate};

    // a port that was bound and released, so connecting to it is refused
    fn closed_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        port
    }

    fn context(max_retries: u8) -> WorkerContext {
        WorkerContext {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(2))
                .no_proxy()
                .build()
                .unwrap(),
            filters: Arc::new(HideFilters::from_config(&HideConfig::default())),
            counters: Arc::new(RequestCounters::new()),
            max_retries,
            sleep: Duration::ZERO,
        }
    }

    fn descriptor(base: &str) -> RequestDescriptor {
        RequestDescriptor {
            template: Arc::new(RequestTemplate::new("FUZZ", "GET", base, vec![], "", &[]).unwrap()),
            entry: "admin".to_string(),
            extension: Arc::from(""),
            position: 0,
            retries: 0,
        }
    }

    #[tokio::test]
    async fn failing_descriptor_is_attempted_max_retries_plus_one_times() {
        let ctx = context(3);
        ctx.counters.add_expected(1);
        let (tx, mut rx) = mpsc::channel(4);
        let base = format!("http://127.0.0.1:{}", closed_port());

        let outcome = process_descriptor(&ctx, descriptor(&base), &tx).await;
        drop(tx);

        assert_eq!(outcome, DispatchOutcome::Abandoned);
        assert_eq!(ctx.counters.done(), 4);
        assert_eq!(ctx.counters.approx_total(), 4);
        assert_eq!(ctx.counters.emitted(), 0);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn zero_retries_means_a_single_attempt() {
        let ctx = context(0);
        let (tx, _rx) = mpsc::channel(1);
        let base = format!("http://127.0.0.1:{}", closed_port());
        let outcome = process_descriptor(&ctx, descriptor(&base), &tx).await;
        assert_eq!(outcome, DispatchOutcome::Abandoned);
        assert_eq!(ctx.counters.done(), 1);
        assert_eq!(ctx.counters.approx_total(), 0);
    }

    #[tokio::test]
    async fn worker_exits_when_queue_closes() {
        let ctx = context(0);
        let (qtx, qrx) = mpsc::channel(4);
        let (rtx, _rrx) = mpsc::channel(4);
        let base = format!("http://127.0.0.1:{}", closed_port());
        qtx.send(descriptor(&base)).await.unwrap();
        drop(qtx);

        let counters = ctx.counters.clone();
        run_worker(0, ctx, Arc::new(Mutex::new(qrx)), rtx).await;
        assert_eq!(counters.done(), 1);
    }

    #[tokio::test]
    async fn worker_sleeps_between_descriptors() {
        let ctx = WorkerContext {
            sleep: Duration::from_millis(50),
            ..context(0)
        };
        let (qtx, qrx) = mpsc::channel(4);
        let (rtx, _rrx) = mpsc::channel(4);
        let base = format!("http://127.0.0.1:{}", closed_port());
        qtx.send(descriptor(&base)).await.unwrap();
        qtx.send(descriptor(&base)).await.unwrap();
        drop(qtx);

        let counters = ctx.counters.clone();
        let started = std::time::Instant::now();
        run_worker(0, ctx, Arc::new(Mutex::new(qrx)), rtx).await;
        let elapsed = started.elapsed();

        assert_eq!(counters.done(), 2);
        assert!(elapsed >= Duration::from_millis(100), "took {elapsed:?}");
    }
}
