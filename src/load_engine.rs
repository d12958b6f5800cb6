//! Component E: the steady-state load engine.
//!
//! Holds exactly K requests in flight for duration T using a semaphore of
//! K permits. Each in-flight unit acquires a permit, issues one request,
//! releases the permit, and appends its outcome to a shared accumulator.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, Notify, Semaphore};
use tokio::task::JoinSet;

use crate::aggregate::{aggregate, ConcurrencyTestResult};
use crate::client::ChannelPoolClient;
use crate::queue::WorkQueue;

/// Shared cancellation signal threaded from the prober down into the load
/// engine and every in-flight call it spawns.
#[derive(Clone, Default)]
pub struct CancellationHandle {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancellationHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    pub fn notify(&self) -> Arc<Notify> {
        self.notify.clone()
    }
}

/// Runs the steady-state load loop at a fixed concurrency K for duration T.
/// At no point are more than K requests in flight. Resets queue stats at
/// the start of the level so peak-depth/max-wait reflect this level alone.
pub async fn run_level(
    client: Arc<ChannelPoolClient>,
    queue: &WorkQueue,
    concurrency: usize,
    duration: Duration,
    cancellation: CancellationHandle,
) -> ConcurrencyTestResult {
    queue.reset_stats();

    let semaphore = Arc::new(Semaphore::new(concurrency));
    let outcomes = Arc::new(Mutex::new(Vec::new()));
    let mut units: JoinSet<()> = JoinSet::new();

    let start = Instant::now();
    while start.elapsed() < duration && !cancellation.is_cancelled() {
        let permit = tokio::select! {
            permit = semaphore.clone().acquire_owned() => match permit {
                Ok(p) => p,
                Err(_) => break,
            },
            _ = cancellation.notify().notified() => break,
        };

        let client = client.clone();
        let outcomes = outcomes.clone();
        let notify = cancellation.notify();
        units.spawn(async move {
            let outcome = client.call_cancellable(notify).await;
            outcomes.lock().await.push(outcome);
            drop(permit);
        });
    }

    // Await all outstanding units; cancellation-propagation is reflected
    // in their Outcome (TransportError{client_cancelled: true}), not as a
    // join error, so there is nothing further to ignore here.
    while units.join_next().await.is_some() {}

    let actual_duration = start.elapsed();
    let outcomes = Arc::try_unwrap(outcomes)
        .map(|m| m.into_inner())
        .unwrap_or_default();

    aggregate(
        concurrency,
        actual_duration,
        &outcomes,
        queue.peak_depth(),
        queue.max_queue_wait(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_handle_reports_cancelled_after_cancel() {
        let handle = CancellationHandle::new();
        assert!(!handle.is_cancelled());
        handle.cancel();
        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn cancellation_handle_wakes_notified_waiters() {
        let handle = CancellationHandle::new();
        let notify = handle.notify();
        let waiter = tokio::spawn(async move {
            notify.notified().await;
        });
        handle.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake promptly")
            .unwrap();
    }
}
