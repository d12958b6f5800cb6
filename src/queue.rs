//! Component B: the single-consumer work queue.
//!
//! A FIFO channel from RPC handlers to one dedicated worker task, launched
//! at construction. Records per-item timestamps and exposes queue-depth and
//! wait-time statistics via atomics (CAS loop for monotonic maxima,
//! fetch-add for counters).

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::synthetic::ServiceTimeConfig;
use crate::time::now_ticks;
use crate::work_item::{WorkItem, WorkResult};

#[derive(Default)]
struct QueueStats {
    current_depth: AtomicI64,
    peak_depth: AtomicI64,
    processed_count: AtomicU64,
    cancelled_count: AtomicU64,
    max_queue_wait: AtomicI64,
}

impl QueueStats {
    fn reset(&self) {
        self.current_depth.store(0, Ordering::Release);
        self.peak_depth.store(0, Ordering::Release);
        self.processed_count.store(0, Ordering::Release);
        self.cancelled_count.store(0, Ordering::Release);
        self.max_queue_wait.store(0, Ordering::Release);
    }
}

/// Updates `atomic` to `max(atomic, candidate)` via a CAS loop. Returns the
/// depth/wait value that was actually observed after the push/stamp, for
/// use as `queue_depth_at_enqueue`.
fn update_max(atomic: &AtomicI64, candidate: i64) {
    let mut current = atomic.load(Ordering::Acquire);
    while candidate > current {
        match atomic.compare_exchange_weak(
            current,
            candidate,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => break,
            Err(observed) => current = observed,
        }
    }
}

/// Handle to the single-consumer queue. Cloning shares the same worker and
/// statistics; the worker task itself is owned by the first handle to be
/// constructed via `new`.
#[derive(Clone)]
pub struct WorkQueue {
    sender: mpsc::UnboundedSender<WorkItem>,
    stats: Arc<QueueStats>,
}

pub struct WorkQueueHandle {
    pub queue: WorkQueue,
    worker: JoinHandle<()>,
}

impl WorkQueueHandle {
    /// Joins the consumer task with a bounded grace period. Crash of the
    /// consumer is otherwise fatal to the process, by design.
    pub async fn shutdown(self, grace: std::time::Duration) {
        drop(self.queue.sender);
        let _ = tokio::time::timeout(grace, self.worker).await;
    }
}

impl WorkQueue {
    pub fn spawn(service_time: ServiceTimeConfig) -> WorkQueueHandle {
        let (sender, receiver) = mpsc::unbounded_channel();
        let stats = Arc::new(QueueStats::default());
        let worker = tokio::spawn(worker_loop(receiver, stats.clone(), service_time));
        WorkQueueHandle {
            queue: WorkQueue { sender, stats },
            worker,
        }
    }

    /// Stamps `enqueue_time`, snapshots the current queue depth into the
    /// item, updates the running peak, and pushes. Non-blocking.
    pub fn enqueue(&self, mut item: WorkItem) {
        let depth = self.stats.current_depth.fetch_add(1, Ordering::AcqRel) + 1;
        update_max(&self.stats.peak_depth, depth);
        item.stamp_enqueue(depth as i32);
        // The worker is the only consumer; a closed channel means the
        // queue has been shut down, which only happens after all senders
        // (including this one) are dropped, so this send cannot fail in
        // practice during normal operation.
        let _ = self.sender.send(item);
    }

    pub fn peak_depth(&self) -> i64 {
        self.stats.peak_depth.load(Ordering::Acquire)
    }

    pub fn processed_count(&self) -> u64 {
        self.stats.processed_count.load(Ordering::Acquire)
    }

    pub fn cancelled_count(&self) -> u64 {
        self.stats.cancelled_count.load(Ordering::Acquire)
    }

    pub fn max_queue_wait(&self) -> i64 {
        self.stats.max_queue_wait.load(Ordering::Acquire)
    }

    /// Zeroes the four counters and the peak. Safe between probe levels;
    /// does not drain or reorder in-flight items. Idempotent.
    pub fn reset_stats(&self) {
        self.stats.reset();
    }
}

async fn worker_loop(
    mut receiver: mpsc::UnboundedReceiver<WorkItem>,
    stats: Arc<QueueStats>,
    service_time: ServiceTimeConfig,
) {
    while let Some(mut item) = receiver.recv().await {
        stats.current_depth.fetch_sub(1, Ordering::AcqRel);

        if item.is_cancelled() {
            stats.cancelled_count.fetch_add(1, Ordering::AcqRel);
            item.complete(WorkResult::Cancelled);
            continue;
        }

        item.stamp_dequeue();
        let wait = item.dequeue_time - item.enqueue_time;
        update_max(&stats.max_queue_wait, wait);

        let delay_us = service_time.sample();
        crate::synthetic::perform_work(delay_us).await;

        item.stamp_complete();
        stats.processed_count.fetch_add(1, Ordering::AcqRel);
        let timeline = item.timeline();
        let depth_at_enqueue = item.queue_depth_at_enqueue;
        item.complete(WorkResult::Completed(timeline, depth_at_enqueue));
    }
}
