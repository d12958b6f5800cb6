//! The unit of work passed from an RPC handler to the single-consumer queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::oneshot;

use crate::time::now_ticks;

/// Immutable snapshot of a work item's timestamps, returned with a
/// successful response. Round-trips byte-for-byte through the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ServerTimeline {
    pub arrival_time: i64,
    pub enqueue_time: i64,
    pub dequeue_time: i64,
    pub complete_time: i64,
}

/// Outcome of processing a Work Item, delivered through its completion
/// signal to the waiting RPC handler.
#[derive(Debug, Clone)]
pub enum WorkResult {
    Completed(ServerTimeline, i32),
    Cancelled,
}

/// One in-flight server-side unit of work. Created on RPC arrival, mutated
/// only by the worker (dequeue/complete timestamps) and the arrival path
/// (arrival/enqueue timestamps) — disjoint fields, no shared mutable state
/// beyond the completion channel and the cancellation flag.
pub struct WorkItem {
    pub request_id: String,
    pub arrival_time: i64,
    pub enqueue_time: i64,
    pub dequeue_time: i64,
    pub complete_time: i64,
    pub queue_depth_at_enqueue: i32,
    cancelled: Arc<AtomicBool>,
    completion_tx: Option<oneshot::Sender<WorkResult>>,
}

impl WorkItem {
    pub fn new(request_id: String, arrival_time: i64) -> (Self, oneshot::Receiver<WorkResult>, Arc<AtomicBool>) {
        let cancelled = Arc::new(AtomicBool::new(false));
        let (tx, rx) = oneshot::channel();
        let item = WorkItem {
            request_id,
            arrival_time,
            enqueue_time: 0,
            dequeue_time: 0,
            complete_time: 0,
            queue_depth_at_enqueue: 0,
            cancelled: cancelled.clone(),
            completion_tx: Some(tx),
        };
        (item, rx, cancelled)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn stamp_enqueue(&mut self, depth: i32) {
        self.enqueue_time = now_ticks();
        self.queue_depth_at_enqueue = depth;
    }

    pub fn stamp_dequeue(&mut self) {
        self.dequeue_time = now_ticks();
    }

    pub fn stamp_complete(&mut self) {
        self.complete_time = now_ticks();
    }

    pub fn timeline(&self) -> ServerTimeline {
        ServerTimeline {
            arrival_time: self.arrival_time,
            enqueue_time: self.enqueue_time,
            dequeue_time: self.dequeue_time,
            complete_time: self.complete_time,
        }
    }

    /// Fulfils the completion signal exactly once. Subsequent calls are a
    /// no-op (the sender is consumed on first use).
    pub fn complete(&mut self, result: WorkResult) {
        if let Some(tx) = self.completion_tx.take() {
            let _ = tx.send(result);
        }
    }
}

/// RAII guard armed when an RPC handler enqueues a Work Item. If the
/// handler's future is dropped before the completion signal resolves (the
/// caller disconnected), `Drop` flips the shared cancellation flag so the
/// queue worker can skip the item without doing its work.
pub struct CancelGuard {
    cancelled: Arc<AtomicBool>,
    armed: bool,
}

impl CancelGuard {
    pub fn new(cancelled: Arc<AtomicBool>) -> Self {
        CancelGuard {
            cancelled,
            armed: true,
        }
    }

    /// Disarm once a reply is ready to be written; the handler is no longer
    /// at risk of being dropped mid-flight from the queue's perspective.
    pub fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if self.armed {
            self.cancelled.store(true, Ordering::Release);
        }
    }
}
