//! Component C: the RPC server adapter.
//!
//! Exposes the single unary `Process` operation. Enqueues a Work Item into
//! the single-consumer queue and awaits its completion signal; never blocks
//! the I/O thread on the queue itself.

use tonic::{Request, Response, Status};
use tracing::{info, warn};

use crate::proto::prober::benchmark_service_server::BenchmarkService;
use crate::proto::prober::{ProcessRequest, ProcessResponse, Timeline};
use crate::queue::WorkQueue;
use crate::time::now_ticks;
use crate::work_item::{CancelGuard, WorkItem, WorkResult};

pub struct BenchmarkServiceImpl {
    queue: WorkQueue,
}

impl BenchmarkServiceImpl {
    pub fn new(queue: WorkQueue) -> Self {
        BenchmarkServiceImpl { queue }
    }
}

#[tonic::async_trait]
impl BenchmarkService for BenchmarkServiceImpl {
    async fn process(
        &self,
        request: Request<ProcessRequest>,
    ) -> Result<Response<ProcessResponse>, Status> {
        let arrival_time = now_ticks();
        let req = request.into_inner();

        let (item, completion_rx, cancelled) = WorkItem::new(req.request_id.clone(), arrival_time);
        let mut guard = CancelGuard::new(cancelled);

        self.queue.enqueue(item);

        let result = completion_rx.await;
        // A reply is about to be produced (or the wait failed); the
        // handler is no longer at risk of being dropped mid-flight.
        guard.disarm();

        match result {
            Ok(WorkResult::Completed(timeline, depth_at_enqueue)) => {
                info!(request_id = %req.request_id, "request completed");
                Ok(Response::new(ProcessResponse {
                    request_id: req.request_id,
                    success: true,
                    queue_depth_at_enqueue: depth_at_enqueue,
                    timeline: Some(Timeline {
                        arrival_time: timeline.arrival_time,
                        enqueue_time: timeline.enqueue_time,
                        dequeue_time: timeline.dequeue_time,
                        complete_time: timeline.complete_time,
                    }),
                }))
            }
            Ok(WorkResult::Cancelled) => {
                warn!(request_id = %req.request_id, "request cancelled in queue");
                Err(Status::cancelled("request cancelled before processing"))
            }
            Err(_) => {
                warn!(request_id = %req.request_id, "completion channel closed unexpectedly");
                Err(Status::cancelled("request cancelled"))
            }
        }
    }
}
