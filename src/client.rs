//! Component D: the channel-pool client.
//!
//! Maintains N independent HTTP/2 connections to the same address (not N
//! handles onto one multiplexed connection — see DESIGN.md for why this is
//! the single most consequential tuning knob), round-robins outbound calls,
//! and enforces a per-call deadline client-side by racing the call against
//! a timer.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::error::{HarnessError, Result};
use crate::proto::prober::benchmark_service_client::BenchmarkServiceClient;
use crate::proto::prober::{ProcessRequest, ProcessResponse};
use crate::time::now_ticks;
use crate::work_item::ServerTimeline;

/// Classification tag for a Timeout outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutLayer {
    /// Deliberate default: the request never reached the server, or no
    /// reply arrived, and no richer signal was available (see DESIGN.md).
    Http2ConnectionLayer,
    ServerQueueWait,
    ServerProcessing,
    ClientCancelled,
}

/// Outcome of a single call through the channel-pool client.
#[derive(Debug, Clone)]
pub enum CallOutcome {
    Success {
        latency: Duration,
        server_timeline: ServerTimeline,
    },
    Timeout(TimeoutLayer),
    TransportError { client_cancelled: bool },
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub pool_size: usize,
    pub request_timeout: Duration,
    pub server_addr: String,
}

/// Classifies a terminal `ProcessResponse` into a `CallOutcome`. An Outcome
/// is Success iff the client observed `success=true` AND a timeline with
/// both `dequeue_time` and `enqueue_time` nonzero; anything else (including
/// a malformed or degenerate reply) falls through to `TransportError`.
fn classify_reply(resp: ProcessResponse, send_time: i64, receive_time: i64) -> CallOutcome {
    match resp.timeline {
        Some(t) if resp.success && t.dequeue_time > 0 && t.enqueue_time > 0 => CallOutcome::Success {
            latency: Duration::from_micros((receive_time - send_time).max(0) as u64),
            server_timeline: ServerTimeline {
                arrival_time: t.arrival_time,
                enqueue_time: t.enqueue_time,
                dequeue_time: t.dequeue_time,
                complete_time: t.complete_time,
            },
        },
        _ => CallOutcome::TransportError {
            client_cancelled: false,
        },
    }
}

/// N independent transport channels and a round-robin selector.
pub struct ChannelPoolClient {
    clients: Vec<BenchmarkServiceClient<tonic::transport::Channel>>,
    next: AtomicUsize,
    config: ClientConfig,
}

impl ChannelPoolClient {
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let mut clients = Vec::with_capacity(config.pool_size);
        for _ in 0..config.pool_size {
            let channel = tonic::transport::Channel::from_shared(config.server_addr.clone())
                .map_err(|e| HarnessError::InvalidConfig(e.to_string()))?
                .connect()
                .await?;
            clients.push(BenchmarkServiceClient::new(channel));
        }
        Ok(ChannelPoolClient {
            clients,
            next: AtomicUsize::new(0),
            config,
        })
    }

    /// Atomically disposes the old pool and creates a new one with new
    /// parameters. Used only by the optional configuration optimizer.
    pub async fn reconfigure(&mut self, config: ClientConfig) -> Result<()> {
        let fresh = ChannelPoolClient::connect(config).await?;
        self.clients = fresh.clients;
        self.config = fresh.config;
        self.next.store(0, Ordering::Release);
        Ok(())
    }

    fn select_client(&self) -> BenchmarkServiceClient<tonic::transport::Channel> {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.clients.len();
        self.clients[idx].clone()
    }

    /// Issues one unary call, applying a client-side deadline by racing the
    /// call against a timer rather than trusting the wire-level
    /// grpc-timeout alone.
    pub async fn call(&self) -> CallOutcome {
        let mut client = self.select_client();
        let request_id = Uuid::new_v4().to_string();
        let send_time = now_ticks();

        let request = tonic::Request::new(ProcessRequest {
            request_id,
            client_send_time: send_time,
        });

        match tokio::time::timeout(self.config.request_timeout, client.process(request)).await {
            Err(_elapsed) => CallOutcome::Timeout(TimeoutLayer::Http2ConnectionLayer),
            Ok(Ok(response)) => {
                let receive_time = now_ticks();
                classify_reply(response.into_inner(), send_time, receive_time)
            }
            Ok(Err(status)) => match status.code() {
                tonic::Code::Cancelled => CallOutcome::Timeout(TimeoutLayer::ClientCancelled),
                _ => CallOutcome::TransportError {
                    client_cancelled: false,
                },
            },
        }
    }

    /// Races the call against both the per-call deadline and an external
    /// cancellation signal (used by the load engine's own shutdown path).
    pub async fn call_cancellable(&self, cancelled: Arc<tokio::sync::Notify>) -> CallOutcome {
        tokio::select! {
            outcome = self.call() => outcome,
            _ = cancelled.notified() => CallOutcome::TransportError { client_cancelled: true },
        }
    }
}
