//! End-to-end scenarios exercised against the real embedded server over
//! loopback. Durations are kept short relative to the literal spec
//! scenarios to stay fast; the assertions check the same qualitative
//! behavior (SLO pass/fail direction, cancellation safety) rather than the
//! exact literal timings.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tonic::transport::Server;

use rpc_prober::client::{ChannelPoolClient, ClientConfig};
use rpc_prober::load_engine::{run_level, CancellationHandle};
use rpc_prober::proto::prober::benchmark_service_server::BenchmarkServiceServer;
use rpc_prober::queue::WorkQueue;
use rpc_prober::server::BenchmarkServiceImpl;
use rpc_prober::slo::{evaluate, SloThresholds};
use rpc_prober::synthetic::ServiceTimeConfig;

async fn start_server(service_time: ServiceTimeConfig) -> (String, WorkQueue, tokio::task::JoinHandle<()>) {
    let queue_handle = WorkQueue::spawn(service_time);
    let queue = queue_handle.queue.clone();
    let service = BenchmarkServiceImpl::new(queue.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    drop(listener);

    let server_service = service;
    let server_handle = tokio::spawn(async move {
        let _ = Server::builder()
            .add_service(BenchmarkServiceServer::new(server_service))
            .serve(addr)
            .await;
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Leak the queue's background worker task; the test process exits at
    // the end of the test function, reclaiming it.
    std::mem::forget(queue_handle);

    (format!("http://{addr}"), queue, server_handle)
}

#[tokio::test]
async fn low_concurrency_run_meets_slo() {
    let service_time = ServiceTimeConfig::new(10, 2_000); // 10us .. 2ms
    let (addr, queue, _server) = start_server(service_time).await;

    let client = Arc::new(
        ChannelPoolClient::connect(ClientConfig {
            pool_size: 8,
            request_timeout: Duration::from_millis(500),
            server_addr: addr,
        })
        .await
        .unwrap(),
    );

    let cancellation = CancellationHandle::new();
    let result = run_level(client, &queue, 10, Duration::from_millis(500), cancellation).await;

    let slo = SloThresholds {
        min_success_rate: 0.99,
        p99_max: Duration::from_millis(200),
    };
    let verdict = evaluate(&slo, &result);
    assert!(verdict.pass, "low concurrency should meet a generous SLO: {:?}", verdict.violations);
    assert_eq!(
        result.success_count + result.timeout_count + result.error_count,
        result.total_requests
    );
}

#[tokio::test]
async fn overwhelming_concurrency_against_tight_deadline_fails_slo() {
    // Request timeout far shorter than the minimum synthetic service time:
    // every call should time out at the connection layer.
    let service_time = ServiceTimeConfig::new(20_000, 20_000); // fixed 20ms
    let (addr, queue, _server) = start_server(service_time).await;

    let client = Arc::new(
        ChannelPoolClient::connect(ClientConfig {
            pool_size: 4,
            request_timeout: Duration::from_millis(1),
            server_addr: addr,
        })
        .await
        .unwrap(),
    );

    let cancellation = CancellationHandle::new();
    let result = run_level(client, &queue, 5, Duration::from_millis(300), cancellation).await;

    assert_eq!(result.success_count, 0);
    assert!(result.http2_layer_timeout_count > 0);

    let slo = SloThresholds {
        min_success_rate: 0.999,
        p99_max: Duration::from_millis(200),
    };
    assert!(!evaluate(&slo, &result).pass);
}

#[tokio::test]
async fn cancellation_mid_run_stops_promptly_without_error() {
    let service_time = ServiceTimeConfig::new(1_000, 5_000);
    let (addr, queue, _server) = start_server(service_time).await;

    let client = Arc::new(
        ChannelPoolClient::connect(ClientConfig {
            pool_size: 4,
            request_timeout: Duration::from_millis(200),
            server_addr: addr,
        })
        .await
        .unwrap(),
    );

    let cancellation = CancellationHandle::new();
    let cancel_trigger = cancellation.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel_trigger.cancel();
    });

    let result = run_level(client, &queue, 10, Duration::from_secs(5), cancellation).await;
    assert!(result.duration < Duration::from_secs(1));
}
