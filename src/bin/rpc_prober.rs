use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tonic::transport::Server;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rpc_prober::client::{ChannelPoolClient, ClientConfig};
use rpc_prober::config::{Cli, LogFormat, Mode};
use rpc_prober::load_engine::{self, CancellationHandle};
use rpc_prober::proto::prober::benchmark_service_server::BenchmarkServiceServer;
use rpc_prober::prober::{finish, run_probe, Harness, ProbeLevel, ProbePhase, ProberConfig};
use rpc_prober::queue::WorkQueue;
use rpc_prober::report;
use rpc_prober::server::BenchmarkServiceImpl;
use rpc_prober::slo::{evaluate, SloThresholds};
use rpc_prober::synthetic::ServiceTimeConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);
    cli.validate().context("invalid configuration")?;

    let service_time = ServiceTimeConfig::new(cli.min_service_us, cli.max_service_ms * 1000);
    let queue_handle = WorkQueue::spawn(service_time);
    let queue = queue_handle.queue.clone();

    let server_addr = if let Some(external) = &cli.external_server {
        external.clone()
    } else {
        let addr: std::net::SocketAddr = format!("0.0.0.0:{}", cli.port)
            .parse()
            .context("invalid --port")?;
        let service = BenchmarkServiceImpl::new(queue.clone());
        info!(%addr, "embedded server listening");
        tokio::spawn(async move {
            let _ = Server::builder()
                .http2_max_concurrent_streams(Some(u32::MAX))
                .add_service(BenchmarkServiceServer::new(service))
                .serve(addr)
                .await;
        });
        // Give the listener a moment to bind before the client connects.
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        format!("http://{addr}")
    };

    let client = Arc::new(
        ChannelPoolClient::connect(ClientConfig {
            pool_size: cli.channel_pool_size,
            request_timeout: cli.request_timeout_duration(),
            server_addr: server_addr.clone(),
        })
        .await
        .context("failed to connect channel-pool client")?,
    );

    let slo = SloThresholds {
        min_success_rate: cli.success_rate,
        p99_max: cli.p99_threshold_duration(),
    };

    let prober_config = ProberConfig {
        warmup_concurrency: cli.initial_concurrency,
        warmup_duration: cli.warmup_duration_secs(),
        initial_concurrency: cli.initial_concurrency,
        max_concurrency: cli.max_concurrency,
        test_duration: cli.test_duration_secs(),
        stability_duration: cli.stability_duration_secs(),
        bisection_tolerance: cli.bisection_tolerance,
        stability_failure_reduction: 0.9,
        recommended_ceiling_factor: 0.8,
    };

    let probe = match cli.mode {
        Mode::Auto => {
            let cancellation = CancellationHandle::new();
            install_ctrl_c_handler(cancellation.clone());
            let harness = Harness {
                client,
                queue,
                cancellation,
            };
            run_probe(&harness, &slo, &prober_config).await
        }
        Mode::Manual => {
            let levels = cli.manual_levels().context("invalid --concurrency")?;
            let cancellation = CancellationHandle::new();
            install_ctrl_c_handler(cancellation.clone());
            let mut recorded = Vec::new();
            for k in levels {
                let result =
                    load_engine::run_level(client.clone(), &queue, k, cli.test_duration_secs(), cancellation.clone())
                        .await;
                let verdict = evaluate(&slo, &result);
                recorded.push(ProbeLevel {
                    phase: ProbePhase::Manual,
                    result,
                    verdict,
                });
                if cancellation.is_cancelled() {
                    break;
                }
            }
            let cancelled = cancellation.is_cancelled();
            finish(recorded, None, cancelled, &prober_config)
        }
    };

    println!("{}", report::render(&probe));

    queue_handle
        .shutdown(std::time::Duration::from_secs(5))
        .await;

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "rpc_prober=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
    }
}

fn install_ctrl_c_handler(cancellation: CancellationHandle) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancellation.cancel();
        }
    });
}
