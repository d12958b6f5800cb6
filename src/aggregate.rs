//! Component G: the result aggregator.
//!
//! Reduces a list of per-call outcomes over a fixed duration into a
//! Concurrency Test Result: totals, percentile latency, queue-wait
//! distribution, and a timeout-layer breakdown.

use std::time::Duration;

use crate::client::{CallOutcome, TimeoutLayer};

/// A set of percentile summaries derived from a sorted sample.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LatencyDistribution {
    pub min: f64,
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
    pub max: f64,
    pub mean: f64,
    pub stddev: f64,
}

/// Given sorted ascending microsecond samples, computes `P_p = s[clamp(ceil(p*n/100)-1, 0, n-1)]`.
/// Integer ceiling division, no floating-point interpolation. Returns 0 for an empty sample.
fn percentile(sorted: &[f64], p: u32) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    let numerator = p as u64 * n as u64;
    let idx = numerator.div_ceil(100);
    let idx = idx.saturating_sub(1).min(n as u64 - 1) as usize;
    sorted[idx]
}

impl LatencyDistribution {
    pub fn from_samples(samples_us: &[f64]) -> Self {
        if samples_us.is_empty() {
            return LatencyDistribution::default();
        }
        let mut sorted = samples_us.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());

        let n = sorted.len() as f64;
        let mean = sorted.iter().sum::<f64>() / n;
        let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

        LatencyDistribution {
            min: sorted[0],
            p50: percentile(&sorted, 50),
            p90: percentile(&sorted, 90),
            p95: percentile(&sorted, 95),
            p99: percentile(&sorted, 99),
            max: sorted[sorted.len() - 1],
            mean,
            stddev: variance.sqrt(),
        }
    }
}

/// For one concurrency level K over duration T.
#[derive(Debug, Clone)]
pub struct ConcurrencyTestResult {
    pub concurrency: usize,
    pub duration: Duration,
    pub total_requests: u64,
    pub success_count: u64,
    pub timeout_count: u64,
    pub error_count: u64,
    pub success_rate: f64,
    pub throughput: f64,
    pub latency_distribution: LatencyDistribution,
    pub queue_wait_distribution: LatencyDistribution,
    pub peak_queue_depth: i64,
    pub max_queue_wait_us: i64,
    pub http2_layer_timeout_count: u64,
    pub server_layer_timeout_count: u64,
    pub client_cancelled_count: u64,
}

/// Reduces a list of per-call Outcomes into a Concurrency Test Result. Pure:
/// the same Outcome list always yields an identical result.
pub fn aggregate(
    concurrency: usize,
    duration: Duration,
    outcomes: &[CallOutcome],
    peak_queue_depth: i64,
    max_queue_wait_us: i64,
) -> ConcurrencyTestResult {
    let total_requests = outcomes.len() as u64;
    let mut success_count = 0u64;
    let mut timeout_count = 0u64;
    let mut error_count = 0u64;
    let mut http2_layer_timeout_count = 0u64;
    let mut server_layer_timeout_count = 0u64;
    let mut client_cancelled_count = 0u64;

    let mut latencies_us = Vec::new();
    let mut queue_waits_us = Vec::new();

    for outcome in outcomes {
        match outcome {
            CallOutcome::Success {
                latency,
                server_timeline,
            } => {
                success_count += 1;
                latencies_us.push(latency.as_micros() as f64);
                if server_timeline.dequeue_time > 0 && server_timeline.enqueue_time > 0 {
                    queue_waits_us
                        .push((server_timeline.dequeue_time - server_timeline.enqueue_time) as f64);
                }
            }
            CallOutcome::Timeout(layer) => {
                timeout_count += 1;
                match layer {
                    TimeoutLayer::Http2ConnectionLayer => http2_layer_timeout_count += 1,
                    TimeoutLayer::ServerQueueWait | TimeoutLayer::ServerProcessing => {
                        server_layer_timeout_count += 1
                    }
                    TimeoutLayer::ClientCancelled => client_cancelled_count += 1,
                }
            }
            CallOutcome::TransportError { client_cancelled } => {
                error_count += 1;
                if *client_cancelled {
                    client_cancelled_count += 1;
                }
            }
        }
    }

    let success_rate = if total_requests > 0 {
        success_count as f64 / total_requests as f64
    } else {
        0.0
    };
    let throughput = if duration.as_secs_f64() > 0.0 {
        success_count as f64 / duration.as_secs_f64()
    } else {
        0.0
    };

    ConcurrencyTestResult {
        concurrency,
        duration,
        total_requests,
        success_count,
        timeout_count,
        error_count,
        success_rate,
        throughput,
        latency_distribution: LatencyDistribution::from_samples(&latencies_us),
        queue_wait_distribution: LatencyDistribution::from_samples(&queue_waits_us),
        peak_queue_depth,
        max_queue_wait_us,
        http2_layer_timeout_count,
        server_layer_timeout_count,
        client_cancelled_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sample_yields_zero_percentiles() {
        let dist = LatencyDistribution::from_samples(&[]);
        assert_eq!(dist, LatencyDistribution::default());
    }

    #[test]
    fn single_sample_all_percentiles_equal() {
        let dist = LatencyDistribution::from_samples(&[42.0]);
        assert_eq!(dist.min, 42.0);
        assert_eq!(dist.p50, 42.0);
        assert_eq!(dist.p99, 42.0);
        assert_eq!(dist.max, 42.0);
    }

    #[test]
    fn percentile_matches_exact_ceiling_formula() {
        let sorted: Vec<f64> = (1..=100).map(|v| v as f64).collect();
        assert_eq!(percentile(&sorted, 50), 50.0);
        assert_eq!(percentile(&sorted, 99), 99.0);
        assert_eq!(percentile(&sorted, 100), 100.0);
    }

    #[test]
    fn totals_sum_to_total_requests() {
        let outcomes = vec![
            CallOutcome::Success {
                latency: Duration::from_millis(1),
                server_timeline: Default::default(),
            },
            CallOutcome::Timeout(TimeoutLayer::Http2ConnectionLayer),
            CallOutcome::TransportError {
                client_cancelled: false,
            },
        ];
        let result = aggregate(10, Duration::from_secs(1), &outcomes, 0, 0);
        assert_eq!(
            result.success_count + result.timeout_count + result.error_count,
            result.total_requests
        );
    }
}
