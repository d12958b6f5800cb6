//! Property-based tests for the invariants named in the aggregator and SLO
//! evaluator: exact percentile formula, SLO threshold monotonicity, and
//! outcome-count conservation.

use std::time::Duration;

use proptest::prelude::*;

use rpc_prober::aggregate::{aggregate, LatencyDistribution};
use rpc_prober::client::{CallOutcome, TimeoutLayer};
use rpc_prober::slo::{evaluate, SloThresholds};
use rpc_prober::work_item::ServerTimeline;

fn percentile_reference(sorted: &[f64], p: u32) -> f64 {
    let n = sorted.len() as u64;
    let idx = (p as u64 * n).div_ceil(100);
    let idx = idx.saturating_sub(1).min(n.saturating_sub(1)) as usize;
    sorted[idx]
}

proptest! {
    #[test]
    fn percentiles_match_exact_ceiling_formula(mut values in prop::collection::vec(0.0f64..1_000_000.0, 1..200)) {
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let dist = LatencyDistribution::from_samples(&values);
        prop_assert_eq!(dist.p50, percentile_reference(&values, 50));
        prop_assert_eq!(dist.p90, percentile_reference(&values, 90));
        prop_assert_eq!(dist.p95, percentile_reference(&values, 95));
        prop_assert_eq!(dist.p99, percentile_reference(&values, 99));
    }

    #[test]
    fn aggregate_totals_always_sum_to_total_requests(
        n_success in 0u32..50,
        n_timeout in 0u32..50,
        n_error in 0u32..50,
    ) {
        let mut outcomes = Vec::new();
        for _ in 0..n_success {
            outcomes.push(CallOutcome::Success {
                latency: Duration::from_micros(100),
                server_timeline: ServerTimeline::default(),
            });
        }
        for _ in 0..n_timeout {
            outcomes.push(CallOutcome::Timeout(TimeoutLayer::Http2ConnectionLayer));
        }
        for _ in 0..n_error {
            outcomes.push(CallOutcome::TransportError { client_cancelled: false });
        }
        let result = aggregate(10, Duration::from_secs(1), &outcomes, 0, 0);
        prop_assert_eq!(
            result.success_count + result.timeout_count + result.error_count,
            result.total_requests
        );
        prop_assert_eq!(result.total_requests, (n_success + n_timeout + n_error) as u64);
    }

    #[test]
    fn raising_p99_threshold_never_turns_pass_into_fail(
        observed_p99_us in 0.0f64..1_000_000.0,
        strict_ms in 1u64..500,
        slack_ms in 0u64..500,
    ) {
        let relaxed_ms = strict_ms + slack_ms;
        let mut result = aggregate(10, Duration::from_secs(1), &Vec::<CallOutcome>::new(), 0, 0);
        result.success_rate = 1.0;
        result.latency_distribution.p99 = observed_p99_us;

        let strict = SloThresholds {
            min_success_rate: 0.999,
            p99_max: Duration::from_millis(strict_ms),
        };
        let relaxed = SloThresholds {
            min_success_rate: 0.999,
            p99_max: Duration::from_millis(relaxed_ms),
        };

        let strict_verdict = evaluate(&strict, &result);
        let relaxed_verdict = evaluate(&relaxed, &result);
        prop_assert!(!strict_verdict.pass || relaxed_verdict.pass);
    }

    #[test]
    fn lowering_success_rate_floor_never_turns_pass_into_fail(
        observed_rate in 0.0f64..1.0,
        floor_delta in 0.0f64..1.0,
    ) {
        let strict_floor = (observed_rate + 0.3).min(1.0);
        let relaxed_floor = (strict_floor - floor_delta).max(0.0);

        let mut result = aggregate(10, Duration::from_secs(1), &Vec::<CallOutcome>::new(), 0, 0);
        result.success_rate = observed_rate;
        result.latency_distribution.p99 = 0.0;

        let strict = SloThresholds {
            min_success_rate: strict_floor,
            p99_max: Duration::from_secs(1),
        };
        let relaxed = SloThresholds {
            min_success_rate: relaxed_floor,
            p99_max: Duration::from_secs(1),
        };

        let strict_verdict = evaluate(&strict, &result);
        let relaxed_verdict = evaluate(&relaxed, &result);
        prop_assert!(!strict_verdict.pass || relaxed_verdict.pass);
    }
}
