//! Component H: the SLO evaluator.
//!
//! Pure, deterministic, no side effects: applies a two-predicate SLO
//! (success-rate floor, P99 ceiling) to an aggregated result.

use std::time::Duration;

use crate::aggregate::ConcurrencyTestResult;

#[derive(Debug, Clone, Copy)]
pub struct SloThresholds {
    pub min_success_rate: f64,
    pub p99_max: Duration,
}

#[derive(Debug, Clone)]
pub struct SloVerdict {
    pub pass: bool,
    pub violations: Vec<String>,
}

/// `pass = (success_rate >= min_success_rate) AND (p99 <= p99_max)`. On
/// fail, composes a violation string per failed predicate with observed
/// and threshold values.
pub fn evaluate(thresholds: &SloThresholds, result: &ConcurrencyTestResult) -> SloVerdict {
    let mut violations = Vec::new();

    if result.success_rate < thresholds.min_success_rate {
        violations.push(format!(
            "success_rate {:.4} below threshold {:.4}",
            result.success_rate, thresholds.min_success_rate
        ));
    }

    let p99_us = result.latency_distribution.p99;
    let p99_max_us = thresholds.p99_max.as_micros() as f64;
    if p99_us > p99_max_us {
        violations.push(format!(
            "p99 {:.0}us exceeds threshold {:.0}us",
            p99_us, p99_max_us
        ));
    }

    SloVerdict {
        pass: violations.is_empty(),
        violations,
    }
}
