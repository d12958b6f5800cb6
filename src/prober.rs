//! Component F: the adaptive concurrency prober.
//!
//! Five phases executed in order: warm, exponential growth, bisection,
//! stability verification, derivation. Driven against an abstract
//! `LevelRunner` rather than the network client directly, so the
//! growth/bisect/verify control flow can be exercised deterministically in
//! tests without sockets.

use std::time::Duration;

use async_trait::async_trait;

use crate::aggregate::ConcurrencyTestResult;
use crate::load_engine::CancellationHandle;
use crate::slo::{evaluate, SloThresholds, SloVerdict};

#[async_trait]
pub trait LevelRunner: Send + Sync {
    async fn run_level(&self, concurrency: usize, duration: Duration) -> ConcurrencyTestResult;
    fn reset_stats(&self);

    /// Whether an external cancellation has been requested. The growth and
    /// bisection loops poll this between levels; the default (used by
    /// deterministic test stubs with no cancellation concept) is `false`.
    fn is_cancelled(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ProberConfig {
    pub warmup_concurrency: usize,
    pub warmup_duration: Duration,
    pub initial_concurrency: usize,
    pub max_concurrency: usize,
    pub test_duration: Duration,
    pub stability_duration: Duration,
    pub bisection_tolerance: usize,
    pub stability_failure_reduction: f64,
    pub recommended_ceiling_factor: f64,
}

impl Default for ProberConfig {
    fn default() -> Self {
        ProberConfig {
            warmup_concurrency: 10,
            warmup_duration: Duration::from_secs(5),
            initial_concurrency: 20,
            max_concurrency: 2000,
            test_duration: Duration::from_secs(10),
            stability_duration: Duration::from_secs(30),
            bisection_tolerance: 10,
            stability_failure_reduction: 0.9,
            recommended_ceiling_factor: 0.8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbePhase {
    Warmup,
    Growth,
    Bisection,
    Stability,
    Manual,
}

#[derive(Debug, Clone)]
pub struct ProbeLevel {
    pub phase: ProbePhase,
    pub result: ConcurrencyTestResult,
    pub verdict: SloVerdict,
}

#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub levels: Vec<ProbeLevel>,
    pub max_concurrency: usize,
    pub effective_concurrency: usize,
    pub saturated_throughput: f64,
    pub recommended_ceiling: usize,
    pub cancelled: bool,
}

impl ProbeResult {
    fn empty(cancelled: bool) -> Self {
        ProbeResult {
            levels: Vec::new(),
            max_concurrency: 0,
            effective_concurrency: 0,
            saturated_throughput: 0.0,
            recommended_ceiling: 0,
            cancelled,
        }
    }
}

/// Runs the full five-phase probe. Returns a partial `ProbeResult` if
/// `cancellation` fires at any point: `max_concurrency` is reported as 0
/// (stability verification never ran) while `effective_concurrency` and
/// `recommended_ceiling` still reflect whichever levels passed SLO.
pub async fn run_probe(
    runner: &dyn LevelRunner,
    slo: &SloThresholds,
    config: &ProberConfig,
) -> ProbeResult {
    let mut levels: Vec<ProbeLevel> = Vec::new();

    // Phase 1: warm. Discarded; reset_stats before the first recorded level
    // erases any residual effect on queue statistics.
    runner
        .run_level(config.warmup_concurrency, config.warmup_duration)
        .await;
    runner.reset_stats();

    if runner.is_cancelled() {
        return finish(levels, None, true, config);
    }

    // Phase 2: exponential growth.
    let mut k = config.initial_concurrency.min(config.max_concurrency);
    let mut last_good: Option<usize> = None;
    let mut first_bad: Option<usize> = None;
    let mut reached_max_without_failing = false;
    let mut cancelled = false;

    loop {
        if runner.is_cancelled() {
            cancelled = true;
            break;
        }
        let result = runner.run_level(k, config.test_duration).await;
        let verdict = evaluate(slo, &result);
        let passed = verdict.pass;
        levels.push(ProbeLevel {
            phase: ProbePhase::Growth,
            result,
            verdict,
        });

        if passed {
            last_good = Some(k);
            if k >= config.max_concurrency {
                reached_max_without_failing = true;
                break;
            }
            let next = (k * 2).min(config.max_concurrency);
            if next == k {
                reached_max_without_failing = true;
                break;
            }
            k = next;
        } else {
            first_bad = Some(k);
            break;
        }
    }

    // Cancellation mid-growth: partial result, max_concurrency stays 0
    // since stability verification never runs.
    if cancelled {
        return finish(levels, None, true, config);
    }

    // Edge case: the very first exponential step fails SLO.
    if last_good.is_none() {
        return finish(levels, None, false, config);
    }

    // Phase 3: bisection.
    let mut final_k = last_good.expect("checked above");
    if !reached_max_without_failing {
        if let Some(bad) = first_bad {
            let mut low = last_good.expect("checked above");
            let mut high = bad;
            while high.saturating_sub(low) > config.bisection_tolerance {
                if runner.is_cancelled() {
                    return finish(levels, None, true, config);
                }
                let mid = low + (high - low) / 2;
                let result = runner.run_level(mid, config.test_duration).await;
                let verdict = evaluate(slo, &result);
                let passed = verdict.pass;
                levels.push(ProbeLevel {
                    phase: ProbePhase::Bisection,
                    result,
                    verdict,
                });
                if passed {
                    low = mid;
                } else {
                    high = mid;
                }
            }
            final_k = low;
        }
    }

    if runner.is_cancelled() {
        return finish(levels, None, true, config);
    }

    // Phase 4: stability verification.
    let verify_result = runner.run_level(final_k, config.stability_duration).await;
    let verify_verdict = evaluate(slo, &verify_result);
    let verify_passed = verify_verdict.pass;
    levels.push(ProbeLevel {
        phase: ProbePhase::Stability,
        result: verify_result,
        verdict: verify_verdict,
    });

    let max_concurrency = if verify_passed {
        final_k
    } else {
        ((final_k as f64) * config.stability_failure_reduction).floor() as usize
    };

    finish(levels, Some(max_concurrency), false, config)
}

/// Reduces a list of recorded levels into a `ProbeResult`. Exposed so
/// manual-mode callers (which bypass the five-phase search entirely) can
/// reuse the same effective-concurrency/recommended-ceiling derivation.
pub fn finish(
    levels: Vec<ProbeLevel>,
    max_concurrency: Option<usize>,
    cancelled: bool,
    config: &ProberConfig,
) -> ProbeResult {
    if levels.is_empty() && max_concurrency.is_none() {
        return ProbeResult::empty(cancelled);
    }

    let mut effective_concurrency = 0usize;
    let mut saturated_throughput = 0.0f64;
    for level in &levels {
        if level.verdict.pass && level.result.concurrency >= effective_concurrency {
            effective_concurrency = level.result.concurrency;
            saturated_throughput = level.result.throughput;
        }
    }

    let recommended_ceiling =
        ((effective_concurrency as f64) * config.recommended_ceiling_factor).floor() as usize;

    ProbeResult {
        levels,
        max_concurrency: max_concurrency.unwrap_or(0),
        effective_concurrency,
        saturated_throughput,
        recommended_ceiling,
        cancelled,
    }
}

/// Production `LevelRunner` wiring a real channel-pool client and
/// single-consumer queue into the abstract interface the prober drives.
pub struct Harness {
    pub client: std::sync::Arc<crate::client::ChannelPoolClient>,
    pub queue: crate::queue::WorkQueue,
    pub cancellation: CancellationHandle,
}

#[async_trait]
impl LevelRunner for Harness {
    async fn run_level(&self, concurrency: usize, duration: Duration) -> ConcurrencyTestResult {
        crate::load_engine::run_level(
            self.client.clone(),
            &self.queue,
            concurrency,
            duration,
            self.cancellation.clone(),
        )
        .await
    }

    fn reset_stats(&self) {
        self.queue.reset_stats();
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}
