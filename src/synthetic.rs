//! Component A: the synthetic server-side work unit.
//!
//! Draws a delay whose natural log is uniform over `[ln(min_us),
//! ln(max_us)]`, then realizes it with a busy-wait for sub-millisecond
//! precision and a coarse sleep for the bulk of longer delays.

use std::time::{Duration, Instant};

use rand::Rng;

/// Service-time distribution parameters, in microseconds.
#[derive(Debug, Clone, Copy)]
pub struct ServiceTimeConfig {
    pub min_us: u64,
    pub max_us: u64,
}

impl ServiceTimeConfig {
    pub fn new(min_us: u64, max_us: u64) -> Self {
        assert!(min_us >= 1, "min_us must be at least 1");
        assert!(max_us >= min_us, "max_us must be >= min_us");
        ServiceTimeConfig { min_us, max_us }
    }

    /// Draws one delay in microseconds, log-uniform over `[min_us, max_us]`.
    pub fn sample(&self) -> u64 {
        if self.min_us == self.max_us {
            return self.min_us;
        }
        let ln_min = (self.min_us as f64).ln();
        let ln_max = (self.max_us as f64).ln();
        let ln_d = rand::thread_rng().gen_range(ln_min..=ln_max);
        ln_d.exp().round() as u64
    }
}

/// Performs the synthetic work: sleeps for approximately `micros`
/// microseconds. Short delays are realized with a spin-wait; longer ones
/// coarse-sleep the bulk and spin the residual. Always returns; overruns
/// are acceptable scheduling noise, not a failure mode.
pub async fn perform_work(micros: u64) {
    const COARSE_THRESHOLD_US: u64 = 1_000;

    let start = Instant::now();
    let target = Duration::from_micros(micros);

    if micros >= COARSE_THRESHOLD_US {
        let coarse_ms = micros / 1_000;
        tokio::time::sleep(Duration::from_millis(coarse_ms)).await;
    }

    while start.elapsed() < target {
        std::hint::spin_loop();
        if start.elapsed() + Duration::from_micros(50) < target {
            tokio::task::yield_now().await;
        }
    }
}
