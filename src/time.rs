//! Process-wide monotonic clock shared by the in-process client and server.
//!
//! Both sides run in the same process (see DESIGN.md, in-process embedding),
//! so timestamps are comparable as long as they are derived from the same
//! origin. `now_ticks` returns microseconds elapsed since that origin.

use std::sync::OnceLock;
use std::time::Instant;

static CLOCK_ORIGIN: OnceLock<Instant> = OnceLock::new();

fn origin() -> Instant {
    *CLOCK_ORIGIN.get_or_init(Instant::now)
}

/// Microsecond-granularity ticks since the process clock origin.
pub fn now_ticks() -> i64 {
    origin().elapsed().as_micros() as i64
}

/// Ticks elapsed between two `now_ticks()` readings, in microseconds.
pub fn ticks_between(earlier: i64, later: i64) -> i64 {
    later - earlier
}
