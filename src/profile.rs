//! Accounting of time spent blocked in channel operations.
//!
//! Profiling is off by default. When it's on, every blocking operation that had to park stamps
//! its wait record, the counterpart that completes the operation records the release instant,
//! and the blocked duration is added to process-wide counters.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crossbeam_utils::CachePadded;
use tracing::debug;

use crate::waitq::Waiter;

static ENABLED: AtomicBool = AtomicBool::new(false);

static EVENTS: CachePadded<AtomicU64> = CachePadded::new(AtomicU64::new(0));

static TOTAL_NANOS: CachePadded<AtomicU64> = CachePadded::new(AtomicU64::new(0));

/// Turns blocking-time accounting on or off for the whole process.
pub fn set_block_profile(enabled: bool) {
    ENABLED.store(enabled, Ordering::SeqCst);
}

/// Returns `true` if blocking-time accounting is on.
pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

/// Totals of all recorded blocking events.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BlockStats {
    /// Number of operations that blocked and were later completed.
    pub events: u64,

    /// Total time those operations spent blocked.
    pub total: Duration,
}

/// Returns the totals recorded so far.
pub fn snapshot() -> BlockStats {
    BlockStats {
        events: EVENTS.load(Ordering::SeqCst),
        total: Duration::from_nanos(TOTAL_NANOS.load(Ordering::SeqCst)),
    }
}

/// Clears the recorded totals.
pub fn reset() {
    EVENTS.store(0, Ordering::SeqCst);
    TOTAL_NANOS.store(0, Ordering::SeqCst);
}

/// Returns the start instant of a blocking operation if profiling is on.
pub(crate) fn now() -> Option<Instant> {
    if is_enabled() {
        Some(Instant::now())
    } else {
        None
    }
}

/// Marks a wait record of a single-channel operation for profiling and returns its start instant.
pub(crate) fn start(waiter: &mut Waiter) -> Option<Instant> {
    let t0 = now();
    waiter.profiled = t0.is_some();
    t0
}

/// Records a blocking event that started at `t0` and was released at `released`.
///
/// Returns the blocked duration, if both instants are known.
pub(crate) fn finish(t0: Option<Instant>, released: Option<Instant>) -> Option<Duration> {
    let blocked = released?.saturating_duration_since(t0?);
    let nanos = saturating_nanos(blocked);
    EVENTS.fetch_add(1, Ordering::SeqCst);
    TOTAL_NANOS.fetch_add(nanos, Ordering::SeqCst);
    debug!(blocked_ns = nanos, "blocking event");
    Some(blocked)
}

/// Converts a duration to nanoseconds, saturating at `u64::MAX`.
fn saturating_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nanos_saturate() {
        assert_eq!(saturating_nanos(Duration::from_nanos(1_500)), 1_500);
        assert_eq!(saturating_nanos(Duration::from_secs(1)), 1_000_000_000);
        assert_eq!(saturating_nanos(Duration::MAX), u64::MAX);
    }
}
