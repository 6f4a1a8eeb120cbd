//! Fill-grade pushback policy.

use super::traits::{PolicyStatus, PushbackPolicy};
use crate::stream::BufferSnapshot;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// Pushback policy driven by the buffer's fill grade.
///
/// Applies the same threshold math as
/// [`GradualBreakingQueuePolicy`](super::GradualBreakingQueuePolicy), but on
/// the consumption side: instead of pausing the producer itself, it returns
/// the duration the producer should be paused for, and the stream performs
/// the pause. Below the break threshold the pushback is zero; above it the
/// pushback grows by one `base_wait` per missing free slot.
///
/// A pure computation per invocation — the only side effects are the atomic
/// runtime gauges and the periodic diagnostic lines.
#[derive(Debug)]
pub struct FillGradePushbackPolicy {
    id: String,
    break_threshold: u32,
    reference_capacity: Option<usize>,
    base_wait: Duration,
    invocations: AtomicU64,
    fill_grade: AtomicU32,
    current_backpressure_ms: AtomicU64,
}

impl FillGradePushbackPolicy {
    /// Creates a policy.
    ///
    /// `break_threshold` is clamped to `[1, 100]`; `reference_capacity`
    /// `None` derives the capacity from the observed snapshot.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        break_threshold: u32,
        reference_capacity: Option<usize>,
        base_wait: Duration,
    ) -> Self {
        Self {
            id: id.into(),
            break_threshold: break_threshold.clamp(1, 100),
            reference_capacity,
            base_wait,
            invocations: AtomicU64::new(0),
            fill_grade: AtomicU32::new(0),
            current_backpressure_ms: AtomicU64::new(0),
        }
    }

    /// Creates a policy with the default 80% break threshold.
    #[must_use]
    pub fn with_default_threshold(id: impl Into<String>, base_wait: Duration) -> Self {
        Self::new(id, 80, None, base_wait)
    }

    /// Configured break threshold (percent).
    #[must_use]
    pub const fn break_threshold(&self) -> u32 {
        self.break_threshold
    }

    /// Configured base wait per fill-grade step.
    #[must_use]
    pub const fn base_wait(&self) -> Duration {
        self.base_wait
    }
}

impl PushbackPolicy for FillGradePushbackPolicy {
    fn pushback(&self, snapshot: &BufferSnapshot) -> Duration {
        let capacity = self.reference_capacity.unwrap_or(snapshot.capacity);
        let one_percent = capacity as f64 / 100.0;
        let threshold_remaining =
            capacity.saturating_sub((one_percent * f64::from(self.break_threshold)) as usize);

        let count = self.invocations.fetch_add(1, Ordering::Relaxed) + 1;
        self.fill_grade
            .store(snapshot.fill_grade_percent(), Ordering::Relaxed);
        if count % 100 == 0 {
            debug!(
                id = %self.id,
                capacity,
                remaining = snapshot.remaining,
                threshold_remaining,
                "buffer fill report"
            );
        }

        if snapshot.remaining <= threshold_remaining {
            let steps = (threshold_remaining - snapshot.remaining) as u32;
            let backpressure = self.base_wait * steps;
            self.current_backpressure_ms
                .store(backpressure.as_millis() as u64, Ordering::Relaxed);
            if count % 20 == 0 {
                debug!(
                    id = %self.id,
                    backpressure_ms = backpressure.as_millis() as u64,
                    remaining = snapshot.remaining,
                    threshold_remaining,
                    "applying backpressure"
                );
            }
            return backpressure;
        }
        self.current_backpressure_ms.store(0, Ordering::Relaxed);
        Duration::ZERO
    }

    fn status(&self) -> PolicyStatus {
        PolicyStatus {
            fill_grade_percent: self.fill_grade.load(Ordering::Relaxed),
            break_threshold_percent: self.break_threshold,
            base_wait: self.base_wait,
            current_wait: Duration::from_millis(
                self.current_backpressure_ms.load(Ordering::Relaxed),
            ),
            invocations: self.invocations.load(Ordering::Relaxed),
        }
    }

    fn name(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(len: usize, capacity: usize) -> BufferSnapshot {
        BufferSnapshot {
            len,
            capacity,
            remaining: capacity - len,
        }
    }

    #[test]
    fn test_below_threshold_is_zero() {
        let policy =
            FillGradePushbackPolicy::new("test", 80, None, Duration::from_millis(5));
        for len in 0..=79 {
            assert_eq!(policy.pushback(&snapshot(len, 100)), Duration::ZERO);
        }
    }

    #[test]
    fn test_above_threshold_grows_monotonically() {
        let policy =
            FillGradePushbackPolicy::new("test", 80, None, Duration::from_millis(5));
        let mut last = Duration::ZERO;
        for len in 80..=100 {
            let backpressure = policy.pushback(&snapshot(len, 100));
            assert!(backpressure >= last);
            last = backpressure;
        }
        // Full buffer: 20 steps of 5ms.
        assert_eq!(last, Duration::from_millis(100));
    }

    #[test]
    fn test_threshold_clamped() {
        let policy = FillGradePushbackPolicy::new("test", 0, None, Duration::from_millis(5));
        assert_eq!(policy.break_threshold(), 1);
        let policy = FillGradePushbackPolicy::new("test", 120, None, Duration::from_millis(5));
        assert_eq!(policy.break_threshold(), 100);
    }

    #[test]
    fn test_status_reflects_last_invocation() {
        let policy =
            FillGradePushbackPolicy::with_default_threshold("test", Duration::from_millis(5));
        policy.pushback(&snapshot(90, 100));

        let status = policy.status();
        assert_eq!(status.fill_grade_percent, 90);
        assert_eq!(status.break_threshold_percent, 80);
        assert_eq!(status.base_wait, Duration::from_millis(5));
        // threshold_remaining 20, remaining 10 -> 10 steps of 5ms.
        assert_eq!(status.current_wait, Duration::from_millis(50));
        assert_eq!(status.invocations, 1);
    }
}
