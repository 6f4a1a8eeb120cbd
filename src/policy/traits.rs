//! Policy traits and the runtime status snapshot.

use crate::stream::{BufferSnapshot, EventQueue, StreamEvent};
use std::fmt;
use std::time::Duration;

/// Read-only snapshot of a policy's runtime gauges.
///
/// Returned by [`QueuePolicy::status`] / [`PushbackPolicy::status`] for
/// monitoring registries. Gauges are last-value-wins; the invocation count
/// is monotonic. No write access is exposed — only the policy's own
/// invocation path updates the underlying state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyStatus {
    /// Buffer occupancy observed at the last invocation (0-100).
    pub fill_grade_percent: u32,
    /// Configured break threshold (0-100; 0 when the policy has none).
    pub break_threshold_percent: u32,
    /// Configured base wait per fill-grade step.
    pub base_wait: Duration,
    /// Wait or backpressure computed at the last invocation.
    pub current_wait: Duration,
    /// Total invocations of the policy.
    pub invocations: u64,
}

impl PolicyStatus {
    /// A zeroed status for freshly constructed policies.
    #[must_use]
    pub const fn zero() -> Self {
        Self {
            fill_grade_percent: 0,
            break_threshold_percent: 0,
            base_wait: Duration::ZERO,
            current_wait: Duration::ZERO,
            invocations: 0,
        }
    }
}

impl Default for PolicyStatus {
    fn default() -> Self {
        Self::zero()
    }
}

/// Admission policy governing how an event enters a bounded buffer.
///
/// The stream invokes `offer` for every published event, concurrently from
/// the engine's producer tasks; implementations keep their runtime state in
/// atomics. A policy may suspend the calling producer task before
/// performing the insert, but it never blocks other tasks and never
/// reorders admissions.
#[async_trait::async_trait]
pub trait QueuePolicy<T>: Send + Sync + fmt::Debug {
    /// Admits `event` into `queue`, waiting as the policy dictates.
    ///
    /// Returns `false` when the event was not delivered — the queue closed
    /// while waiting or the policy discarded the event. Callers treat an
    /// undelivered event as data loss and log it; no error is raised on
    /// this path.
    async fn offer(&self, queue: &EventQueue<T>, event: StreamEvent<T>) -> bool;

    /// Current runtime gauges.
    fn status(&self) -> PolicyStatus;

    /// Human-readable policy name for logging and diagnostics.
    fn name(&self) -> &str;
}

/// Backpressure policy computing how long the producer should pause.
///
/// Invoked by the stream on each consumption cycle with an occupancy
/// snapshot. A pushback policy is a pure computation — it never sleeps
/// itself; the stream performs the pause it returns.
pub trait PushbackPolicy: Send + Sync + fmt::Debug {
    /// Computes the producer pause for the observed occupancy.
    ///
    /// Returns [`Duration::ZERO`] when no pushback is required.
    fn pushback(&self, snapshot: &BufferSnapshot) -> Duration;

    /// Current runtime gauges.
    fn status(&self) -> PolicyStatus;

    /// Human-readable policy name for logging and diagnostics.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_zero() {
        let status = PolicyStatus::zero();
        assert_eq!(status.fill_grade_percent, 0);
        assert_eq!(status.current_wait, Duration::ZERO);
        assert_eq!(status.invocations, 0);
        assert_eq!(status, PolicyStatus::default());
    }
}
