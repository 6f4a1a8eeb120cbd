//! Gradual breaking admission policy.

use super::traits::{PolicyStatus, QueuePolicy};
use crate::stream::{EventQueue, StreamEvent};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Admission policy that starts breaking at a configured fill grade.
///
/// Below the break threshold, events are admitted immediately. At or above
/// it, the calling producer is paused for
/// `(threshold_remaining - remaining) * base_wait` before the insert — the
/// closer the buffer is to full, the longer the pause. A threshold of 100%
/// degrades to a plain blocking policy: the producer waits only when the
/// buffer is completely full.
///
/// The reference capacity is normally derived from the governed queue; a
/// fixed capacity can be configured instead, which keeps the threshold math
/// stable when the queue is shared or resized.
///
/// Runtime gauges are updated on every invocation and exposed via
/// [`status`]; a diagnostic line is emitted every 100th invocation (buffer
/// report) and every 20th throttled invocation — observability only, never
/// control flow.
///
/// [`status`]: QueuePolicy::status
#[derive(Debug)]
pub struct GradualBreakingQueuePolicy {
    id: String,
    break_threshold: u32,
    reference_capacity: Option<usize>,
    base_wait: Duration,
    invocations: AtomicU64,
    fill_grade: AtomicU32,
    current_wait_ms: AtomicU64,
}

impl GradualBreakingQueuePolicy {
    /// Creates a policy.
    ///
    /// `break_threshold` is clamped to `[1, 100]`; `reference_capacity`
    /// `None` derives the capacity from the governed queue on every
    /// invocation.
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
            current_wait_ms: AtomicU64::new(0),
        }
    }

    /// Creates a policy deriving its capacity from the governed queue.
    #[must_use]
    pub fn derived(id: impl Into<String>, break_threshold: u32, base_wait: Duration) -> Self {
        Self::new(id, break_threshold, None, base_wait)
    }

    /// Configured break threshold (percent).
    #[must_use]
    pub const fn break_threshold(&self) -> u32 {
        self.break_threshold
    }

    /// Configured reference capacity, `None` when derived from the queue.
    #[must_use]
    pub const fn reference_capacity(&self) -> Option<usize> {
        self.reference_capacity
    }

    /// Configured base wait per fill-grade step.
    #[must_use]
    pub const fn base_wait(&self) -> Duration {
        self.base_wait
    }

    /// Current runtime gauges.
    #[must_use]
    pub fn status(&self) -> PolicyStatus {
        PolicyStatus {
            fill_grade_percent: self.fill_grade.load(Ordering::Relaxed),
            break_threshold_percent: self.break_threshold,
            base_wait: self.base_wait,
            current_wait: Duration::from_millis(self.current_wait_ms.load(Ordering::Relaxed)),
            invocations: self.invocations.load(Ordering::Relaxed),
        }
    }

    fn record_wait(&self, wait: Duration) {
        self.current_wait_ms
            .store(wait.as_millis() as u64, Ordering::Relaxed);
    }
}

#[async_trait::async_trait]
impl<T: Send + 'static> QueuePolicy<T> for GradualBreakingQueuePolicy {
    async fn offer(&self, queue: &EventQueue<T>, event: StreamEvent<T>) -> bool {
        let snapshot = queue.snapshot();
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

        // 100% threshold degrades to the strict blocking policy.
        if self.break_threshold == 100 && snapshot.remaining == 0 {
            let start = Instant::now();
            let delivered = queue.push_wait(event).await;
            self.record_wait(start.elapsed());
            if !delivered {
                warn!(id = %self.id, "queue closed while enqueueing, event dropped");
            }
            return delivered;
        }

        if snapshot.remaining <= threshold_remaining {
            let steps = (threshold_remaining - snapshot.remaining) as u32;
            let delay = self.base_wait * steps;
            self.record_wait(delay);
            if count % 20 == 0 {
                debug!(
                    id = %self.id,
                    delay_ms = delay.as_millis() as u64,
                    remaining = snapshot.remaining,
                    threshold_remaining,
                    "breaking enqueue"
                );
            }
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        } else {
            self.record_wait(Duration::ZERO);
        }

        let delivered = queue.push_wait(event).await;
        if !delivered {
            warn!(id = %self.id, "queue closed while enqueueing, event dropped");
        }
        delivered
    }

    fn status(&self) -> PolicyStatus {
        GradualBreakingQueuePolicy::status(self)
    }

    fn name(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn policy(threshold: u32, capacity: Option<usize>, wait_ms: u64) -> GradualBreakingQueuePolicy {
        GradualBreakingQueuePolicy::new("test", threshold, capacity, Duration::from_millis(wait_ms))
    }

    #[test]
    fn test_threshold_is_clamped() {
        assert_eq!(policy(0, None, 5).break_threshold(), 1);
        assert_eq!(policy(250, None, 5).break_threshold(), 100);
        assert_eq!(policy(80, None, 5).break_threshold(), 80);
    }

    #[tokio::test]
    async fn test_below_threshold_admits_without_wait() {
        let policy = policy(80, None, 5);
        let queue = EventQueue::new(100);
        assert!(policy.offer(&queue, StreamEvent::Data(1)).await);

        let status = policy.status();
        assert_eq!(status.current_wait, Duration::ZERO);
        assert_eq!(status.invocations, 1);
    }

    #[tokio::test]
    async fn test_above_threshold_waits_and_records() {
        let policy = policy(80, None, 1);
        let queue = EventQueue::new(100);
        // Fill to 85%: remaining 15 <= threshold_remaining 20.
        for i in 0..85 {
            assert!(queue.try_push(StreamEvent::Data(i)).is_ok());
        }
        assert!(policy.offer(&queue, StreamEvent::Data(99)).await);

        let status = policy.status();
        // threshold_remaining 20, remaining 15 -> 5 steps of 1ms.
        assert_eq!(status.current_wait, Duration::from_millis(5));
        assert_eq!(status.fill_grade_percent, 85);
    }

    #[tokio::test]
    async fn test_wait_grows_as_capacity_shrinks() {
        let policy = policy(80, None, 1);
        let queue = EventQueue::new(100);
        for i in 0..85 {
            assert!(queue.try_push(StreamEvent::Data(i)).is_ok());
        }
        assert!(policy.offer(&queue, StreamEvent::Data(0)).await);
        let first = policy.status().current_wait;

        for i in 0..5 {
            assert!(queue.try_push(StreamEvent::Data(i)).is_ok());
        }
        assert!(policy.offer(&queue, StreamEvent::Data(0)).await);
        let second = policy.status().current_wait;
        assert!(second > first);
    }

    #[tokio::test]
    async fn test_full_threshold_blocks_until_space() {
        let policy = Arc::new(policy(100, None, 5));
        let queue = Arc::new(EventQueue::new(2));
        assert!(queue.try_push(StreamEvent::Data(1)).is_ok());
        assert!(queue.try_push(StreamEvent::Data(2)).is_ok());

        let offering = {
            let policy = Arc::clone(&policy);
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { policy.offer(&queue, StreamEvent::Data(3)).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!offering.is_finished());
        queue.evict_oldest();
        assert!(offering.await.unwrap());
    }

    #[tokio::test]
    async fn test_closed_queue_drops_event() {
        let policy = policy(100, None, 5);
        let queue = EventQueue::new(1);
        assert!(queue.try_push(StreamEvent::Data(1)).is_ok());
        queue.close();
        assert!(!policy.offer(&queue, StreamEvent::Data(2)).await);
    }

    #[tokio::test]
    async fn test_reference_capacity_overrides_queue() {
        // Reference capacity 1000 with threshold 99: threshold_remaining 10.
        // A queue of 100 with 50 free is far below the reference threshold,
        // so no wait applies even though the queue itself is half full.
        let policy = policy(99, Some(1000), 1);
        let queue = EventQueue::new(100);
        for i in 0..50 {
            assert!(queue.try_push(StreamEvent::Data(i)).is_ok());
        }
        assert!(policy.offer(&queue, StreamEvent::Data(0)).await);
        assert_eq!(
            policy.status().current_wait,
            Duration::ZERO
        );
    }
}
