//! Built-in named policies.

use super::traits::{PolicyStatus, PushbackPolicy, QueuePolicy};
use crate::stream::{BufferSnapshot, EventQueue, StreamEvent};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Plain bounded blocking admission.
///
/// Offers wait for a free slot and insert; the wait duration is recorded in
/// the runtime gauges. This is the default policy when nothing else is
/// configured.
#[derive(Debug, Default)]
pub struct BlockingQueuePolicy {
    invocations: AtomicU64,
    fill_grade: AtomicU32,
    current_wait_ms: AtomicU64,
}

impl BlockingQueuePolicy {
    /// Creates the policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current runtime gauges.
    #[must_use]
    pub fn status(&self) -> PolicyStatus {
        PolicyStatus {
            fill_grade_percent: self.fill_grade.load(Ordering::Relaxed),
            break_threshold_percent: 100,
            base_wait: Duration::ZERO,
            current_wait: Duration::from_millis(self.current_wait_ms.load(Ordering::Relaxed)),
            invocations: self.invocations.load(Ordering::Relaxed),
        }
    }
}

#[async_trait::async_trait]
impl<T: Send + 'static> QueuePolicy<T> for BlockingQueuePolicy {
    async fn offer(&self, queue: &EventQueue<T>, event: StreamEvent<T>) -> bool {
        self.invocations.fetch_add(1, Ordering::Relaxed);
        self.fill_grade
            .store(queue.snapshot().fill_grade_percent(), Ordering::Relaxed);
        let start = Instant::now();
        let delivered = queue.push_wait(event).await;
        self.current_wait_ms
            .store(start.elapsed().as_millis() as u64, Ordering::Relaxed);
        if !delivered {
            warn!("queue closed while enqueueing, event dropped");
        }
        delivered
    }

    fn status(&self) -> PolicyStatus {
        BlockingQueuePolicy::status(self)
    }

    fn name(&self) -> &str {
        "BLOCK"
    }
}

/// Admission that evicts the oldest buffered event when full.
///
/// The new event is always admitted; evictions are counted and logged.
#[derive(Debug, Default)]
pub struct DiscardOldestQueuePolicy {
    invocations: AtomicU64,
    evicted: AtomicU64,
    fill_grade: AtomicU32,
}

impl DiscardOldestQueuePolicy {
    /// Creates the policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events evicted so far.
    #[must_use]
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    /// Current runtime gauges.
    #[must_use]
    pub fn status(&self) -> PolicyStatus {
        PolicyStatus {
            fill_grade_percent: self.fill_grade.load(Ordering::Relaxed),
            break_threshold_percent: 100,
            base_wait: Duration::ZERO,
            current_wait: Duration::ZERO,
            invocations: self.invocations.load(Ordering::Relaxed),
        }
    }
}

#[async_trait::async_trait]
impl<T: Send + 'static> QueuePolicy<T> for DiscardOldestQueuePolicy {
    async fn offer(&self, queue: &EventQueue<T>, event: StreamEvent<T>) -> bool {
        self.invocations.fetch_add(1, Ordering::Relaxed);
        self.fill_grade
            .store(queue.snapshot().fill_grade_percent(), Ordering::Relaxed);
        let mut event = event;
        loop {
            if queue.is_closed() {
                warn!("queue closed while enqueueing, event dropped");
                return false;
            }
            match queue.try_push(event) {
                Ok(()) => return true,
                Err(rejected) => {
                    event = rejected;
                    if queue.evict_oldest().is_some() {
                        let count = self.evicted.fetch_add(1, Ordering::Relaxed) + 1;
                        if count % 100 == 0 {
                            debug!(evicted = count, "discarding oldest events under overflow");
                        }
                    }
                }
            }
        }
    }

    fn status(&self) -> PolicyStatus {
        DiscardOldestQueuePolicy::status(self)
    }

    fn name(&self) -> &str {
        "DISCARD_OLDEST"
    }
}

/// Factory for the simple pushback policy families.
///
/// Each option is configured with a single base value, mirroring how the
/// options are addressed from configuration: a name plus one paired number.
/// For every option but [`LinearAfterThreshold`] the value is a wait in
/// milliseconds; for `LinearAfterThreshold` it is the buffered-item
/// threshold after which pushback grows by one millisecond per item.
///
/// [`LinearAfterThreshold`]: PushbackPolicyOption::LinearAfterThreshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushbackPolicyOption {
    /// Constant pushback of the base wait.
    Fixed,
    /// Base wait while the buffer is full, zero otherwise.
    OnFullFixed,
    /// Base wait doubled per consecutive full observation, reset on space.
    OnFullExponential,
    /// Base wait scaled by the buffer fill fraction.
    Linear,
    /// One millisecond per buffered item beyond the threshold.
    LinearAfterThreshold,
}

impl PushbackPolicyOption {
    /// Constructs a fresh policy instance configured with `value`.
    #[must_use]
    pub fn policy(self, value: u64) -> Arc<dyn PushbackPolicy> {
        match self {
            Self::Fixed => Arc::new(FixedPushback {
                base_wait: Duration::from_millis(value),
                invocations: AtomicU64::new(0),
            }),
            Self::OnFullFixed => Arc::new(OnFullFixedPushback {
                base_wait: Duration::from_millis(value),
                invocations: AtomicU64::new(0),
            }),
            Self::OnFullExponential => Arc::new(OnFullExponentialPushback {
                base_wait: Duration::from_millis(value),
                consecutive_full: AtomicU32::new(0),
                invocations: AtomicU64::new(0),
            }),
            Self::Linear => Arc::new(LinearPushback {
                base_wait: Duration::from_millis(value),
                invocations: AtomicU64::new(0),
            }),
            Self::LinearAfterThreshold => Arc::new(LinearAfterThresholdPushback {
                threshold: value as usize,
                invocations: AtomicU64::new(0),
            }),
        }
    }
}

#[derive(Debug)]
struct FixedPushback {
    base_wait: Duration,
    invocations: AtomicU64,
}

impl PushbackPolicy for FixedPushback {
    fn pushback(&self, _snapshot: &BufferSnapshot) -> Duration {
        self.invocations.fetch_add(1, Ordering::Relaxed);
        self.base_wait
    }

    fn status(&self) -> PolicyStatus {
        PolicyStatus {
            base_wait: self.base_wait,
            current_wait: self.base_wait,
            invocations: self.invocations.load(Ordering::Relaxed),
            ..PolicyStatus::zero()
        }
    }

    fn name(&self) -> &str {
        "FIXED"
    }
}

#[derive(Debug)]
struct OnFullFixedPushback {
    base_wait: Duration,
    invocations: AtomicU64,
}

impl PushbackPolicy for OnFullFixedPushback {
    fn pushback(&self, snapshot: &BufferSnapshot) -> Duration {
        self.invocations.fetch_add(1, Ordering::Relaxed);
        if snapshot.remaining == 0 {
            self.base_wait
        } else {
            Duration::ZERO
        }
    }

    fn status(&self) -> PolicyStatus {
        PolicyStatus {
            break_threshold_percent: 100,
            base_wait: self.base_wait,
            invocations: self.invocations.load(Ordering::Relaxed),
            ..PolicyStatus::zero()
        }
    }

    fn name(&self) -> &str {
        "ON_FULL_FIXED"
    }
}

#[derive(Debug)]
struct OnFullExponentialPushback {
    base_wait: Duration,
    consecutive_full: AtomicU32,
    invocations: AtomicU64,
}

impl PushbackPolicy for OnFullExponentialPushback {
    fn pushback(&self, snapshot: &BufferSnapshot) -> Duration {
        self.invocations.fetch_add(1, Ordering::Relaxed);
        if snapshot.remaining == 0 {
            // Shift capped to keep the doubling well inside u64 range.
            let shift = self
                .consecutive_full
                .fetch_add(1, Ordering::Relaxed)
                .min(16);
            self.base_wait * (1u32 << shift)
        } else {
            self.consecutive_full.store(0, Ordering::Relaxed);
            Duration::ZERO
        }
    }

    fn status(&self) -> PolicyStatus {
        PolicyStatus {
            break_threshold_percent: 100,
            base_wait: self.base_wait,
            invocations: self.invocations.load(Ordering::Relaxed),
            ..PolicyStatus::zero()
        }
    }

    fn name(&self) -> &str {
        "ON_FULL_EXPONENTIAL"
    }
}

#[derive(Debug)]
struct LinearPushback {
    base_wait: Duration,
    invocations: AtomicU64,
}

impl PushbackPolicy for LinearPushback {
    fn pushback(&self, snapshot: &BufferSnapshot) -> Duration {
        self.invocations.fetch_add(1, Ordering::Relaxed);
        if snapshot.capacity == 0 {
            return Duration::ZERO;
        }
        self.base_wait * snapshot.len as u32 / snapshot.capacity as u32
    }

    fn status(&self) -> PolicyStatus {
        PolicyStatus {
            base_wait: self.base_wait,
            invocations: self.invocations.load(Ordering::Relaxed),
            ..PolicyStatus::zero()
        }
    }

    fn name(&self) -> &str {
        "LINEAR"
    }
}

#[derive(Debug)]
struct LinearAfterThresholdPushback {
    threshold: usize,
    invocations: AtomicU64,
}

impl PushbackPolicy for LinearAfterThresholdPushback {
    fn pushback(&self, snapshot: &BufferSnapshot) -> Duration {
        self.invocations.fetch_add(1, Ordering::Relaxed);
        Duration::from_millis(snapshot.len.saturating_sub(self.threshold) as u64)
    }

    fn status(&self) -> PolicyStatus {
        PolicyStatus {
            invocations: self.invocations.load(Ordering::Relaxed),
            ..PolicyStatus::zero()
        }
    }

    fn name(&self) -> &str {
        "LINEAR_AFTER_THRESHOLD"
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

    #[tokio::test]
    async fn test_blocking_policy_records_wait() {
        let policy = BlockingQueuePolicy::new();
        let queue = EventQueue::new(4);
        assert!(policy.offer(&queue, StreamEvent::Data(1)).await);
        assert_eq!(policy.status().invocations, 1);
    }

    #[tokio::test]
    async fn test_discard_oldest_evicts_one_per_overflow() {
        let policy = DiscardOldestQueuePolicy::new();
        let queue = EventQueue::new(3);
        for i in 0..3 {
            assert!(policy.offer(&queue, StreamEvent::Data(i)).await);
        }
        assert!(policy.offer(&queue, StreamEvent::Data(3)).await);

        assert_eq!(policy.evicted(), 1);
        assert_eq!(queue.len(), 3);
        assert!(matches!(queue.pop_wait().await, Some(StreamEvent::Data(1))));
    }

    #[test]
    fn test_fixed_is_constant() {
        let policy = PushbackPolicyOption::Fixed.policy(7);
        assert_eq!(policy.pushback(&snapshot(0, 10)), Duration::from_millis(7));
        assert_eq!(policy.pushback(&snapshot(10, 10)), Duration::from_millis(7));
    }

    #[test]
    fn test_on_full_fixed() {
        let policy = PushbackPolicyOption::OnFullFixed.policy(7);
        assert_eq!(policy.pushback(&snapshot(9, 10)), Duration::ZERO);
        assert_eq!(policy.pushback(&snapshot(10, 10)), Duration::from_millis(7));
    }

    #[test]
    fn test_on_full_exponential_doubles_and_resets() {
        let policy = PushbackPolicyOption::OnFullExponential.policy(2);
        assert_eq!(policy.pushback(&snapshot(10, 10)), Duration::from_millis(2));
        assert_eq!(policy.pushback(&snapshot(10, 10)), Duration::from_millis(4));
        assert_eq!(policy.pushback(&snapshot(10, 10)), Duration::from_millis(8));
        assert_eq!(policy.pushback(&snapshot(5, 10)), Duration::ZERO);
        assert_eq!(policy.pushback(&snapshot(10, 10)), Duration::from_millis(2));
    }

    #[test]
    fn test_linear_scales_with_fill() {
        let policy = PushbackPolicyOption::Linear.policy(100);
        assert_eq!(policy.pushback(&snapshot(0, 10)), Duration::ZERO);
        assert_eq!(policy.pushback(&snapshot(5, 10)), Duration::from_millis(50));
        assert_eq!(
            policy.pushback(&snapshot(10, 10)),
            Duration::from_millis(100)
        );
    }

    #[test]
    fn test_linear_after_threshold() {
        let policy = PushbackPolicyOption::LinearAfterThreshold.policy(100);
        assert_eq!(policy.pushback(&snapshot(50, 200)), Duration::ZERO);
        assert_eq!(policy.pushback(&snapshot(100, 200)), Duration::ZERO);
        assert_eq!(
            policy.pushback(&snapshot(110, 200)),
            Duration::from_millis(10)
        );
    }
}
