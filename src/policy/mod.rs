//! Buffer admission and pushback policies.
//!
//! This module provides pluggable flow-control policies for bounded event
//! buffers. Two seams exist:
//!
//! - [`QueuePolicy`]: decides, when a producer offers an event, how long to
//!   wait before the event is actually inserted (admission control).
//! - [`PushbackPolicy`]: decides, on each consumption cycle, how long the
//!   producer should be paused before the next item is accepted
//!   (backpressure). The policy only computes the duration; the stream
//!   performs the pause.
//!
//! # Built-in Policies
//!
//! - [`GradualBreakingQueuePolicy`]: admission delay grows linearly once the
//!   buffer fill grade crosses a configured threshold; degrades to strict
//!   blocking at a threshold of 100%.
//! - [`FillGradePushbackPolicy`]: the same fill-grade math on the pushback
//!   side, as a pure duration computation.
//! - [`BlockingQueuePolicy`] / [`DiscardOldestQueuePolicy`]: plain bounded
//!   blocking and oldest-eviction admission.
//! - [`PushbackPolicyOption`]: factory for the simple pushback families
//!   (fixed, on-full, exponential, linear, linear-after-threshold).
//!
//! # Configuration-Driven Construction
//!
//! [`queue_policy_by_name`] and [`pushback_policy_by_name`] resolve policy
//! names from configuration, including the parametrized
//! `GRADUAL_BREAKING_POLICY_<threshold>_<buffer>_<wait>` family.
//! Configuration errors surface synchronously as [`PolicyError`].
//!
//! # Introspection
//!
//! Every policy exposes a read-only [`PolicyStatus`] snapshot of its runtime
//! gauges (current fill grade, configured threshold, configured and last
//! computed wait) for monitoring registries.
//!
//! # Example
//!
//! ```rust
//! use flowbridge::policy::{queue_policy_by_name, PolicyError};
//!
//! # fn example() -> Result<(), PolicyError> {
//! // 60% break threshold, reference capacity 500, 5ms base wait.
//! let policy = queue_policy_by_name::<String>(Some("GRADUAL_BREAKING_POLICY_60_500_5"))?;
//! assert!(policy.is_some());
//!
//! // No name configured: no policy, not an error.
//! assert!(queue_policy_by_name::<String>(None)?.is_none());
//! # Ok(())
//! # }
//! ```

mod error;
mod fill_grade;
mod gradual;
mod options;
mod registry;
mod traits;

pub use error::PolicyError;
pub use fill_grade::FillGradePushbackPolicy;
pub use gradual::GradualBreakingQueuePolicy;
pub use options::{BlockingQueuePolicy, DiscardOldestQueuePolicy, PushbackPolicyOption};
pub use registry::{
    pushback_policy_by_name, queue_policy_by_name, DEFAULT_BREAK_THRESHOLD,
    DEFAULT_REFERENCE_CAPACITY, DEFAULT_WAIT_MS, GRADUAL_BREAKING_POLICY,
};
pub use traits::{PolicyStatus, PushbackPolicy, QueuePolicy};
