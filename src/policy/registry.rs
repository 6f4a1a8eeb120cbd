//! Name-based policy resolution.

use super::error::PolicyError;
use super::fill_grade::FillGradePushbackPolicy;
use super::gradual::GradualBreakingQueuePolicy;
use super::options::{BlockingQueuePolicy, DiscardOldestQueuePolicy, PushbackPolicyOption};
use super::traits::{PushbackPolicy, QueuePolicy};
use std::sync::Arc;
use std::time::Duration;

/// Prefix of the parametrized gradual breaking family.
pub const GRADUAL_BREAKING_POLICY: &str = "GRADUAL_BREAKING_POLICY";

/// Default break threshold (percent) for an unparametrized gradual policy.
pub const DEFAULT_BREAK_THRESHOLD: u32 = 80;

/// Default reference capacity for an unparametrized gradual policy.
pub const DEFAULT_REFERENCE_CAPACITY: usize = 100;

/// Default base wait in milliseconds for an unparametrized gradual policy.
pub const DEFAULT_WAIT_MS: u64 = 5;

/// Resolves a configured queue policy name to a fresh policy instance.
///
/// Resolution order:
///
/// 1. built-in options: `BLOCK`, `DISCARD_OLDEST`;
/// 2. `GRADUAL_BREAKING_POLICY`, with the documented 80/100/5 defaults;
/// 3. the parametrized family
///    `GRADUAL_BREAKING_POLICY_<threshold>[_<buffer>[_<wait>]]` — omitted
///    suffixes default to 80/100/5.
///
/// Names are case-insensitive. `None` resolves to `Ok(None)` — an absent
/// configuration is not an error.
///
/// # Errors
///
/// - [`PolicyError::InvalidParameter`] when a numeric suffix fails to
///   parse, naming the offending token;
/// - [`PolicyError::UnknownPolicy`] when a non-null name matches nothing.
///
/// # Example
///
/// ```rust
/// use flowbridge::policy::queue_policy_by_name;
///
/// let policy = queue_policy_by_name::<u32>(Some("GRADUAL_BREAKING_POLICY_60_500_5")).unwrap();
/// assert_eq!(policy.unwrap().name(), "GRADUAL_BREAKING_POLICY_60_500_5");
///
/// assert!(queue_policy_by_name::<u32>(Some("NO_SUCH_POLICY")).is_err());
/// ```
pub fn queue_policy_by_name<T: Send + 'static>(
    name: Option<&str>,
) -> Result<Option<Arc<dyn QueuePolicy<T>>>, PolicyError> {
    let Some(name) = name else {
        return Ok(None);
    };
    let upper = name.to_ascii_uppercase();
    match upper.as_str() {
        "BLOCK" => return Ok(Some(Arc::new(BlockingQueuePolicy::new()))),
        "DISCARD_OLDEST" => return Ok(Some(Arc::new(DiscardOldestQueuePolicy::new()))),
        _ => {}
    }
    if upper.starts_with(GRADUAL_BREAKING_POLICY) {
        // Parameters are parsed from the original spelling so that a
        // malformed token is reported exactly as configured.
        let rest = &name[GRADUAL_BREAKING_POLICY.len()..];
        let (threshold, capacity, wait_ms) = parse_gradual_params(rest)?;
        return Ok(Some(Arc::new(GradualBreakingQueuePolicy::new(
            upper,
            threshold,
            Some(capacity),
            Duration::from_millis(wait_ms),
        ))));
    }
    Err(PolicyError::UnknownPolicy {
        name: name.to_string(),
    })
}

/// Parses the `_<threshold>[_<buffer>[_<wait>]]` suffix of the gradual
/// breaking family. `rest` is the name with the family prefix stripped.
fn parse_gradual_params(rest: &str) -> Result<(u32, usize, u64), PolicyError> {
    let mut threshold = DEFAULT_BREAK_THRESHOLD;
    let mut capacity = DEFAULT_REFERENCE_CAPACITY;
    let mut wait_ms = DEFAULT_WAIT_MS;
    if rest.is_empty() {
        return Ok((threshold, capacity, wait_ms));
    }
    let Some(params) = rest.strip_prefix('_') else {
        // Some other name that merely shares the prefix characters.
        return Err(PolicyError::UnknownPolicy {
            name: format!("{GRADUAL_BREAKING_POLICY}{rest}"),
        });
    };
    for (position, token) in params.split('_').enumerate() {
        match position {
            0 => threshold = parse_token(token)?,
            1 => capacity = parse_token(token)?,
            2 => wait_ms = parse_token(token)?,
            // Extra suffixes are ignored, as the original family did.
            _ => break,
        }
    }
    Ok((threshold, capacity, wait_ms))
}

fn parse_token<N: std::str::FromStr>(token: &str) -> Result<N, PolicyError> {
    token.parse().map_err(|_| PolicyError::InvalidParameter {
        token: token.to_string(),
    })
}

/// Resolves a configured pushback policy name to a fresh policy instance.
///
/// Recognized names: `FIXED`, `ON_FULL_FIXED`, `ON_FULL_EXPONENTIAL`,
/// `LINEAR`, `LINEAR_AFTER_THRESHOLD` and `FILL_GRADE` (80% default
/// threshold). A name always requires the paired base value; `None` for the
/// name resolves to `Ok(None)`.
///
/// # Errors
///
/// - [`PolicyError::MissingWaitTime`] when a name is configured without its
///   paired value;
/// - [`PolicyError::UnknownPolicy`] when the name matches nothing.
pub fn pushback_policy_by_name(
    name: Option<&str>,
    base_value: Option<u64>,
) -> Result<Option<Arc<dyn PushbackPolicy>>, PolicyError> {
    let Some(name) = name else {
        return Ok(None);
    };
    let Some(value) = base_value else {
        return Err(PolicyError::MissingWaitTime {
            name: name.to_string(),
        });
    };
    let upper = name.to_ascii_uppercase();
    let policy: Arc<dyn PushbackPolicy> = match upper.as_str() {
        "FIXED" => PushbackPolicyOption::Fixed.policy(value),
        "ON_FULL_FIXED" => PushbackPolicyOption::OnFullFixed.policy(value),
        "ON_FULL_EXPONENTIAL" => PushbackPolicyOption::OnFullExponential.policy(value),
        "LINEAR" => PushbackPolicyOption::Linear.policy(value),
        "LINEAR_AFTER_THRESHOLD" => PushbackPolicyOption::LinearAfterThreshold.policy(value),
        "FILL_GRADE" => Arc::new(FillGradePushbackPolicy::with_default_threshold(
            upper.clone(),
            Duration::from_millis(value),
        )),
        _ => {
            return Err(PolicyError::UnknownPolicy {
                name: name.to_string(),
            })
        }
    };
    Ok(Some(policy))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_resolves_to_none() {
        assert!(queue_policy_by_name::<i32>(None).unwrap().is_none());
        assert!(pushback_policy_by_name(None, None).unwrap().is_none());
    }

    #[test]
    fn test_unknown_name_fails() {
        let error = queue_policy_by_name::<i32>(Some("UNKNOWN_NAME")).unwrap_err();
        assert_eq!(
            error,
            PolicyError::UnknownPolicy {
                name: "UNKNOWN_NAME".to_string()
            }
        );
    }

    #[test]
    fn test_builtin_options() {
        let block = queue_policy_by_name::<i32>(Some("block")).unwrap().unwrap();
        assert_eq!(block.name(), "BLOCK");
        let discard = queue_policy_by_name::<i32>(Some("DISCARD_OLDEST"))
            .unwrap()
            .unwrap();
        assert_eq!(discard.name(), "DISCARD_OLDEST");
    }

    #[test]
    fn test_gradual_defaults() {
        let policy = queue_policy_by_name::<i32>(Some("GRADUAL_BREAKING_POLICY"))
            .unwrap()
            .unwrap();
        let status = policy.status();
        assert_eq!(status.break_threshold_percent, DEFAULT_BREAK_THRESHOLD);
        assert_eq!(status.base_wait, Duration::from_millis(DEFAULT_WAIT_MS));
    }

    #[test]
    fn test_gradual_fully_parametrized() {
        let policy = queue_policy_by_name::<i32>(Some("GRADUAL_BREAKING_POLICY_60_500_7"))
            .unwrap()
            .unwrap();
        let status = policy.status();
        assert_eq!(status.break_threshold_percent, 60);
        assert_eq!(status.base_wait, Duration::from_millis(7));
        assert_eq!(policy.name(), "GRADUAL_BREAKING_POLICY_60_500_7");
    }

    #[test]
    fn test_gradual_partial_parameters_default() {
        let policy = queue_policy_by_name::<i32>(Some("GRADUAL_BREAKING_POLICY_60"))
            .unwrap()
            .unwrap();
        let status = policy.status();
        assert_eq!(status.break_threshold_percent, 60);
        assert_eq!(status.base_wait, Duration::from_millis(DEFAULT_WAIT_MS));
    }

    #[test]
    fn test_gradual_bad_token_names_it() {
        let error =
            queue_policy_by_name::<i32>(Some("GRADUAL_BREAKING_POLICY_test_500_5")).unwrap_err();
        assert_eq!(
            error,
            PolicyError::InvalidParameter {
                token: "test".to_string()
            }
        );
    }

    #[test]
    fn test_gradual_prefix_without_separator_is_unknown() {
        assert!(queue_policy_by_name::<i32>(Some("GRADUAL_BREAKING_POLICYX")).is_err());
    }

    #[test]
    fn test_pushback_requires_paired_value() {
        let error = pushback_policy_by_name(Some("FIXED"), None).unwrap_err();
        assert_eq!(
            error,
            PolicyError::MissingWaitTime {
                name: "FIXED".to_string()
            }
        );
    }

    #[test]
    fn test_pushback_names() {
        for name in [
            "FIXED",
            "ON_FULL_FIXED",
            "ON_FULL_EXPONENTIAL",
            "LINEAR",
            "LINEAR_AFTER_THRESHOLD",
            "FILL_GRADE",
        ] {
            let policy = pushback_policy_by_name(Some(name), Some(5)).unwrap().unwrap();
            assert_eq!(policy.name(), name);
        }
        assert!(pushback_policy_by_name(Some("NO_SUCH"), Some(5)).is_err());
    }
}
