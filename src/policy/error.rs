//! Configuration-time policy errors.

use thiserror::Error;

/// Errors raised while resolving or constructing policies from
/// configuration.
///
/// These surface synchronously at setup time: an invalid configuration never
/// yields a silently defaulted policy (the documented
/// `GRADUAL_BREAKING_POLICY` defaults of 80/100/5 apply only to *omitted*
/// parameters, never to malformed ones).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    /// The configured name matches no known policy or policy family.
    #[error("unknown policy name '{name}'")]
    UnknownPolicy {
        /// The unrecognized name.
        name: String,
    },

    /// A numeric parameter of the gradual breaking family failed to parse.
    #[error("illegal parameter '{token}' for gradual breaking queue policy")]
    InvalidParameter {
        /// The token that failed to parse.
        token: String,
    },

    /// A pushback policy was named without its paired wait time.
    #[error("pushback policy '{name}' requires a paired wait time")]
    MissingWaitTime {
        /// The policy that was named.
        name: String,
    },
}

impl PolicyError {
    /// Returns `true` for an unrecognized policy name.
    #[must_use]
    pub const fn is_unknown_policy(&self) -> bool {
        matches!(self, Self::UnknownPolicy { .. })
    }

    /// Returns `true` for a malformed numeric parameter.
    #[must_use]
    pub const fn is_invalid_parameter(&self) -> bool {
        matches!(self, Self::InvalidParameter { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_the_token() {
        let error = PolicyError::InvalidParameter {
            token: "test".to_string(),
        };
        assert!(error.to_string().contains("'test'"));
        assert!(error.is_invalid_parameter());
    }

    #[test]
    fn test_display_names_the_policy() {
        let error = PolicyError::UnknownPolicy {
            name: "UNKNOWN_NAME".to_string(),
        };
        assert!(error.to_string().contains("UNKNOWN_NAME"));
        assert!(error.is_unknown_policy());
    }
}
