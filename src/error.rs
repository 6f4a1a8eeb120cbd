//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Top-level error type.
//!
//! Each layer of the crate reports its own errors:
//!
//! 1. **Configuration**: policy resolution failures ([`PolicyError`]) —
//!    surface synchronously at setup time.
//! 2. **Usage**: illegal-state violations ([`RelayError`]) — programmer
//!    misuse, reported immediately at the call site.
//! 3. **Pipeline**: stream failures ([`StreamError`]) — surface
//!    asynchronously through registered error handlers, exactly once per
//!    occurrence.
//!
//! [`FlowbridgeError`] composes the three for call sites that cross layers.

use crate::policy::PolicyError;
use crate::relay::RelayError;
use crate::stream::StreamError;
use std::error::Error as StdError;
use std::fmt;

/// Top-level error composing the crate's error layers.
///
/// # Examples
///
/// ```rust
/// use flowbridge::policy::PolicyError;
/// use flowbridge::FlowbridgeError;
///
/// let error: FlowbridgeError = PolicyError::UnknownPolicy {
///     name: "NO_SUCH".to_string(),
/// }
/// .into();
/// assert!(error.is_policy_error());
/// ```
#[derive(Debug)]
pub enum FlowbridgeError {
    /// A configuration-time policy resolution failure.
    Policy(PolicyError),

    /// An illegal-state violation on a relay or stream object.
    Relay(RelayError),

    /// A stream pipeline failure.
    Stream(StreamError),
}

impl FlowbridgeError {
    /// Returns `true` for a configuration error.
    #[must_use]
    pub const fn is_policy_error(&self) -> bool {
        matches!(self, Self::Policy(_))
    }

    /// Returns `true` for an illegal-state error.
    #[must_use]
    pub const fn is_relay_error(&self) -> bool {
        matches!(self, Self::Relay(_))
    }

    /// Returns `true` for a pipeline error.
    #[must_use]
    pub const fn is_stream_error(&self) -> bool {
        matches!(self, Self::Stream(_))
    }
}

impl fmt::Display for FlowbridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Policy(e) => write!(f, "policy error: {}", e),
            Self::Relay(e) => write!(f, "relay error: {}", e),
            Self::Stream(e) => write!(f, "stream error: {}", e),
        }
    }
}

impl StdError for FlowbridgeError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Policy(e) => Some(e),
            Self::Relay(e) => Some(e),
            Self::Stream(e) => Some(e),
        }
    }
}

impl From<PolicyError> for FlowbridgeError {
    fn from(error: PolicyError) -> Self {
        Self::Policy(error)
    }
}

impl From<RelayError> for FlowbridgeError {
    fn from(error: RelayError) -> Self {
        Self::Relay(error)
    }
}

impl From<StreamError> for FlowbridgeError {
    fn from(error: StreamError) -> Self {
        Self::Stream(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicates_and_from() {
        let error: FlowbridgeError = PolicyError::UnknownPolicy {
            name: "X".to_string(),
        }
        .into();
        assert!(error.is_policy_error());
        assert!(!error.is_relay_error());

        let error: FlowbridgeError = RelayError::AlreadyConnected.into();
        assert!(error.is_relay_error());

        let error: FlowbridgeError = StreamError::message("boom").into();
        assert!(error.is_stream_error());
    }

    #[test]
    fn test_display_and_source() {
        let error: FlowbridgeError = RelayError::AlreadyConnected.into();
        assert!(error.to_string().contains("relay error"));
        assert!(error.source().is_some());
    }
}
