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

//! Stream configuration.

use crate::policy::{
    pushback_policy_by_name, queue_policy_by_name, PolicyError, PushbackPolicy, QueuePolicy,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Configuration for a stream, usually loaded from a configuration map or
/// file.
///
/// Policies are addressed by name and resolved through the policy registry;
/// resolution errors surface synchronously when the configuration is
/// applied, never later at runtime. A pushback policy name requires the
/// paired `pushback_wait_ms` value.
///
/// # Examples
///
/// ```rust
/// use flowbridge::config::StreamConfig;
///
/// let config = StreamConfig {
///     buffer_size: Some(500),
///     queue_policy: Some("GRADUAL_BREAKING_POLICY_60_500_5".to_string()),
///     pushback_policy: Some("FILL_GRADE".to_string()),
///     pushback_wait_ms: Some(5),
/// };
/// assert!(config.resolve_queue_policy::<String>().is_ok());
/// assert!(config.resolve_pushback_policy().is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Capacity of the stream's event buffer.
    ///
    /// Default: 32 (see
    /// [`DEFAULT_BUFFER_SIZE`](crate::stream::DEFAULT_BUFFER_SIZE)).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_size: Option<usize>,

    /// Name of the admission policy applied on publish.
    ///
    /// Resolved via [`queue_policy_by_name`]; supports the parametrized
    /// `GRADUAL_BREAKING_POLICY_<threshold>_<buffer>_<wait>` family.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_policy: Option<String>,

    /// Name of the pushback policy applied between deliveries.
    ///
    /// Requires [`pushback_wait_ms`](StreamConfig::pushback_wait_ms).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pushback_policy: Option<String>,

    /// Base value paired with the pushback policy, in milliseconds (or
    /// items, for the linear-after-threshold family).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pushback_wait_ms: Option<u64>,
}

impl StreamConfig {
    /// Resolves the configured admission policy.
    ///
    /// # Errors
    ///
    /// Surfaces [`PolicyError`] for an unknown name or malformed parameter.
    pub fn resolve_queue_policy<T: Send + 'static>(
        &self,
    ) -> Result<Option<Arc<dyn QueuePolicy<T>>>, PolicyError> {
        queue_policy_by_name(self.queue_policy.as_deref())
    }

    /// Resolves the configured pushback policy.
    ///
    /// # Errors
    ///
    /// Surfaces [`PolicyError`] for an unknown name or a missing paired
    /// wait time.
    pub fn resolve_pushback_policy(&self) -> Result<Option<Arc<dyn PushbackPolicy>>, PolicyError> {
        pushback_policy_by_name(self.pushback_policy.as_deref(), self.pushback_wait_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_resolves_nothing() {
        let config = StreamConfig::default();
        assert!(config.resolve_queue_policy::<i32>().unwrap().is_none());
        assert!(config.resolve_pushback_policy().unwrap().is_none());
    }

    #[test]
    fn test_bad_name_surfaces_at_resolution() {
        let config = StreamConfig {
            queue_policy: Some("NO_SUCH_POLICY".to_string()),
            ..StreamConfig::default()
        };
        assert!(config
            .resolve_queue_policy::<i32>()
            .unwrap_err()
            .is_unknown_policy());
    }

    #[test]
    fn test_pushback_name_requires_wait() {
        let config = StreamConfig {
            pushback_policy: Some("FIXED".to_string()),
            ..StreamConfig::default()
        };
        assert_eq!(
            config.resolve_pushback_policy().unwrap_err(),
            PolicyError::MissingWaitTime {
                name: "FIXED".to_string()
            }
        );
    }

    #[test]
    fn test_serde_round_trip() {
        let config = StreamConfig {
            buffer_size: Some(500),
            queue_policy: Some("GRADUAL_BREAKING_POLICY_60_500_5".to_string()),
            pushback_policy: Some("FILL_GRADE".to_string()),
            pushback_wait_ms: Some(5),
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: StreamConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_json() {
        let parsed: StreamConfig = serde_json::from_str(r#"{"buffer_size": 64}"#).unwrap();
        assert_eq!(parsed.buffer_size, Some(64));
        assert!(parsed.queue_policy.is_none());
    }
}
