// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tierstore_tier::{Error, KeyDomain};

/// Default topic for cache invalidation fan-out.
pub const DEFAULT_CACHE_TOPIC: &str = "midCache";

/// Default topic for backing-store propagation.
pub const DEFAULT_STORE_TOPIC: &str = "orm";

/// Settings for a [`BaseStorage`](crate::BaseStorage).
///
/// Every field has a default, so an empty document is a valid configuration.
/// An unknown key domain is rejected while deserializing.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use tierstore::{KeyDomain, StorageConfig};
///
/// let config: StorageConfig = serde_json::from_str(r#"{"key_domain": "text", "call_timeout_ms": 250}"#).unwrap();
/// assert_eq!(config.key_domain, KeyDomain::Text);
/// assert_eq!(config.cache_topic, "midCache");
/// assert_eq!(config.call_timeout(), Some(Duration::from_millis(250)));
///
/// assert!(serde_json::from_str::<StorageConfig>(r#"{"key_domain": "uuid"}"#).is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// The domain entity keys are derived in.
    pub key_domain: KeyDomain,
    /// Topic that carries cache invalidations.
    pub cache_topic: String,
    /// Topic that carries backing-store mutations.
    pub store_topic: String,
    /// Deadline for each remote cache, backing store and bus call, in
    /// milliseconds. No deadline when absent.
    pub call_timeout_ms: Option<u64>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            key_domain: KeyDomain::default(),
            cache_topic: DEFAULT_CACHE_TOPIC.to_owned(),
            store_topic: DEFAULT_STORE_TOPIC.to_owned(),
            call_timeout_ms: None,
        }
    }
}

impl StorageConfig {
    /// Returns the per-call deadline.
    #[must_use]
    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_ms.map(Duration::from_millis)
    }

    /// Checks the settings for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if a topic is empty, both topics are
    /// the same, or the call timeout is zero.
    pub fn validate(&self) -> Result<(), Error> {
        if self.cache_topic.is_empty() || self.store_topic.is_empty() {
            return Err(Error::configuration("topic names must not be empty"));
        }
        if self.cache_topic == self.store_topic {
            return Err(Error::configuration(format!(
                "cache and store topics must differ, both are `{}`",
                self.cache_topic
            )));
        }
        if self.call_timeout_ms == Some(0) {
            return Err(Error::configuration("call timeout must be greater than zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = StorageConfig::default();
        assert_eq!(config.key_domain, KeyDomain::Integer);
        assert_eq!(config.store_topic, "orm");
        assert_eq!(config.call_timeout(), None);
        config.validate().unwrap();
    }

    #[test]
    fn empty_document_is_default() {
        let config: StorageConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, StorageConfig::default());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(serde_json::from_str::<StorageConfig>(r#"{"topic": "x"}"#).is_err());
    }

    #[test]
    fn validate_rejects_shared_topic() {
        let config = StorageConfig {
            store_topic: DEFAULT_CACHE_TOPIC.to_owned(),
            ..StorageConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let config = StorageConfig {
            call_timeout_ms: Some(0),
            ..StorageConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
