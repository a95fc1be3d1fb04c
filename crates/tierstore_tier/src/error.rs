// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error types for tier operations.
//!
//! Absence is never an error: a missing cache key is `Ok(None)` and an empty
//! query is an empty result. Every variant here is a hard failure that aborts
//! the tier attempt it came from.

use std::borrow::Cow;
use std::time::Duration;

/// A boxed error from an underlying client library.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// An error from a tier operation.
///
/// # Examples
///
/// ```
/// use tierstore_tier::Error;
///
/// let error = Error::Closed { cache: "local" };
/// assert_eq!(error.to_string(), "cache `local` is closed");
/// ```
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The operation was attempted on a cache that has been stopped.
    #[error("cache `{cache}` is closed")]
    Closed {
        /// Name of the stopped cache.
        cache: &'static str,
    },

    /// A value could not be encoded for, or decoded from, its textual form.
    #[error("serialization failed")]
    Serialization(#[source] BoxError),

    /// The remote cache service could not be reached or rejected the command.
    #[error("remote cache request failed")]
    RemoteCache(#[source] BoxError),

    /// The backing store reported a connectivity or integrity failure.
    #[error("backing store {operation} failed")]
    BackingStore {
        /// The store operation that failed (`create`, `find_all`, ...).
        operation: &'static str,
        /// The error reported by the store client.
        #[source]
        source: BoxError,
    },

    /// A message could not be accepted by the message bus.
    #[error("publish to topic `{topic}` failed")]
    BusPublish {
        /// The topic the message was published to.
        topic: String,
        /// Why the bus rejected the message.
        #[source]
        source: BoxError,
    },

    /// The configured key domain is not one a [`Gid`](crate::Gid) can produce.
    #[error("unsupported key domain `{0}`, expected `text` or `integer`")]
    UnsupportedKeyDomain(String),

    /// A component was configured with invalid settings.
    #[error("invalid configuration: {0}")]
    Configuration(Cow<'static, str>),

    /// A tier call did not finish within its deadline.
    #[error("{tier} call timed out after {after:?}")]
    Timeout {
        /// The tier the call was issued to.
        tier: &'static str,
        /// The deadline that elapsed.
        after: Duration,
    },
}

impl Error {
    /// Wraps a codec failure.
    pub fn serialization(cause: impl Into<BoxError>) -> Self {
        Self::Serialization(cause.into())
    }

    /// Wraps a remote cache client failure.
    pub fn remote_cache(cause: impl Into<BoxError>) -> Self {
        Self::RemoteCache(cause.into())
    }

    /// Wraps a backing store failure, annotated with the failing operation.
    pub fn backing_store(operation: &'static str, cause: impl Into<BoxError>) -> Self {
        Self::BackingStore {
            operation,
            source: cause.into(),
        }
    }

    /// Wraps a message bus failure, annotated with the topic.
    pub fn bus_publish(topic: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        Self::BusPublish {
            topic: topic.into(),
            source: cause.into(),
        }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Configuration(message.into())
    }

    /// Returns `true` if the error came from a stopped cache.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed { .. })
    }
}

/// A specialized [`Result`] type for tier operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn backing_store_error_keeps_source() {
        let error = Error::backing_store("find_all", "disk I/O error");
        assert_eq!(error.to_string(), "backing store find_all failed");
        let source = error.source().expect("source should be attached");
        assert_eq!(source.to_string(), "disk I/O error");
    }

    #[test]
    fn bus_publish_error_names_topic() {
        let error = Error::bus_publish("orm", "queue closed");
        assert!(error.to_string().contains("`orm`"));
    }

    #[test]
    fn is_closed_only_matches_closed() {
        assert!(Error::Closed { cache: "local" }.is_closed());
        assert!(!Error::configuration("capacity must be positive").is_closed());
    }

    #[test]
    fn result_type_alias_propagates_errors() {
        fn returns_err() -> Result<i32> {
            Err(Error::remote_cache("connection refused"))
        }

        let err = returns_err().expect_err("should return an error");
        assert!(matches!(err, Error::RemoteCache(_)));
    }
}
