//! Error types for the cache subsystem.
//!
//! Three layers of errors exist:
//! - [`TierError`]: a single tier failed to serve an operation.
//! - [`ProvisionError`]: a tier manager could not produce a tier for a name.
//! - [`CacheError`]: what callers of [`Cache`](crate::Cache) and
//!   [`CacheManager`](crate::CacheManager) actually see.
//!
//! Read paths never surface [`TierError`]; they degrade to a miss and log.

use std::fmt;
use std::time::Duration;

/// Which tier of a cache an operation touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TierKind {
    /// In-process tier private to this instance.
    Local,
    /// Shared, networked tier.
    Distributed,
}

impl TierKind {
    /// Stable label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Distributed => "distributed",
        }
    }
}

impl fmt::Display for TierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cache operation, for error reporting and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheOperation {
    Get,
    Put,
    Evict,
    Clear,
}

impl CacheOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Put => "put",
            Self::Evict => "evict",
            Self::Clear => "clear",
        }
    }
}

impl fmt::Display for CacheOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by an individual tier provider.
#[derive(Debug, thiserror::Error)]
pub enum TierError {
    /// The backing store could not be reached (pool exhausted, connection refused).
    #[error("tier unavailable: {message}")]
    Unavailable { message: String },

    /// The backing store rejected or failed a command.
    #[error("tier command failed: {message}")]
    Command { message: String },

    /// Stored data could not be encoded or decoded.
    #[error("tier serialization failed: {message}")]
    Serialization { message: String },

    /// The operation did not complete within the tier's timeout.
    #[error("tier operation timed out after {0:?}")]
    Timeout(Duration),
}

impl TierError {
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn command(message: impl Into<String>) -> Self {
        Self::Command {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Returns `true` for failures caused by bad payloads rather than connectivity.
    #[must_use]
    pub fn is_serialization(&self) -> bool {
        matches!(self, Self::Serialization { .. })
    }
}

impl From<redis::RedisError> for TierError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
            Self::unavailable(err.to_string())
        } else {
            Self::command(err.to_string())
        }
    }
}

impl From<deadpool_redis::PoolError> for TierError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        Self::unavailable(err.to_string())
    }
}

/// A tier manager could not provide a tier for a cache name.
#[derive(Debug, thiserror::Error)]
#[error("{tier} tier cannot provision cache '{name}': {reason}")]
pub struct ProvisionError {
    pub tier: TierKind,
    pub name: String,
    pub reason: String,
}

impl ProvisionError {
    #[must_use]
    pub fn new(tier: TierKind, name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            tier,
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Errors surfaced to callers of the cache.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// A write (put/evict/clear) did not reach a tier. Mutations already applied
    /// to tiers written earlier in the sequence are not rolled back.
    #[error("cache '{cache}': {operation} failed on {tier} tier: {source}")]
    TierWrite {
        cache: String,
        operation: CacheOperation,
        tier: TierKind,
        #[source]
        source: TierError,
    },

    /// The name cannot be used as a cache name.
    #[error("invalid cache name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// No tier could be provisioned for a cache name.
    #[error("no tier could be provisioned for cache '{name}': {reasons}")]
    Provisioning { name: String, reasons: String },

    /// A typed value could not be converted to the cache value model.
    #[error("cache '{cache}' key '{key}': value serialization failed: {source}")]
    Serialization {
        cache: String,
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The distributed tier could not be set up at bootstrap.
    #[error("distributed tier setup failed: {message}")]
    Connection { message: String },
}

impl CacheError {
    /// Returns `true` if this is a write that failed to reach a tier.
    #[must_use]
    pub fn is_tier_write(&self) -> bool {
        matches!(self, Self::TierWrite { .. })
    }

    /// The tier a failed write was aimed at, if any.
    #[must_use]
    pub fn tier(&self) -> Option<TierKind> {
        match self {
            Self::TierWrite { tier, .. } => Some(*tier),
            _ => None,
        }
    }
}
