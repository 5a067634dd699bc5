//! Cache entry model.

use std::sync::Arc;

use serde_json::Value;

/// Result of a lookup in one tier or in a composite cache.
///
/// `Null` means an absence was cached on purpose (the key is known to have no
/// value). It is a hit: callers must not recompute the value.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEntry {
    /// Hit with a value.
    Value(Arc<Value>),
    /// Hit with an explicitly cached absence.
    Null,
    /// No entry.
    Miss,
}

impl CacheEntry {
    /// Wrap an owned value.
    pub fn value(value: Value) -> Self {
        Self::Value(Arc::new(value))
    }

    /// Build an entry from a stored slot, where `None` is a cached absence.
    pub fn from_slot(slot: Option<Arc<Value>>) -> Self {
        match slot {
            Some(value) => Self::Value(value),
            None => Self::Null,
        }
    }

    /// `true` for both `Value` and `Null`.
    pub fn is_hit(&self) -> bool {
        !matches!(self, Self::Miss)
    }

    pub fn is_miss(&self) -> bool {
        matches!(self, Self::Miss)
    }

    /// The cached value, if this is a hit with a value.
    pub fn as_value(&self) -> Option<&Arc<Value>> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<Arc<Value>> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }

    /// The stored slot of a hit (`Some(None)` for a cached absence).
    pub fn into_slot(self) -> Option<Option<Arc<Value>>> {
        match self {
            Self::Value(value) => Some(Some(value)),
            Self::Null => Some(None),
            Self::Miss => None,
        }
    }
}
