//! Namespace and TTL policy table.
//!
//! One row per logical cache name. Tier managers consult the table when they
//! provision a tier; caches never look at it per operation.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::keys::{self, names, ttl};

/// Provisioning policy for one logical cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePolicy {
    /// Logical cache name.
    pub name: String,
    /// Prefix of every key this cache writes to the distributed tier.
    pub key_prefix: String,
    /// Maximum number of entries held by the local tier.
    pub local_max_entries: u64,
    /// Local tier time-to-live after write.
    pub local_ttl: Duration,
    /// Distributed tier time-to-live after write.
    pub distributed_ttl: Duration,
    /// Whether the local tier may hold explicitly cached absences.
    /// The distributed tier never stores absences.
    pub cache_null_values: bool,
    /// Lifetime of a cached absence in the local tier (capped by `local_ttl`).
    pub null_ttl: Duration,
}

impl CachePolicy {
    /// Policy for `name` with the default limits and the given global prefix.
    pub fn new(name: impl Into<String>, global_prefix: &str) -> Self {
        let name = name.into();
        Self {
            key_prefix: keys::namespace(global_prefix, &name),
            name,
            local_max_entries: 1000,
            local_ttl: Duration::from_secs(ttl::SHORT_SECS),
            distributed_ttl: Duration::from_secs(ttl::DEFAULT_SECS),
            cache_null_values: true,
            null_ttl: Duration::from_secs(ttl::NULL_SECS),
        }
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn with_local_max_entries(mut self, max: u64) -> Self {
        self.local_max_entries = max;
        self
    }

    pub fn with_local_ttl(mut self, ttl: Duration) -> Self {
        self.local_ttl = ttl;
        self
    }

    pub fn with_distributed_ttl(mut self, ttl: Duration) -> Self {
        self.distributed_ttl = ttl;
        self
    }

    pub fn with_null_values(mut self, enabled: bool) -> Self {
        self.cache_null_values = enabled;
        self
    }

    pub fn with_null_ttl(mut self, ttl: Duration) -> Self {
        self.null_ttl = ttl;
        self
    }

    /// Effective lifetime of a cached absence in the local tier.
    pub fn effective_null_ttl(&self) -> Duration {
        self.null_ttl.min(self.local_ttl)
    }

    /// Full distributed-tier key for a caller key.
    pub fn distributed_key(&self, key: &str) -> String {
        keys::cache_key(&self.key_prefix, key)
    }

    /// True when every key of `other` also lives under this policy's prefix,
    /// so clearing this cache would clear `other` too.
    pub fn namespace_contains(&self, other: &CachePolicy) -> bool {
        other.key_prefix == self.key_prefix
            || other
                .key_prefix
                .strip_prefix(self.key_prefix.as_str())
                .is_some_and(|rest| rest.starts_with(keys::KEY_SEPARATOR))
    }

    pub fn validate(&self) -> Result<(), String> {
        keys::validate_cache_name(&self.name)?;
        if self.key_prefix.is_empty() {
            return Err(format!("cache '{}': key_prefix must not be empty", self.name));
        }
        if self.local_max_entries == 0 {
            return Err(format!(
                "cache '{}': local_max_entries must be > 0",
                self.name
            ));
        }
        if self.local_ttl.is_zero() || self.distributed_ttl.is_zero() {
            return Err(format!("cache '{}': ttls must be > 0", self.name));
        }
        if self.distributed_ttl < self.local_ttl {
            return Err(format!(
                "cache '{}': distributed_ttl must be >= local_ttl",
                self.name
            ));
        }
        Ok(())
    }
}

/// Static table of cache policies keyed by cache name.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    global_prefix: String,
    null_ttl: Duration,
    policies: BTreeMap<String, CachePolicy>,
}

impl PolicyTable {
    /// Empty table; every name resolves to the default policy.
    pub fn new(global_prefix: impl Into<String>) -> Self {
        Self {
            global_prefix: global_prefix.into(),
            null_ttl: Duration::from_secs(ttl::NULL_SECS),
            policies: BTreeMap::new(),
        }
    }

    /// The reference table for the platform caches.
    pub fn standard(global_prefix: impl Into<String>) -> Self {
        let table = Self::new(global_prefix);
        let prefix = table.global_prefix.clone();
        let long = Duration::from_secs(ttl::LONG_SECS);

        table
            .with_policy(CachePolicy::new(names::USER, &prefix))
            .with_policy(
                CachePolicy::new(names::ROLE, &prefix)
                    .with_local_max_entries(500)
                    .with_distributed_ttl(long),
            )
            .with_policy(CachePolicy::new(names::PERMISSION, &prefix).with_distributed_ttl(long))
            .with_policy(
                CachePolicy::new(names::MENU, &prefix)
                    .with_local_max_entries(200)
                    .with_distributed_ttl(long),
            )
            .with_policy(CachePolicy::new(names::DICTIONARY, &prefix).with_distributed_ttl(long))
            .with_policy(
                CachePolicy::new(names::CONFIG, &prefix)
                    .with_local_max_entries(200)
                    .with_local_ttl(Duration::from_secs(60))
                    .with_distributed_ttl(Duration::from_secs(ttl::SHORT_SECS))
                    .with_null_values(false),
            )
    }

    /// Set the lifetime of cached absences for every row, present and future.
    pub fn with_null_ttl(mut self, null_ttl: Duration) -> Self {
        self.null_ttl = null_ttl;
        for policy in self.policies.values_mut() {
            policy.null_ttl = null_ttl;
        }
        self
    }

    /// Insert or replace a row.
    pub fn with_policy(mut self, mut policy: CachePolicy) -> Self {
        policy.null_ttl = self.null_ttl;
        self.policies.insert(policy.name.clone(), policy);
        self
    }

    pub fn global_prefix(&self) -> &str {
        &self.global_prefix
    }

    /// Explicit row for `name`, if the table has one.
    pub fn get(&self, name: &str) -> Option<&CachePolicy> {
        self.policies.get(name)
    }

    /// Row for `name`, or the default policy for unknown names.
    pub fn policy_for(&self, name: &str) -> CachePolicy {
        self.policies.get(name).cloned().unwrap_or_else(|| {
            CachePolicy::new(name, &self.global_prefix).with_null_ttl(self.null_ttl)
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.policies.keys().map(String::as_str)
    }

    pub fn policies(&self) -> impl Iterator<Item = &CachePolicy> {
        self.policies.values()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.global_prefix.is_empty() {
            return Err("cache key prefix must not be empty".into());
        }
        self.policies.values().try_for_each(CachePolicy::validate)?;

        for outer in self.policies.values() {
            if let Some(inner) = self
                .policies
                .values()
                .find(|inner| inner.name != outer.name && outer.namespace_contains(inner))
            {
                return Err(format!(
                    "cache '{}': key_prefix '{}' overlaps cache '{}' ('{}')",
                    inner.name, inner.key_prefix, outer.name, outer.key_prefix
                ));
            }
        }
        Ok(())
    }
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self::standard(keys::DEFAULT_KEY_PREFIX)
    }
}
