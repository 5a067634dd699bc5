use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::keys;
use crate::policy::{CachePolicy, PolicyTable};
use crate::tier::ValueCodec;

/// Cache subsystem configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Compose the local tier in front of the distributed tier.
    /// When false only the distributed tier is used (local tier as fallback).
    /// Default: true
    #[serde(default = "default_multi_level")]
    pub multi_level: bool,

    /// Global prefix for distributed-tier keys
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Lifetime of cached absences in the local tier, in seconds
    #[serde(default = "default_null_ttl_secs")]
    pub null_ttl_secs: u64,

    /// Distributed tier (Redis) connection
    #[serde(default)]
    pub redis: RedisConfig,

    /// Per-cache overrides of the reference policy table
    #[serde(default)]
    pub policies: BTreeMap<String, PolicyOverride>,
}

fn default_multi_level() -> bool {
    true
}

fn default_key_prefix() -> String {
    keys::DEFAULT_KEY_PREFIX.to_string()
}

fn default_null_ttl_secs() -> u64 {
    keys::ttl::NULL_SECS
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            multi_level: default_multi_level(),
            key_prefix: default_key_prefix(),
            null_ttl_secs: default_null_ttl_secs(),
            redis: RedisConfig::default(),
            policies: BTreeMap::new(),
        }
    }
}

impl CacheSettings {
    /// Reference table with the configured overrides applied.
    pub fn policy_table(&self) -> PolicyTable {
        let base = PolicyTable::standard(self.key_prefix.clone())
            .with_null_ttl(Duration::from_secs(self.null_ttl_secs));

        self.policies.iter().fold(base, |table, (name, overrides)| {
            let policy = overrides.apply(table.policy_for(name));
            table.with_policy(policy)
        })
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.null_ttl_secs == 0 {
            return Err("cache.null_ttl_secs must be > 0".into());
        }
        if self.redis.enabled {
            if self.redis.url.is_empty() {
                return Err("cache.redis.url must not be empty".into());
            }
            if self.redis.pool_size == 0 {
                return Err("cache.redis.pool_size must be > 0".into());
            }
            if self.redis.timeout_ms == 0 {
                return Err("cache.redis.timeout_ms must be > 0".into());
            }
        }
        self.policy_table().validate()
    }
}

/// Redis configuration for the distributed tier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Enable Redis (gracefully degrades without it)
    /// Default: false (local tier only)
    #[serde(default = "default_redis_enabled")]
    pub enabled: bool,

    /// Redis connection URL (e.g., "redis://localhost:6379")
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Connection pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Connection and command timeout in milliseconds
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,

    /// Value encoding ("json" or "msgpack")
    #[serde(default)]
    pub codec: ValueCodec,
}

fn default_redis_enabled() -> bool {
    false
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_pool_size() -> usize {
    10
}

fn default_redis_timeout_ms() -> u64 {
    2000
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: default_redis_enabled(),
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
            codec: ValueCodec::default(),
        }
    }
}

impl RedisConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Per-cache policy override. Unset fields keep the table value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyOverride {
    #[serde(default)]
    pub key_prefix: Option<String>,
    #[serde(default)]
    pub local_max_entries: Option<u64>,
    #[serde(default)]
    pub local_ttl_secs: Option<u64>,
    #[serde(default)]
    pub distributed_ttl_secs: Option<u64>,
    #[serde(default)]
    pub cache_null_values: Option<bool>,
}

impl PolicyOverride {
    pub fn apply(&self, mut policy: CachePolicy) -> CachePolicy {
        if let Some(prefix) = &self.key_prefix {
            policy.key_prefix = prefix.clone();
        }
        if let Some(max) = self.local_max_entries {
            policy.local_max_entries = max;
        }
        if let Some(secs) = self.local_ttl_secs {
            policy.local_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = self.distributed_ttl_secs {
            policy.distributed_ttl = Duration::from_secs(secs);
        }
        if let Some(enabled) = self.cache_null_values {
            policy.cache_null_values = enabled;
        }
        policy
    }
}
