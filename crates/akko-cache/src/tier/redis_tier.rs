//! Distributed tier backed by Redis.
//!
//! ## Key Format
//!
//! `{key_prefix}:{key}`, e.g. `backend:user:detail:42`.
//!
//! ## Failure Model
//!
//! Every round-trip is bounded by the configured timeout. Pool and I/O
//! failures map to [`TierError::Unavailable`], rejected commands to
//! [`TierError::Command`], undecodable payloads to [`TierError::Serialization`].
//! Absences are never written.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use deadpool_redis::{Connection, Pool};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{CacheTier, DynCacheTier, TierManager};
use crate::config::RedisConfig;
use crate::entry::CacheEntry;
use crate::error::{CacheError, ProvisionError, TierError, TierKind};
use crate::keys;
use crate::policy::{CachePolicy, PolicyTable};

/// Keys requested per SCAN round-trip during `clear`.
const SCAN_BATCH: usize = 500;

/// Wire encoding of values stored in Redis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueCodec {
    /// Plain JSON, readable by any client.
    #[default]
    Json,
    /// MessagePack, more compact.
    #[serde(alias = "msgpack")]
    MessagePack,
}

impl ValueCodec {
    pub fn encode(&self, value: &Value) -> Result<Vec<u8>, TierError> {
        match self {
            Self::Json => {
                serde_json::to_vec(value).map_err(|e| TierError::serialization(e.to_string()))
            }
            Self::MessagePack => {
                rmp_serde::to_vec_named(value).map_err(|e| TierError::serialization(e.to_string()))
            }
        }
    }

    pub fn decode(&self, data: &[u8]) -> Result<Value, TierError> {
        match self {
            Self::Json => {
                serde_json::from_slice(data).map_err(|e| TierError::serialization(e.to_string()))
            }
            Self::MessagePack => {
                rmp_serde::from_slice(data).map_err(|e| TierError::serialization(e.to_string()))
            }
        }
    }
}

/// Build a connection pool from configuration, as the bootstrap does.
pub fn create_pool(config: &RedisConfig) -> Result<Pool, CacheError> {
    let timeout = config.timeout();
    let mut redis_config = deadpool_redis::Config::from_url(&config.url);
    let pool_config = redis_config.pool.get_or_insert_with(Default::default);
    pool_config.max_size = config.pool_size;
    pool_config.timeouts.wait = Some(timeout);
    pool_config.timeouts.create = Some(timeout);
    pool_config.timeouts.recycle = Some(timeout);

    redis_config
        .create_pool(Some(deadpool_redis::Runtime::Tokio1))
        .map_err(|e| CacheError::Connection {
            message: format!("failed to create Redis pool: {e}"),
        })
}

/// Run one Redis round-trip under a deadline.
async fn bounded<T, F>(timeout: Duration, fut: F) -> Result<T, TierError>
where
    F: Future<Output = Result<T, TierError>>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| TierError::Timeout(timeout))?
}

/// Redis tier for one cache name.
pub struct RedisTier {
    pool: Pool,
    policy: CachePolicy,
    codec: ValueCodec,
    timeout: Duration,
}

impl RedisTier {
    pub fn new(pool: Pool, policy: CachePolicy, codec: ValueCodec, timeout: Duration) -> Self {
        Self {
            pool,
            policy,
            codec,
            timeout,
        }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    async fn connection(&self) -> Result<Connection, TierError> {
        bounded(self.timeout, async { Ok::<_, TierError>(self.pool.get().await?) }).await
    }

    /// `MATCH` pattern covering exactly this cache's keys.
    pub fn clear_pattern(&self) -> String {
        format!(
            "{}{}*",
            keys::escape_glob(&self.policy.key_prefix),
            keys::KEY_SEPARATOR
        )
    }

    /// Expiry in whole seconds; Redis rejects zero.
    fn ttl_secs(&self) -> u64 {
        self.policy.distributed_ttl.as_secs().max(1)
    }
}

#[async_trait]
impl CacheTier for RedisTier {
    fn name(&self) -> &str {
        &self.policy.name
    }

    fn kind(&self) -> TierKind {
        TierKind::Distributed
    }

    async fn get(&self, key: &str) -> Result<CacheEntry, TierError> {
        let full_key = self.policy.distributed_key(key);
        let mut conn = self.connection().await?;
        let data = bounded(self.timeout, async {
            Ok::<_, TierError>(conn.get::<_, Option<Vec<u8>>>(&full_key).await?)
        })
        .await?;

        match data {
            Some(bytes) => Ok(CacheEntry::value(self.codec.decode(&bytes)?)),
            None => Ok(CacheEntry::Miss),
        }
    }

    async fn put(&self, key: &str, value: Option<Arc<Value>>) -> Result<(), TierError> {
        let Some(value) = value else {
            tracing::debug!(cache = %self.policy.name, key = %key, "null value not cached (redis)");
            return Ok(());
        };

        let full_key = self.policy.distributed_key(key);
        let data = self.codec.encode(&value)?;
        let ttl_secs = self.ttl_secs();
        let mut conn = self.connection().await?;
        bounded(self.timeout, async {
            Ok::<_, TierError>(conn.set_ex::<_, _, ()>(&full_key, data, ttl_secs).await?)
        })
        .await?;

        tracing::debug!(key = %full_key, ttl_secs = %ttl_secs, "redis SET");
        Ok(())
    }

    async fn evict(&self, key: &str) -> Result<(), TierError> {
        let full_key = self.policy.distributed_key(key);
        let mut conn = self.connection().await?;
        bounded(self.timeout, async {
            Ok::<_, TierError>(conn.del::<_, ()>(&full_key).await?)
        })
        .await?;
        tracing::debug!(key = %full_key, "redis DEL");
        Ok(())
    }

    async fn clear(&self) -> Result<(), TierError> {
        let pattern = self.clear_pattern();
        let mut conn = self.connection().await?;
        let mut cursor: u64 = 0;
        let mut removed = 0usize;

        loop {
            let mut scan = redis::cmd("SCAN");
            scan.arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH);
            let (next, keys): (u64, Vec<String>) = bounded(self.timeout, async {
                Ok::<_, TierError>(scan.query_async(&mut conn).await?)
            })
            .await?;

            if !keys.is_empty() {
                removed += keys.len();
                bounded(self.timeout, async {
                    Ok::<_, TierError>(conn.del::<_, ()>(keys).await?)
                })
                .await?;
            }
            if next == 0 {
                break;
            }
            cursor = next;
        }

        tracing::debug!(pattern = %pattern, removed, "redis namespace cleared");
        Ok(())
    }
}

/// Hands out [`RedisTier`]s sharing one connection pool.
pub struct RedisTierManager {
    pool: Pool,
    policies: Arc<PolicyTable>,
    codec: ValueCodec,
    timeout: Duration,
    tiers: DashMap<String, Arc<RedisTier>>,
}

impl RedisTierManager {
    pub fn new(pool: Pool, policies: Arc<PolicyTable>, codec: ValueCodec, timeout: Duration) -> Self {
        Self {
            pool,
            policies,
            codec,
            timeout,
            tiers: DashMap::new(),
        }
    }

    /// Create the pool from configuration. Does not touch the network.
    pub fn from_config(config: &RedisConfig, policies: Arc<PolicyTable>) -> Result<Self, CacheError> {
        let pool = create_pool(config)?;
        Ok(Self::new(pool, policies, config.codec, config.timeout()))
    }

    /// Round-trip a PING through the pool.
    pub async fn ping(&self) -> Result<(), TierError> {
        let mut conn = bounded(self.timeout, async {
            Ok::<_, TierError>(self.pool.get().await?)
        })
        .await?;
        let _pong: String = bounded(self.timeout, async {
            Ok::<_, TierError>(redis::cmd("PING").query_async(&mut conn).await?)
        })
        .await?;
        Ok(())
    }

    /// Check if Redis is reachable (for health checks).
    pub async fn is_available(&self) -> bool {
        self.ping().await.is_ok()
    }
}

#[async_trait]
impl TierManager for RedisTierManager {
    fn kind(&self) -> TierKind {
        TierKind::Distributed
    }

    async fn get_tier(&self, name: &str) -> Result<DynCacheTier, ProvisionError> {
        keys::validate_cache_name(name)
            .map_err(|reason| ProvisionError::new(TierKind::Distributed, name, reason))?;
        self.ping()
            .await
            .map_err(|e| ProvisionError::new(TierKind::Distributed, name, e.to_string()))?;

        let entry = self.tiers.entry(name.to_owned()).or_insert_with(|| {
            Arc::new(RedisTier::new(
                self.pool.clone(),
                self.policies.policy_for(name),
                self.codec,
                self.timeout,
            ))
        });
        let tier: DynCacheTier = entry.value().clone();
        Ok(tier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_codecs_preserve_values() {
        let value = json!({"id": 1, "name": "a", "roles": ["admin"], "active": true});
        for codec in [ValueCodec::Json, ValueCodec::MessagePack] {
            let data = codec.encode(&value).unwrap();
            assert_eq!(codec.decode(&data).unwrap(), value);
        }
    }

    #[test]
    fn test_corrupt_payload_is_serialization_error() {
        let err = ValueCodec::Json.decode(b"{not json").unwrap_err();
        assert!(err.is_serialization());
    }

    #[test]
    fn test_codec_config_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            codec: ValueCodec,
        }
        let w: Wrapper = toml::from_str(r#"codec = "msgpack""#).unwrap();
        assert_eq!(w.codec, ValueCodec::MessagePack);
        let w: Wrapper = toml::from_str(r#"codec = "json""#).unwrap();
        assert_eq!(w.codec, ValueCodec::Json);
    }

    #[tokio::test]
    async fn test_clear_pattern_is_literal() {
        let pool = create_pool(&RedisConfig::default()).unwrap();
        let timeout = Duration::from_millis(200);

        let user = RedisTier::new(
            pool.clone(),
            PolicyTable::default().policy_for("user"),
            ValueCodec::Json,
            timeout,
        );
        assert_eq!(user.clear_pattern(), "backend:user:*");

        let tenant = RedisTier::new(
            pool,
            PolicyTable::standard("ten[ant]*").policy_for("user"),
            ValueCodec::Json,
            timeout,
        );
        assert_eq!(tenant.clear_pattern(), r"ten\[ant\]\*:user:*");
    }

    #[tokio::test]
    async fn test_unsafe_name_is_not_provisioned() {
        let manager =
            RedisTierManager::from_config(&RedisConfig::default(), Arc::new(PolicyTable::default()))
                .unwrap();
        let err = manager.get_tier("user:archive").await.err().unwrap();
        assert!(err.reason.contains("must not contain"));
    }

    #[tokio::test]
    async fn test_unreachable_redis_fails_provisioning() {
        let config = RedisConfig {
            enabled: true,
            url: "redis://127.0.0.1:1".to_string(),
            pool_size: 1,
            timeout_ms: 200,
            codec: ValueCodec::Json,
        };
        let manager =
            RedisTierManager::from_config(&config, Arc::new(PolicyTable::default())).unwrap();
        assert!(!manager.is_available().await);

        let err = manager.get_tier("user").await.err().unwrap();
        assert_eq!(err.tier, TierKind::Distributed);
        assert_eq!(err.name, "user");
    }
}
