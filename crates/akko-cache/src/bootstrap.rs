//! Wiring of a [`CacheManager`] from [`CacheSettings`].

use std::sync::Arc;

use crate::config::CacheSettings;
use crate::manager::CacheManager;
use crate::tier::{LocalTierManager, RedisTierManager};

/// Build the cache manager an application service uses.
///
/// Never fails: without a usable Redis pool the manager serves every cache
/// from the local tier. Reachability is checked per cache at provisioning.
pub async fn create_cache_manager(settings: &CacheSettings) -> CacheManager {
    let policies = Arc::new(settings.policy_table());
    let local = Arc::new(LocalTierManager::new(Arc::clone(&policies)));
    let builder = CacheManager::builder()
        .local(local)
        .multi_level(settings.multi_level);

    if !settings.redis.enabled {
        tracing::info!("Redis disabled, using local cache only");
        return builder.build();
    }

    tracing::info!(url = %settings.redis.url, codec = ?settings.redis.codec, "Connecting to Redis");

    let redis = match RedisTierManager::from_config(&settings.redis, policies) {
        Ok(redis) => redis,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to create Redis pool. Falling back to local cache.");
            return builder.build();
        }
    };

    match redis.ping().await {
        Ok(()) => tracing::info!(multi_level = settings.multi_level, "Connected to Redis"),
        Err(e) => tracing::warn!(
            error = %e,
            "Redis not reachable yet, caches fall back to local tier until it is"
        ),
    }

    builder.distributed(Arc::new(redis)).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::LayoutKind;
    use crate::manager::CacheMode;

    #[tokio::test]
    async fn test_redis_disabled_is_local_only() {
        let manager = create_cache_manager(&CacheSettings::default()).await;
        assert_eq!(manager.mode(), CacheMode::MultiLevel);

        let cache = manager.get_cache("user").await.unwrap();
        assert_eq!(cache.layout_kind(), LayoutKind::LocalOnly);
    }

    #[tokio::test]
    async fn test_unreachable_redis_degrades_to_local() {
        let mut settings = CacheSettings::default();
        settings.redis.enabled = true;
        settings.redis.url = "redis://127.0.0.1:1".to_string();
        settings.redis.timeout_ms = 200;
        settings.multi_level = false;

        let manager = create_cache_manager(&settings).await;
        assert_eq!(manager.mode(), CacheMode::DistributedOnly);

        let cache = manager.get_cache("role").await.unwrap();
        assert_eq!(cache.layout_kind(), LayoutKind::LocalOnly);
    }

    #[tokio::test]
    async fn test_invalid_redis_url_degrades_to_local() {
        let mut settings = CacheSettings::default();
        settings.redis.enabled = true;
        settings.redis.url = "not a url".to_string();

        let manager = create_cache_manager(&settings).await;
        let cache = manager.get_cache("menu").await.unwrap();
        assert_eq!(cache.layout_kind(), LayoutKind::LocalOnly);
    }
}
