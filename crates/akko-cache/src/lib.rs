//! Two-tier caching for horizontally scaled services.
//!
//! ## Architecture
//!
//! - **Local tier (moka)**: in-process, bounded, per-instance
//! - **Distributed tier (Redis)**: shared across instances, independent TTL
//! - **CacheManager**: one [`Cache`] per logical name, provisioned lazily
//!
//! ## Cache Hierarchy
//!
//! ```text
//! get(key) → local → distributed → loader (DB/API)
//!              ↑          │
//!              └─promote──┘
//! ```
//!
//! ## Graceful Degradation
//!
//! If Redis is unavailable or disabled, caches fall back to the local tier.
//! Read failures are logged and reported as misses; write failures are
//! returned to the caller.
//!
//! ```no_run
//! # async fn demo() -> Result<(), akko_cache::CacheError> {
//! use akko_cache::{CacheSettings, create_cache_manager, keys};
//!
//! let manager = create_cache_manager(&CacheSettings::default()).await;
//! let users = manager.get_cache(keys::names::USER).await?;
//! users.put(&keys::user_detail(1), serde_json::json!({"id": 1})).await?;
//! # Ok(())
//! # }
//! ```

pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod entry;
pub mod error;
pub mod keys;
pub mod manager;
pub mod metrics;
pub mod policy;
pub mod tier;

pub use bootstrap::create_cache_manager;
pub use cache::{Cache, CacheLayout, CacheStats, LayoutKind};
pub use config::{CacheSettings, PolicyOverride, RedisConfig};
pub use entry::CacheEntry;
pub use error::{CacheError, CacheOperation, ProvisionError, TierError, TierKind};
pub use manager::{CacheManager, CacheManagerBuilder, CacheMode};
pub use policy::{CachePolicy, PolicyTable};
pub use tier::{
    CacheTier, DynCacheTier, LocalTier, LocalTierManager, MemoryTier, MemoryTierManager,
    RedisTier, RedisTierManager, TierCalls, TierManager, ValueCodec,
};
