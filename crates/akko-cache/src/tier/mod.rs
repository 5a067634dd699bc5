//! Tier providers and tier managers.
//!
//! A tier is one store bound to one cache name. A tier manager hands out tiers
//! by name and is consulted by [`CacheManager`](crate::CacheManager) exactly
//! once per name.
//!
//! | Tier | Backing store | Failure modes |
//! |------|---------------|---------------|
//! | [`LocalTier`] | moka, bounded + TTL | none |
//! | [`RedisTier`] | Redis via deadpool | connectivity, timeout, payload |
//! | [`MemoryTier`] | DashMap, unbounded | injected |

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::entry::CacheEntry;
use crate::error::{ProvisionError, TierError, TierKind};

pub mod local;
pub mod memory;
pub mod redis_tier;

pub use local::{LocalTier, LocalTierManager};
pub use memory::{MemoryTier, MemoryTierManager, TierCalls};
pub use redis_tier::{RedisTier, RedisTierManager, ValueCodec};

/// Shared handle to a tier.
pub type DynCacheTier = Arc<dyn CacheTier>;

/// One store bound to one cache name.
///
/// Implementations own their concurrency control; a single operation on a
/// single key must be atomic with respect to other operations on that key.
#[async_trait]
pub trait CacheTier: Send + Sync {
    /// Cache name this tier is bound to.
    fn name(&self) -> &str;

    /// Which side of the cache this tier serves.
    fn kind(&self) -> TierKind;

    /// Look up a key. `CacheEntry::Null` is only returned by tiers that cache absences.
    async fn get(&self, key: &str) -> Result<CacheEntry, TierError>;

    /// Store a value, overwriting any entry. `None` stores an absence; tiers
    /// whose policy forbids absences skip the write.
    async fn put(&self, key: &str, value: Option<Arc<Value>>) -> Result<(), TierError>;

    /// Remove a key. Removing an absent key succeeds.
    async fn evict(&self, key: &str) -> Result<(), TierError>;

    /// Remove every key of this cache name.
    async fn clear(&self) -> Result<(), TierError>;
}

/// Factory of tiers by cache name.
#[async_trait]
pub trait TierManager: Send + Sync {
    fn kind(&self) -> TierKind;

    /// Provide the tier bound to `name`.
    async fn get_tier(&self, name: &str) -> Result<DynCacheTier, ProvisionError>;
}
