//! In-process tier backed by moka.
//!
//! Bounded by `local_max_entries`; entries expire `local_ttl` after every
//! write. Cached absences expire after the (shorter) null TTL.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use moka::Expiry;
use moka::future::Cache;
use serde_json::Value;

use super::{CacheTier, DynCacheTier, TierManager};
use crate::entry::CacheEntry;
use crate::error::{ProvisionError, TierError, TierKind};
use crate::policy::{CachePolicy, PolicyTable};

/// Stored slot; `None` is a cached absence.
type Slot = Option<Arc<Value>>;

/// Per-entry expiration: values live `value_ttl`, absences live `null_ttl`.
struct SlotExpiry {
    value_ttl: Duration,
    null_ttl: Duration,
}

impl SlotExpiry {
    fn ttl_for(&self, slot: &Slot) -> Duration {
        if slot.is_some() {
            self.value_ttl
        } else {
            self.null_ttl
        }
    }
}

impl Expiry<String, Slot> for SlotExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Slot,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(self.ttl_for(value))
    }

    // Overwrites restart the clock, matching expire-after-write semantics.
    fn expire_after_update(
        &self,
        _key: &String,
        value: &Slot,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(self.ttl_for(value))
    }
}

/// Local tier for one cache name.
pub struct LocalTier {
    policy: CachePolicy,
    store: Cache<String, Slot>,
}

impl LocalTier {
    pub fn new(policy: CachePolicy) -> Self {
        let store = Cache::builder()
            .name(&policy.name)
            .max_capacity(policy.local_max_entries)
            .expire_after(SlotExpiry {
                value_ttl: policy.local_ttl,
                null_ttl: policy.effective_null_ttl(),
            })
            .build();

        Self { policy, store }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Approximate number of live entries (exact after [`Self::sync`]).
    pub fn entry_count(&self) -> u64 {
        self.store.entry_count()
    }

    /// Apply pending evictions and expirations.
    pub async fn sync(&self) {
        self.store.run_pending_tasks().await;
    }
}

#[async_trait]
impl CacheTier for LocalTier {
    fn name(&self) -> &str {
        &self.policy.name
    }

    fn kind(&self) -> TierKind {
        TierKind::Local
    }

    async fn get(&self, key: &str) -> Result<CacheEntry, TierError> {
        Ok(match self.store.get(key).await {
            Some(slot) => CacheEntry::from_slot(slot),
            None => CacheEntry::Miss,
        })
    }

    async fn put(&self, key: &str, value: Option<Arc<Value>>) -> Result<(), TierError> {
        if value.is_none() && !self.policy.cache_null_values {
            tracing::debug!(cache = %self.policy.name, key = %key, "null value not cached (local)");
            return Ok(());
        }
        self.store.insert(key.to_owned(), value).await;
        Ok(())
    }

    async fn evict(&self, key: &str) -> Result<(), TierError> {
        self.store.invalidate(key).await;
        Ok(())
    }

    async fn clear(&self) -> Result<(), TierError> {
        self.store.invalidate_all();
        Ok(())
    }
}

/// Hands out one [`LocalTier`] per cache name, sized by the policy table.
pub struct LocalTierManager {
    policies: Arc<PolicyTable>,
    tiers: DashMap<String, Arc<LocalTier>>,
}

impl LocalTierManager {
    pub fn new(policies: Arc<PolicyTable>) -> Self {
        Self {
            policies,
            tiers: DashMap::new(),
        }
    }

    /// Tier for `name`, created on first use.
    pub fn tier(&self, name: &str) -> Arc<LocalTier> {
        let entry = self
            .tiers
            .entry(name.to_owned())
            .or_insert_with(|| Arc::new(LocalTier::new(self.policies.policy_for(name))));
        Arc::clone(entry.value())
    }
}

#[async_trait]
impl TierManager for LocalTierManager {
    fn kind(&self) -> TierKind {
        TierKind::Local
    }

    async fn get_tier(&self, name: &str) -> Result<DynCacheTier, ProvisionError> {
        let tier: DynCacheTier = self.tier(name);
        Ok(tier)
    }
}
