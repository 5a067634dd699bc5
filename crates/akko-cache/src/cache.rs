//! Composite cache over a local and a distributed tier.
//!
//! ## Lookup Order
//!
//! ```text
//! get(key) → local ──hit──▶ return
//!              │ miss
//!              ▼
//!          distributed ──hit──▶ promote to local, return
//!              │ miss / error (logged)
//!              ▼
//!            Miss  (get_with: run loader once, write through)
//! ```
//!
//! ## Failure Semantics
//!
//! - Reads never fail: a tier error is logged and counted, then treated as a miss.
//! - Writes (`put`, `evict`, `clear`) go local first, then distributed. A
//!   distributed failure is returned as [`CacheError::TierWrite`]; the local
//!   mutation stays applied.
//!
//! Concurrent `get_with` calls on the same missing key each run their loader.
//! `put_if_absent` is check-then-write, not a compare-and-swap.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::entry::CacheEntry;
use crate::error::{CacheError, CacheOperation, TierError, TierKind};
use crate::metrics;
use crate::tier::DynCacheTier;

/// Which tiers back a cache. Chosen once, at provisioning time.
#[derive(Clone)]
pub enum CacheLayout {
    /// Only the in-process tier could be provisioned (or was requested).
    LocalOnly(DynCacheTier),
    /// Only the distributed tier is used.
    DistributedOnly(DynCacheTier),
    /// Local tier in front of the distributed tier.
    TwoTier {
        local: DynCacheTier,
        distributed: DynCacheTier,
    },
}

impl CacheLayout {
    pub fn kind(&self) -> LayoutKind {
        match self {
            Self::LocalOnly(_) => LayoutKind::LocalOnly,
            Self::DistributedOnly(_) => LayoutKind::DistributedOnly,
            Self::TwoTier { .. } => LayoutKind::TwoTier,
        }
    }
}

/// Tag of a [`CacheLayout`], for logging and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutKind {
    LocalOnly,
    DistributedOnly,
    TwoTier,
}

impl fmt::Display for LayoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocalOnly => write!(f, "local-only"),
            Self::DistributedOnly => write!(f, "distributed-only"),
            Self::TwoTier => write!(f, "two-tier"),
        }
    }
}

/// Cache statistics snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered by the local tier.
    pub local_hits: u64,
    /// Lookups answered by the distributed tier.
    pub distributed_hits: u64,
    /// Lookups that missed every tier.
    pub misses: u64,
    /// Loader invocations after a combined miss.
    pub loads: u64,
    /// Failed tier operations, reads and writes.
    pub tier_errors: u64,
}

impl CacheStats {
    pub fn hits(&self) -> u64 {
        self.local_hits + self.distributed_hits
    }

    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits() + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits() as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct Counters {
    local_hits: AtomicU64,
    distributed_hits: AtomicU64,
    misses: AtomicU64,
    loads: AtomicU64,
    tier_errors: AtomicU64,
}

/// A named logical cache.
pub struct Cache {
    name: String,
    layout: CacheLayout,
    counters: Counters,
}

impl Cache {
    pub fn new(name: impl Into<String>, layout: CacheLayout) -> Self {
        Self {
            name: name.into(),
            layout,
            counters: Counters::default(),
        }
    }

    pub fn two_tier(name: impl Into<String>, local: DynCacheTier, distributed: DynCacheTier) -> Self {
        Self::new(name, CacheLayout::TwoTier { local, distributed })
    }

    pub fn local_only(name: impl Into<String>, local: DynCacheTier) -> Self {
        Self::new(name, CacheLayout::LocalOnly(local))
    }

    pub fn distributed_only(name: impl Into<String>, distributed: DynCacheTier) -> Self {
        Self::new(name, CacheLayout::DistributedOnly(distributed))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layout(&self) -> &CacheLayout {
        &self.layout
    }

    pub fn layout_kind(&self) -> LayoutKind {
        self.layout.kind()
    }

    /// The local tier, if this cache has one.
    pub fn local_tier(&self) -> Option<&DynCacheTier> {
        match &self.layout {
            CacheLayout::LocalOnly(local) | CacheLayout::TwoTier { local, .. } => Some(local),
            CacheLayout::DistributedOnly(_) => None,
        }
    }

    /// The distributed tier, if this cache has one.
    pub fn distributed_tier(&self) -> Option<&DynCacheTier> {
        match &self.layout {
            CacheLayout::DistributedOnly(distributed)
            | CacheLayout::TwoTier { distributed, .. } => Some(distributed),
            CacheLayout::LocalOnly(_) => None,
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            local_hits: self.counters.local_hits.load(Ordering::Relaxed),
            distributed_hits: self.counters.distributed_hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            loads: self.counters.loads.load(Ordering::Relaxed),
            tier_errors: self.counters.tier_errors.load(Ordering::Relaxed),
        }
    }

    /// Look up a key.
    ///
    /// A local hit (value or cached absence) returns without touching the
    /// distributed tier. A distributed hit is promoted into the local tier.
    /// Tier errors are logged and reported as a miss.
    pub async fn get(&self, key: &str) -> CacheEntry {
        match &self.layout {
            CacheLayout::LocalOnly(tier) | CacheLayout::DistributedOnly(tier) => {
                let entry = self.read(tier, key).await;
                self.record_lookup(key, &entry, tier.kind());
                entry
            }
            CacheLayout::TwoTier { local, distributed } => {
                let entry = self.read(local, key).await;
                if entry.is_hit() {
                    self.record_lookup(key, &entry, TierKind::Local);
                    return entry;
                }

                let entry = self.read(distributed, key).await;
                if entry.is_hit() {
                    self.promote(local, key, &entry).await;
                }
                self.record_lookup(key, &entry, TierKind::Distributed);
                entry
            }
        }
    }

    /// Look up a key, running `loader` once on a combined miss.
    ///
    /// A loaded value is written to every tier before it is returned; a failed
    /// write is logged, not returned. A loader error is returned as is and
    /// nothing is written. A cached absence returns `Ok(None)` without
    /// running the loader.
    pub async fn get_with<F, Fut, E>(&self, key: &str, loader: F) -> Result<Option<Arc<Value>>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<Value>, E>>,
    {
        match self.get(key).await {
            CacheEntry::Value(value) => return Ok(Some(value)),
            CacheEntry::Null => return Ok(None),
            CacheEntry::Miss => {}
        }

        self.counters.loads.fetch_add(1, Ordering::Relaxed);
        metrics::record_cache_load(&self.name);

        let Some(value) = loader().await? else {
            tracing::debug!(cache = %self.name, key = %key, "loader returned no value");
            return Ok(None);
        };

        let value = Arc::new(value);
        if let Err(err) = self.write(key, Some(Arc::clone(&value))).await {
            tracing::warn!(cache = %self.name, key = %key, error = %err, "failed to cache loaded value");
        }
        Ok(Some(value))
    }

    /// Typed lookup. A value that does not deserialize into `T` is logged and
    /// treated as a miss.
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key).await.into_value()?;
        match T::deserialize(value.as_ref()) {
            Ok(typed) => Some(typed),
            Err(err) => {
                tracing::warn!(
                    cache = %self.name,
                    key = %key,
                    error = %err,
                    "cached value has unexpected shape, treating as miss"
                );
                None
            }
        }
    }

    /// Write-through: local tier first, then distributed.
    pub async fn put(&self, key: &str, value: Value) -> Result<(), CacheError> {
        self.write(key, Some(Arc::new(value))).await
    }

    /// Cache an absence. Tiers that do not cache absences skip the write.
    pub async fn put_null(&self, key: &str) -> Result<(), CacheError> {
        self.write(key, None).await
    }

    /// Serialize and write through.
    pub async fn put_as<T: Serialize>(&self, key: &str, value: &T) -> Result<(), CacheError> {
        let value = serde_json::to_value(value).map_err(|source| CacheError::Serialization {
            cache: self.name.clone(),
            key: key.to_string(),
            source,
        })?;
        self.put(key, value).await
    }

    /// Return the existing entry if any tier has one (promoting a distributed
    /// hit), otherwise write `value` through and return `CacheEntry::Miss`.
    pub async fn put_if_absent(&self, key: &str, value: Value) -> Result<CacheEntry, CacheError> {
        let existing = self.get(key).await;
        if existing.is_hit() {
            return Ok(existing);
        }
        self.put(key, value).await?;
        Ok(CacheEntry::Miss)
    }

    /// Remove a key from every tier.
    pub async fn evict(&self, key: &str) -> Result<(), CacheError> {
        for tier in self.tiers().into_iter().flatten() {
            tier.evict(key)
                .await
                .map_err(|e| self.write_failed(tier, key, CacheOperation::Evict, e))?;
        }
        tracing::debug!(cache = %self.name, key = %key, "cache evict");
        Ok(())
    }

    /// Remove every key of this cache from every tier.
    pub async fn clear(&self) -> Result<(), CacheError> {
        for tier in self.tiers().into_iter().flatten() {
            tier.clear()
                .await
                .map_err(|e| self.write_failed(tier, "*", CacheOperation::Clear, e))?;
        }
        tracing::debug!(cache = %self.name, "cache clear");
        Ok(())
    }

    /// Tiers in write order: local, then distributed.
    fn tiers(&self) -> [Option<&DynCacheTier>; 2] {
        [self.local_tier(), self.distributed_tier()]
    }

    async fn read(&self, tier: &DynCacheTier, key: &str) -> CacheEntry {
        match tier.get(key).await {
            Ok(entry) => entry,
            Err(err) => {
                self.count_tier_error(tier.kind(), CacheOperation::Get);
                tracing::warn!(
                    cache = %self.name,
                    key = %key,
                    tier = %tier.kind(),
                    error = %err,
                    "cache read failed, treating as miss"
                );
                CacheEntry::Miss
            }
        }
    }

    async fn write(&self, key: &str, value: Option<Arc<Value>>) -> Result<(), CacheError> {
        for tier in self.tiers().into_iter().flatten() {
            tier.put(key, value.clone())
                .await
                .map_err(|e| self.write_failed(tier, key, CacheOperation::Put, e))?;
        }
        tracing::debug!(cache = %self.name, key = %key, "cache put");
        Ok(())
    }

    async fn promote(&self, local: &DynCacheTier, key: &str, entry: &CacheEntry) {
        if let Err(err) = local.put(key, entry.as_value().cloned()).await {
            self.count_tier_error(TierKind::Local, CacheOperation::Put);
            tracing::warn!(cache = %self.name, key = %key, error = %err, "promotion to local tier failed");
        }
    }

    fn record_lookup(&self, key: &str, entry: &CacheEntry, tier: TierKind) {
        if entry.is_hit() {
            let counter = match tier {
                TierKind::Local => &self.counters.local_hits,
                TierKind::Distributed => &self.counters.distributed_hits,
            };
            counter.fetch_add(1, Ordering::Relaxed);
            metrics::record_cache_hit(&self.name, tier);
            tracing::debug!(cache = %self.name, key = %key, tier = %tier, "cache hit");
        } else {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            metrics::record_cache_miss(&self.name);
            tracing::debug!(cache = %self.name, key = %key, "cache miss");
        }
    }

    fn write_failed(
        &self,
        tier: &DynCacheTier,
        key: &str,
        operation: CacheOperation,
        source: TierError,
    ) -> CacheError {
        self.count_tier_error(tier.kind(), operation);
        tracing::debug!(
            cache = %self.name,
            key = %key,
            tier = %tier.kind(),
            operation = %operation,
            error = %source,
            "cache write failed"
        );
        CacheError::TierWrite {
            cache: self.name.clone(),
            operation,
            tier: tier.kind(),
            source,
        }
    }

    fn count_tier_error(&self, tier: TierKind, operation: CacheOperation) {
        self.counters.tier_errors.fetch_add(1, Ordering::Relaxed);
        metrics::record_tier_error(&self.name, tier, operation);
    }
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("name", &self.name)
            .field("layout", &self.layout_kind())
            .field("stats", &self.stats())
            .finish()
    }
}
