//! Unbounded in-memory tier with call counting and failure injection.
//!
//! Stands in for the distributed tier in tests and single-node experiments:
//! it never caches absences and can be switched into a failing state in which
//! every operation returns [`TierError::Unavailable`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use super::{CacheTier, DynCacheTier, TierManager};
use crate::entry::CacheEntry;
use crate::error::{ProvisionError, TierError, TierKind};

/// Snapshot of per-operation call counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TierCalls {
    pub gets: u64,
    pub puts: u64,
    pub evicts: u64,
    pub clears: u64,
}

impl TierCalls {
    pub fn total(&self) -> u64 {
        self.gets + self.puts + self.evicts + self.clears
    }
}

#[derive(Default)]
struct Counters {
    gets: AtomicU64,
    puts: AtomicU64,
    evicts: AtomicU64,
    clears: AtomicU64,
}

/// In-memory tier for one cache name.
pub struct MemoryTier {
    name: String,
    kind: TierKind,
    entries: DashMap<String, Arc<Value>>,
    failing: AtomicBool,
    counters: Counters,
}

impl MemoryTier {
    /// New tier acting as the distributed side of `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_kind(name, TierKind::Distributed)
    }

    pub fn with_kind(name: impl Into<String>, kind: TierKind) -> Self {
        Self {
            name: name.into(),
            kind,
            entries: DashMap::new(),
            failing: AtomicBool::new(false),
            counters: Counters::default(),
        }
    }

    /// Make every subsequent operation fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> TierCalls {
        TierCalls {
            gets: self.counters.gets.load(Ordering::SeqCst),
            puts: self.counters.puts.load(Ordering::SeqCst),
            evicts: self.counters.evicts.load(Ordering::SeqCst),
            clears: self.counters.clears.load(Ordering::SeqCst),
        }
    }

    /// Direct read, bypassing counters and failure injection.
    pub fn peek(&self, key: &str) -> Option<Arc<Value>> {
        self.entries.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Direct write, bypassing counters and failure injection.
    pub fn seed(&self, key: impl Into<String>, value: Value) {
        self.entries.insert(key.into(), Arc::new(value));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn check(&self, counter: &AtomicU64) -> Result<(), TierError> {
        counter.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(TierError::unavailable(format!(
                "memory tier '{}' is failing",
                self.name
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheTier for MemoryTier {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TierKind {
        self.kind
    }

    async fn get(&self, key: &str) -> Result<CacheEntry, TierError> {
        self.check(&self.counters.gets)?;
        Ok(match self.peek(key) {
            Some(value) => CacheEntry::Value(value),
            None => CacheEntry::Miss,
        })
    }

    async fn put(&self, key: &str, value: Option<Arc<Value>>) -> Result<(), TierError> {
        self.check(&self.counters.puts)?;
        if let Some(value) = value {
            self.entries.insert(key.to_owned(), value);
        }
        Ok(())
    }

    async fn evict(&self, key: &str) -> Result<(), TierError> {
        self.check(&self.counters.evicts)?;
        self.entries.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), TierError> {
        self.check(&self.counters.clears)?;
        self.entries.clear();
        Ok(())
    }
}

/// Hands out one [`MemoryTier`] per name; provisioning can be made to fail.
pub struct MemoryTierManager {
    kind: TierKind,
    tiers: DashMap<String, Arc<MemoryTier>>,
    unavailable: AtomicBool,
    provisions: AtomicU64,
}

impl MemoryTierManager {
    pub fn new(kind: TierKind) -> Self {
        Self {
            kind,
            tiers: DashMap::new(),
            unavailable: AtomicBool::new(false),
            provisions: AtomicU64::new(0),
        }
    }

    /// Tier for `name`, created on first use. Usable before the cache exists,
    /// e.g. to seed entries.
    pub fn tier(&self, name: &str) -> Arc<MemoryTier> {
        let entry = self
            .tiers
            .entry(name.to_owned())
            .or_insert_with(|| Arc::new(MemoryTier::with_kind(name, self.kind)));
        Arc::clone(entry.value())
    }

    /// Refuse (or allow again) every `get_tier` call.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of `get_tier` calls served so far, failed ones included.
    pub fn provisions(&self) -> u64 {
        self.provisions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TierManager for MemoryTierManager {
    fn kind(&self) -> TierKind {
        self.kind
    }

    async fn get_tier(&self, name: &str) -> Result<DynCacheTier, ProvisionError> {
        self.provisions.fetch_add(1, Ordering::SeqCst);
        // Give concurrent provisioners a chance to interleave.
        tokio::task::yield_now().await;

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ProvisionError::new(self.kind, name, "backing store unavailable"));
        }
        let tier: DynCacheTier = self.tier(name);
        Ok(tier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_counts_and_failures() {
        let tier = MemoryTier::new("role");
        tier.put("tree:0", Some(Arc::new(json!("x")))).await.unwrap();
        assert_eq!(tier.get("tree:0").await.unwrap(), CacheEntry::value(json!("x")));

        tier.set_failing(true);
        assert!(tier.get("tree:0").await.is_err());
        assert!(tier.evict("tree:0").await.is_err());

        let calls = tier.calls();
        assert_eq!(calls.gets, 2);
        assert_eq!(calls.puts, 1);
        assert_eq!(calls.evicts, 1);
        assert_eq!(calls.total(), 4);

        // Failing evict left the entry in place
        assert!(tier.peek("tree:0").is_some());
    }

    #[tokio::test]
    async fn test_absences_are_not_stored() {
        let tier = MemoryTier::new("user");
        tier.put("detail:404", None).await.unwrap();
        assert!(tier.is_empty());
        assert_eq!(tier.get("detail:404").await.unwrap(), CacheEntry::Miss);
    }

    #[tokio::test]
    async fn test_manager_provisioning() {
        let manager = MemoryTierManager::new(TierKind::Distributed);
        manager.tier("user").seed("detail:1", json!(1));

        let tier = manager.get_tier("user").await.unwrap();
        assert!(tier.get("detail:1").await.unwrap().is_hit());

        manager.set_unavailable(true);
        let err = manager.get_tier("menu").await.err().unwrap();
        assert_eq!(err.tier, TierKind::Distributed);
        assert_eq!(manager.provisions(), 2);
    }
}
