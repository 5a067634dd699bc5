//! Registry of named caches.
//!
//! Each name maps to a lazily provisioned [`Cache`]. Provisioning runs at most
//! once per name at a time and its result is kept for the life of the
//! manager; a failed provisioning is not kept, so the next lookup retries.

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;

use crate::cache::{Cache, CacheLayout};
use crate::error::{CacheError, ProvisionError};
use crate::keys;
use crate::tier::{DynCacheTier, TierManager};

/// How the manager composes tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Local tier in front of the distributed tier.
    #[default]
    MultiLevel,
    /// Distributed tier only; the local tier is used only when the
    /// distributed tier cannot be provisioned.
    DistributedOnly,
}

type Slot = Arc<OnceCell<Arc<Cache>>>;

/// Hands out exactly one [`Cache`] per logical name.
pub struct CacheManager {
    local: Option<Arc<dyn TierManager>>,
    distributed: Option<Arc<dyn TierManager>>,
    mode: CacheMode,
    caches: DashMap<String, Slot>,
}

impl CacheManager {
    pub fn builder() -> CacheManagerBuilder {
        CacheManagerBuilder::default()
    }

    pub fn mode(&self) -> CacheMode {
        self.mode
    }

    /// Cache for `name`, provisioned on first use.
    ///
    /// Concurrent first callers share one provisioning; all of them get the
    /// same instance.
    pub async fn get_cache(&self, name: &str) -> Result<Arc<Cache>, CacheError> {
        keys::validate_cache_name(name).map_err(|reason| CacheError::InvalidName {
            name: name.to_string(),
            reason,
        })?;

        let slot = {
            let entry = self.caches.entry(name.to_owned()).or_default();
            Arc::clone(entry.value())
        };

        match slot.get_or_try_init(|| self.provision(name)).await {
            Ok(cache) => Ok(Arc::clone(cache)),
            Err(err) => {
                // Drop the empty slot unless another caller still holds it.
                self.caches.remove_if(name, |_, existing| {
                    Arc::ptr_eq(existing, &slot)
                        && Arc::strong_count(existing) == 2
                        && !existing.initialized()
                });
                Err(err)
            }
        }
    }

    /// Names of the caches provisioned so far.
    pub fn cache_names(&self) -> BTreeSet<String> {
        self.caches
            .iter()
            .filter(|entry| entry.value().initialized())
            .map(|entry| entry.key().clone())
            .collect()
    }

    async fn provision(&self, name: &str) -> Result<Arc<Cache>, CacheError> {
        let distributed = match &self.distributed {
            Some(manager) => manager.get_tier(name).await.map_err(Some),
            None => Err(None),
        };

        // In distributed-only mode the local tier is a fallback, not a layer.
        let local = match (&self.local, self.mode, &distributed) {
            (Some(_), CacheMode::DistributedOnly, Ok(_)) => Err(None),
            (Some(manager), _, _) => manager.get_tier(name).await.map_err(Some),
            (None, _, _) => Err(None),
        };

        let layout = select_layout(name, self.mode, local, distributed)?;
        tracing::info!(cache = %name, layout = %layout.kind(), "cache provisioned");
        Ok(Arc::new(Cache::new(name, layout)))
    }
}

type TierResult = Result<DynCacheTier, Option<ProvisionError>>;

/// Pick the layout from whichever tiers provisioned. `Err(None)` means the
/// tier was not configured or not requested.
fn select_layout(
    name: &str,
    mode: CacheMode,
    local: TierResult,
    distributed: TierResult,
) -> Result<CacheLayout, CacheError> {
    match (local, distributed) {
        (Ok(local), Ok(distributed)) => Ok(CacheLayout::TwoTier { local, distributed }),
        (Err(reason), Ok(distributed)) => {
            if let Some(err) = &reason {
                tracing::warn!(cache = %name, error = %err, "local tier unavailable, using distributed tier only");
            }
            Ok(CacheLayout::DistributedOnly(distributed))
        }
        (Ok(local), Err(reason)) => {
            if let Some(err) = &reason {
                tracing::warn!(cache = %name, error = %err, "distributed tier unavailable, using local tier only");
            } else if mode == CacheMode::DistributedOnly {
                tracing::warn!(cache = %name, "no distributed tier configured, using local tier only");
            }
            Ok(CacheLayout::LocalOnly(local))
        }
        (Err(local), Err(distributed)) => Err(CacheError::Provisioning {
            name: name.to_string(),
            reasons: format!(
                "local: {}; distributed: {}",
                describe(local.as_ref()),
                describe(distributed.as_ref())
            ),
        }),
    }
}

fn describe(reason: Option<&ProvisionError>) -> String {
    reason.map_or_else(|| "not configured".to_string(), |err| err.reason.clone())
}

/// Builder for [`CacheManager`].
#[derive(Default)]
pub struct CacheManagerBuilder {
    local: Option<Arc<dyn TierManager>>,
    distributed: Option<Arc<dyn TierManager>>,
    mode: CacheMode,
}

impl CacheManagerBuilder {
    pub fn local(mut self, manager: Arc<dyn TierManager>) -> Self {
        self.local = Some(manager);
        self
    }

    pub fn distributed(mut self, manager: Arc<dyn TierManager>) -> Self {
        self.distributed = Some(manager);
        self
    }

    pub fn mode(mut self, mode: CacheMode) -> Self {
        self.mode = mode;
        self
    }

    /// `true` selects [`CacheMode::MultiLevel`], `false` [`CacheMode::DistributedOnly`].
    pub fn multi_level(self, enabled: bool) -> Self {
        self.mode(if enabled {
            CacheMode::MultiLevel
        } else {
            CacheMode::DistributedOnly
        })
    }

    pub fn build(self) -> CacheManager {
        CacheManager {
            local: self.local,
            distributed: self.distributed,
            mode: self.mode,
            caches: DashMap::new(),
        }
    }
}
