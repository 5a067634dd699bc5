//! Behavior of the composite cache with a moka local tier and an in-memory
//! distributed tier that counts calls and can be made to fail.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use akko_cache::{
    Cache, CacheEntry, CacheError, CacheManager, CacheTier, LayoutKind, LocalTier,
    LocalTierManager, MemoryTier, MemoryTierManager, PolicyTable, TierKind, keys,
};
use serde_json::{Value, json};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

struct Harness {
    manager: Arc<CacheManager>,
    local: Arc<LocalTierManager>,
    remote: Arc<MemoryTierManager>,
}

impl Harness {
    fn new() -> Self {
        let local = Arc::new(LocalTierManager::new(Arc::new(PolicyTable::default())));
        let remote = Arc::new(MemoryTierManager::new(TierKind::Distributed));
        let manager = CacheManager::builder()
            .local(local.clone())
            .distributed(remote.clone())
            .build();
        Self {
            manager: Arc::new(manager),
            local,
            remote,
        }
    }

    async fn cache(&self, name: &str) -> (Arc<Cache>, Arc<LocalTier>, Arc<MemoryTier>) {
        let cache = self.manager.get_cache(name).await.unwrap();
        assert_eq!(cache.layout_kind(), LayoutKind::TwoTier);
        (cache, self.local.tier(name), self.remote.tier(name))
    }
}

/// Counts WARN events emitted while installed.
#[derive(Clone, Default)]
struct WarnCounter(Arc<AtomicUsize>);

impl WarnCounter {
    fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl<S: Subscriber> Layer<S> for WarnCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::WARN {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

fn count_warnings() -> (WarnCounter, tracing::subscriber::DefaultGuard) {
    let counter = WarnCounter::default();
    let subscriber = tracing_subscriber::registry().with(counter.clone());
    let guard = tracing::subscriber::set_default(subscriber);
    (counter, guard)
}

#[tokio::test]
async fn test_distributed_hit_is_promoted() {
    let harness = Harness::new();
    let (cache, local, remote) = harness.cache(keys::names::USER).await;
    let user = json!({"id": 1, "name": "a"});
    remote.seed(keys::user_detail(1), user.clone());

    let entry = cache.get("detail:1").await;
    assert_eq!(entry, CacheEntry::value(user.clone()));
    assert_eq!(local.get("detail:1").await.unwrap(), CacheEntry::value(user.clone()));

    // Served locally from now on
    let gets = remote.calls().gets;
    assert_eq!(cache.get("detail:1").await, CacheEntry::value(user));
    assert_eq!(remote.calls().gets, gets);
}

#[tokio::test]
async fn test_put_writes_through() {
    let harness = Harness::new();
    let (cache, local, remote) = harness.cache(keys::names::DICTIONARY).await;

    cache.put("item:gender", json!(["m", "f"])).await.unwrap();

    assert_eq!(
        local.get("item:gender").await.unwrap(),
        CacheEntry::value(json!(["m", "f"]))
    );
    assert_eq!(remote.peek("item:gender").as_deref(), Some(&json!(["m", "f"])));
}

#[tokio::test]
async fn test_local_hit_skips_distributed_tier() {
    let harness = Harness::new();
    let (cache, local, remote) = harness.cache(keys::names::MENU).await;
    local.put("tree:0", Some(Arc::new(json!({"children": []})))).await.unwrap();

    for _ in 0..3 {
        assert!(cache.get("tree:0").await.is_hit());
    }
    assert_eq!(remote.calls().total(), 0);
    assert_eq!(cache.stats().local_hits, 3);
}

#[tokio::test]
async fn test_failing_distributed_tier_reads_as_miss_with_one_warning() {
    let harness = Harness::new();
    let (cache, _local, remote) = harness.cache(keys::names::PERMISSION).await;
    remote.set_failing(true);

    let (warnings, _guard) = count_warnings();
    let entry = cache.get("permission:9").await;

    assert!(entry.is_miss());
    assert_eq!(warnings.count(), 1);
    assert_eq!(cache.stats().tier_errors, 1);
}

#[tokio::test]
async fn test_loader_runs_once_then_value_is_cached() {
    let harness = Harness::new();
    let (cache, local, remote) = harness.cache(keys::names::USER).await;
    let calls = AtomicUsize::new(0);

    for _ in 0..2 {
        let value = cache
            .get_with("detail:2", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, CacheError>(Some(json!({"id": 2})))
            })
            .await
            .unwrap();
        assert_eq!(value.as_deref(), Some(&json!({"id": 2})));
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(local.get("detail:2").await.unwrap().is_hit());
    assert!(remote.peek("detail:2").is_some());
    assert_eq!(cache.stats().loads, 1);
}

#[derive(Debug, PartialEq)]
struct LoadFailed;

#[tokio::test]
async fn test_loader_error_writes_nothing() {
    let harness = Harness::new();
    let (cache, local, remote) = harness.cache(keys::names::USER).await;

    let result = cache
        .get_with("detail:3", || async { Err::<Option<Value>, _>(LoadFailed) })
        .await;

    assert_eq!(result, Err(LoadFailed));
    assert!(local.get("detail:3").await.unwrap().is_miss());
    assert!(remote.peek("detail:3").is_none());
    assert_eq!(remote.calls().puts, 0);
}

#[tokio::test]
async fn test_loader_value_survives_distributed_write_failure() {
    let harness = Harness::new();
    let (cache, local, remote) = harness.cache(keys::names::ROLE).await;
    remote.set_failing(true);

    let (warnings, _guard) = count_warnings();
    let value = cache
        .get_with(&keys::tree(0), || async { Ok::<_, LoadFailed>(Some(json!("computed"))) })
        .await
        .unwrap();

    // One degraded read, one failed write-back
    assert_eq!(warnings.count(), 2);
    assert_eq!(value.as_deref(), Some(&json!("computed")));
    assert_eq!(
        local.get("tree:0").await.unwrap(),
        CacheEntry::value(json!("computed"))
    );
    assert!(remote.is_empty());
}

#[tokio::test]
async fn test_loader_absence_is_not_cached() {
    let harness = Harness::new();
    let (cache, local, _remote) = harness.cache(keys::names::USER).await;

    let value = cache
        .get_with("detail:404", || async { Ok::<_, LoadFailed>(None) })
        .await
        .unwrap();

    assert!(value.is_none());
    assert!(local.get("detail:404").await.unwrap().is_miss());
}

#[tokio::test]
async fn test_overwrite_is_visible_locally() {
    let harness = Harness::new();
    let (cache, _local, remote) = harness.cache(keys::names::CONFIG).await;

    cache.put("system:theme", json!("v1")).await.unwrap();
    cache.put("system:theme", json!("v2")).await.unwrap();

    let gets = remote.calls().gets;
    assert_eq!(cache.get("system:theme").await, CacheEntry::value(json!("v2")));
    assert_eq!(remote.calls().gets, gets);
    assert_eq!(remote.peek("system:theme").as_deref(), Some(&json!("v2")));
}

#[tokio::test]
async fn test_evict_and_clear_are_idempotent() {
    let harness = Harness::new();
    let (cache, local, remote) = harness.cache(keys::names::MENU).await;

    cache.evict("menu:absent").await.unwrap();
    cache.clear().await.unwrap();

    cache.put("tree:1", json!(1)).await.unwrap();
    cache.put("tree:2", json!(2)).await.unwrap();
    cache.evict("tree:1").await.unwrap();
    cache.evict("tree:1").await.unwrap();
    assert!(cache.get("tree:1").await.is_miss());

    cache.clear().await.unwrap();
    cache.clear().await.unwrap();
    assert!(local.get("tree:2").await.unwrap().is_miss());
    assert!(remote.is_empty());
}

#[tokio::test]
async fn test_evict_reports_distributed_failure_after_local_removal() {
    let harness = Harness::new();
    let (cache, local, remote) = harness.cache(keys::names::USER).await;
    cache.put("detail:5", json!(5)).await.unwrap();
    remote.set_failing(true);

    let err = cache.evict("detail:5").await.unwrap_err();
    assert!(err.is_tier_write());
    assert_eq!(err.tier(), Some(TierKind::Distributed));
    assert!(local.get("detail:5").await.unwrap().is_miss());
}

#[tokio::test]
async fn test_put_if_absent() {
    let harness = Harness::new();
    let (cache, _local, remote) = harness.cache(keys::names::USER).await;

    // Absent everywhere: candidate becomes authoritative
    let previous = cache.put_if_absent("detail:6", json!("first")).await.unwrap();
    assert!(previous.is_miss());
    assert_eq!(remote.peek("detail:6").as_deref(), Some(&json!("first")));

    // Present locally: existing entry wins
    let previous = cache.put_if_absent("detail:6", json!("second")).await.unwrap();
    assert_eq!(previous, CacheEntry::value(json!("first")));
    assert_eq!(remote.peek("detail:6").as_deref(), Some(&json!("first")));

    // Present only in the distributed tier: promoted, not overwritten
    remote.seed("detail:7", json!("remote"));
    let previous = cache.put_if_absent("detail:7", json!("candidate")).await.unwrap();
    assert_eq!(previous, CacheEntry::value(json!("remote")));
    assert_eq!(cache.stats().local_hits, 1);
    assert_eq!(
        cache.get("detail:7").await,
        CacheEntry::value(json!("remote"))
    );
    assert_eq!(cache.stats().local_hits, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_use_yields_one_instance() {
    let harness = Harness::new();

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let manager = Arc::clone(&harness.manager);
            tokio::spawn(async move { manager.get_cache(keys::names::ROLE).await.unwrap() })
        })
        .collect();

    let mut caches = Vec::new();
    for handle in handles {
        caches.push(handle.await.unwrap());
    }

    assert!(caches.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    assert_eq!(harness.remote.provisions(), 1);
    assert_eq!(
        harness.manager.cache_names().into_iter().collect::<Vec<_>>(),
        vec![keys::names::ROLE.to_string()]
    );
}

#[tokio::test]
async fn test_memory_tier_can_stand_in_for_local() {
    let local = Arc::new(MemoryTier::with_kind("user", TierKind::Local));
    let remote = Arc::new(MemoryTier::new("user"));
    let cache = Cache::two_tier("user", local.clone(), remote.clone());

    remote.seed("detail:8", json!(8));
    assert!(cache.get("detail:8").await.is_hit());
    assert_eq!(local.peek("detail:8").as_deref(), Some(&json!(8)));
    assert_eq!(local.calls().puts, 1);
}
