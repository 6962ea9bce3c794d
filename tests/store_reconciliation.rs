// Tests for cache/gateway reconciliation in the series store.
use chrono::{TimeZone, Utc};
use episodic::cache::{DiskCache, KEY_SERIES, LocalCache, MemoryCache};
use episodic::client::{MemoryGateway, PersistenceGateway};
use episodic::context::{AppContext, TestContext};
use episodic::error::TrackerError;
use episodic::model::RemoteSettings;
use episodic::store::{Replication, SeriesStore, SyncMode};
use std::sync::Arc;

fn gateway_store(
    cache: Arc<dyn LocalCache>,
    gateway: &Arc<MemoryGateway>,
) -> SeriesStore {
    let gw: Arc<dyn PersistenceGateway> = gateway.clone();
    SeriesStore::new(cache, Some(gw))
}

#[tokio::test]
async fn test_online_load_mirrors_remote_into_cache() {
    let cache = Arc::new(MemoryCache::new());
    cache.set(KEY_SERIES, r#"["Stale Show"]"#).unwrap();

    let gateway = Arc::new(MemoryGateway::with_state(
        &["Severance", "Andor"],
        Some(RemoteSettings {
            notif_enabled: Some(true),
            last_checked_at: None,
        }),
    ));
    let mut store = gateway_store(cache.clone(), &gateway);

    let report = store.load().await.unwrap();
    assert_eq!(report.mode, SyncMode::Online);
    assert_eq!(report.series, vec!["Severance", "Andor"]);
    assert!(report.settings.notif_enabled);

    // Gateway is authoritative: the stale cached entry is gone.
    assert_eq!(
        cache.get(KEY_SERIES).unwrap().as_deref(),
        Some(r#"["Severance","Andor"]"#)
    );
}

#[tokio::test]
async fn test_unreachable_gateway_falls_back_to_cache() {
    let cache = Arc::new(MemoryCache::new());
    cache.set(KEY_SERIES, r#"["Dark"]"#).unwrap();

    let gateway = Arc::new(MemoryGateway::with_state(&["Remote Only"], None));
    gateway.set_offline(true);
    let mut store = gateway_store(cache.clone(), &gateway);

    let report = store.load().await.unwrap();
    assert!(matches!(report.mode, SyncMode::SyncError(ref reason) if reason.contains("offline")));
    assert_eq!(report.series, vec!["Dark"]);
    // Cache is untouched by a failed load.
    assert_eq!(cache.get(KEY_SERIES).unwrap().as_deref(), Some(r#"["Dark"]"#));
}

#[tokio::test]
async fn test_missing_remote_settings_keep_cached_settings() {
    let cache = Arc::new(MemoryCache::new());
    let mut offline = SeriesStore::new(cache.clone(), None);
    offline.set_notif_enabled(true).await.unwrap();

    let gateway = Arc::new(MemoryGateway::with_state(&[], None));
    let mut store = gateway_store(cache, &gateway);
    let report = store.load().await.unwrap();
    assert_eq!(report.mode, SyncMode::Online);
    assert!(report.settings.notif_enabled);
}

#[tokio::test]
async fn test_added_names_load_once_in_insertion_order() {
    let gateway = Arc::new(MemoryGateway::new());
    let mut store = gateway_store(Arc::new(MemoryCache::new()), &gateway);
    let names = ["Severance", "The Bear", "Andor", "severance"];
    for name in names {
        store.add(name).await.unwrap();
    }
    assert!(store.add("Andor").await.is_err());

    let report = store.load().await.unwrap();
    assert_eq!(report.mode, SyncMode::Online);
    assert_eq!(report.series, names);
}

#[tokio::test]
async fn test_unconfigured_gateway_is_offline_mode() {
    let mut store = SeriesStore::new(Arc::new(MemoryCache::new()), None);
    let report = store.load().await.unwrap();
    assert_eq!(report.mode, SyncMode::Offline);
    assert!(report.series.is_empty());
    assert!(!store.is_online_capable());
}

#[tokio::test]
async fn test_failed_replication_keeps_local_commit() {
    let cache = Arc::new(MemoryCache::new());
    let gateway = Arc::new(MemoryGateway::new());
    let mut store = gateway_store(cache.clone(), &gateway);
    store.load().await.unwrap();

    gateway.set_offline(true);
    let outcome = store.add("The Bear").await.unwrap();
    assert!(matches!(outcome, Replication::Failed(_)));
    assert!(outcome.warning().is_some());
    assert_eq!(store.series(), ["The Bear"]);
    assert_eq!(cache.get(KEY_SERIES).unwrap().as_deref(), Some(r#"["The Bear"]"#));
    assert!(gateway.series().is_empty());

    // Once reachable again, the next load makes the gateway authoritative.
    gateway.set_offline(false);
    let report = store.load().await.unwrap();
    assert_eq!(report.mode, SyncMode::Online);
    assert!(report.series.is_empty());
}

#[tokio::test]
async fn test_mutations_replicate_when_online() {
    let gateway = Arc::new(MemoryGateway::new());
    let mut store = gateway_store(Arc::new(MemoryCache::new()), &gateway);

    assert_eq!(store.add("Severance").await.unwrap(), Replication::Synced);
    assert_eq!(store.add("Shogun").await.unwrap(), Replication::Synced);
    assert_eq!(store.remove("Severance").await.unwrap(), Replication::Synced);
    assert_eq!(gateway.series(), vec!["Shogun"]);

    // Removing an absent name never reaches the gateway.
    let before = gateway.calls().len();
    assert_eq!(store.remove("Severance").await.unwrap(), Replication::Skipped);
    assert_eq!(gateway.calls().len(), before);

    assert_eq!(store.set_notif_enabled(true).await.unwrap(), Replication::Synced);
    assert_eq!(gateway.settings().and_then(|s| s.notif_enabled), Some(true));
}

#[tokio::test]
async fn test_last_checked_never_regresses() {
    let gateway = Arc::new(MemoryGateway::new());
    let mut store = gateway_store(Arc::new(MemoryCache::new()), &gateway);

    let newer = Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap();
    let older = Utc.with_ymd_and_hms(2025, 3, 7, 9, 0, 0).unwrap();

    assert_eq!(store.record_check(newer).await.unwrap(), Replication::Synced);
    assert_eq!(store.record_check(older).await.unwrap(), Replication::Skipped);
    assert_eq!(store.settings().last_checked_at, Some(newer));

    // A remote row holding an older value does not roll the local one back.
    let stale_remote = Arc::new(MemoryGateway::with_state(
        &[],
        Some(RemoteSettings {
            notif_enabled: Some(false),
            last_checked_at: Some(older),
        }),
    ));
    let cache = Arc::new(MemoryCache::new());
    let mut local = SeriesStore::new(cache.clone(), None);
    local.record_check(newer).await.unwrap();
    let mut store = gateway_store(cache, &stale_remote);
    let report = store.load().await.unwrap();
    assert_eq!(report.settings.last_checked_at, Some(newer));
}

#[tokio::test]
async fn test_disk_cache_survives_restart() {
    let ctx = TestContext::new();
    {
        let mut store = SeriesStore::new(Arc::new(DiskCache::open(&ctx).unwrap()), None);
        store.add("Severance").await.unwrap();
        store.set_notif_enabled(true).await.unwrap();
    }

    let store = SeriesStore::new(Arc::new(DiskCache::open(&ctx).unwrap()), None);
    assert_eq!(store.series(), ["Severance"]);
    assert!(store.settings().notif_enabled);
}

#[tokio::test]
async fn test_local_storage_failure_is_surfaced() {
    let ctx = TestContext::new();
    let path = ctx.get_data_dir().unwrap().join("missing").join("cache.json");
    let gateway = Arc::new(MemoryGateway::new());
    let mut store = gateway_store(Arc::new(DiskCache::new(path)), &gateway);

    let err = store.add("Severance").await.unwrap_err();
    assert!(matches!(err, TrackerError::LocalStorage(_)));
    assert!(err.is_local_storage());
    // Nothing was committed anywhere.
    assert!(store.series().is_empty());
    assert!(gateway.series().is_empty());
}

#[tokio::test]
async fn test_remote_duplicates_and_empty_rows_are_dropped() {
    let cache = Arc::new(MemoryCache::new());
    let gateway = Arc::new(MemoryGateway::with_state(
        &["Severance", "Severance", "", "Andor", "Severance"],
        None,
    ));
    let mut store = gateway_store(cache.clone(), &gateway);

    let report = store.load().await.unwrap();
    assert_eq!(report.mode, SyncMode::Online);
    assert_eq!(report.series, ["Severance", "Andor"]);
    assert_eq!(
        cache.get(KEY_SERIES).unwrap().as_deref(),
        Some(r#"["Severance","Andor"]"#)
    );

    // The cleaned list still rejects a re-add.
    assert!(matches!(
        store.add("Severance").await,
        Err(TrackerError::Duplicate(_))
    ));
}

#[tokio::test]
async fn test_settings_writes_surface_local_storage_failure() {
    let ctx = TestContext::new();
    let path = ctx.get_data_dir().unwrap().join("missing").join("cache.json");
    let gateway = Arc::new(MemoryGateway::new());
    let mut store = gateway_store(Arc::new(DiskCache::new(path)), &gateway);

    let err = store.set_notif_enabled(true).await.unwrap_err();
    assert!(err.is_local_storage());
    assert!(!store.settings().notif_enabled);

    let at = Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap();
    let err = store.record_check(at).await.unwrap_err();
    assert!(err.is_local_storage());
    assert_eq!(store.settings().last_checked_at, None);

    // Neither write reached the remote store.
    assert!(gateway.calls().is_empty());
    assert_eq!(gateway.settings(), None);
}
