// File: src/store.rs
//! Reconciliation between the local cache and the remote store.
//!
//! Every mutation commits to memory and the local cache first, then
//! replicates to the gateway. Replication failures are logged and reported
//! as `Replication::Failed`; local state is already correct and the next
//! successful `load()` makes the gateway authoritative again.
use crate::cache::{KEY_LAST_CHECKED, KEY_NEXT_DUE, KEY_NOTIF_ENABLED, KEY_SERIES, LocalCache};
use crate::client::PersistenceGateway;
use crate::error::{GatewayError, Result, TrackerError};
use crate::model::{SettingsPatch, TrackerSettings};
use chrono::{DateTime, Local, Utc};
use std::collections::HashSet;
use std::sync::Arc;

/// Where the data returned by `load()` came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncMode {
    /// Fetched from the gateway and mirrored into the cache.
    Online,
    /// No gateway configured; cache only.
    Offline,
    /// Gateway configured but unreachable; cache contents returned as-is.
    SyncError(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub series: Vec<String>,
    pub settings: TrackerSettings,
    pub mode: SyncMode,
}

/// Result of the remote half of a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Replication {
    Synced,
    /// No gateway configured.
    Offline,
    /// Nothing needed replicating (e.g. removing an absent name).
    Skipped,
    Failed(String),
}

impl Replication {
    pub fn warning(&self) -> Option<String> {
        match self {
            Replication::Failed(reason) => Some(format!("Saved locally; sync failed: {}", reason)),
            _ => None,
        }
    }
}

/// Drops empty names and repeated rows, keeping first occurrences in order.
///
/// The remote table has no uniqueness constraint, so retried inserts or two
/// devices adding the same name can leave duplicates behind.
fn normalize_series(series: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let before = series.len();
    let kept: Vec<String> = series
        .into_iter()
        .filter(|name| !name.is_empty() && seen.insert(name.clone()))
        .collect();
    if kept.len() != before {
        log::warn!(
            "Ignored {} empty or duplicate series rows from remote store",
            before - kept.len()
        );
    }
    kept
}

pub struct SeriesStore {
    cache: Arc<dyn LocalCache>,
    gateway: Option<Arc<dyn PersistenceGateway>>,
    series: Vec<String>,
    settings: TrackerSettings,
}

impl SeriesStore {
    /// Builds a store primed from the cache. Nothing remote is touched until `load()`.
    pub fn new(
        cache: Arc<dyn LocalCache>,
        gateway: Option<Arc<dyn PersistenceGateway>>,
    ) -> Self {
        let mut store = Self {
            cache,
            gateway,
            series: Vec::new(),
            settings: TrackerSettings::default(),
        };
        let (series, settings) = store.read_cache();
        store.series = series;
        store.settings = settings;
        store
    }

    pub fn series(&self) -> &[String] {
        &self.series
    }

    pub fn settings(&self) -> TrackerSettings {
        self.settings
    }

    pub fn is_online_capable(&self) -> bool {
        self.gateway.is_some()
    }

    // --- Cache helpers ---

    fn read_cache(&self) -> (Vec<String>, TrackerSettings) {
        let get = |key: &str| match self.cache.get(key) {
            Ok(v) => v,
            Err(e) => {
                log::warn!("Cache read of '{}' failed: {}", key, e);
                None
            }
        };

        let series = get(KEY_SERIES)
            .and_then(|raw| match serde_json::from_str::<Vec<String>>(&raw) {
                Ok(list) => Some(list),
                Err(e) => {
                    log::warn!("Ignoring unreadable cached series list: {}", e);
                    None
                }
            })
            .unwrap_or_default();

        let notif_enabled = get(KEY_NOTIF_ENABLED).is_some_and(|v| v == "true");
        let last_checked_at = get(KEY_LAST_CHECKED)
            .and_then(|v| DateTime::parse_from_rfc3339(&v).ok())
            .map(|dt| dt.with_timezone(&Utc));

        (
            series,
            TrackerSettings {
                notif_enabled,
                last_checked_at,
            },
        )
    }

    fn write_series(&self, series: &[String]) -> Result<()> {
        let json = serde_json::to_string(series)
            .map_err(|e| TrackerError::LocalStorage(anyhow::Error::from(e)))?;
        self.cache
            .set(KEY_SERIES, &json)
            .map_err(TrackerError::LocalStorage)
    }

    fn write_settings(&self, settings: &TrackerSettings) -> Result<()> {
        self.cache
            .set(
                KEY_NOTIF_ENABLED,
                if settings.notif_enabled { "true" } else { "false" },
            )
            .map_err(TrackerError::LocalStorage)?;
        if let Some(at) = settings.last_checked_at {
            self.cache
                .set(KEY_LAST_CHECKED, &at.to_rfc3339())
                .map_err(TrackerError::LocalStorage)?;
        }
        Ok(())
    }

    fn replicated(what: &str, outcome: std::result::Result<(), GatewayError>) -> Replication {
        match outcome {
            Ok(()) => Replication::Synced,
            Err(e) => {
                log::warn!("Remote sync of {} failed: {}", what, e);
                Replication::Failed(e.to_string())
            }
        }
    }

    // --- Operations ---

    /// Reconciles cache and gateway. Never fails because of the remote side.
    ///
    /// A local cache write failure while mirroring fetched data is still
    /// fatal, since the cache is the only durability guarantee.
    pub async fn load(&mut self) -> Result<LoadReport> {
        let (cached_series, cached_settings) = self.read_cache();

        let Some(gateway) = self.gateway.clone() else {
            self.series = cached_series;
            self.settings = cached_settings;
            log::info!("No remote store configured; using local cache");
            return Ok(self.report(SyncMode::Offline));
        };

        let (series, settings) = futures::join!(gateway.list_series(), gateway.get_settings());

        match (series, settings) {
            (Ok(series), Ok(remote_settings)) => {
                let series = normalize_series(series);
                let settings = match remote_settings {
                    Some(remote) => remote.merge_into(cached_settings),
                    None => cached_settings,
                };
                self.write_series(&series)?;
                self.write_settings(&settings)?;
                self.series = series;
                self.settings = settings;
                log::info!("Loaded {} series from remote store", self.series.len());
                Ok(self.report(SyncMode::Online))
            }
            (series, settings) => {
                let reason = series
                    .err()
                    .or(settings.err())
                    .map(|e| e.to_string())
                    .unwrap_or_default();
                log::warn!("Remote load failed, using local cache: {}", reason);
                self.series = cached_series;
                self.settings = cached_settings;
                Ok(self.report(SyncMode::SyncError(reason)))
            }
        }
    }

    fn report(&self, mode: SyncMode) -> LoadReport {
        LoadReport {
            series: self.series.clone(),
            settings: self.settings,
            mode,
        }
    }

    /// Appends `name`. Rejects empty names and exact duplicates.
    pub async fn add(&mut self, name: &str) -> Result<Replication> {
        if name.is_empty() {
            return Err(TrackerError::EmptyName);
        }
        if self.series.iter().any(|s| s == name) {
            return Err(TrackerError::Duplicate(name.to_string()));
        }

        let mut next = self.series.clone();
        next.push(name.to_string());
        self.write_series(&next)?;
        self.series = next;

        let Some(gateway) = self.gateway.clone() else {
            return Ok(Replication::Offline);
        };
        Ok(Self::replicated(
            &format!("add '{}'", name),
            gateway.add_series(name).await,
        ))
    }

    /// Removes `name`. Absent names are a no-op.
    pub async fn remove(&mut self, name: &str) -> Result<Replication> {
        if !self.series.iter().any(|s| s == name) {
            return Ok(Replication::Skipped);
        }

        let next: Vec<String> = self.series.iter().filter(|s| *s != name).cloned().collect();
        self.write_series(&next)?;
        self.series = next;

        let Some(gateway) = self.gateway.clone() else {
            return Ok(Replication::Offline);
        };
        Ok(Self::replicated(
            &format!("remove '{}'", name),
            gateway.remove_series(name).await,
        ))
    }

    pub async fn set_notif_enabled(&mut self, enabled: bool) -> Result<Replication> {
        let mut next = self.settings;
        next.notif_enabled = enabled;
        self.write_settings(&next)?;
        self.settings = next;

        let Some(gateway) = self.gateway.clone() else {
            return Ok(Replication::Offline);
        };
        Ok(Self::replicated(
            "notification preference",
            gateway
                .save_settings(&SettingsPatch::notif_enabled(enabled))
                .await,
        ))
    }

    /// Records a completed check. Older timestamps than the current one are ignored.
    pub async fn record_check(&mut self, at: DateTime<Utc>) -> Result<Replication> {
        let mut next = self.settings;
        if !next.advance_last_checked(at) {
            return Ok(Replication::Skipped);
        }
        self.write_settings(&next)?;
        self.settings = next;

        let Some(gateway) = self.gateway.clone() else {
            return Ok(Replication::Offline);
        };
        Ok(Self::replicated(
            "last check time",
            gateway
                .save_settings(&SettingsPatch::last_checked_at(at))
                .await,
        ))
    }

    /// Remembers the armed trigger for display. Local only.
    pub fn record_next_due(&self, next: Option<DateTime<Local>>) -> Result<()> {
        let value = next.map(|n| n.to_rfc3339()).unwrap_or_default();
        self.cache
            .set(KEY_NEXT_DUE, &value)
            .map_err(TrackerError::LocalStorage)
    }

    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.cache
            .get(KEY_NEXT_DUE)
            .ok()
            .flatten()
            .and_then(|v| DateTime::parse_from_rfc3339(&v).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }
}
