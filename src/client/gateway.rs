// File: src/client/gateway.rs
//! Remote list/settings store.
//!
//! `PersistenceGateway` is the seam the reconciliation store talks to.
//! `RestGateway` speaks to a PostgREST-style endpoint with two tables:
//! `tracked_series(name, created_at)` and a single-row
//! `tracker_settings(id = 1, notif_enabled, last_checked_at)`.
use crate::error::GatewayError;
use crate::model::{RemoteSettings, SettingsPatch};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn list_series(&self) -> Result<Vec<String>, GatewayError>;
    async fn add_series(&self, name: &str) -> Result<(), GatewayError>;
    async fn remove_series(&self, name: &str) -> Result<(), GatewayError>;
    /// `None` when the settings row has never been written.
    async fn get_settings(&self) -> Result<Option<RemoteSettings>, GatewayError>;
    async fn save_settings(&self, patch: &SettingsPatch) -> Result<(), GatewayError>;
}

const SERIES_TABLE: &str = "tracked_series";
const SETTINGS_TABLE: &str = "tracker_settings";
const SETTINGS_ROW_ID: i64 = 1;

#[derive(Deserialize)]
struct SeriesRow {
    name: String,
}

#[derive(Serialize)]
struct NewSeriesRow<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct SettingsUpsert<'a> {
    id: i64,
    #[serde(flatten)]
    patch: &'a SettingsPatch,
}

#[derive(Clone, Debug)]
pub struct RestGateway {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RestGateway {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, String> {
        if base_url.trim().is_empty() {
            return Err("Gateway URL is empty".to_string());
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| e.to_string())?;
        Ok(Self {
            http,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<String, GatewayError> {
        let resp = self
            .authorized(builder)
            .send()
            .await
            .map_err(|e| GatewayError::Unreachable(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| GatewayError::Unreachable(e.to_string()))?;

        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl PersistenceGateway for RestGateway {
    async fn list_series(&self) -> Result<Vec<String>, GatewayError> {
        let req = self
            .http
            .get(self.table_url(SERIES_TABLE))
            .query(&[("select", "name"), ("order", "created_at.asc")]);
        let body = self.send(req).await?;
        let rows: Vec<SeriesRow> =
            serde_json::from_str(&body).map_err(|e| GatewayError::Decode(e.to_string()))?;
        Ok(rows.into_iter().map(|r| r.name).collect())
    }

    async fn add_series(&self, name: &str) -> Result<(), GatewayError> {
        let req = self
            .http
            .post(self.table_url(SERIES_TABLE))
            .header("Prefer", "return=minimal")
            .json(&NewSeriesRow { name });
        self.send(req).await.map(|_| ())
    }

    async fn remove_series(&self, name: &str) -> Result<(), GatewayError> {
        let filter = format!("eq.{}", name);
        let req = self
            .http
            .delete(self.table_url(SERIES_TABLE))
            .query(&[("name", filter.as_str())]);
        self.send(req).await.map(|_| ())
    }

    async fn get_settings(&self) -> Result<Option<RemoteSettings>, GatewayError> {
        let id_filter = format!("eq.{}", SETTINGS_ROW_ID);
        let req = self.http.get(self.table_url(SETTINGS_TABLE)).query(&[
            ("id", id_filter.as_str()),
            ("select", "notif_enabled,last_checked_at"),
        ]);
        let body = self.send(req).await?;
        let mut rows: Vec<RemoteSettings> =
            serde_json::from_str(&body).map_err(|e| GatewayError::Decode(e.to_string()))?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.swap_remove(0))
        })
    }

    async fn save_settings(&self, patch: &SettingsPatch) -> Result<(), GatewayError> {
        let req = self
            .http
            .post(self.table_url(SETTINGS_TABLE))
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&SettingsUpsert {
                id: SETTINGS_ROW_ID,
                patch,
            });
        self.send(req).await.map(|_| ())
    }
}

/// In-process gateway for tests. Can be switched offline to simulate an
/// unreachable remote; every call made while offline fails with `Unreachable`.
#[derive(Debug, Default)]
pub struct MemoryGateway {
    offline: AtomicBool,
    series: Mutex<Vec<String>>,
    settings: Mutex<Option<RemoteSettings>>,
    calls: Mutex<Vec<String>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(series: &[&str], settings: Option<RemoteSettings>) -> Self {
        let gw = Self::default();
        *lock(&gw.series) = series.iter().map(|s| s.to_string()).collect();
        *lock(&gw.settings) = settings;
        gw
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn series(&self) -> Vec<String> {
        lock(&self.series).clone()
    }

    pub fn settings(&self) -> Option<RemoteSettings> {
        lock(&self.settings).clone()
    }

    /// Names of the operations attempted so far, failed ones included.
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    fn enter(&self, op: &str) -> Result<(), GatewayError> {
        lock(&self.calls).push(op.to_string());
        if self.offline.load(Ordering::SeqCst) {
            Err(GatewayError::Unreachable("memory gateway is offline".to_string()))
        } else {
            Ok(())
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl PersistenceGateway for MemoryGateway {
    async fn list_series(&self) -> Result<Vec<String>, GatewayError> {
        self.enter("list_series")?;
        Ok(self.series())
    }

    async fn add_series(&self, name: &str) -> Result<(), GatewayError> {
        self.enter("add_series")?;
        lock(&self.series).push(name.to_string());
        Ok(())
    }

    async fn remove_series(&self, name: &str) -> Result<(), GatewayError> {
        self.enter("remove_series")?;
        lock(&self.series).retain(|s| s != name);
        Ok(())
    }

    async fn get_settings(&self) -> Result<Option<RemoteSettings>, GatewayError> {
        self.enter("get_settings")?;
        Ok(self.settings())
    }

    async fn save_settings(&self, patch: &SettingsPatch) -> Result<(), GatewayError> {
        self.enter("save_settings")?;
        let mut settings = lock(&self.settings);
        let row = settings.get_or_insert_with(RemoteSettings::default);
        if let Some(enabled) = patch.notif_enabled {
            row.notif_enabled = Some(enabled);
        }
        if let Some(at) = patch.last_checked_at {
            row.last_checked_at = Some(at);
        }
        Ok(())
    }
}
