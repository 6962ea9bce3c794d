// File: ./src/model/series.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-installation tracker settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerSettings {
    pub notif_enabled: bool,
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl TrackerSettings {
    /// Applies a check timestamp without ever moving backwards.
    ///
    /// Returns `true` if the stored value changed.
    pub fn advance_last_checked(&mut self, at: DateTime<Utc>) -> bool {
        match self.last_checked_at {
            Some(prev) if prev >= at => false,
            _ => {
                self.last_checked_at = Some(at);
                true
            }
        }
    }
}

/// Partial settings update sent to the remote store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SettingsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notif_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl SettingsPatch {
    pub fn notif_enabled(enabled: bool) -> Self {
        Self {
            notif_enabled: Some(enabled),
            ..Self::default()
        }
    }

    pub fn last_checked_at(at: DateTime<Utc>) -> Self {
        Self {
            last_checked_at: Some(at),
            ..Self::default()
        }
    }
}

/// Settings row as stored remotely; every column is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RemoteSettings {
    #[serde(default)]
    pub notif_enabled: Option<bool>,
    #[serde(default)]
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl RemoteSettings {
    /// Remote values win; columns the remote left null keep the local value.
    /// The check timestamp keeps whichever side is newer so it never regresses.
    pub fn merge_into(&self, local: TrackerSettings) -> TrackerSettings {
        let last_checked_at = match (self.last_checked_at, local.last_checked_at) {
            (Some(remote), Some(local)) => Some(remote.max(local)),
            (remote, local) => remote.or(local),
        };
        TrackerSettings {
            notif_enabled: self.notif_enabled.unwrap_or(local.notif_enabled),
            last_checked_at,
        }
    }
}
