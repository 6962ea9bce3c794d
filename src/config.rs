// File: ./src/config.rs
// Handles configuration loading, saving, and defaults.
use crate::context::AppContext;
use crate::storage::LocalStorage;
use anyhow::{Error, Result};
use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::fs;

fn default_lookup_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_lookup_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_check_weekday() -> String {
    "Fri".to_string()
}
fn default_check_time() -> String {
    "09:00".to_string()
}
fn default_true() -> bool {
    true
}
fn default_request_timeout() -> u64 {
    60
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Config {
    /// Base URL of the remote list/settings store. Empty means offline-only.
    #[serde(default)]
    pub gateway_url: String,
    #[serde(default)]
    pub gateway_key: String,

    #[serde(default = "default_lookup_endpoint")]
    pub lookup_endpoint: String,
    #[serde(default)]
    pub lookup_api_key: String,
    #[serde(default = "default_lookup_model")]
    pub lookup_model: String,

    /// Three-letter English weekday, e.g. "Fri".
    #[serde(default = "default_check_weekday")]
    pub check_weekday: String,
    #[serde(default = "default_check_time")]
    pub check_time: String, // Format "HH:MM"

    #[serde(default = "default_true")]
    pub notifications_supported: bool,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gateway_url: String::new(),
            gateway_key: String::new(),
            lookup_endpoint: default_lookup_endpoint(),
            lookup_api_key: String::new(),
            lookup_model: default_lookup_model(),
            check_weekday: default_check_weekday(),
            check_time: default_check_time(),
            notifications_supported: true,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Config {
    /// Load the configuration from disk using an explicit context.
    /// Returns a contextualized error if reading or parsing fails.
    pub fn load(ctx: &dyn AppContext) -> Result<Self> {
        let path = ctx.get_config_file_path()?;

        // Explicitly detect missing file so callers can fall back to defaults.
        if !path.exists() {
            return Err(anyhow::anyhow!("Config file not found"));
        }

        let contents = fs::read_to_string(&path).map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
        })?;

        let config: Config = toml::from_str(&contents).map_err(|e| {
            anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e)
        })?;

        Ok(config)
    }

    /// Loads the config. A missing file is replaced by the defaults, which
    /// are also written out so there is a file to edit. A present but broken
    /// file is still an error.
    pub fn load_or_init(ctx: &dyn AppContext) -> Result<Self> {
        match Self::load(ctx) {
            Ok(config) => Ok(config),
            Err(e) if Self::is_missing_config_error(&e) => {
                let config = Self::default();
                match config.save(ctx) {
                    Ok(()) => log::info!("Wrote default config to {:?}", ctx.get_config_file_path().ok()),
                    Err(e) => log::warn!("Could not write default config: {}", e),
                }
                Ok(config)
            }
            Err(e) => Err(e),
        }
    }

    /// Helper to detect whether an anyhow::Error indicates that the config file was missing.
    pub fn is_missing_config_error(err: &Error) -> bool {
        if err.to_string().contains("Config file not found") {
            return true;
        }

        // Walk the error chain and look for an underlying IO NotFound.
        err.chain().any(|cause| {
            cause
                .downcast_ref::<std::io::Error>()
                .is_some_and(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
        })
    }

    /// Save configuration using an explicit context.
    pub fn save(&self, ctx: &dyn AppContext) -> Result<()> {
        let path = ctx.get_config_file_path()?;
        LocalStorage::with_lock(&path, || {
            let toml_str = toml::to_string_pretty(self)?;
            LocalStorage::atomic_write(&path, toml_str)?;
            Ok(())
        })?;
        Ok(())
    }

    pub fn has_gateway(&self) -> bool {
        !self.gateway_url.trim().is_empty()
    }

    pub fn check_weekday(&self) -> Result<Weekday> {
        self.check_weekday
            .trim()
            .parse::<Weekday>()
            .map_err(|_| anyhow::anyhow!("Invalid check_weekday '{}'", self.check_weekday))
    }

    pub fn check_time(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(self.check_time.trim(), "%H:%M")
            .map_err(|e| anyhow::anyhow!("Invalid check_time '{}': {}", self.check_time, e))
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TestContext;

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let ctx = TestContext::new();
        let err = Config::load(&ctx).unwrap_err();
        assert!(Config::is_missing_config_error(&err));

        let config = Config::load_or_init(&ctx).unwrap();
        // The defaults were written out and load back unchanged.
        let written = Config::load(&ctx).unwrap();
        assert_eq!(written.lookup_model, config.lookup_model);
        assert_eq!(written.check_weekday, "Fri");
        assert!(!config.has_gateway());
        assert_eq!(config.check_weekday().unwrap(), Weekday::Fri);
        assert_eq!(
            config.check_time().unwrap(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_partial_file_uses_serde_defaults() {
        let ctx = TestContext::new();
        fs::write(
            ctx.get_config_file_path().unwrap(),
            "gateway_url = \"https://db.example.org\"\ncheck_weekday = \"Mon\"\n",
        )
        .unwrap();

        let config = Config::load_or_init(&ctx).unwrap();
        assert!(config.has_gateway());
        assert_eq!(config.check_weekday().unwrap(), Weekday::Mon);
        assert_eq!(config.lookup_model, "gemini-2.5-flash");
        assert!(config.notifications_supported);
    }

    #[test]
    fn test_broken_file_is_an_error() {
        let ctx = TestContext::new();
        fs::write(ctx.get_config_file_path().unwrap(), "gateway_url = [").unwrap();
        let err = Config::load_or_init(&ctx).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_save_then_load() {
        let ctx = TestContext::new();
        let config = Config {
            check_time: "20:30".to_string(),
            ..Config::default()
        };
        config.save(&ctx).unwrap();

        let loaded = Config::load(&ctx).unwrap();
        assert_eq!(
            loaded.check_time().unwrap(),
            NaiveTime::from_hms_opt(20, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_invalid_schedule_values() {
        let config = Config {
            check_weekday: "Someday".to_string(),
            check_time: "25:99".to_string(),
            ..Config::default()
        };
        assert!(config.check_weekday().is_err());
        assert!(config.check_time().is_err());
    }
}
