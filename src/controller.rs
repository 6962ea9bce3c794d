// File: src/controller.rs
//! Central tracker workflows.
//! Every front end (CLI commands, the daemon loop) delegates here so that
//! add/remove/check/toggle behave the same whether invoked by a person or
//! by the weekly schedule.
use crate::cache::DiskCache;
use crate::client::{GenerativeLookupClient, PersistenceGateway, RestGateway, StatusLookup};
use crate::config::Config;
use crate::context::AppContext;
use crate::error::{Result, TrackerError};
use crate::model::parser::parse_sections;
use crate::model::CheckReport;
use crate::notify::{DesktopNotifier, NotificationBackend, NotificationGate, NotificationPermission};
use crate::scheduler::{ScheduledTick, WeeklyScheduler};
use crate::store::{LoadReport, Replication, SeriesStore};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

pub const APP_NAME: &str = "Episodic";
const SUMMARY_TITLE: &str = "Weekly series check";
const FAILURE_BODY: &str = "Could not check your series this week. Run a manual check to retry.";

/// What a notification toggle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Enabled,
    Disabled,
    /// The user was asked and declined; the flag stays off.
    PermissionDenied,
    /// Permission is denied or unsupported; nothing was changed or requested.
    Unavailable(NotificationPermission),
}

/// Coordinates the store, the lookup provider, the notification gate and
/// the weekly scheduler. Cheap to clone; all parts are shared.
#[derive(Clone)]
pub struct TrackerController {
    pub store: Arc<Mutex<SeriesStore>>,
    pub lookup: Arc<dyn StatusLookup>,
    pub gate: Arc<Mutex<NotificationGate>>,
    pub scheduler: Arc<Mutex<WeeklyScheduler>>,
}

impl TrackerController {
    pub fn new(
        store: SeriesStore,
        lookup: Arc<dyn StatusLookup>,
        gate: NotificationGate,
        scheduler: WeeklyScheduler,
    ) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            lookup,
            gate: Arc::new(Mutex::new(gate)),
            scheduler: Arc::new(Mutex::new(scheduler)),
        }
    }

    /// Wires the production collaborators from `config`.
    ///
    /// An empty gateway URL yields an offline-only store; that is a mode, not
    /// an error. A configured but unbuildable gateway is an error.
    pub fn from_config(
        ctx: &dyn AppContext,
        config: &Config,
    ) -> anyhow::Result<(Self, mpsc::Receiver<ScheduledTick>)> {
        let cache = Arc::new(DiskCache::open(ctx)?);

        let gateway: Option<Arc<dyn PersistenceGateway>> = if config.has_gateway() {
            let gw = RestGateway::new(
                &config.gateway_url,
                &config.gateway_key,
                config.request_timeout(),
            )
            .map_err(|e| anyhow::anyhow!("Failed to initialize remote store: {}", e))?;
            Some(Arc::new(gw))
        } else {
            None
        };

        let lookup = GenerativeLookupClient::new(
            &config.lookup_endpoint,
            &config.lookup_api_key,
            &config.lookup_model,
            config.request_timeout(),
        )
        .map_err(|e| anyhow::anyhow!("Failed to initialize status lookup: {}", e))?;

        let backend: Arc<dyn NotificationBackend> =
            Arc::new(DesktopNotifier::new(APP_NAME, config.notifications_supported));

        let (scheduler, ticks) = WeeklyScheduler::new(config.check_weekday()?, config.check_time()?);

        let controller = Self::new(
            SeriesStore::new(cache, gateway),
            Arc::new(lookup),
            NotificationGate::new(backend),
            scheduler,
        );
        Ok((controller, ticks))
    }

    fn collect_warning(warnings: &mut Vec<String>, replication: Replication) {
        if let Some(w) = replication.warning() {
            warnings.push(w);
        }
    }

    /// Loads state and arms the schedule to match it.
    pub async fn start(&self) -> Result<LoadReport> {
        let report = self.store.lock().await.load().await?;
        self.sync_schedule().await;
        Ok(report)
    }

    /// Disarms, then re-arms if notifications are enabled and granted.
    ///
    /// Called after every change to either input so a stale timer can never
    /// outlive a disable.
    pub async fn sync_schedule(&self) {
        let enabled = self.store.lock().await.settings().notif_enabled;
        let granted = self.gate.lock().await.is_granted();

        let next = {
            let mut scheduler = self.scheduler.lock().await;
            scheduler.disarm();
            if enabled && granted {
                Some(scheduler.arm())
            } else {
                None
            }
        };

        if let Err(e) = self.store.lock().await.record_next_due(next) {
            log::warn!("Could not record next check time: {}", e);
        }
    }

    pub async fn add_series(&self, name: &str) -> Result<Vec<String>> {
        let mut warnings = Vec::new();
        let replication = self.store.lock().await.add(name).await?;
        Self::collect_warning(&mut warnings, replication);
        Ok(warnings)
    }

    /// Returns `None` when `name` was not tracked and nothing changed.
    pub async fn remove_series(&self, name: &str) -> Result<Option<Vec<String>>> {
        let replication = self.store.lock().await.remove(name).await?;
        if replication == Replication::Skipped {
            return Ok(None);
        }
        let mut warnings = Vec::new();
        Self::collect_warning(&mut warnings, replication);
        Ok(Some(warnings))
    }

    /// Persists the flag and re-arms the schedule accordingly.
    pub async fn set_notif_enabled(&self, enabled: bool) -> Result<Vec<String>> {
        let mut warnings = Vec::new();
        let replication = self.store.lock().await.set_notif_enabled(enabled).await?;
        Self::collect_warning(&mut warnings, replication);
        self.sync_schedule().await;
        Ok(warnings)
    }

    /// User-facing enable/disable control.
    ///
    /// Disabling always works. Enabling needs `Granted`; from `Default` the
    /// platform is asked first. From `Denied`/`Unsupported` nothing happens.
    pub async fn toggle_notifications(&self) -> Result<ToggleOutcome> {
        let enabled = self.store.lock().await.settings().notif_enabled;
        if enabled {
            self.set_notif_enabled(false).await?;
            return Ok(ToggleOutcome::Disabled);
        }

        let permission = self.gate.lock().await.current_permission();
        match permission {
            NotificationPermission::Granted => {
                self.set_notif_enabled(true).await?;
                Ok(ToggleOutcome::Enabled)
            }
            NotificationPermission::Default => {
                let answer = self.gate.lock().await.request_permission().await;
                if answer == NotificationPermission::Granted {
                    self.set_notif_enabled(true).await?;
                    Ok(ToggleOutcome::Enabled)
                } else {
                    // Permission changed; keep the schedule in line with it.
                    self.sync_schedule().await;
                    Ok(ToggleOutcome::PermissionDenied)
                }
            }
            NotificationPermission::Denied | NotificationPermission::Unsupported => {
                Ok(ToggleOutcome::Unavailable(permission))
            }
        }
    }

    /// Lookup, record and parse. Shared by the manual and scheduled paths.
    async fn perform_check(&self) -> Result<Option<CheckReport>> {
        let names = self.store.lock().await.series().to_vec();
        if names.is_empty() {
            log::debug!("Nothing tracked; skipping status check");
            return Ok(None);
        }

        log::info!("Checking status of {} series", names.len());
        let response = self.lookup.check_statuses(&names).await?;
        let checked_at = Utc::now();

        let replication = self.store.lock().await.record_check(checked_at).await?;
        if let Some(w) = replication.warning() {
            log::warn!("{}", w);
        }

        let sections = parse_sections(&response.text);
        if sections.is_empty() {
            log::warn!("Status text contained no per-series sections");
        }

        Ok(Some(CheckReport {
            checked_at,
            text: response.text,
            sections,
            sources: response.sources,
        }))
    }

    /// Manual check. Lookup failures are returned to the caller.
    pub async fn check_now(&self) -> Result<Option<CheckReport>> {
        self.perform_check().await
    }

    /// Scheduled check. Never fails: results and failures become notifications.
    pub async fn run_scheduled_check(&self) -> Option<CheckReport> {
        match self.perform_check().await {
            Ok(Some(report)) => {
                self.announce(&report).await;
                Some(report)
            }
            Ok(None) => None,
            Err(e) => {
                log::error!("Scheduled status check failed: {}", e);
                self.gate.lock().await.notify(SUMMARY_TITLE, FAILURE_BODY);
                None
            }
        }
    }

    async fn announce(&self, report: &CheckReport) {
        let good_news: Vec<_> = report.good_news().collect();
        let summary = match good_news.len() {
            0 => format!(
                "Checked {} series. No new episodes or seasons.",
                report.sections.len()
            ),
            1 => format!("Checked {} series. 1 has news.", report.sections.len()),
            n => format!("Checked {} series. {} have news.", report.sections.len(), n),
        };

        let gate = self.gate.lock().await;
        gate.notify(SUMMARY_TITLE, &summary);
        for section in good_news {
            gate.notify(&section.title, &section.headline());
        }
    }

    /// Runs the scheduled check for `tick` unless the schedule changed since it fired.
    pub async fn handle_tick(&self, tick: ScheduledTick) -> Option<CheckReport> {
        if !self.scheduler.lock().await.accepts(&tick) {
            log::debug!("Dropping stale tick (generation {})", tick.generation);
            return None;
        }
        self.run_scheduled_check().await
    }

    /// Serves ticks until the channel closes.
    pub async fn serve_ticks(&self, mut ticks: mpsc::Receiver<ScheduledTick>) {
        while let Some(tick) = ticks.recv().await {
            self.handle_tick(tick).await;
        }
    }

    pub async fn permission(&self) -> NotificationPermission {
        self.gate.lock().await.current_permission()
    }

    /// Surfaces local storage failures as-is; everything else is a plain message.
    pub fn describe_error(err: &TrackerError) -> String {
        if err.is_local_storage() {
            format!("{} (changes cannot be saved on this machine)", err)
        } else {
            err.to_string()
        }
    }
}
