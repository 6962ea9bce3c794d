// File: ./src/notify.rs
//! Notification permission state machine and emission.
//!
//! The gate reads the platform permission once at construction. The only
//! transitions are `Default -> Granted` and `Default -> Denied`, and only
//! through an explicit `request_permission` call. `notify` is a silent no-op
//! unless permission is exactly `Granted`.
use anyhow::Result;
use async_trait::async_trait;
use notify_rust::Notification;
use std::fmt;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationPermission {
    Unsupported,
    Default,
    Denied,
    Granted,
}

impl fmt::Display for NotificationPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NotificationPermission::Unsupported => "unsupported",
            NotificationPermission::Default => "not yet requested",
            NotificationPermission::Denied => "denied",
            NotificationPermission::Granted => "granted",
        };
        write!(f, "{}", s)
    }
}

/// Platform notification API.
#[async_trait]
pub trait NotificationBackend: Send + Sync {
    fn permission(&self) -> NotificationPermission;
    /// Asks the user. Only called while the gate is in `Default`.
    async fn request_permission(&self) -> NotificationPermission;
    fn show(&self, title: &str, body: &str) -> Result<()>;
}

pub struct NotificationGate {
    backend: Arc<dyn NotificationBackend>,
    permission: NotificationPermission,
}

impl NotificationGate {
    pub fn new(backend: Arc<dyn NotificationBackend>) -> Self {
        let permission = backend.permission();
        log::debug!("Notification permission at startup: {}", permission);
        Self {
            backend,
            permission,
        }
    }

    pub fn current_permission(&self) -> NotificationPermission {
        self.permission
    }

    pub fn is_granted(&self) -> bool {
        self.permission == NotificationPermission::Granted
    }

    /// Issues a platform request from `Default`; any other state is returned
    /// unchanged without contacting the platform. The answer narrows to
    /// `Granted` or `Denied` (a dismissed prompt counts as denied for the
    /// rest of the session).
    pub async fn request_permission(&mut self) -> NotificationPermission {
        if self.permission != NotificationPermission::Default {
            return self.permission;
        }
        let answer = self.backend.request_permission().await;
        self.permission = match answer {
            NotificationPermission::Granted => NotificationPermission::Granted,
            _ => NotificationPermission::Denied,
        };
        log::info!("Notification permission is now {}", self.permission);
        self.permission
    }

    /// Shows a notification if allowed. Returns whether one was attempted.
    pub fn notify(&self, title: &str, body: &str) -> bool {
        if !self.is_granted() {
            return false;
        }
        if let Err(e) = self.backend.show(title, body) {
            log::warn!("Failed to show notification '{}': {}", title, e);
        }
        true
    }
}

// --- Desktop Implementation ---

/// Desktop notifications through the session's notification daemon.
/// Desktops do not prompt for permission, so support implies `Granted`.
#[derive(Clone, Debug)]
pub struct DesktopNotifier {
    app_name: String,
    supported: bool,
}

impl DesktopNotifier {
    pub fn new(app_name: &str, supported: bool) -> Self {
        Self {
            app_name: app_name.to_string(),
            supported,
        }
    }
}

#[async_trait]
impl NotificationBackend for DesktopNotifier {
    fn permission(&self) -> NotificationPermission {
        if self.supported {
            NotificationPermission::Granted
        } else {
            NotificationPermission::Unsupported
        }
    }

    async fn request_permission(&self) -> NotificationPermission {
        self.permission()
    }

    fn show(&self, title: &str, body: &str) -> Result<()> {
        let summary = title.to_string();
        let body = body.to_string();
        let app_name = self.app_name.clone();

        // Showing can block on the D-Bus round trip; keep it off the runtime.
        std::thread::spawn(move || {
            if let Err(e) = Notification::new()
                .summary(&summary)
                .body(&body)
                .appname(&app_name)
                .show()
            {
                log::warn!("Desktop notification failed: {}", e);
            }
        });
        Ok(())
    }
}

// --- Test Implementation ---

/// Records notifications instead of showing them. The permission it starts
/// with and the answer it gives to a request are configurable.
#[derive(Debug)]
pub struct MemoryNotifier {
    initial: NotificationPermission,
    answer: NotificationPermission,
    requests: Mutex<u32>,
    shown: Mutex<Vec<(String, String)>>,
}

impl MemoryNotifier {
    pub fn new(initial: NotificationPermission, answer: NotificationPermission) -> Self {
        Self {
            initial,
            answer,
            requests: Mutex::new(0),
            shown: Mutex::new(Vec::new()),
        }
    }

    pub fn granted() -> Self {
        Self::new(NotificationPermission::Granted, NotificationPermission::Granted)
    }

    pub fn request_count(&self) -> u32 {
        *self.requests.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn shown(&self) -> Vec<(String, String)> {
        self.shown.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait]
impl NotificationBackend for MemoryNotifier {
    fn permission(&self) -> NotificationPermission {
        self.initial
    }

    async fn request_permission(&self) -> NotificationPermission {
        *self.requests.lock().unwrap_or_else(|p| p.into_inner()) += 1;
        self.answer
    }

    fn show(&self, title: &str, body: &str) -> Result<()> {
        self.shown
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((title.to_string(), body.to_string()));
        Ok(())
    }
}
