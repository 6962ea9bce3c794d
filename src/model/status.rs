// File: ./src/model/status.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{EnumIter, IntoEnumIterator};

/// Classification of one series' status text.
///
/// Variants are declared in priority order: when a body carries more than
/// one marker glyph, the earliest variant wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter)]
pub enum StatusClassification {
    AvailableNow,
    SeasonConfirmed,
    InProduction,
    RenewalPending,
    Ended,
    Unknown,
}

impl StatusClassification {
    /// The glyph the lookup provider is asked to emit for this status.
    pub fn marker(&self) -> Option<&'static str> {
        match self {
            StatusClassification::AvailableNow => Some("✅"),
            StatusClassification::SeasonConfirmed => Some("📅"),
            StatusClassification::InProduction => Some("🎬"),
            StatusClassification::RenewalPending => Some("⏳"),
            StatusClassification::Ended => Some("❌"),
            StatusClassification::Unknown => None,
        }
    }

    /// Human label paired with the marker in the provider prompt.
    pub fn label(&self) -> &'static str {
        match self {
            StatusClassification::AvailableNow => "New Episodes Available",
            StatusClassification::SeasonConfirmed => "New Season Confirmed",
            StatusClassification::InProduction => "In Production",
            StatusClassification::RenewalPending => "Awaiting Renewal",
            StatusClassification::Ended => "Ended",
            StatusClassification::Unknown => "Unknown",
        }
    }

    /// Whether a scheduled check should raise a per-series alert.
    pub fn is_good_news(&self) -> bool {
        matches!(
            self,
            StatusClassification::AvailableNow
                | StatusClassification::SeasonConfirmed
                | StatusClassification::InProduction
        )
    }
}

impl fmt::Display for StatusClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.marker() {
            Some(marker) => write!(f, "{} {}", marker, self.label()),
            None => write!(f, "{}", self.label()),
        }
    }
}

/// Classifies a section body by marker glyph presence.
///
/// Pure and cheap; callers recompute it whenever they need it.
pub fn classify(body: &str) -> StatusClassification {
    StatusClassification::iter()
        .find(|c| c.marker().is_some_and(|m| body.contains(m)))
        .unwrap_or(StatusClassification::Unknown)
}

/// One per-series block of the provider's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSection {
    /// Series name as written in the header, or empty if unparsable.
    pub title: String,
    pub body: String,
}

impl StatusSection {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }

    pub fn classification(&self) -> StatusClassification {
        classify(&self.body)
    }

    /// Short status line for notifications.
    ///
    /// Picks the first body line carrying the winning marker and strips a
    /// leading `Status:` label; falls back to the first non-blank line.
    pub fn headline(&self) -> String {
        let tidy = |line: &str| {
            let line = line.trim();
            let line = line.trim_start_matches(['*', '-', ' ']);
            line.strip_prefix("Status:")
                .unwrap_or(line)
                .trim()
                .trim_matches('*')
                .trim()
                .to_string()
        };

        if let Some(marker) = self.classification().marker()
            && let Some(line) = self.body.lines().find(|l| l.contains(marker))
        {
            return tidy(line);
        }
        self.body
            .lines()
            .find(|l| !l.trim().is_empty())
            .map(tidy)
            .unwrap_or_default()
    }
}

/// Citation returned alongside the status text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSource {
    pub uri: String,
    pub title: String,
}

/// Outcome of one successful status check.
#[derive(Debug, Clone)]
pub struct CheckReport {
    pub checked_at: DateTime<Utc>,
    pub text: String,
    pub sections: Vec<StatusSection>,
    pub sources: Vec<StatusSource>,
}

impl CheckReport {
    pub fn good_news(&self) -> impl Iterator<Item = &StatusSection> {
        self.sections
            .iter()
            .filter(|s| s.classification().is_good_news())
    }
}
