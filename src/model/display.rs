// File: ./src/model/display.rs
use crate::model::status::{CheckReport, StatusClassification, StatusSection};
use chrono::{DateTime, Local, Utc};

pub trait SectionDisplay {
    fn badge(&self) -> &'static str;
    fn to_report_line(&self) -> String;
}

impl SectionDisplay for StatusSection {
    fn badge(&self) -> &'static str {
        match self.classification() {
            StatusClassification::AvailableNow => "[NEW]",
            StatusClassification::SeasonConfirmed => "[SEASON]",
            StatusClassification::InProduction => "[FILMING]",
            StatusClassification::RenewalPending => "[PENDING]",
            StatusClassification::Ended => "[ENDED]",
            StatusClassification::Unknown => "[?]",
        }
    }

    fn to_report_line(&self) -> String {
        let title = if self.title.is_empty() {
            "(untitled)"
        } else {
            self.title.as_str()
        };
        let headline = self.headline();
        if headline.is_empty() {
            format!("{:<10} {}", self.badge(), title)
        } else {
            format!("{:<10} {}: {}", self.badge(), title, headline)
        }
    }
}

/// Formats a timestamp for people, in local time.
pub fn format_timestamp(at: Option<DateTime<Utc>>) -> String {
    match at {
        Some(at) => at
            .with_timezone(&Local)
            .format("%a %Y-%m-%d %H:%M")
            .to_string(),
        None => "never".to_string(),
    }
}

/// Plain-text rendering of a report: one line per section, then the
/// full body of each section, then sources.
pub fn render_report(report: &CheckReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Checked {} series at {}\n\n",
        report.sections.len(),
        format_timestamp(Some(report.checked_at))
    ));

    if report.sections.is_empty() {
        out.push_str("The provider answered without any per-series sections:\n\n");
        out.push_str(report.text.trim());
        out.push('\n');
    }

    for section in &report.sections {
        out.push_str(&section.to_report_line());
        out.push('\n');
    }

    for section in &report.sections {
        out.push_str(&format!("\n== {} ==\n", section.title));
        out.push_str(section.body.trim());
        out.push('\n');
    }

    if !report.sources.is_empty() {
        out.push_str("\nSources:\n");
        for source in &report.sources {
            let label = if source.title.is_empty() {
                source.uri.as_str()
            } else {
                source.title.as_str()
            };
            out.push_str(&format!("  - {} <{}>\n", label, source.uri));
        }
    }
    out
}
