// File: src/model/parser.rs
//! Splits the provider's free-form answer into per-series sections.
//!
//! The format is only loosely enforced by the prompt, so this is a
//! structural splitter rather than a grammar: a line that is entirely a
//! bold pair (`**Title**`) opens a section, everything up to the next such
//! line is that section's body. Text before the first header is dropped.
//! A body line shaped like a header always opens a new section; there is
//! no escaping.
use crate::model::status::StatusSection;

/// Returns the inner title if `line` is exactly one bold pair and nothing else.
/// Trailing whitespace is tolerated; leading indentation is not.
pub fn header_title(line: &str) -> Option<&str> {
    let trimmed = line.trim_end();
    let inner = trimmed.strip_prefix("**")?.strip_suffix("**")?;
    if inner.trim().is_empty() || inner.contains("**") {
        return None;
    }
    Some(inner.trim())
}

/// Parses `text` into ordered sections. Pure: no state survives the call.
pub fn parse_sections(text: &str) -> Vec<StatusSection> {
    let mut sections = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in text.lines() {
        if let Some(title) = header_title(line) {
            if let Some((title, body)) = current.take() {
                sections.push(StatusSection::new(title, body.join("\n")));
            }
            current = Some((title.to_string(), Vec::new()));
        } else if let Some((_, body)) = current.as_mut() {
            body.push(line);
        }
    }

    if let Some((title, body)) = current {
        sections.push(StatusSection::new(title, body.join("\n")));
    }

    sections
}
