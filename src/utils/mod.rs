//! Common utilities and helper functions
//!
//! This module provides shared utilities used across the application.

pub mod error;
pub mod retry;

use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use url::Url;

/// Normalize whitespace in text
pub fn normalize_whitespace(text: &str) -> String {
    static WHITESPACE_RE: OnceLock<Regex> = OnceLock::new();

    let re = WHITESPACE_RE.get_or_init(|| Regex::new(r"\s+").expect("Invalid regex pattern"));

    re.replace_all(text.trim(), " ").to_string()
}

/// Parse an absolute http(s) URL
pub fn parse_http_url(raw: &str) -> Option<Url> {
    let parsed = Url::parse(raw.trim()).ok()?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Some(parsed),
        _ => None,
    }
}

/// Derive a human-readable target name from a page URL
///
/// Uses the last path segment that is not a numeric/opaque event id, so
/// `https://in.bookmyshow.com/movies/mumbai/param-sundari-hindi/ET00426409`
/// becomes `param-sundari-hindi`. Falls back to the host name.
pub fn name_from_url(url: &Url) -> String {
    static EVENT_ID_RE: OnceLock<Regex> = OnceLock::new();
    let event_id = EVENT_ID_RE.get_or_init(|| Regex::new(r"^[A-Z]{2}\d+$|^\d+$").expect("Invalid regex pattern"));

    url.path_segments()
        .and_then(|segments| {
            segments
                .filter(|s| !s.is_empty() && !event_id.is_match(s))
                .last()
                .map(|s| s.to_string())
        })
        .or_else(|| url.host_str().map(|h| h.to_string()))
        .unwrap_or_else(|| url.to_string())
}

/// Truncate text to a maximum number of characters
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}

/// Await a spawned task until `deadline`, aborting it once the deadline passes
///
/// Returns `Ok(None)` when the task was aborted.
pub async fn join_until<T>(
    mut task: JoinHandle<T>,
    deadline: Instant,
) -> Result<Option<T>, JoinError> {
    match tokio::time::timeout_at(deadline, &mut task).await {
        Ok(joined) => joined.map(Some),
        Err(_) => {
            task.abort();
            Ok(None)
        }
    }
}

/// Format a duration as a compact human-readable string (`1h 2m 3s`)
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);

    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}
