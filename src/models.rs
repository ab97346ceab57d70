// Core data structures for the ticketwatch monitor

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A named page being monitored for ticket availability
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MonitoredTarget {
    /// Unique human-readable name
    pub name: String,
    /// Page URL
    pub url: String,
}

impl MonitoredTarget {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

impl fmt::Display for MonitoredTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.url)
    }
}

/// Observed availability of a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    /// No successful check yet
    Unknown,
    /// Last successful check found no bookable signal
    Unavailable,
    /// Last successful check found tickets bookable
    Available,
}

impl Availability {
    pub fn from_signal(bookable: Option<bool>) -> Self {
        match bookable {
            None => Self::Unknown,
            Some(false) => Self::Unavailable,
            Some(true) => Self::Available,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Unavailable => "unavailable",
            Self::Available => "available",
        }
    }

    /// Status glyph used in chat messages
    pub fn glyph(&self) -> &'static str {
        match self {
            Self::Unknown => "❔",
            Self::Unavailable => "❌",
            Self::Available => "✅",
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-target state kept in memory for the lifetime of the process
#[derive(Debug, Clone, Serialize)]
pub struct AvailabilityState {
    pub target: MonitoredTarget,

    /// Bookable signal from the last successful check, `None` until one succeeds
    pub last_known_bookable: Option<bool>,

    /// Time of the last successful check
    pub last_checked_at: Option<DateTime<Utc>>,

    /// Page title seen on the last successful check
    pub title: Option<String>,

    /// Detector status line from the last successful check
    pub last_status: Option<String>,

    /// Error from the most recent failed fetch, cleared on success
    pub last_error: Option<String>,

    /// Time of the most recent failed fetch
    pub last_error_at: Option<DateTime<Utc>>,

    /// Fetch failures since the last success
    pub consecutive_failures: u32,

    /// Transitions to available seen for this target
    pub transitions: u64,
}

impl AvailabilityState {
    pub fn new(target: MonitoredTarget) -> Self {
        Self {
            target,
            last_known_bookable: None,
            last_checked_at: None,
            title: None,
            last_status: None,
            last_error: None,
            last_error_at: None,
            consecutive_failures: 0,
            transitions: 0,
        }
    }

    pub fn availability(&self) -> Availability {
        Availability::from_signal(self.last_known_bookable)
    }
}

/// Ephemeral notification handed to the notifier
#[derive(Debug, Clone, Serialize)]
pub struct NotificationEvent {
    pub id: uuid::Uuid,
    pub target: MonitoredTarget,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}
