//! Availability notifications
//!
//! Builds the alert text for a target that just became bookable and hands it
//! to a [`Notifier`]. Delivery is at most once per transition: a failed send
//! is logged and never retried.

pub mod channels;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Availability, MonitoredTarget, NotificationEvent};
use crate::parser::Detection;

// Re-exports
pub use channels::telegram::{TelegramChannel, TelegramClient};
pub use channels::{ChannelResult, DeliveryStatus, Notifier};

/// Format the alert sent when a target becomes bookable
pub fn format_availability_message(
    target: &MonitoredTarget,
    detection: &Detection,
    at: DateTime<Utc>,
) -> String {
    let title = detection.title.as_deref().unwrap_or(&target.name);

    format!(
        "🎬 TICKETS AVAILABLE! 🎬\n\n\
         🎭 Movie: {title}\n\
         📌 Target: {name}\n\
         {glyph} Status: {status}\n\
         🔗 URL: {url}\n\n\
         🏃 Hurry up and book your tickets now!\n\
         ⏰ Notification sent at: {time}",
        name = target.name,
        glyph = Availability::Available.glyph(),
        status = detection.status,
        url = target.url,
        time = at.format("%Y-%m-%d %H:%M:%S UTC"),
    )
}

impl NotificationEvent {
    /// Build the event for a target that just became bookable
    pub fn availability(target: &MonitoredTarget, detection: &Detection, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            target: target.clone(),
            timestamp: at,
            message: format_availability_message(target, detection, at),
        }
    }
}
