//! Notification channels for delivering availability alerts

pub mod telegram;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::error::NotifyError;

/// Result type for channel operations
pub type ChannelResult<T> = Result<T, NotifyError>;

/// Response from sending a notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryStatus {
    /// Whether the notification was successfully delivered
    pub success: bool,
    /// Channel that delivered (or failed to deliver) the notification
    pub channel: String,
    /// Optional message about the delivery
    pub message: Option<String>,
    /// Timestamp of delivery attempt
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl DeliveryStatus {
    /// Create a successful delivery status
    pub fn success(channel: impl Into<String>) -> Self {
        Self {
            success: true,
            channel: channel.into(),
            message: None,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Create a successful delivery status with a message
    pub fn success_with_message(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::success(channel)
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.success { "SUCCESS" } else { "FAILED" };
        write!(f, "[{status}] {}", self.channel)?;
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

/// Delivers a message string to the configured destination
///
/// Implementations report failures as [`NotifyError`]; callers log them and
/// move on.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Get the channel name
    fn name(&self) -> &str;

    /// Send a message through this channel
    async fn send(&self, message: &str) -> ChannelResult<DeliveryStatus>;
}
