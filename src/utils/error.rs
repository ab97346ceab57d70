//! Error types for the ticketwatch monitor
//!
//! This module defines the domain error types used throughout the application.

use thiserror::Error;

/// Errors that can occur while fetching a monitored page
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP transport error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status code
    #[error("Server returned status {0}")]
    Status(u16),

    /// Request timeout
    #[error("Request timeout")]
    Timeout,

    /// Content decoding error
    #[error("Decoding error: {0}")]
    Decode(String),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    /// Whether another attempt within the same fetch may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout => true,
            Self::Status(code) => matches!(code, 429 | 500 | 502 | 503 | 504),
            Self::Http(e) => e.is_connect() || e.is_timeout(),
            Self::Decode(_) | Self::InvalidUrl(_) => false,
        }
    }
}

/// Errors that can occur while delivering a notification
#[derive(Error, Debug)]
pub enum NotifyError {
    /// No chat destination is configured
    #[error("No notification destination configured")]
    NoDestination,

    /// HTTP transport error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The messaging API rejected the request
    #[error("API rejected message ({status}): {description}")]
    Rejected { status: u16, description: String },

    /// Delivery did not finish within the notify timeout
    #[error("Notification timed out after {0}s")]
    Timeout(u64),
}

/// Errors that can occur while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required environment variable is not set
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    /// A setting has an invalid value
    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },

    /// The configuration file could not be read or parsed
    #[error("Failed to load config file {path}: {reason}")]
    File { path: String, reason: String },
}

impl ConfigError {
    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Errors returned to users of the command surface
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Command arguments could not be understood
    #[error("Usage: {0}")]
    Usage(&'static str),

    /// URL is not an absolute http(s) URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// A target with this name already exists
    #[error("Target '{0}' is already being monitored")]
    DuplicateName(String),

    /// A target with this URL already exists
    #[error("URL is already being monitored as '{0}'")]
    DuplicateUrl(String),

    /// No target with this name
    #[error("No target named '{0}'")]
    UnknownTarget(String),
}
