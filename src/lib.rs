//! ticketwatch - Movie ticket availability monitor
//!
//! Periodically checks booking pages and sends a Telegram notification when a
//! page changes from "not available" to "tickets available".
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`crawler`] - Page fetching with rate limiting and retry
//! - [`parser`] - Availability detection from page HTML
//! - [`monitor`] - State tracking, the shared watch table and the monitor loop
//! - [`notifications`] - Alert formatting and the Telegram channel
//! - [`bot`] - Telegram command handling
//! - [`server`] - Optional HTTP admin API
//! - [`metrics`] - Prometheus metrics
//! - [`models`] - Core data structures and types
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ticketwatch::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let table = WatchTable::new(config.targets.clone(), config.check_interval()).into_shared();
//!     let monitor = Monitor::new(
//!         table,
//!         Arc::new(HttpFetcher::from_config(&config)?),
//!         AvailabilityDetector::new(&config.detector),
//!         Arc::new(TelegramChannel::from_config(&config.bot)?),
//!         MonitorSettings::from_config(&config),
//!     );
//!     let report = monitor.run_cycle().await;
//!     println!("{report}");
//!     Ok(())
//! }
//! ```

pub mod bot;
pub mod config;
pub mod crawler;
pub mod metrics;
pub mod models;
pub mod monitor;
pub mod notifications;
pub mod parser;
pub mod server;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::crawler::{HttpFetcher, PageFetcher};
    pub use crate::models::{Availability, AvailabilityState, MonitoredTarget, NotificationEvent};
    pub use crate::monitor::{CycleReport, Monitor, MonitorSettings, SharedTable, WatchTable};
    pub use crate::notifications::{Notifier, TelegramChannel};
    pub use crate::parser::{AvailabilityDetector, Detection};
    pub use crate::utils::error::{CommandError, ConfigError, FetchError, NotifyError};
}

// Direct re-exports for convenience
pub use models::{Availability, AvailabilityState, MonitoredTarget, NotificationEvent};
