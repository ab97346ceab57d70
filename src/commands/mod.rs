//! CLI command implementations

pub mod check;
pub mod config;
pub mod run;

// Re-export command functions for convenience
pub use check::{check, detect};
pub use config::show_config;
pub use run::run;

use anyhow::{Context, Result};
use std::sync::Arc;

use ticketwatch::config::Config;
use ticketwatch::crawler::HttpFetcher;
use ticketwatch::monitor::{Monitor, MonitorSettings, WatchTable};
use ticketwatch::notifications::TelegramChannel;
use ticketwatch::parser::AvailabilityDetector;

/// Wire the monitor and its collaborators from configuration
fn build_monitor(config: &Config) -> Result<Arc<Monitor>> {
    let fetcher = HttpFetcher::from_config(config).context("Failed to create page fetcher")?;
    let notifier =
        TelegramChannel::from_config(&config.bot).context("Failed to create Telegram channel")?;

    if !notifier.has_destination() {
        tracing::warn!("TELEGRAM_CHAT_ID not set, availability notifications will not be delivered");
    }

    let table = WatchTable::new(config.targets.clone(), config.check_interval()).into_shared();

    Ok(Arc::new(Monitor::new(
        table,
        Arc::new(fetcher),
        AvailabilityDetector::new(&config.detector),
        Arc::new(notifier),
        MonitorSettings::from_config(config),
    )))
}
