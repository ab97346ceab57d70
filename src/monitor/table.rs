//! Shared watch table
//!
//! The table holds the target list in insertion order, the per-target state
//! and the run counters. The monitor loop, the bot and the admin API all go
//! through one `RwLock` around it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::state::StateTracker;
use crate::metrics;
use crate::models::{Availability, MonitoredTarget};
use crate::utils::error::CommandError;
use crate::utils::{name_from_url, parse_http_url};

/// Watch table shared between tasks
pub type SharedTable = Arc<RwLock<WatchTable>>;

/// Targets, their state and run counters
#[derive(Debug)]
pub struct WatchTable {
    targets: Vec<MonitoredTarget>,
    states: StateTracker,
    check_interval: Duration,
    started_at: DateTime<Utc>,
    running: bool,
    cycles_completed: u64,
    checks_performed: u64,
    notifications_sent: u64,
}

/// Point-in-time view of one target
#[derive(Debug, Clone, Serialize)]
pub struct TargetStatus {
    pub name: String,
    pub url: String,
    pub availability: Availability,
    pub title: Option<String>,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub last_status: Option<String>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
}

/// Point-in-time view of the whole monitor
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub running: bool,
    pub check_interval_secs: u64,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
    pub cycles_completed: u64,
    pub checks_performed: u64,
    pub notifications_sent: u64,
    pub targets: Vec<TargetStatus>,
}

impl WatchTable {
    /// Create a table from the configured targets
    ///
    /// Later duplicates of a name are dropped with a warning.
    pub fn new(targets: Vec<MonitoredTarget>, check_interval: Duration) -> Self {
        let mut table = Self {
            targets: Vec::with_capacity(targets.len()),
            states: StateTracker::new(),
            check_interval,
            started_at: Utc::now(),
            running: false,
            cycles_completed: 0,
            checks_performed: 0,
            notifications_sent: 0,
        };

        for target in targets {
            if table.find(&target.name).is_some() {
                tracing::warn!(target = %target.name, "Duplicate target name ignored");
                continue;
            }
            table.targets.push(target);
        }

        metrics::set_target_count(table.targets.len());
        table
    }

    /// Wrap the table for sharing between tasks
    pub fn into_shared(self) -> SharedTable {
        Arc::new(RwLock::new(self))
    }

    /// Targets in insertion order
    pub fn targets(&self) -> &[MonitoredTarget] {
        &self.targets
    }

    pub fn find(&self, name: &str) -> Option<&MonitoredTarget> {
        self.targets.iter().find(|t| t.name == name)
    }

    /// Whether this exact target (name and URL) is still monitored
    pub fn contains(&self, target: &MonitoredTarget) -> bool {
        self.targets.iter().any(|t| t == target)
    }

    pub fn states(&self) -> &StateTracker {
        &self.states
    }

    pub fn states_mut(&mut self) -> &mut StateTracker {
        &mut self.states
    }

    /// Add a target; the name is derived from the URL when not given
    pub fn add_target(
        &mut self,
        name: Option<&str>,
        url: &str,
    ) -> Result<MonitoredTarget, CommandError> {
        let url = url.trim();
        let parsed = parse_http_url(url).ok_or_else(|| CommandError::InvalidUrl(url.to_string()))?;

        let name = match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => name.to_string(),
            None => name_from_url(&parsed),
        };

        if self.find(&name).is_some() {
            return Err(CommandError::DuplicateName(name));
        }
        if let Some(existing) = self.targets.iter().find(|t| t.url == url) {
            return Err(CommandError::DuplicateUrl(existing.name.clone()));
        }

        let target = MonitoredTarget::new(name, url);
        self.targets.push(target.clone());
        metrics::set_target_count(self.targets.len());

        tracing::info!(target = %target.name, url = %target.url, "Target added");
        Ok(target)
    }

    /// Remove a target and its state
    pub fn remove_target(&mut self, name: &str) -> Result<MonitoredTarget, CommandError> {
        let name = name.trim();
        let index = self
            .targets
            .iter()
            .position(|t| t.name == name)
            .ok_or_else(|| CommandError::UnknownTarget(name.to_string()))?;

        let target = self.targets.remove(index);
        self.states.remove(&target.name);
        metrics::set_target_count(self.targets.len());

        tracing::info!(target = %target.name, "Target removed");
        Ok(target)
    }

    pub fn set_running(&mut self, running: bool) {
        if running && !self.running {
            self.started_at = Utc::now();
        }
        self.running = running;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn check_interval(&self) -> Duration {
        self.check_interval
    }

    pub fn record_check(&mut self) {
        self.checks_performed += 1;
    }

    pub fn record_notification(&mut self) {
        self.notifications_sent += 1;
    }

    pub fn record_cycle(&mut self) {
        self.cycles_completed += 1;
    }

    pub fn notifications_sent(&self) -> u64 {
        self.notifications_sent
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed
    }

    /// Current status of the monitor and every target
    pub fn status(&self) -> StatusSnapshot {
        let now = Utc::now();
        let targets = self
            .targets
            .iter()
            .map(|target| match self.states.get(&target.name) {
                Some(state) => TargetStatus {
                    name: target.name.clone(),
                    url: target.url.clone(),
                    availability: state.availability(),
                    title: state.title.clone(),
                    last_checked_at: state.last_checked_at,
                    last_status: state.last_status.clone(),
                    last_error: state.last_error.clone(),
                    consecutive_failures: state.consecutive_failures,
                },
                None => TargetStatus {
                    name: target.name.clone(),
                    url: target.url.clone(),
                    availability: Availability::Unknown,
                    title: None,
                    last_checked_at: None,
                    last_status: None,
                    last_error: None,
                    consecutive_failures: 0,
                },
            })
            .collect();

        StatusSnapshot {
            running: self.running,
            check_interval_secs: self.check_interval.as_secs(),
            started_at: self.started_at,
            uptime_secs: (now - self.started_at).num_seconds().max(0) as u64,
            cycles_completed: self.cycles_completed,
            checks_performed: self.checks_performed,
            notifications_sent: self.notifications_sent,
            targets,
        }
    }
}
