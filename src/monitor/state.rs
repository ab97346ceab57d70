//! Per-target availability state and edge detection

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::models::{AvailabilityState, MonitoredTarget};
use crate::parser::Detection;

/// Last observed signal for every target, keyed by target name
#[derive(Debug, Default)]
pub struct StateTracker {
    states: HashMap<String, AvailabilityState>,
}

impl StateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a successful observation and report whether it is a new opening
    ///
    /// Returns true exactly when the stored signal was false or absent and
    /// `bookable` is true. The stored signal is always overwritten.
    pub fn update_and_check_transition(
        &mut self,
        target: &MonitoredTarget,
        bookable: bool,
        at: DateTime<Utc>,
    ) -> bool {
        let state = self.entry(target);
        let was_bookable = state.last_known_bookable.unwrap_or(false);

        state.last_known_bookable = Some(bookable);
        state.last_checked_at = Some(at);
        state.last_error = None;
        state.consecutive_failures = 0;

        let transitioned = bookable && !was_bookable;
        if transitioned {
            state.transitions += 1;
        }
        transitioned
    }

    /// Store a detection, including its title and status diagnostics
    pub fn record_detection(
        &mut self,
        target: &MonitoredTarget,
        detection: &Detection,
        at: DateTime<Utc>,
    ) -> bool {
        let transitioned = self.update_and_check_transition(target, detection.bookable, at);

        let state = self.entry(target);
        state.last_status = Some(detection.status.clone());
        if detection.title.is_some() {
            state.title = detection.title.clone();
        }

        transitioned
    }

    /// Record a failed check; the bookable signal is left untouched
    pub fn record_failure(&mut self, target: &MonitoredTarget, error: &str, at: DateTime<Utc>) {
        let state = self.entry(target);
        state.last_error = Some(error.to_string());
        state.last_error_at = Some(at);
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
    }

    pub fn remove(&mut self, name: &str) -> Option<AvailabilityState> {
        self.states.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&AvailabilityState> {
        self.states.get(name)
    }

    /// Clone of every stored state
    pub fn snapshot(&self) -> Vec<AvailabilityState> {
        self.states.values().cloned().collect()
    }

    fn entry(&mut self, target: &MonitoredTarget) -> &mut AvailabilityState {
        let state = self
            .states
            .entry(target.name.clone())
            .or_insert_with(|| AvailabilityState::new(target.clone()));

        // A re-added name may point at a different URL
        if state.target.url != target.url {
            *state = AvailabilityState::new(target.clone());
        }
        state
    }
}
