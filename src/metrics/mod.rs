//! Prometheus metrics for the ticketwatch monitor
//!
//! This module provides metrics tracking for:
//! - Monitor: checks by result, transitions, notifications, cycle duration
//! - Admin API: requests by endpoint and status
//!
//! # Usage
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If initialization fails, metrics operations become no-ops.

use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_histogram,
    Counter, CounterVec, Encoder, Gauge, Histogram, TextEncoder,
};
use std::sync::OnceLock;

// ============================================================================
// Metrics Storage
// ============================================================================

/// Container for all monitor metrics
struct MonitorMetrics {
    checks: CounterVec,
    notifications: CounterVec,
    transitions: Counter,
    cycle_duration: Histogram,
    targets: Gauge,
    api_requests: CounterVec,
}

/// Global storage for monitor metrics; `None` when registration failed
static MONITOR_METRICS: OnceLock<Option<MonitorMetrics>> = OnceLock::new();

fn metrics() -> Option<&'static MonitorMetrics> {
    MONITOR_METRICS.get().and_then(Option::as_ref)
}

/// Outcome of checking one target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckResult {
    Available,
    Unavailable,
    Failed,
}

impl CheckResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Unavailable => "unavailable",
            Self::Failed => "failed",
        }
    }
}

// ============================================================================
// Initialization
// ============================================================================

/// Initialize all Prometheus metrics
///
/// If metric registration fails, the error is returned and subsequent metric
/// operations become no-ops.
///
/// # Example
///
/// ```ignore
/// if let Err(e) = ticketwatch::metrics::init_metrics() {
///     tracing::warn!(error = %e, "Metrics initialization failed");
/// }
/// ```
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    let mut failure = None;

    // Only the first call registers; later calls see the stored outcome
    MONITOR_METRICS.get_or_init(|| match register_metrics() {
        Ok(metrics) => {
            tracing::info!("Prometheus metrics initialized successfully");
            Some(metrics)
        }
        Err(e) => {
            failure = Some(e);
            None
        }
    });

    match failure {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

fn register_metrics() -> Result<MonitorMetrics, prometheus::Error> {
    Ok(MonitorMetrics {
        checks: register_counter_vec!(
            "ticketwatch_checks_total",
            "Target checks by result",
            &["result"]
        )?,
        notifications: register_counter_vec!(
            "ticketwatch_notifications_total",
            "Availability notifications by delivery result",
            &["result"]
        )?,
        transitions: register_counter!(
            "ticketwatch_transitions_total",
            "Transitions from not available to available"
        )?,
        cycle_duration: register_histogram!(
            "ticketwatch_cycle_duration_seconds",
            "Time spent running one monitor cycle in seconds",
            vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]
        )?,
        targets: register_gauge!("ticketwatch_targets", "Number of monitored targets")?,
        api_requests: register_counter_vec!(
            "ticketwatch_api_requests_total",
            "Admin API requests by endpoint and status",
            &["endpoint", "status"]
        )?,
    })
}

/// Check if metrics have been initialized
pub fn metrics_initialized() -> bool {
    metrics().is_some()
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Record the outcome of one target check
pub fn record_check(result: CheckResult) {
    if let Some(m) = metrics() {
        m.checks.with_label_values(&[result.as_str()]).inc();
    }
}

/// Record a transition to available
pub fn record_transition() {
    if let Some(m) = metrics() {
        m.transitions.inc();
    }
}

/// Record a notification delivery attempt
pub fn record_notification(delivered: bool) {
    if let Some(m) = metrics() {
        let label = if delivered { "sent" } else { "failed" };
        m.notifications.with_label_values(&[label]).inc();
    }
}

/// Update the monitored target count
pub fn set_target_count(count: usize) {
    if let Some(m) = metrics() {
        m.targets.set(count as f64);
    }
}

/// Record admin API request
pub fn record_api_request(endpoint: &str, status: u16) {
    let Some(m) = metrics() else {
        return;
    };

    let status_str = status.to_string();
    m.api_requests
        .with_label_values(&[endpoint, &status_str])
        .inc();
}

/// Histogram timer guard that records duration on drop
pub struct MetricsTimer {
    timer: Option<prometheus::HistogramTimer>,
}

impl MetricsTimer {
    fn new(timer: prometheus::HistogramTimer) -> Self {
        Self { timer: Some(timer) }
    }

    /// Create a no-op timer when metrics are not initialized
    fn noop() -> Self {
        Self { timer: None }
    }
}

impl Drop for MetricsTimer {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.stop_and_record();
        }
    }
}

/// Start a cycle timer (returns a timer handle)
pub fn start_cycle_timer() -> MetricsTimer {
    match metrics() {
        Some(m) => MetricsTimer::new(m.cycle_duration.start_timer()),
        None => MetricsTimer::noop(),
    }
}

// ============================================================================
// Tests
// ============================================================================
