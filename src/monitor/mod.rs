//! Periodic availability monitor
//!
//! Each cycle walks the targets in insertion order:
//! fetch, detect, update state, and notify on a new opening.
//!
//! The target list is snapshotted under the table lock at the start of a
//! cycle and the lock is released during network I/O. Results are written
//! back under the lock; a target removed in the meantime has its result
//! dropped, and a target added in the meantime is picked up next cycle.

pub mod state;
pub mod table;

pub use state::StateTracker;
pub use table::{SharedTable, StatusSnapshot, TargetStatus, WatchTable};

use chrono::Utc;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::crawler::PageFetcher;
use crate::metrics::{self, CheckResult};
use crate::models::{MonitoredTarget, NotificationEvent};
use crate::notifications::Notifier;
use crate::parser::AvailabilityDetector;
use crate::utils::error::NotifyError;
use crate::utils::format_duration;

/// Shortest period the monitor loop will tick at
pub const MIN_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Timing settings for the monitor loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSettings {
    /// Time between cycle starts
    pub check_interval: Duration,
    /// Upper bound for one notification delivery
    pub notify_timeout: Duration,
    /// Time an in-flight cycle may take to finish after shutdown is requested
    pub shutdown_grace: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(300),
            notify_timeout: Duration::from_secs(10),
            shutdown_grace: Duration::from_secs(30),
        }
    }
}

impl MonitorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            check_interval: config.check_interval(),
            notify_timeout: config.notify_timeout(),
            shutdown_grace: config.shutdown_grace(),
        }
    }
}

/// Summary of one monitor cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Targets whose page was fetched and evaluated
    pub checked: usize,
    /// Checked targets that looked bookable
    pub available: usize,
    /// Targets whose fetch failed
    pub failed: usize,
    /// Notifications delivered
    pub notified: usize,
    /// Results dropped because the target was removed mid-cycle
    pub skipped_removed: usize,
    /// Wall time of the cycle
    pub duration: Duration,
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} checked, {} available, {} failed, {} notified in {}",
            self.checked,
            self.available,
            self.failed,
            self.notified,
            format_duration(self.duration)
        )?;
        if self.skipped_removed > 0 {
            write!(f, " ({} removed mid-cycle)", self.skipped_removed)?;
        }
        Ok(())
    }
}

/// The monitor loop and its collaborators
pub struct Monitor {
    table: SharedTable,
    fetcher: Arc<dyn PageFetcher>,
    detector: AvailabilityDetector,
    notifier: Arc<dyn Notifier>,
    settings: MonitorSettings,

    /// Serializes scheduled and on-demand cycles
    cycle_guard: Mutex<()>,
}

impl Monitor {
    pub fn new(
        table: SharedTable,
        fetcher: Arc<dyn PageFetcher>,
        detector: AvailabilityDetector,
        notifier: Arc<dyn Notifier>,
        mut settings: MonitorSettings,
    ) -> Self {
        if settings.check_interval < MIN_CHECK_INTERVAL {
            warn!(
                requested_ms = settings.check_interval.as_millis() as u64,
                "Check interval too short, using {}",
                format_duration(MIN_CHECK_INTERVAL)
            );
            settings.check_interval = MIN_CHECK_INTERVAL;
        }

        Self {
            table,
            fetcher,
            detector,
            notifier,
            settings,
            cycle_guard: Mutex::new(()),
        }
    }

    pub fn table(&self) -> &SharedTable {
        &self.table
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    /// Run one pass over every target
    ///
    /// Per-target failures are recorded and logged; they never abort the cycle.
    pub async fn run_cycle(&self) -> CycleReport {
        let _guard = self.cycle_guard.lock().await;
        let _timer = metrics::start_cycle_timer();
        let started = Instant::now();

        let targets = self.table.read().await.targets().to_vec();
        debug!(targets = targets.len(), "Starting monitor cycle");

        let mut report = CycleReport::default();
        for target in &targets {
            self.check_target(target, &mut report).await;
        }

        self.table.write().await.record_cycle();
        report.duration = started.elapsed();

        info!(
            checked = report.checked,
            available = report.available,
            failed = report.failed,
            notified = report.notified,
            skipped_removed = report.skipped_removed,
            elapsed_ms = report.duration.as_millis() as u64,
            "Monitor cycle completed"
        );

        report
    }

    async fn check_target(&self, target: &MonitoredTarget, report: &mut CycleReport) {
        let started = Instant::now();
        let page = self.fetcher.fetch(&target.url).await;
        let at = Utc::now();

        let page = match page {
            Ok(page) => page,
            Err(e) => {
                warn!(
                    target = %target.name,
                    url = %target.url,
                    error = %e,
                    "Fetch failed, state unchanged"
                );

                let mut table = self.table.write().await;
                if !table.contains(target) {
                    report.skipped_removed += 1;
                    return;
                }
                table.states_mut().record_failure(target, &e.to_string(), at);
                table.record_check();
                metrics::record_check(CheckResult::Failed);
                report.failed += 1;
                return;
            }
        };

        let detection = self.detector.detect(&page);
        if detection.is_ambiguous() {
            debug!(target = %target.name, "No booking or sold-out marker on page");
        }

        let transitioned = {
            let mut table = self.table.write().await;
            if !table.contains(target) {
                debug!(target = %target.name, "Target removed during cycle, result dropped");
                report.skipped_removed += 1;
                return;
            }
            table.record_check();
            table.states_mut().record_detection(target, &detection, at)
        };

        report.checked += 1;
        if detection.bookable {
            report.available += 1;
            metrics::record_check(CheckResult::Available);
        } else {
            metrics::record_check(CheckResult::Unavailable);
        }

        info!(
            target = %target.name,
            bookable = detection.bookable,
            status = %detection.status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Target checked"
        );

        if transitioned {
            metrics::record_transition();
            let event = NotificationEvent::availability(target, &detection, at);
            if self.notify(&event).await {
                report.notified += 1;
                self.table.write().await.record_notification();
            }
        }
    }

    /// Deliver one event; failures are logged and never retried
    async fn notify(&self, event: &NotificationEvent) -> bool {
        let timeout = self.settings.notify_timeout;
        let result = match tokio::time::timeout(timeout, self.notifier.send(&event.message)).await
        {
            Ok(result) => result,
            Err(_) => Err(NotifyError::Timeout(timeout.as_secs())),
        };

        match result {
            Ok(status) => {
                info!(
                    target = %event.target.name,
                    event_id = %event.id,
                    delivery = %status,
                    "Availability notification sent"
                );
                metrics::record_notification(true);
                true
            }
            Err(e) => {
                error!(
                    target = %event.target.name,
                    event_id = %event.id,
                    channel = self.notifier.name(),
                    error = %e,
                    "Availability notification failed"
                );
                metrics::record_notification(false);
                false
            }
        }
    }

    /// Run cycles on the configured interval until shutdown is signalled
    ///
    /// A cycle in flight when shutdown arrives gets the grace period to
    /// finish; after that it is dropped.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        self.table.write().await.set_running(true);
        info!(
            interval_secs = self.settings.check_interval.as_secs(),
            "Monitor started"
        );

        let mut ticker = tokio::time::interval(self.settings.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }

            let cycle = self.run_cycle();
            tokio::pin!(cycle);

            tokio::select! {
                _ = &mut cycle => {}
                _ = shutdown.changed() => {
                    info!(
                        grace_secs = self.settings.shutdown_grace.as_secs(),
                        "Shutdown requested, waiting for in-flight cycle"
                    );
                    if tokio::time::timeout(self.settings.shutdown_grace, &mut cycle)
                        .await
                        .is_err()
                    {
                        warn!("In-flight cycle did not finish within grace period, aborted");
                    }
                    break;
                }
            }
        }

        self.table.write().await.set_running(false);
        info!("Monitor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::DeliveryStatus;
    use crate::utils::error::FetchError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    struct StaticFetcher {
        pages: HashMap<String, Result<String, u16>>,
    }

    #[async_trait]
    impl PageFetcher for StaticFetcher {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            match self.pages.get(url) {
                Some(Ok(page)) => Ok(page.clone()),
                Some(Err(status)) => Err(FetchError::Status(*status)),
                None => Err(FetchError::Status(404)),
            }
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: StdMutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send(&self, message: &str) -> Result<DeliveryStatus, NotifyError> {
            if self.fail {
                return Err(NotifyError::NoDestination);
            }
            self.sent.lock().unwrap().push(message.to_string());
            Ok(DeliveryStatus::success("recording"))
        }
    }

    fn monitor(
        pages: Vec<(&str, Result<&str, u16>)>,
        notifier: Arc<RecordingNotifier>,
    ) -> Monitor {
        let targets = pages
            .iter()
            .enumerate()
            .map(|(i, (url, _))| MonitoredTarget::new(format!("T{i}"), *url))
            .collect();
        let pages = pages
            .into_iter()
            .map(|(url, page)| (url.to_string(), page.map(str::to_string)))
            .collect();

        Monitor::new(
            WatchTable::new(targets, Duration::from_secs(300)).into_shared(),
            Arc::new(StaticFetcher { pages }),
            AvailabilityDetector::default(),
            notifier,
            MonitorSettings::default(),
        )
    }

    #[tokio::test]
    async fn test_cycle_report() {
        let notifier = Arc::new(RecordingNotifier::default());
        let monitor = monitor(
            vec![
                ("https://example.com/a", Ok("<button>Book tickets</button>")),
                ("https://example.com/b", Ok("<p>Sold out</p>")),
                ("https://example.com/c", Err(503)),
            ],
            Arc::clone(&notifier),
        );

        let report = monitor.run_cycle().await;
        assert_eq!(report.checked, 2);
        assert_eq!(report.available, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.notified, 1);
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);

        let table = monitor.table().read().await;
        assert_eq!(table.notifications_sent(), 1);
        assert_eq!(table.cycles_completed(), 1);
        let failed = table.states().get("T2").unwrap();
        assert_eq!(failed.consecutive_failures, 1);
        assert!(failed.last_known_bookable.is_none());
    }

    #[tokio::test]
    async fn test_failed_delivery_is_not_retried() {
        let notifier = Arc::new(RecordingNotifier {
            fail: true,
            ..Default::default()
        });
        let monitor = monitor(
            vec![("https://example.com/a", Ok("<button>Book now</button>"))],
            notifier,
        );

        let first = monitor.run_cycle().await;
        assert_eq!(first.notified, 0);

        // The transition already happened; a second available check is silent
        let second = monitor.run_cycle().await;
        assert_eq!(second.notified, 0);
        let table = monitor.table().read().await;
        assert_eq!(table.states().get("T0").unwrap().transitions, 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let notifier = Arc::new(RecordingNotifier::default());
        let monitor = Arc::new(monitor(
            vec![("https://example.com/a", Ok("<p>Sold out</p>"))],
            notifier,
        ));
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn({
            let monitor = Arc::clone(&monitor);
            async move { monitor.run(rx).await }
        });

        // The first tick fires immediately
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        let table = monitor.table().read().await;
        assert!(!table.is_running());
        assert_eq!(table.cycles_completed(), 1);
    }

    #[test]
    fn test_report_display() {
        let report = CycleReport {
            checked: 2,
            available: 1,
            failed: 0,
            notified: 1,
            skipped_removed: 1,
            duration: Duration::from_secs(3),
        };
        assert_eq!(
            report.to_string(),
            "2 checked, 1 available, 0 failed, 1 notified in 3s (1 removed mid-cycle)"
        );
    }
}
