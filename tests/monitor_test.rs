//! Monitor cycle tests over a scripted fetcher and a recording notifier

mod common;

use chrono::Utc;
use common::{
    build_monitor, build_monitor_with_settings, target, RecordingNotifier, ScriptedFetcher, Step,
};
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use ticketwatch::models::Availability;
use ticketwatch::monitor::{Monitor, MonitorSettings, StateTracker, MIN_CHECK_INTERVAL};
use ticketwatch::parser::Detection;

use Step::{Available as A, Fail as F, Unavailable as U};

/// Run one cycle per step and return the cycle numbers (1-based) that notified
async fn notifying_cycles(steps: &[Step]) -> (Vec<usize>, Arc<RecordingNotifier>) {
    let movie = target("movie-a");
    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher.script(&movie.url, steps.iter().copied());
    let notifier = Arc::new(RecordingNotifier::new());
    let monitor = build_monitor(vec![movie], fetcher, Arc::clone(&notifier));

    let mut cycles = Vec::new();
    for cycle in 1..=steps.len() {
        if monitor.run_cycle().await.notified > 0 {
            cycles.push(cycle);
        }
    }
    (cycles, notifier)
}

#[tokio::test]
async fn test_notifies_once_per_transition() {
    let (cycles, notifier) = notifying_cycles(&[U, U, A, A, U, A]).await;

    assert_eq!(cycles, vec![3, 6]);
    assert_eq!(notifier.sent().len(), 2);
    assert!(notifier.sent()[0].contains("TICKETS AVAILABLE"));
}

#[tokio::test]
async fn test_first_check_available_notifies() {
    let (cycles, _) = notifying_cycles(&[A, A]).await;
    assert_eq!(cycles, vec![1]);
}

#[tokio::test]
async fn test_failures_do_not_change_state() {
    // A failed check between two available checks is not a transition
    let (cycles, _) = notifying_cycles(&[A, F, A, U, F, A]).await;
    assert_eq!(cycles, vec![1, 6]);
}

#[tokio::test]
async fn test_failure_is_recorded_without_touching_availability() {
    let movie = target("movie-a");
    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher.script(&movie.url, [U, F, F]);
    let notifier = Arc::new(RecordingNotifier::new());
    let monitor = build_monitor(vec![movie.clone()], fetcher, notifier);

    let first = monitor.run_cycle().await;
    assert_eq!(first.checked, 1);

    let second = monitor.run_cycle().await;
    assert_eq!(second.checked, 0);
    assert_eq!(second.failed, 1);
    monitor.run_cycle().await;

    let table = monitor.table().read().await;
    let state = table.states().get(&movie.name).unwrap();
    assert_eq!(state.availability(), Availability::Unavailable);
    assert_eq!(state.consecutive_failures, 2);
    assert!(state.last_error.as_deref().unwrap().contains("503"));
    assert!(state.last_checked_at.is_some());
}

#[tokio::test]
async fn test_failed_delivery_is_not_retried() {
    let movie = target("movie-a");
    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher.script(&movie.url, [A, A, A]);
    let notifier = Arc::new(RecordingNotifier::failing());
    let monitor = build_monitor(vec![movie], fetcher, notifier);

    for _ in 0..3 {
        let report = monitor.run_cycle().await;
        assert_eq!(report.notified, 0);
        assert_eq!(report.available, 1);
    }

    let table = monitor.table().read().await;
    assert_eq!(table.notifications_sent(), 0);
    assert_eq!(table.cycles_completed(), 3);
}

#[tokio::test]
async fn test_one_failing_target_does_not_abort_cycle() {
    let a = target("movie-a");
    let b = target("movie-b");
    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher.script(&a.url, [F]);
    fetcher.script(&b.url, [A]);
    let notifier = Arc::new(RecordingNotifier::new());
    let monitor = build_monitor(vec![a, b], Arc::clone(&fetcher), Arc::clone(&notifier));

    let report = monitor.run_cycle().await;

    assert_eq!(report.failed, 1);
    assert_eq!(report.checked, 1);
    assert_eq!(report.notified, 1);
    assert_eq!(fetcher.calls().len(), 2);
    assert!(notifier.sent()[0].contains("movie-b"));
}

#[tokio::test]
async fn test_target_added_mid_cycle_is_checked_next_cycle() {
    let a = target("movie-a");
    let b = target("movie-b");
    let fetcher = Arc::new(ScriptedFetcher::with_delay(Duration::from_millis(200)));
    let notifier = Arc::new(RecordingNotifier::new());
    let monitor = build_monitor(vec![a], Arc::clone(&fetcher), notifier);

    let cycle = tokio::spawn({
        let monitor = Arc::clone(&monitor);
        async move { monitor.run_cycle().await }
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    monitor
        .table()
        .write()
        .await
        .add_target(Some(b.name.as_str()), &b.url)
        .unwrap();

    let first = cycle.await.unwrap();
    assert_eq!(first.checked, 1);
    assert!(!fetcher.calls().contains(&b.url));

    let second = monitor.run_cycle().await;
    assert_eq!(second.checked, 2);
    assert!(fetcher.calls().contains(&b.url));
}

#[tokio::test]
async fn test_target_removed_mid_cycle_result_is_dropped() {
    let a = target("movie-a");
    let fetcher = Arc::new(ScriptedFetcher::with_delay(Duration::from_millis(200)));
    fetcher.script(&a.url, [A]);
    let notifier = Arc::new(RecordingNotifier::new());
    let monitor = build_monitor(vec![a.clone()], fetcher, Arc::clone(&notifier));

    let cycle = tokio::spawn({
        let monitor = Arc::clone(&monitor);
        async move { monitor.run_cycle().await }
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    monitor.table().write().await.remove_target(&a.name).unwrap();

    let report = cycle.await.unwrap();
    assert_eq!(report.skipped_removed, 1);
    assert_eq!(report.checked, 0);
    assert!(notifier.sent().is_empty());
    assert!(monitor.table().read().await.states().get(&a.name).is_none());
}

#[tokio::test]
async fn test_status_reflects_last_check() {
    let a = target("movie-a");
    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher.script(&a.url, [A]);
    let monitor = build_monitor(vec![a], fetcher, Arc::new(RecordingNotifier::new()));

    monitor.run_cycle().await;
    let status = monitor.table().read().await.status();

    assert_eq!(status.cycles_completed, 1);
    assert_eq!(status.checks_performed, 1);
    assert_eq!(status.notifications_sent, 1);
    assert_eq!(status.targets[0].availability, Availability::Available);
    assert_eq!(status.targets[0].title.as_deref(), Some("Movie"));
}

#[tokio::test]
async fn test_shutdown_stops_monitor_loop() {
    let a = target("movie-a");
    let fetcher = Arc::new(ScriptedFetcher::new());
    let monitor = build_monitor(vec![a], Arc::clone(&fetcher), Arc::new(RecordingNotifier::new()));
    let (tx, rx) = tokio::sync::watch::channel(false);

    let task = tokio::spawn({
        let monitor = Arc::clone(&monitor);
        async move { monitor.run(rx).await }
    });

    // The first tick fires immediately
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(monitor.table().read().await.is_running());

    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("monitor should stop promptly")
        .unwrap();

    assert!(!monitor.table().read().await.is_running());
    assert_eq!(fetcher.calls().len(), 1);
}

#[tokio::test]
async fn test_slow_notifier_times_out_without_retry() {
    let movie = target("movie-a");
    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher.script(&movie.url, [A, A]);
    let notifier = Arc::new(RecordingNotifier::slow(Duration::from_millis(500)));
    let settings = MonitorSettings {
        notify_timeout: Duration::from_millis(100),
        ..MonitorSettings::default()
    };
    let monitor =
        build_monitor_with_settings(vec![movie.clone()], fetcher, Arc::clone(&notifier), settings);

    let first = monitor.run_cycle().await;
    assert_eq!(first.available, 1);
    assert_eq!(first.notified, 0);

    // Still available, so no new transition and no second attempt
    let second = monitor.run_cycle().await;
    assert_eq!(second.notified, 0);

    assert!(notifier.sent().is_empty());
    let table = monitor.table().read().await;
    assert_eq!(table.notifications_sent(), 0);
    assert_eq!(
        table.states().get(&movie.name).unwrap().availability(),
        Availability::Available
    );
}

/// Start `Monitor::run` over one slow target and request shutdown once the cycle is in flight
async fn shutdown_during_cycle(
    fetch_delay: Duration,
    grace: Duration,
) -> (Arc<ScriptedFetcher>, Arc<Monitor>, Duration) {
    let fetcher = Arc::new(ScriptedFetcher::with_delay(fetch_delay));
    let settings = MonitorSettings {
        shutdown_grace: grace,
        ..MonitorSettings::default()
    };
    let monitor = build_monitor_with_settings(
        vec![target("movie-a")],
        Arc::clone(&fetcher),
        Arc::new(RecordingNotifier::new()),
        settings,
    );
    let (tx, rx) = tokio::sync::watch::channel(false);
    let task = tokio::spawn({
        let monitor = Arc::clone(&monitor);
        async move { monitor.run(rx).await }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(fetcher.calls().len(), 1);

    let stopping = std::time::Instant::now();
    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(3), task)
        .await
        .expect("monitor should stop within the grace period")
        .unwrap();

    (fetcher, monitor, stopping.elapsed())
}

#[tokio::test]
async fn test_in_flight_cycle_finishes_within_grace() {
    let (_, monitor, elapsed) =
        shutdown_during_cycle(Duration::from_millis(300), Duration::from_secs(1)).await;

    let table = monitor.table().read().await;
    assert_eq!(table.cycles_completed(), 1);
    assert_eq!(table.status().targets[0].title.as_deref(), Some("Movie"));
    assert!(!table.is_running());
    assert!(elapsed < Duration::from_secs(1));
}

#[tokio::test]
async fn test_in_flight_cycle_aborted_after_grace() {
    let (fetcher, monitor, elapsed) =
        shutdown_during_cycle(Duration::from_secs(2), Duration::from_millis(100)).await;

    assert!(elapsed < Duration::from_millis(1500), "took {elapsed:?}");
    assert_eq!(fetcher.calls().len(), 1);

    let table = monitor.table().read().await;
    assert_eq!(table.cycles_completed(), 0);
    assert_eq!(table.status().checks_performed, 0);
    assert!(!table.is_running());
}

#[tokio::test]
async fn test_zero_interval_is_clamped() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let settings = MonitorSettings {
        check_interval: Duration::ZERO,
        ..MonitorSettings::default()
    };
    let monitor = build_monitor_with_settings(
        vec![target("movie-a")],
        Arc::clone(&fetcher),
        Arc::new(RecordingNotifier::new()),
        settings,
    );
    assert_eq!(monitor.settings().check_interval, MIN_CHECK_INTERVAL);

    let (tx, rx) = tokio::sync::watch::channel(false);
    let task = tokio::spawn({
        let monitor = Arc::clone(&monitor);
        async move { monitor.run(rx).await }
    });

    tokio::time::sleep(Duration::from_millis(300)).await;
    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("monitor should stop promptly")
        .unwrap();

    // One immediate tick, the next is a full second away
    assert_eq!(fetcher.calls().len(), 1);
}

/// Count false-or-unknown to true edges in a sequence of successful checks
fn expected_transitions(signals: &[Option<bool>]) -> usize {
    let mut last = None;
    let mut count = 0;
    for signal in signals.iter().flatten() {
        if *signal && !last.unwrap_or(false) {
            count += 1;
        }
        last = Some(*signal);
    }
    count
}

proptest! {
    #[test]
    fn prop_tracker_counts_rising_edges(signals in prop::collection::vec(prop::option::of(any::<bool>()), 0..40)) {
        let movie = target("movie-a");
        let mut tracker = StateTracker::new();
        let mut transitions = 0;

        for signal in &signals {
            match signal {
                Some(bookable) => {
                    let detection = Detection {
                        bookable: *bookable,
                        title: None,
                        status: String::from("scripted"),
                    };
                    if tracker.record_detection(&movie, &detection, Utc::now()) {
                        transitions += 1;
                    }
                }
                None => tracker.record_failure(&movie, "boom", Utc::now()),
            }
        }

        prop_assert_eq!(transitions, expected_transitions(&signals));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_monitor_notifies_per_rising_edge(signals in prop::collection::vec(prop::option::of(any::<bool>()), 1..12)) {
        let steps: Vec<Step> = signals
            .iter()
            .map(|s| s.map(Step::from_bool).unwrap_or(F))
            .collect();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let (_, notifier) = runtime.block_on(notifying_cycles(&steps));

        prop_assert_eq!(notifier.sent().len(), expected_transitions(&signals));
    }
}
