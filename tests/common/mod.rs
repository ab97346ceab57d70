//! Common test utilities
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ticketwatch::crawler::PageFetcher;
use ticketwatch::models::MonitoredTarget;
use ticketwatch::monitor::{Monitor, MonitorSettings, WatchTable};
use ticketwatch::notifications::{DeliveryStatus, Notifier};
use ticketwatch::parser::AvailabilityDetector;
use ticketwatch::utils::error::{FetchError, NotifyError};

/// Test fixture paths
const FIXTURES_DIR: &str = "tests/fixtures/html";

pub const BOOKABLE_PAGE: &str = "<html><body><h1>Movie</h1><button>Book tickets</button></body></html>";
pub const SOLD_OUT_PAGE: &str = "<html><body><h1>Movie</h1><p>Sold out</p></body></html>";

pub fn load_fixture(filename: &str) -> String {
    let path = format!("{FIXTURES_DIR}/{filename}");
    fs::read_to_string(&path).unwrap_or_else(|_| panic!("Failed to load fixture: {path}"))
}

/// One scripted fetch result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Available,
    Unavailable,
    Fail,
}

impl Step {
    pub fn from_bool(bookable: bool) -> Self {
        if bookable {
            Self::Available
        } else {
            Self::Unavailable
        }
    }
}

/// Fetcher that replays a scripted sequence of results per URL
///
/// Once a script runs out the last step repeats.
#[derive(Default)]
pub struct ScriptedFetcher {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    last: Mutex<HashMap<String, Step>>,
    calls: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn script(&self, url: &str, steps: impl IntoIterator<Item = Step>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(url.to_string(), steps.into_iter().collect());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let step = {
            let mut scripts = self.scripts.lock().unwrap();
            let mut last = self.last.lock().unwrap();
            let next = scripts.get_mut(url).and_then(VecDeque::pop_front);
            let step = next
                .or_else(|| last.get(url).copied())
                .unwrap_or(Step::Unavailable);
            last.insert(url.to_string(), step);
            step
        };

        match step {
            Step::Available => Ok(BOOKABLE_PAGE.to_string()),
            Step::Unavailable => Ok(SOLD_OUT_PAGE.to_string()),
            Step::Fail => Err(FetchError::Status(503)),
        }
    }
}

/// Notifier that records every message
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<String>>,
    fail: bool,
    delay: Option<Duration>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Notifier that takes `delay` before each delivery
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, message: &str) -> Result<DeliveryStatus, NotifyError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(NotifyError::Rejected {
                status: 400,
                description: "Bad Request: chat not found".to_string(),
            });
        }
        self.sent.lock().unwrap().push(message.to_string());
        Ok(DeliveryStatus::success("recording"))
    }
}

pub fn target(name: &str) -> MonitoredTarget {
    MonitoredTarget::new(name, format!("https://example.com/movies/{name}"))
}

/// Build a monitor over fakes
pub fn build_monitor(
    targets: Vec<MonitoredTarget>,
    fetcher: Arc<ScriptedFetcher>,
    notifier: Arc<RecordingNotifier>,
) -> Arc<Monitor> {
    build_monitor_with_settings(targets, fetcher, notifier, MonitorSettings::default())
}

pub fn build_monitor_with_settings(
    targets: Vec<MonitoredTarget>,
    fetcher: Arc<ScriptedFetcher>,
    notifier: Arc<RecordingNotifier>,
    settings: MonitorSettings,
) -> Arc<Monitor> {
    let table = WatchTable::new(targets, settings.check_interval).into_shared();
    Arc::new(Monitor::new(
        table,
        fetcher,
        AvailabilityDetector::default(),
        notifier,
        settings,
    ))
}
