//! Ticket availability detection
//!
//! This module turns a booking page into a boolean "bookable" signal.
//!
//! The decision is made in order:
//! 1. An enabled booking control (button, link or `role="button"`) whose text
//!    contains a booking indicator
//! 2. A booking indicator in the page text with no unavailable marker
//! 3. An unavailable marker in the page text
//! 4. Nothing conclusive, reported as not bookable
//!
//! Matching is case insensitive. Detection never fails: empty or malformed
//! input is simply not bookable.

pub mod html;
pub mod selectors;

pub use html::{controls, extract_title, visible_text, Control};

use scraper::Html;
use serde::Serialize;

use crate::config::DetectorConfig;

/// Status reported when a page has neither booking indicators nor markers
pub const AMBIGUOUS_STATUS: &str = "No clear booking indicators found";

/// Result of running the detector over one page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Detection {
    /// Whether tickets look bookable
    pub bookable: bool,

    /// Page title, when one could be extracted
    pub title: Option<String>,

    /// Human-readable reason for the decision
    pub status: String,
}

impl Detection {
    fn new(bookable: bool, title: Option<String>, status: impl Into<String>) -> Self {
        Self {
            bookable,
            title,
            status: status.into(),
        }
    }

    /// Whether the detector found nothing conclusive
    pub fn is_ambiguous(&self) -> bool {
        !self.bookable && self.status == AMBIGUOUS_STATUS
    }
}

/// Pure detector over page text
#[derive(Debug, Clone)]
pub struct AvailabilityDetector {
    /// Lowercased booking indicators
    indicators: Vec<String>,

    /// Lowercased unavailable markers
    markers: Vec<String>,
}

impl AvailabilityDetector {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            indicators: lowercase_all(&config.booking_indicators),
            markers: lowercase_all(&config.unavailable_markers),
        }
    }

    /// Decide whether the page shows bookable tickets
    pub fn detect(&self, page: &str) -> Detection {
        if page.trim().is_empty() {
            return Detection::new(false, None, "Empty page");
        }

        let document = Html::parse_document(page);
        let title = extract_title(&document);

        if let Some(control) = controls(&document)
            .into_iter()
            .filter(|control| control.enabled)
            .find(|control| self.find_indicator(&control.text).is_some())
        {
            return Detection::new(
                true,
                title,
                format!("Booking button found: {}", control.text),
            );
        }

        let text = visible_text(&document).to_lowercase();
        let marker = self.find_marker(&text);

        if let Some(indicator) = self.find_indicator(&text) {
            if marker.is_none() {
                return Detection::new(
                    true,
                    title,
                    format!("Tickets available - found '{indicator}'"),
                );
            }
        }

        match marker {
            Some(marker) => Detection::new(false, title, format!("Not available - {marker}")),
            None => Detection::new(false, title, AMBIGUOUS_STATUS),
        }
    }

    fn find_indicator(&self, text: &str) -> Option<&str> {
        let text = text.to_lowercase();
        self.indicators
            .iter()
            .find(|indicator| text.contains(indicator.as_str()))
            .map(String::as_str)
    }

    fn find_marker(&self, lowered: &str) -> Option<&str> {
        self.markers
            .iter()
            .find(|marker| lowered.contains(marker.as_str()))
            .map(String::as_str)
    }
}

impl Default for AvailabilityDetector {
    fn default() -> Self {
        Self::new(&DetectorConfig::default())
    }
}

fn lowercase_all(phrases: &[String]) -> Vec<String> {
    phrases
        .iter()
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .collect()
}
