//! Booking page fetching with rate limiting
//!
//! This module fetches monitored pages with browser-like headers, a minimum
//! spacing between requests and fixed-interval retry for transient failures.

pub mod fetcher;
pub mod headers;

pub use fetcher::{decode_bytes, HttpFetcher, PageFetcher};
pub use headers::{build_browser_headers, USER_AGENTS};
