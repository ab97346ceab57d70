//! HTTP page fetcher with rate limiting and fixed-interval retry
//!
//! This module provides the page fetcher used by the monitor loop:
//! - User-Agent rotation (unless a fixed agent is configured)
//! - Minimum spacing between requests with governor
//! - Fixed-interval retry for transient failures
//! - Charset detection from the Content-Type header or `<meta charset>`

use async_trait::async_trait;
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use rand::seq::SliceRandom;
use reqwest::{Client, Response};
use std::time::Duration;

use super::headers::{build_browser_headers, USER_AGENTS};
use crate::config::Config;
use crate::utils::error::FetchError;
use crate::utils::parse_http_url;
use crate::utils::retry::{with_retry_if, RetryConfig};

/// Source of page text for the monitor loop
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch the page at `url` and return its decoded text
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Page fetcher backed by reqwest
pub struct HttpFetcher {
    /// HTTP client with configured timeout and compression
    client: Client,

    /// Spaces out consecutive requests; `None` disables spacing
    rate_limiter: Option<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,

    /// Retry policy for transient failures
    retry: RetryConfig,

    /// Fixed user agent, or `None` to rotate through [`USER_AGENTS`]
    user_agent: Option<String>,
}

impl HttpFetcher {
    /// Create a fetcher from the application configuration
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn from_config(config: &Config) -> Result<Self, FetchError> {
        let mut fetcher = Self::with_config(
            config.request_timeout(),
            Duration::from_secs(config.fetcher.min_request_interval_secs),
            config.retry(),
        )?;
        fetcher.user_agent = config.fetcher.user_agent.clone();
        Ok(fetcher)
    }

    /// Create a fetcher with explicit settings
    ///
    /// # Arguments
    ///
    /// * `timeout` - Request timeout; a timed out request is a `FetchError::Timeout`
    /// * `min_interval` - Minimum spacing between requests (zero disables it)
    /// * `retry` - Retry policy for transient failures
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn with_config(
        timeout: Duration,
        min_interval: Duration,
        retry: RetryConfig,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .cookie_store(true)
            .build()?;

        let rate_limiter = Quota::with_period(min_interval).map(RateLimiter::direct);

        Ok(Self {
            client,
            rate_limiter,
            retry,
            user_agent: None,
        })
    }

    /// Use a fixed user agent instead of rotating
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Send a single request and decode the body
    async fn fetch_once(&self, url: &str) -> Result<String, FetchError> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }

        tracing::debug!(url = %url, "Fetching page");

        let headers = build_browser_headers(self.user_agent());
        let response = self
            .client
            .get(url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout
                } else {
                    FetchError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        self.decode_response(response).await
    }

    /// Decode response body using the charset it declares
    async fn decode_response(&self, response: Response) -> Result<String, FetchError> {
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .unwrap_or_default();

        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Http(e)
            }
        })?;

        decode_bytes(&bytes, &content_type)
    }

    fn user_agent(&self) -> &str {
        match &self.user_agent {
            Some(agent) => agent,
            None => random_user_agent(),
        }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        if parse_http_url(url).is_none() {
            return Err(FetchError::InvalidUrl(url.to_string()));
        }

        with_retry_if(&self.retry, || self.fetch_once(url), FetchError::is_retryable).await
    }
}

/// Get a random user agent from the pool
fn random_user_agent() -> &'static str {
    let mut rng = rand::thread_rng();
    USER_AGENTS.choose(&mut rng).copied().unwrap_or(USER_AGENTS[0])
}

/// Decode bytes to a string with charset detection
///
/// This tries, in order:
/// 1. The charset named in the Content-Type header
/// 2. A `<meta charset>` declaration in the first 1024 bytes
/// 3. UTF-8, falling back to Windows-1252 for non-UTF-8 bodies
///
/// # Errors
///
/// Returns `FetchError::Decode` when a declared charset does not match the bytes
pub fn decode_bytes(bytes: &[u8], content_type: &str) -> Result<String, FetchError> {
    let declared = charset_label(content_type)
        .or_else(|| meta_charset(&bytes[..bytes.len().min(1024)]))
        .and_then(|label| Encoding::for_label(label.as_bytes()));

    if let Some(encoding) = declared {
        let (text, _, had_errors) = encoding.decode(bytes);
        if had_errors {
            return Err(FetchError::Decode(format!(
                "content is not valid {}",
                encoding.name()
            )));
        }
        return Ok(text.into_owned());
    }

    let (text, had_errors) = UTF_8.decode_without_bom_handling(bytes);
    if !had_errors {
        return Ok(text.into_owned());
    }

    let (text, _, _) = WINDOWS_1252.decode(bytes);
    Ok(text.into_owned())
}

fn charset_label(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .map(str::trim)
        .find_map(|part| {
            let (key, value) = part.split_once('=')?;
            key.trim()
                .eq_ignore_ascii_case("charset")
                .then(|| value.trim().trim_matches('"').to_ascii_lowercase())
        })
}

fn meta_charset(head: &[u8]) -> Option<String> {
    let head = String::from_utf8_lossy(head).to_ascii_lowercase();
    let start = head.find("charset=")? + "charset=".len();
    let label: String = head[start..]
        .trim_start_matches(['"', '\''])
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();

    (!label.is_empty()).then_some(label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_rotation() {
        let mut agents = std::collections::HashSet::new();
        for _ in 0..100 {
            let agent = random_user_agent();
            assert!(USER_AGENTS.contains(&agent));
            agents.insert(agent);
        }

        assert!(agents.len() > 1, "User agents should rotate");
    }

    #[test]
    fn test_fixed_user_agent() {
        let fetcher = HttpFetcher::with_config(
            Duration::from_secs(5),
            Duration::ZERO,
            RetryConfig::none(),
        )
        .unwrap()
        .with_user_agent("ticketwatch-test");

        assert_eq!(fetcher.user_agent(), "ticketwatch-test");
        assert!(fetcher.rate_limiter.is_none());
    }

    #[test]
    fn test_decode_utf8() {
        let text = "Book tickets ✅ 안녕하세요";
        let decoded = decode_bytes(text.as_bytes(), "text/html; charset=utf-8").unwrap();
        assert_eq!(decoded, text);
    }

    #[test]
    fn test_decode_declared_latin1() {
        // "café" in ISO-8859-1
        let bytes: &[u8] = &[0x63, 0x61, 0x66, 0xe9];
        let decoded = decode_bytes(bytes, "text/html; charset=ISO-8859-1").unwrap();
        assert_eq!(decoded, "café");
    }

    #[test]
    fn test_decode_meta_charset() {
        let mut bytes = b"<html><head><meta charset=\"windows-1252\"></head><body>caf".to_vec();
        bytes.push(0xe9);
        let decoded = decode_bytes(&bytes, "text/html").unwrap();
        assert!(decoded.ends_with("café"));
    }

    #[test]
    fn test_decode_undeclared_falls_back() {
        let bytes: &[u8] = &[0x63, 0x61, 0x66, 0xe9];
        let decoded = decode_bytes(bytes, "").unwrap();
        assert_eq!(decoded, "café");
    }

    #[test]
    fn test_decode_declared_mismatch() {
        let bytes: &[u8] = &[0xff, 0xfe, 0xfd];
        let result = decode_bytes(bytes, "text/html; charset=utf-8");
        assert!(matches!(result, Err(FetchError::Decode(_))));
    }

    #[test]
    fn test_charset_label() {
        assert_eq!(
            charset_label("text/html; charset=\"UTF-8\"").as_deref(),
            Some("utf-8")
        );
        assert_eq!(charset_label("text/html"), None);
    }

    #[tokio::test]
    async fn test_invalid_url_rejected() {
        let fetcher =
            HttpFetcher::with_config(Duration::from_secs(1), Duration::ZERO, RetryConfig::none())
                .unwrap();
        let result = fetcher.fetch("not a url").await;
        assert!(matches!(result, Err(FetchError::InvalidUrl(_))));
    }
}
