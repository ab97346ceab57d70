//! Configuration management for the ticketwatch monitor
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! environment variables. The bot token is required; everything else has a
//! default.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::models::MonitoredTarget;
use crate::utils::error::ConfigError;
use crate::utils::retry::RetryConfig;
use crate::utils::{name_from_url, parse_http_url};

/// Environment variable holding the bot token
pub const TOKEN_VAR: &str = "TELEGRAM_BOT_TOKEN";

/// Default browser User-Agent sent with page requests
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/116.0.0.0 Safari/537.36";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Telegram bot configuration
    pub bot: BotConfig,

    /// Monitor loop configuration
    pub monitor: MonitorConfig,

    /// Page fetcher configuration
    pub fetcher: FetcherConfig,

    /// Availability detector phrases
    pub detector: DetectorConfig,

    /// Optional HTTP admin API
    pub server: ServerConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Pages to monitor, in check order
    pub targets: Vec<MonitoredTarget>,
}

/// Telegram bot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Bot API token
    pub token: String,

    /// Chat that receives availability notifications
    pub chat_id: Option<String>,

    /// Bot API base URL
    pub api_url: String,

    /// Long-poll timeout for `getUpdates` in seconds
    pub poll_timeout_secs: u64,

    /// Upper bound on a single notification delivery in seconds
    pub notify_timeout_secs: u64,

    /// Whether to answer chat commands
    pub enable_commands: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            chat_id: None,
            api_url: String::from("https://api.telegram.org"),
            poll_timeout_secs: 30,
            notify_timeout_secs: 10,
            enable_commands: true,
        }
    }
}

/// Monitor loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Seconds between check cycles
    pub check_interval_secs: u64,

    /// Seconds an in-flight cycle may keep running after shutdown is requested
    pub shutdown_grace_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: 300,
            shutdown_grace_secs: 30,
        }
    }
}

/// Page fetcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// Minimum seconds between two page requests
    pub min_request_interval_secs: u64,

    /// Retries for retryable failures within one fetch
    pub max_retries: u32,

    /// Fixed delay between retries in seconds
    pub retry_delay_secs: u64,

    /// User agent string; when unset a browser agent is rotated per request
    pub user_agent: Option<String>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 10,
            min_request_interval_secs: 2,
            max_retries: 2,
            retry_delay_secs: 2,
            user_agent: None,
        }
    }
}

/// Phrases used by the availability detector
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Phrases that indicate booking is open
    pub booking_indicators: Vec<String>,

    /// Phrases that indicate booking is closed
    pub unavailable_markers: Vec<String>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            booking_indicators: [
                "book tickets",
                "book now",
                "buy tickets",
                "purchase tickets",
                "select seats",
                "choose seats",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            unavailable_markers: [
                "sold out",
                "not available",
                "coming soon",
                "advance booking not started",
                "no shows available",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// HTTP admin API configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address; the admin API is disabled when unset
    pub bind_address: Option<SocketAddr>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

/// Pages monitored when nothing else is configured
pub fn default_targets() -> Vec<MonitoredTarget> {
    vec![
        MonitoredTarget::new(
            "Demon Slayer: Infinity Castle",
            "https://in.bookmyshow.com/movies/mumbai/demon-slayer-kimetsu-no-yaiba-the-movie-infinity-castle-japanese/ET00436673",
        ),
        MonitoredTarget::new(
            "Param Sundari",
            "https://in.bookmyshow.com/movies/mumbai/param-sundari-hindi/ET00426409",
        ),
    ]
}

impl Config {
    /// Load configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` when `TELEGRAM_BOT_TOKEN` is not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load defaults, an optional TOML file, then environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Same as [`Config::load`] with an explicit variable lookup
    pub fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self::load_settings_with(path, lookup)?;

        if config.bot.token.trim().is_empty() {
            return Err(ConfigError::Missing(TOKEN_VAR));
        }

        Ok(config)
    }

    /// Load and validate settings without requiring the bot token
    ///
    /// Used by commands that only fetch pages.
    pub fn load_settings(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_settings_with(path, |key| std::env::var(key).ok())
    }

    pub fn load_settings_with<F>(path: Option<&Path>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        config.apply_env(lookup)?;

        if config.targets.is_empty() {
            config.targets = default_targets();
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file without environment overrides
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::File {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::File {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Apply environment variable overrides
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = get(TOKEN_VAR) {
            self.bot.token = token.trim().to_string();
        }
        if let Some(chat_id) = get("TELEGRAM_CHAT_ID") {
            self.bot.chat_id = Some(chat_id.trim().to_string());
        }
        if let Some(api_url) = get("TELEGRAM_API_URL") {
            self.bot.api_url = api_url.trim().trim_end_matches('/').to_string();
        }
        if let Some(v) = parse_var(&get, "TICKETWATCH_CHECK_INTERVAL")? {
            self.monitor.check_interval_secs = v;
        }
        if let Some(v) = parse_var(&get, "TICKETWATCH_SHUTDOWN_GRACE")? {
            self.monitor.shutdown_grace_secs = v;
        }
        if let Some(v) = parse_var(&get, "TICKETWATCH_REQUEST_TIMEOUT")? {
            self.fetcher.request_timeout_secs = v;
        }
        if let Some(v) = parse_var(&get, "TICKETWATCH_NOTIFY_TIMEOUT")? {
            self.bot.notify_timeout_secs = v;
        }
        if let Some(v) = parse_var(&get, "TICKETWATCH_MIN_REQUEST_INTERVAL")? {
            self.fetcher.min_request_interval_secs = v;
        }
        if let Some(v) = parse_var(&get, "TICKETWATCH_MAX_RETRIES")? {
            self.fetcher.max_retries = v;
        }
        if let Some(user_agent) = get("TICKETWATCH_USER_AGENT") {
            self.fetcher.user_agent = Some(user_agent);
        }
        if let Some(v) = parse_var(&get, "TICKETWATCH_HTTP_ADDR")? {
            self.server.bind_address = Some(v);
        }
        if let Some(format) = get("TICKETWATCH_LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Some(raw) = get("TICKETWATCH_TARGETS") {
            self.targets = parse_targets(&raw)?;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.monitor.check_interval_secs == 0 {
            return Err(ConfigError::invalid("check_interval_secs", "must be greater than 0"));
        }
        if self.fetcher.request_timeout_secs == 0 {
            return Err(ConfigError::invalid("request_timeout_secs", "must be greater than 0"));
        }
        if self.bot.notify_timeout_secs == 0 {
            return Err(ConfigError::invalid("notify_timeout_secs", "must be greater than 0"));
        }
        if parse_http_url(&self.bot.api_url).is_none() {
            return Err(ConfigError::invalid("api_url", "must be an http(s) URL"));
        }
        if self.detector.booking_indicators.iter().all(|p| p.trim().is_empty()) {
            return Err(ConfigError::invalid("booking_indicators", "at least one phrase is required"));
        }
        if !matches!(self.logging.format.as_str(), "text" | "json") {
            return Err(ConfigError::invalid("format", "must be 'text' or 'json'"));
        }

        let mut names = HashSet::new();
        for target in &self.targets {
            if target.name.trim().is_empty() {
                return Err(ConfigError::invalid("targets", "target name cannot be empty"));
            }
            if !names.insert(target.name.as_str()) {
                return Err(ConfigError::invalid(
                    "targets",
                    format!("duplicate target name '{}'", target.name),
                ));
            }
            if parse_http_url(&target.url).is_none() {
                return Err(ConfigError::invalid(
                    "targets",
                    format!("'{}' is not an http(s) URL", target.url),
                ));
            }
        }

        Ok(())
    }

    /// Copy of this configuration safe to print
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.bot.token.is_empty() {
            copy.bot.token = String::from("<redacted>");
        }
        copy
    }

    #[must_use]
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.monitor.check_interval_secs)
    }

    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.monitor.shutdown_grace_secs)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.fetcher.request_timeout_secs)
    }

    #[must_use]
    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.bot.notify_timeout_secs)
    }

    #[must_use]
    pub fn retry(&self) -> RetryConfig {
        RetryConfig::new(
            self.fetcher.max_retries,
            Duration::from_secs(self.fetcher.retry_delay_secs),
        )
    }
}

fn parse_var<T, G>(get: &G, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| ConfigError::invalid(key, e.to_string()))
        })
        .transpose()
}

/// Parse a `name=url;name=url` list; bare URLs get a name derived from the path
pub fn parse_targets(raw: &str) -> Result<Vec<MonitoredTarget>, ConfigError> {
    raw.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (name, url) = match entry.split_once('=') {
                Some((name, url)) if !name.contains("://") => (Some(name.trim()), url.trim()),
                _ => (None, entry),
            };

            let parsed = parse_http_url(url).ok_or_else(|| {
                ConfigError::invalid("TICKETWATCH_TARGETS", format!("'{url}' is not an http(s) URL"))
            })?;

            let name = name
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| name_from_url(&parsed));

            Ok(MonitoredTarget::new(name, url))
        })
        .collect()
}
