//! Telegram Bot API client and notification channel
//!
//! The client covers the two Bot API methods the application needs:
//! `sendMessage` for notifications and replies, and `getUpdates` for the
//! long-polling command loop.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{ChannelResult, DeliveryStatus, Notifier};
use crate::config::BotConfig;
use crate::utils::error::NotifyError;

/// Extra time allowed on top of the long-poll timeout
const POLL_SLACK: Duration = Duration::from_secs(10);

/// Envelope returned by every Bot API method
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<u16>,
}

/// Incoming update from `getUpdates`
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub first_name: String,
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Serialize)]
struct GetUpdates<'a> {
    offset: i64,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

/// Minimal Telegram Bot API client
#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    api_url: String,
    token: String,
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

impl TelegramClient {
    /// Create a client for the given API base URL and bot token
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> ChannelResult<Self> {
        let client = Client::builder().build()?;

        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    pub fn from_config(config: &BotConfig) -> ChannelResult<Self> {
        Self::new(&config.api_url, &config.token)
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.token, method)
    }

    /// Call `sendMessage`, returning the id of the sent message
    pub async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        timeout: Duration,
    ) -> ChannelResult<i64> {
        let body = SendMessage {
            chat_id,
            text,
            disable_web_page_preview: true,
        };

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| request_error(e, timeout))?;

        let message: Message = parse_response(response, timeout).await?;
        Ok(message.message_id)
    }

    /// Long-poll `getUpdates` starting at `offset`
    pub async fn get_updates(&self, offset: i64, poll_timeout: Duration) -> ChannelResult<Vec<Update>> {
        let body = GetUpdates {
            offset,
            timeout: poll_timeout.as_secs(),
            allowed_updates: &["message"],
        };
        let timeout = poll_timeout + POLL_SLACK;

        let response = self
            .client
            .post(self.method_url("getUpdates"))
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| request_error(e, timeout))?;

        parse_response(response, timeout).await
    }
}

fn request_error(e: reqwest::Error, timeout: Duration) -> NotifyError {
    if e.is_timeout() {
        NotifyError::Timeout(timeout.as_secs())
    } else {
        // The request URL carries the bot token
        NotifyError::Http(e.without_url())
    }
}

async fn parse_response<T>(response: reqwest::Response, timeout: Duration) -> ChannelResult<T>
where
    T: for<'de> Deserialize<'de>,
{
    let status = response.status().as_u16();
    let envelope: ApiResponse<T> = response
        .json()
        .await
        .map_err(|e| request_error(e, timeout))?;

    match envelope {
        ApiResponse {
            ok: true,
            result: Some(result),
            ..
        } => Ok(result),
        other => Err(NotifyError::Rejected {
            status: other.error_code.unwrap_or(status),
            description: other
                .description
                .unwrap_or_else(|| String::from("no description")),
        }),
    }
}

/// Notification channel that posts to one Telegram chat
#[derive(Debug, Clone)]
pub struct TelegramChannel {
    client: TelegramClient,
    chat_id: Option<String>,
    timeout: Duration,
}

impl TelegramChannel {
    pub fn new(client: TelegramClient, chat_id: Option<String>, timeout: Duration) -> Self {
        Self {
            client,
            chat_id: chat_id.filter(|id| !id.trim().is_empty()),
            timeout,
        }
    }

    pub fn from_config(config: &BotConfig) -> ChannelResult<Self> {
        Ok(Self::new(
            TelegramClient::from_config(config)?,
            config.chat_id.clone(),
            Duration::from_secs(config.notify_timeout_secs),
        ))
    }

    pub fn has_destination(&self) -> bool {
        self.chat_id.is_some()
    }
}

#[async_trait]
impl Notifier for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, message: &str) -> ChannelResult<DeliveryStatus> {
        let chat_id = self.chat_id.as_deref().ok_or(NotifyError::NoDestination)?;

        let message_id = self
            .client
            .send_message(chat_id, message, self.timeout)
            .await?;

        tracing::debug!(chat_id = %chat_id, message_id, "Telegram message delivered");

        Ok(DeliveryStatus::success_with_message(
            self.name(),
            format!("message {message_id}"),
        ))
    }
}
