//! Telegram command bot
//!
//! Long-polls `getUpdates` and answers each text message through the
//! [`CommandHandler`]. The poller stops on the shared shutdown signal.

pub mod commands;

pub use commands::{format_status, BotCommand, CommandHandler};

use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::notifications::TelegramClient;
use crate::utils::truncate_text;

/// Pause after a failed poll before trying again
const ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Default time a command in progress gets to finish after shutdown
const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Long-polling loop for incoming chat messages
pub struct BotPoller {
    client: TelegramClient,
    handler: CommandHandler,
    poll_timeout: Duration,
    reply_timeout: Duration,
    shutdown_grace: Duration,
    offset: i64,
}

impl BotPoller {
    pub fn new(
        client: TelegramClient,
        handler: CommandHandler,
        poll_timeout: Duration,
        reply_timeout: Duration,
    ) -> Self {
        Self {
            client,
            handler,
            poll_timeout,
            reply_timeout,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            offset: 0,
        }
    }

    /// Time a command in progress (such as `/check`) gets after shutdown
    #[must_use]
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Poll until shutdown is signalled
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            poll_timeout_secs = self.poll_timeout.as_secs(),
            "Bot poller started"
        );

        'poll: loop {
            if *shutdown.borrow() {
                break;
            }

            let updates = tokio::select! {
                result = self.client.get_updates(self.offset, self.poll_timeout) => result,
                _ = shutdown.changed() => break,
            };

            match updates {
                Ok(updates) => {
                    for update in updates {
                        self.offset = self.offset.max(update.update_id + 1);
                        let Some(message) = update.message else {
                            continue;
                        };
                        let Some(text) = message.text else {
                            continue;
                        };

                        debug!(
                            chat_id = message.chat.id,
                            text = %truncate_text(&text, 80),
                            "Message received"
                        );
                        let (reply, stopping) = self.reply_within_grace(&text, &mut shutdown).await;

                        if let Some(reply) = reply {
                            if let Err(e) = self
                                .client
                                .send_message(&message.chat.id.to_string(), &reply, self.reply_timeout)
                                .await
                            {
                                warn!(chat_id = message.chat.id, error = %e, "Failed to send reply");
                            }
                        }
                        if stopping {
                            break 'poll;
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Polling for updates failed");
                    tokio::select! {
                        _ = tokio::time::sleep(ERROR_BACKOFF) => {}
                        _ = shutdown.changed() => break,
                    }
                }
            }
        }

        info!("Bot poller stopped");
    }

    /// Handle one message, giving it the grace period if shutdown arrives
    ///
    /// Returns the reply, if one was produced, and whether shutdown was seen.
    async fn reply_within_grace(
        &self,
        text: &str,
        shutdown: &mut watch::Receiver<bool>,
    ) -> (Option<String>, bool) {
        let handling = self.handler.handle(text);
        tokio::pin!(handling);

        tokio::select! {
            reply = &mut handling => (Some(reply), false),
            _ = shutdown.changed() => {
                info!(
                    grace_secs = self.shutdown_grace.as_secs(),
                    "Shutdown requested, waiting for command in progress"
                );
                match tokio::time::timeout(self.shutdown_grace, &mut handling).await {
                    Ok(reply) => (Some(reply), true),
                    Err(_) => {
                        warn!("Command did not finish within grace period, aborted");
                        (None, true)
                    }
                }
            }
        }
    }
}
