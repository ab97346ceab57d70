//! Chat command parsing and replies

use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;

use crate::monitor::{Monitor, StatusSnapshot};
use crate::utils::error::CommandError;
use crate::utils::{format_duration, parse_http_url};

const ADD_USAGE: &str = "/add <name> <url> or /add <url>";
const REMOVE_USAGE: &str = "/remove <name>";

lazy_static! {
    static ref GREETING: Regex =
        Regex::new(r"(?i)\b(hello|hi|hey|greetings)\b").expect("Invalid regex pattern");
    static ref FAREWELL: Regex =
        Regex::new(r"(?i)\b(bye|goodbye|see you|farewell)\b").expect("Invalid regex pattern");
    static ref URL: Regex = Regex::new(r"https?://\S+").expect("Invalid regex pattern");
}

/// A parsed chat message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Help,
    Status,
    Add { name: Option<String>, url: String },
    Remove(String),
    List,
    Check,
    /// A slash command the bot does not know
    Unknown(String),
    /// Anything that is not a command
    Text(String),
}

impl BotCommand {
    /// Parse a message text into a command
    ///
    /// Commands may carry a `@botname` suffix, as Telegram sends in groups.
    pub fn parse(text: &str) -> Result<Self, CommandError> {
        let text = text.trim();
        let Some(rest) = text.strip_prefix('/') else {
            return Ok(Self::Text(text.to_string()));
        };

        let (head, args) = rest
            .split_once(char::is_whitespace)
            .map(|(h, a)| (h, a.trim()))
            .unwrap_or((rest, ""));
        let command = head.split('@').next().unwrap_or(head).to_lowercase();

        match command.as_str() {
            "start" => Ok(Self::Start),
            "help" => Ok(Self::Help),
            "status" => Ok(Self::Status),
            "list" => Ok(Self::List),
            "check" => Ok(Self::Check),
            "add" | "add_movie" => parse_add(args),
            "remove" => {
                if args.is_empty() {
                    Err(CommandError::Usage(REMOVE_USAGE))
                } else {
                    Ok(Self::Remove(args.to_string()))
                }
            }
            _ => Ok(Self::Unknown(command)),
        }
    }
}

/// `/add <url>` or `/add <name...> <url>`
fn parse_add(args: &str) -> Result<BotCommand, CommandError> {
    let Some((head, url)) = args.rsplit_once(char::is_whitespace).or_else(|| {
        (!args.is_empty()).then_some(("", args))
    }) else {
        return Err(CommandError::Usage(ADD_USAGE));
    };

    if parse_http_url(url).is_none() {
        return Err(CommandError::InvalidUrl(url.to_string()));
    }

    let name = head.trim();
    Ok(BotCommand::Add {
        name: (!name.is_empty()).then(|| name.to_string()),
        url: url.to_string(),
    })
}

/// Produces the reply for each incoming message
#[derive(Clone)]
pub struct CommandHandler {
    monitor: Arc<Monitor>,
}

impl CommandHandler {
    pub fn new(monitor: Arc<Monitor>) -> Self {
        Self { monitor }
    }

    /// Handle one message and return the reply text
    pub async fn handle(&self, text: &str) -> String {
        match BotCommand::parse(text) {
            Ok(command) => self.execute(command).await,
            Err(e) => format!("⚠️ {e}"),
        }
    }

    async fn execute(&self, command: BotCommand) -> String {
        match command {
            BotCommand::Start => welcome_text(),
            BotCommand::Help => help_text(self.monitor.settings().check_interval),
            BotCommand::Status => {
                let status = self.monitor.table().read().await.status();
                format_status(&status)
            }
            BotCommand::List => {
                let table = self.monitor.table().read().await;
                if table.targets().is_empty() {
                    return String::from("📭 No targets are being monitored.");
                }
                let lines: Vec<String> = table
                    .targets()
                    .iter()
                    .enumerate()
                    .map(|(i, t)| format!("{}. {}\n   {}", i + 1, t.name, t.url))
                    .collect();
                format!("🎬 Monitored targets:\n\n{}", lines.join("\n"))
            }
            BotCommand::Add { name, url } => {
                let result = self
                    .monitor
                    .table()
                    .write()
                    .await
                    .add_target(name.as_deref(), &url);
                match result {
                    Ok(target) => format!(
                        "✅ Now monitoring '{}'\n🔗 {}\n\nIt will be checked in the next cycle.",
                        target.name, target.url
                    ),
                    Err(e) => format!("⚠️ {e}"),
                }
            }
            BotCommand::Remove(name) => {
                let result = self.monitor.table().write().await.remove_target(&name);
                match result {
                    Ok(target) => format!("🗑️ Stopped monitoring '{}'", target.name),
                    Err(e) => format!("⚠️ {e}"),
                }
            }
            BotCommand::Check => {
                let report = self.monitor.run_cycle().await;
                format!("🔍 Check completed: {report}")
            }
            BotCommand::Unknown(command) => {
                format!("❓ Unknown command /{command}. Send /help for the command list.")
            }
            BotCommand::Text(text) => reply_to_text(&text),
        }
    }
}

/// Reply for plain (non-command) messages
pub fn reply_to_text(text: &str) -> String {
    if GREETING.is_match(text) {
        String::from("Hello there! 👋 How can I help you with movie ticket monitoring today?")
    } else if FAREWELL.is_match(text) {
        String::from("Goodbye! 👋 I'll keep monitoring for movie tickets. See you later!")
    } else if let Some(url) = URL.find(text) {
        format!(
            "🎬 I see you've shared a link!\n\n📝 URL received: {}\n\nSend /add {} to start monitoring it.",
            url.as_str(),
            url.as_str()
        )
    } else {
        format!("You said: {text}\n\nI'm listening! 🎧")
    }
}

fn welcome_text() -> String {
    String::from(
        "🎬 Welcome to the movie ticket monitor bot! 🎬\n\n\
         I watch booking pages and notify you when tickets become available.\n\n\
         Send /help to see what I can do.",
    )
}

fn help_text(interval: Duration) -> String {
    format!(
        "📋 Available Commands:\n\n\
         /start - Welcome message\n\
         /help - Show this help message\n\
         /status - Monitoring status and per-target state\n\
         /list - List monitored targets\n\
         /add <name> <url> - Monitor a booking page (/add <url> derives the name)\n\
         /remove <name> - Stop monitoring a target\n\
         /check - Run a check right now\n\n\
         🎬 Pages are checked every {}.",
        format_duration(interval)
    )
}

/// Format the `/status` reply
pub fn format_status(status: &StatusSnapshot) -> String {
    let mut out = format!(
        "📊 Monitor Status\n\n\
         🔄 Monitoring: {}\n\
         ⏱️ Interval: {}\n\
         🎬 Targets: {}\n\
         🔍 Checks performed: {}\n\
         🔔 Notifications sent: {}\n\
         ⏳ Uptime: {}\n",
        if status.running { "✅ running" } else { "⏸️ stopped" },
        format_duration(Duration::from_secs(status.check_interval_secs)),
        status.targets.len(),
        status.checks_performed,
        status.notifications_sent,
        format_duration(Duration::from_secs(status.uptime_secs)),
    );

    for target in &status.targets {
        let checked = target
            .last_checked_at
            .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| String::from("never"));

        out.push_str(&format!(
            "\n{} {} ({})\n   last checked: {}",
            target.availability.glyph(),
            target.name,
            target.availability,
            checked
        ));
        if let Some(error) = &target.last_error {
            out.push_str(&format!(
                "\n   last error: {error} ({} in a row)",
                target.consecutive_failures
            ));
        }
    }

    out
}
