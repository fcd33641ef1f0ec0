use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Instant,
};

use chrono::{DateTime, Utc};
use engine::{Clock, Committed, Ledger, PermissionEngine, RateLimiter, Role};

use crate::{
    commands::games::Spinner,
    parsing::parse_user,
    registry::{CommandError, CommandRegistry, CommandSpec},
    transport::Transport,
};

/// Presentation and game knobs of the bot.
#[derive(Clone, Debug)]
pub struct CommandSettings {
    pub bot_name: String,
    pub prefix: String,
    pub currency_name: String,
    pub currency_symbol: String,
    pub slots_min_bet: i64,
    pub slots_max_bet: i64,
    pub default_sudo_minutes: i64,
    pub leaderboard_size: usize,
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self {
            bot_name: "Aamon".to_string(),
            prefix: ".".to_string(),
            currency_name: "cc".to_string(),
            currency_symbol: "💰".to_string(),
            slots_min_bet: 10,
            slots_max_bet: 1000,
            default_sudo_minutes: 60,
            leaderboard_size: 10,
        }
    }
}

/// Everything a command may touch, shared by the dispatcher and every
/// handler invocation.
#[derive(Debug)]
pub struct Services {
    pub ledger: Arc<Ledger>,
    pub permissions: Arc<PermissionEngine>,
    pub limiter: Arc<RateLimiter>,
    pub registry: Arc<CommandRegistry>,
    pub transport: Arc<dyn Transport>,
    pub clock: Arc<dyn Clock>,
    pub spinner: Arc<dyn Spinner>,
    pub settings: CommandSettings,
    pub started_at: DateTime<Utc>,
    commands_handled: AtomicU64,
}

impl Services {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ledger: Arc<Ledger>,
        permissions: Arc<PermissionEngine>,
        limiter: Arc<RateLimiter>,
        registry: Arc<CommandRegistry>,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
        spinner: Arc<dyn Spinner>,
        settings: CommandSettings,
    ) -> Self {
        let started_at = clock.now();
        Self {
            ledger,
            permissions,
            limiter,
            registry,
            transport,
            clock,
            spinner,
            settings,
            started_at,
            commands_handled: AtomicU64::new(0),
        }
    }

    pub fn commands_handled(&self) -> u64 {
        self.commands_handled.load(Ordering::Relaxed)
    }

    pub(crate) fn count_command(&self) {
        self.commands_handled.fetch_add(1, Ordering::Relaxed);
    }

    /// Resolved requirement of a registered command.
    pub fn required_role(&self, spec: &CommandSpec) -> Role {
        self.permissions.resolved_min_role(spec.name, spec.min_role)
    }
}

/// One command invocation as seen by its handler.
#[derive(Clone, Debug)]
pub struct CommandContext {
    pub services: Arc<Services>,
    pub command: String,
    pub sender_id: String,
    pub chat_id: String,
    pub is_group: bool,
    pub args: Vec<String>,
    pub quoted_sender_id: Option<String>,
    pub received_at: Instant,
}

impl CommandContext {
    pub fn settings(&self) -> &CommandSettings {
        &self.services.settings
    }

    pub fn ledger(&self) -> &Ledger {
        &self.services.ledger
    }

    pub fn permissions(&self) -> &PermissionEngine {
        &self.services.permissions
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.services.clock.now()
    }

    /// Sends `text` to the chat the command came from. A failed send is
    /// logged and otherwise ignored.
    pub async fn reply(&self, text: impl AsRef<str>) {
        if let Err(err) = self
            .services
            .transport
            .send(&self.chat_id, text.as_ref())
            .await
        {
            tracing::warn!(
                "failed to reply to {} in chat {}: {err}",
                self.command,
                self.chat_id
            );
        }
    }

    /// Replies with `text`, followed by a notice when `saved` is false.
    pub async fn reply_saved(&self, saved: bool, text: impl AsRef<str>) {
        if saved {
            self.reply(text).await;
        } else {
            self.reply(format!(
                "{}\n\n⚠️ The change is applied but could not be saved yet.",
                text.as_ref()
            ))
            .await;
        }
    }

    pub async fn reply_committed<T>(&self, committed: &Committed<T>, text: impl AsRef<str>) {
        self.reply_saved(committed.is_durable(), text).await;
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    /// Arguments from `index` on, joined by spaces.
    pub fn rest(&self, index: usize) -> String {
        self.args.get(index..).unwrap_or_default().join(" ")
    }

    /// User the command targets: the argument at `index` if given, else the
    /// author of the quoted message.
    pub fn target(&self, index: usize) -> Option<String> {
        match self.arg(index) {
            Some(raw) => parse_user(raw),
            None => self.quoted_sender_id.clone(),
        }
    }

    /// Target and raw amount of `<user> <amount>` arguments starting at
    /// `offset`. When replying to a message the user may be left out.
    pub fn target_and_amount(&self, offset: usize) -> Option<(String, &str)> {
        match self.args.get(offset..).unwrap_or_default() {
            [user, amount, ..] => parse_user(user).map(|user| (user, amount.as_str())),
            [amount] => self
                .quoted_sender_id
                .clone()
                .map(|user| (user, amount.as_str())),
            _ => None,
        }
    }

    pub fn usage(&self, usage: &str) -> CommandError {
        CommandError::Usage(format!("{}{}", self.settings().prefix, usage))
    }
}
