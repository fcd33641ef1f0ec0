//! Telegram front end of the bot.
//!
//! Messages are translated into [`InboundMessage`]s and fed to the
//! [`Dispatcher`], which runs the registered commands against the engine.

use std::sync::Arc;

use engine::{Clock, Ledger, PermissionEngine, RateLimiter, SystemClock};
use teloxide::prelude::*;

#[macro_use]
mod macros;

pub mod calc;
pub mod commands;
mod context;
mod dispatcher;
mod handlers;
pub mod parsing;
mod registry;
mod transport;
mod ui;

pub use commands::{
    games::{RandomSpinner, SlotSymbol, Spinner},
    register_defaults,
};
pub use context::{CommandContext, CommandSettings, Services};
pub use dispatcher::{DispatchOutcome, Dispatcher, InboundMessage};
pub use registry::{
    Category, CommandError, CommandHandler, CommandRegistry, CommandResult, CommandSpec,
    handler_fn,
};
pub use transport::{TelegramTransport, Transport, TransportError};

pub struct Bot {
    bot: teloxide::Bot,
    dispatcher: Arc<Dispatcher>,
}

impl Bot {
    pub fn builder() -> BotBuilder {
        BotBuilder::default()
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub async fn run(&self) {
        tracing::info!("Starting telegram bot...");

        let handler =
            dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

        teloxide::dispatching::Dispatcher::builder(self.bot.clone(), handler)
            .dependencies(dptree::deps![self.dispatcher.clone()])
            .default_handler(|upd| async move {
                tracing::debug!("Unhandled update: {:?}", upd.kind);
            })
            .error_handler(LoggingErrorHandler::with_custom_text(
                "An error has occurred in the dispatcher",
            ))
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;
    }
}

#[derive(Default, Debug)]
pub struct BotBuilder {
    token: String,
    ledger: Option<Arc<Ledger>>,
    permissions: Option<Arc<PermissionEngine>>,
    limiter: Option<Arc<RateLimiter>>,
    clock: Option<Arc<dyn Clock>>,
    settings: CommandSettings,
}

impl BotBuilder {
    pub fn token(mut self, token: &str) -> BotBuilder {
        self.token = token.to_string();
        self
    }

    pub fn ledger(mut self, ledger: Arc<Ledger>) -> BotBuilder {
        self.ledger = Some(ledger);
        self
    }

    pub fn permissions(mut self, permissions: Arc<PermissionEngine>) -> BotBuilder {
        self.permissions = Some(permissions);
        self
    }

    pub fn limiter(mut self, limiter: Arc<RateLimiter>) -> BotBuilder {
        self.limiter = Some(limiter);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> BotBuilder {
        self.clock = Some(clock);
        self
    }

    pub fn settings(mut self, settings: CommandSettings) -> BotBuilder {
        self.settings = settings;
        self
    }

    pub fn build(self) -> Result<Bot, String> {
        tracing::info!("Initializing telegram bot...");
        if self.token.is_empty() {
            return Err("missing telegram token".to_string());
        }
        let ledger = self.ledger.ok_or("missing ledger")?;
        let permissions = self.permissions.ok_or("missing permission engine")?;
        let limiter = self.limiter.ok_or("missing rate limiter")?;
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);

        let mut registry = CommandRegistry::new();
        register_defaults(&mut registry);
        tracing::info!("{} commands registered", registry.len());

        let bot = teloxide::Bot::new(&self.token);
        let services = Services::new(
            ledger,
            permissions,
            limiter,
            Arc::new(registry),
            Arc::new(TelegramTransport::new(bot.clone())),
            clock,
            Arc::new(RandomSpinner),
            self.settings,
        );

        Ok(Bot {
            bot,
            dispatcher: Arc::new(Dispatcher::new(Arc::new(services))),
        })
    }
}
