//! Name -> command table.
//!
//! Command modules register their [`CommandSpec`]s at startup through
//! [`crate::commands::register_defaults`]; the dispatcher only ever reads the
//! table afterwards.

use std::{collections::BTreeMap, fmt, future::Future, sync::Arc};

use async_trait::async_trait;
use engine::{EngineError, Role};
use thiserror::Error;

use crate::{context::CommandContext, transport::TransportError};

#[derive(Debug, Error)]
pub enum CommandError {
    /// Wrong arguments; the dispatcher replies with the usage line.
    #[error("usage: {0}")]
    Usage(String),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub type CommandResult = Result<(), CommandError>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    General,
    Currency,
    Games,
    Utility,
    Admin,
    Owner,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::General,
        Category::Currency,
        Category::Games,
        Category::Utility,
        Category::Admin,
        Category::Owner,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Category::General => "📌 General",
            Category::Currency => "💰 Currency",
            Category::Games => "🎰 Games",
            Category::Utility => "🧮 Utility",
            Category::Admin => "🛡️ Admin",
            Category::Owner => "👑 Owner",
        }
    }
}

#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, ctx: CommandContext) -> CommandResult;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> CommandHandler for FnHandler<F>
where
    F: Fn(CommandContext) -> Fut + Send + Sync,
    Fut: Future<Output = CommandResult> + Send + 'static,
{
    async fn handle(&self, ctx: CommandContext) -> CommandResult {
        (self.0)(ctx).await
    }
}

/// Wraps an `async fn(CommandContext) -> CommandResult` into a handler.
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn CommandHandler>
where
    F: Fn(CommandContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CommandResult> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

#[derive(Clone)]
pub struct CommandSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub usage: &'static str,
    pub category: Category,
    /// Declared requirement; the permission engine may override it.
    pub min_role: Role,
    pub handler: Arc<dyn CommandHandler>,
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("min_role", &self.min_role)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct CommandRegistry {
    commands: BTreeMap<&'static str, CommandSpec>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `spec`, replacing a command registered under the same name.
    pub fn register(&mut self, spec: CommandSpec) {
        if self.commands.contains_key(spec.name) {
            tracing::warn!("command {} registered twice, keeping the last one", spec.name);
        }
        self.commands.insert(spec.name, spec);
    }

    pub fn get(&self, name: &str) -> Option<&CommandSpec> {
        self.commands.get(name)
    }

    /// Commands in name order.
    pub fn iter(&self) -> impl Iterator<Item = &CommandSpec> {
        self.commands.values()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
