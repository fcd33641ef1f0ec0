//! Built-in commands, one module per category.

use engine::EngineError;

use crate::{
    context::CommandContext,
    registry::{CommandRegistry, CommandResult},
};

pub mod admin;
pub mod currency;
pub mod games;
pub mod general;
pub mod owner;
pub mod utility;

/// Registers every built-in command.
pub fn register_defaults(registry: &mut CommandRegistry) {
    general::register(registry);
    currency::register(registry);
    games::register(registry);
    utility::register(registry);
    admin::register(registry);
    owner::register(registry);
}

/// Answers the engine refusing an action; other errors are propagated.
pub(crate) async fn reply_refusal(ctx: &CommandContext, err: EngineError) -> CommandResult {
    match err {
        EngineError::PermissionDenied(_) => {
            ctx.reply("⛔ You are not allowed to do that.").await;
            Ok(())
        }
        EngineError::NotFound(_) => {
            ctx.reply("🤷 Nothing to do.").await;
            Ok(())
        }
        err => Err(err.into()),
    }
}
