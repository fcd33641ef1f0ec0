use crate::{
    calc::{self, evaluate},
    context::CommandContext,
    registry::{CommandRegistry, CommandResult},
};

pub(crate) fn register(registry: &mut CommandRegistry) {
    command!(registry, "calc", calc, Utility, Citizen, "calc <expression>", "Evaluate arithmetic");
}

/// Shared by `calc` and the owner's `eval`.
pub(crate) async fn reply_evaluation(ctx: &CommandContext, usage: &str) -> CommandResult {
    let expression = ctx.rest(0);
    if expression.trim().is_empty() {
        return Err(ctx.usage(usage));
    }

    match evaluate(&expression) {
        Ok(value) => {
            ctx.reply(format!("🧮 {expression} = {}", calc::format_number(value)))
                .await;
        }
        Err(err) => ctx.reply(format!("❌ {err}")).await,
    }
    Ok(())
}

async fn calc(ctx: CommandContext) -> CommandResult {
    reply_evaluation(&ctx, "calc <expression>").await
}
