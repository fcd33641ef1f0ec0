use engine::{EngineError, Role};

use crate::{
    commands::{reply_refusal, utility::reply_evaluation},
    context::CommandContext,
    registry::{CommandRegistry, CommandResult},
};

pub(crate) fn register(registry: &mut CommandRegistry) {
    command!(registry, "addadmin", addadmin, Owner, Owner, "addadmin <user>", "Promote a user to admin");
    command!(registry, "removeadmin", removeadmin, Owner, Owner, "removeadmin <user>", "Demote an admin");
    command!(
        registry,
        "commandrole",
        commandrole,
        Owner,
        Owner,
        "commandrole <command> <owner|admin|citizen|reset>",
        "Change who may run a command"
    );
    command!(registry, "eval", eval, Owner, Owner, "eval <expression>", "Evaluate arithmetic");
}

async fn addadmin(ctx: CommandContext) -> CommandResult {
    let Some(target) = ctx.target(0) else {
        return Err(ctx.usage("addadmin <user>"));
    };

    match ctx.permissions().add_admin(&target, &ctx.sender_id) {
        Ok(()) => ctx.reply(format!("🛡️ {target} is now an admin.")).await,
        Err(EngineError::InvalidArgument(reason)) => ctx.reply(format!("❌ {reason}.")).await,
        Err(err) => return reply_refusal(&ctx, err).await,
    }
    Ok(())
}

async fn removeadmin(ctx: CommandContext) -> CommandResult {
    let Some(target) = ctx.target(0) else {
        return Err(ctx.usage("removeadmin <user>"));
    };

    match ctx.permissions().remove_admin(&target, &ctx.sender_id) {
        Ok(()) => ctx.reply(format!("👤 {target} is no longer an admin.")).await,
        Err(EngineError::NotFound(_)) => ctx.reply(format!("🤷 {target} is not an admin.")).await,
        Err(err) => return reply_refusal(&ctx, err).await,
    }
    Ok(())
}

async fn commandrole(ctx: CommandContext) -> CommandResult {
    const USAGE: &str = "commandrole <command> <owner|admin|citizen|reset>";
    let (Some(command), Some(raw_role)) = (ctx.arg(0), ctx.arg(1)) else {
        return Err(ctx.usage(USAGE));
    };
    let command = command
        .trim_start_matches(ctx.settings().prefix.as_str())
        .to_lowercase();

    let services = &ctx.services;
    let Some(spec) = services.registry.get(&command) else {
        ctx.reply(format!("🤷 Unknown command {command}.")).await;
        return Ok(());
    };
    let declared = spec.min_role;

    if raw_role.eq_ignore_ascii_case("reset") {
        if let Err(err) = services.permissions.clear_command_role(&command, &ctx.sender_id) {
            return reply_refusal(&ctx, err).await;
        }
        ctx.reply(format!(
            "↩️ {command} is back to {}.",
            declared.label()
        ))
        .await;
        return Ok(());
    }

    let role: Role = match raw_role.parse() {
        Ok(role) => role,
        Err(_) => return Err(ctx.usage(USAGE)),
    };
    if let Err(err) = services
        .permissions
        .set_command_role(&command, role, &ctx.sender_id)
    {
        return reply_refusal(&ctx, err).await;
    }
    ctx.reply(format!("🔐 {command} now requires {}.", role.label()))
        .await;
    Ok(())
}

async fn eval(ctx: CommandContext) -> CommandResult {
    reply_evaluation(&ctx, "eval <expression>").await
}
