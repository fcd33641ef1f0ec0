//! Moderation and sudo management.

use std::fmt::Write;

use engine::{EngineError, Role};

use crate::{
    commands::reply_refusal,
    context::CommandContext,
    registry::{CommandRegistry, CommandResult},
    ui,
};

pub(crate) fn register(registry: &mut CommandRegistry) {
    command!(registry, "mute", mute, Admin, Admin, "mute <user>", "Delete a user's messages in this group");
    command!(registry, "unmute", unmute, Admin, Admin, "unmute <user>", "Lift a mute");
    command!(registry, "mutelist", mutelist, Admin, Admin, "mutelist", "Muted users in this group");
    command!(registry, "setsudo", setsudo, Admin, Admin, "setsudo <user> [minutes]", "Grant temporary admin");
    command!(registry, "delsudo", delsudo, Admin, Admin, "delsudo <user>", "Revoke temporary admin");
    command!(registry, "sudolist", sudolist, Admin, Admin, "sudolist", "Active sudo grants");
    command!(registry, "status", status, Admin, Admin, "status", "Bot status");
}

async fn mute(ctx: CommandContext) -> CommandResult {
    if !ctx.is_group {
        ctx.reply("👥 Mutes only work in groups.").await;
        return Ok(());
    }
    let Some(target) = ctx.target(0) else {
        return Err(ctx.usage("mute <user>"));
    };

    let permissions = ctx.permissions();
    if target == ctx.sender_id {
        ctx.reply("❌ You cannot mute yourself.").await;
        return Ok(());
    }
    if permissions.role_of(&target) >= permissions.role_of(&ctx.sender_id).max(Role::Admin) {
        ctx.reply("❌ You cannot mute someone of your rank or above.").await;
        return Ok(());
    }

    match permissions.mute(&target, &ctx.chat_id, &ctx.sender_id) {
        Ok(_) => {
            ctx.reply(format!("🔇 {target} is muted. Their messages will be deleted."))
                .await;
            Ok(())
        }
        Err(err) => reply_refusal(&ctx, err).await,
    }
}

async fn unmute(ctx: CommandContext) -> CommandResult {
    if !ctx.is_group {
        ctx.reply("👥 Mutes only work in groups.").await;
        return Ok(());
    }
    let Some(target) = ctx.target(0) else {
        return Err(ctx.usage("unmute <user>"));
    };

    match ctx.permissions().unmute(&target, &ctx.chat_id, &ctx.sender_id) {
        Ok(_) => {
            ctx.reply(format!("🔊 {target} can talk again.")).await;
            Ok(())
        }
        Err(EngineError::NotFound(_)) => {
            ctx.reply(format!("🤷 {target} is not muted here.")).await;
            Ok(())
        }
        Err(err) => reply_refusal(&ctx, err).await,
    }
}

async fn mutelist(ctx: CommandContext) -> CommandResult {
    if !ctx.is_group {
        ctx.reply("👥 Mutes only work in groups.").await;
        return Ok(());
    }

    let records = ctx.permissions().muted_in_group(&ctx.chat_id);
    if records.is_empty() {
        ctx.reply("🔊 Nobody is muted here.").await;
        return Ok(());
    }

    let now = ctx.now();
    let mut text = String::from("🔇 Muted users\n");
    for record in records {
        let _ = writeln!(
            text,
            "• {} (by {}, {} ago)",
            record.user_id,
            record.muted_by,
            ui::duration(now - record.muted_at)
        );
    }
    ctx.reply(text).await;
    Ok(())
}

async fn setsudo(ctx: CommandContext) -> CommandResult {
    const USAGE: &str = "setsudo <user> [minutes]";
    let default_minutes = ctx.settings().default_sudo_minutes;

    // `setsudo 30` while replying means the quoted user for 30 minutes.
    let (target, minutes) = match (ctx.args.as_slice(), &ctx.quoted_sender_id) {
        ([minutes], Some(quoted)) if minutes.parse::<i64>().is_ok() => {
            (Some(quoted.clone()), Some(minutes.as_str()))
        }
        _ => (ctx.target(0), ctx.arg(1)),
    };
    let Some(target) = target else {
        return Err(ctx.usage(USAGE));
    };
    let minutes = match minutes {
        None => default_minutes,
        Some(raw) => match raw.parse::<i64>() {
            Ok(minutes) => minutes,
            Err(_) => return Err(ctx.usage(USAGE)),
        },
    };

    let permissions = ctx.permissions();
    if permissions.role_of(&target) >= Role::Admin {
        ctx.reply(format!("ℹ️ {target} is already {}.", permissions.role_of(&target).label()))
            .await;
        return Ok(());
    }

    match permissions.grant_sudo(&target, &ctx.sender_id, minutes) {
        Ok(grant) => {
            ctx.reply(format!(
                "🛡️ {target} is admin for {minutes} minutes (until {}).",
                grant.expires_at.format("%H:%M UTC")
            ))
            .await;
            Ok(())
        }
        Err(EngineError::InvalidDuration(_)) => {
            let (min, max) = permissions.sudo_bounds();
            ctx.reply(format!("❌ Duration must be between {min} and {max} minutes."))
                .await;
            Ok(())
        }
        Err(err) => reply_refusal(&ctx, err).await,
    }
}

async fn delsudo(ctx: CommandContext) -> CommandResult {
    let Some(target) = ctx.target(0) else {
        return Err(ctx.usage("delsudo <user>"));
    };

    match ctx.permissions().revoke_sudo(&target, &ctx.sender_id) {
        Ok(_) => {
            ctx.reply(format!("🛡️ Sudo revoked from {target}.")).await;
            Ok(())
        }
        Err(EngineError::NotFound(_)) => {
            ctx.reply(format!("🤷 {target} has no active sudo.")).await;
            Ok(())
        }
        Err(err) => reply_refusal(&ctx, err).await,
    }
}

async fn sudolist(ctx: CommandContext) -> CommandResult {
    let grants = ctx.permissions().active_sudo_grants();
    if grants.is_empty() {
        ctx.reply("🛡️ No active sudo grants.").await;
        return Ok(());
    }

    let now = ctx.now();
    let mut text = String::from("🛡️ Active sudo grants\n");
    for grant in grants {
        let _ = writeln!(
            text,
            "• {} - {} min left (by {})",
            grant.user_id,
            grant.minutes_left(now),
            grant.granted_by
        );
    }
    ctx.reply(text).await;
    Ok(())
}

async fn status(ctx: CommandContext) -> CommandResult {
    let services = &ctx.services;
    let settings = &services.settings;
    let stats = services.ledger.stats();
    let limits = services.limiter.config();

    let text = format!(
        "🤖 {} status\n\
         ⏱️ Uptime: {}\n\
         📨 Commands handled: {}\n\
         📚 Commands registered: {}\n\
         👑 Owner: {}\n\
         🛡️ Admins: {} (+{} sudo)\n\
         🚦 Rate limit: {} per {}s\n\
         👥 Accounts: {}\n\
         🏦 Money in circulation: {}",
        settings.bot_name,
        ui::duration(ctx.now() - services.started_at),
        services.commands_handled(),
        services.registry.len(),
        services.permissions.owner(),
        services.permissions.admins().len(),
        services.permissions.active_sudo_grants().len(),
        limits.max_per_window,
        limits.window_ms / 1000,
        stats.total_users,
        ui::money(settings, stats.total_balance),
    );
    ctx.reply(text).await;
    Ok(())
}
