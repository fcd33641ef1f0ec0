use std::fmt::Write;

use crate::{
    context::CommandContext,
    registry::{Category, CommandRegistry, CommandResult},
    ui,
};

pub(crate) fn register(registry: &mut CommandRegistry) {
    command!(registry, "ping", ping, General, Citizen, "ping", "Check that the bot is alive");
    command!(registry, "menu", menu, General, Citizen, "menu", "List the commands you can use");
    command!(registry, "whoami", whoami, General, Citizen, "whoami", "Show your role");
}

async fn ping(ctx: CommandContext) -> CommandResult {
    let latency = ctx.received_at.elapsed().as_millis();
    let uptime = ctx.now() - ctx.services.started_at;
    ctx.reply(format!(
        "🏓 Pong! {latency} ms\n⏱️ Uptime: {}",
        ui::duration(uptime)
    ))
    .await;
    Ok(())
}

async fn menu(ctx: CommandContext) -> CommandResult {
    let services = &ctx.services;
    let role = services.permissions.effective_role(&ctx.sender_id);
    let prefix = &services.settings.prefix;

    let mut text = format!("📜 {} commands\n", services.settings.bot_name);
    for category in Category::ALL {
        let visible: Vec<_> = services
            .registry
            .iter()
            .filter(|spec| spec.category == category && role.satisfies(services.required_role(spec)))
            .collect();
        if visible.is_empty() {
            continue;
        }

        let _ = write!(text, "\n{}\n", category.label());
        for spec in visible {
            let _ = writeln!(text, "• {prefix}{} - {}", spec.usage, spec.description);
        }
    }
    let _ = write!(text, "\nYour role: {}", role.label());

    ctx.reply(text).await;
    Ok(())
}

async fn whoami(ctx: CommandContext) -> CommandResult {
    let permissions = ctx.permissions();
    let role = permissions.role_of(&ctx.sender_id);
    let effective = permissions.effective_role(&ctx.sender_id);

    let mut text = format!("🪪 {}\nRole: {}", ctx.sender_id, role.label());
    if let Some(grant) = permissions.sudo_grant(&ctx.sender_id) {
        let _ = write!(
            text,
            "\nSudo: {} for {} more minutes",
            effective.label(),
            grant.minutes_left(ctx.now())
        );
    }

    ctx.reply(text).await;
    Ok(())
}
