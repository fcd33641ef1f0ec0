use std::fmt::Write;

use engine::EngineError;

use crate::{
    context::CommandContext,
    parsing::parse_amount,
    registry::{CommandRegistry, CommandResult},
    ui,
};

pub(crate) fn register(registry: &mut CommandRegistry) {
    command!(registry, "balance", balance, Currency, Citizen, "balance [user]", "Show a balance");
    command!(registry, "daily", daily, Currency, Citizen, "daily", "Claim the daily bonus");
    command!(registry, "pay", pay, Currency, Citizen, "pay <user> <amount>", "Send money to someone");
    command!(registry, "rich", rich, Currency, Citizen, "rich", "Richest users and economy stats");
    command!(
        registry,
        "currency",
        currency,
        Admin,
        Admin,
        "currency <give|take|set> <user> <amount>",
        "Adjust a balance"
    );
}

async fn balance(ctx: CommandContext) -> CommandResult {
    let settings = ctx.settings();
    let user = match ctx.target(0) {
        Some(user) => user,
        None if ctx.arg(0).is_some() => return Err(ctx.usage("balance [user]")),
        None => ctx.sender_id.clone(),
    };

    // Someone else's balance is only read, never opened.
    if user != ctx.sender_id {
        let text = match ctx.ledger().account(&user) {
            Some(account) => {
                format!("👛 Balance of {user}: {}", ui::money(settings, account.balance))
            }
            None => format!("🤷 {user} has no account yet."),
        };
        ctx.reply(text).await;
        return Ok(());
    }

    let committed = ctx.ledger().balance(&user).await;
    let mut text = format!("👛 Your balance: {}", ui::money(settings, committed.value));
    match ctx.ledger().next_daily_claim_at(&user) {
        None => {
            let _ = write!(text, "\n🎁 Daily bonus available: {}daily", settings.prefix);
        }
        Some(at) => {
            let _ = write!(text, "\n🎁 Next daily bonus in {}", ui::duration(at - ctx.now()));
        }
    }

    ctx.reply_committed(&committed, text).await;
    Ok(())
}

async fn daily(ctx: CommandContext) -> CommandResult {
    let settings = ctx.settings();
    match ctx.ledger().claim_daily_bonus(&ctx.sender_id).await {
        Ok(claimed) => {
            let bonus = claimed.value;
            ctx.reply_committed(
                &claimed,
                format!(
                    "🎁 You claimed {}!\n👛 Balance: {}",
                    ui::money(settings, bonus.amount),
                    ui::money(settings, bonus.balance)
                ),
            )
            .await;
        }
        Err(EngineError::AlreadyClaimed { next_claim_at }) => {
            ctx.reply(format!(
                "⏰ Already claimed today. Come back in {}.",
                ui::duration(next_claim_at - ctx.now())
            ))
            .await;
        }
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

async fn pay(ctx: CommandContext) -> CommandResult {
    let settings = ctx.settings();
    let Some((target, raw_amount)) = ctx.target_and_amount(0) else {
        return Err(ctx.usage("pay <user> <amount>"));
    };
    let Some(amount) = parse_amount(raw_amount) else {
        ctx.reply("❌ The amount must be a positive whole number.").await;
        return Ok(());
    };

    match ctx.ledger().transfer(&ctx.sender_id, &target, amount).await {
        Ok(done) => {
            let receipt = done.value;
            ctx.reply_committed(
                &done,
                format!(
                    "💸 Sent {} to {target}.\n👛 Your balance: {}",
                    ui::money(settings, receipt.amount),
                    ui::money(settings, receipt.from_balance)
                ),
            )
            .await;
        }
        Err(EngineError::SelfTransfer) => {
            ctx.reply("❌ You cannot pay yourself.").await;
        }
        Err(EngineError::InsufficientFunds { balance, requested }) => {
            ctx.reply(format!(
                "❌ Insufficient funds: you have {}, you need {} more.",
                ui::money(settings, balance),
                ui::money(settings, requested - balance)
            ))
            .await;
        }
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

async fn rich(ctx: CommandContext) -> CommandResult {
    let settings = ctx.settings();
    let ledger = ctx.ledger();
    let top = ledger.top_accounts(settings.leaderboard_size);
    if top.is_empty() {
        ctx.reply("📉 Nobody has an account yet.").await;
        return Ok(());
    }

    let mut text = String::from("🏆 Richest users\n");
    for (rank, (user, balance)) in top.iter().enumerate() {
        let medal = match rank {
            0 => "🥇",
            1 => "🥈",
            2 => "🥉",
            _ => "▫️",
        };
        let _ = writeln!(
            text,
            "{medal} {}. {} {}",
            rank + 1,
            ui::mask_user(user),
            ui::money(settings, *balance)
        );
    }

    let stats = ledger.stats();
    let _ = write!(
        text,
        "\n👥 Users: {}\n🏦 Total: {}\n📊 Average: {}\n🎁 Daily claims: {}",
        stats.total_users,
        ui::money(settings, stats.total_balance),
        ui::money(settings, stats.average_balance),
        stats.total_daily_claims
    );

    ctx.reply(text).await;
    Ok(())
}

async fn currency(ctx: CommandContext) -> CommandResult {
    const USAGE: &str = "currency <give|take|set> <user> <amount>";
    let settings = ctx.settings();
    let ledger = ctx.ledger();

    let Some(action) = ctx.arg(0).map(str::to_lowercase) else {
        return Err(ctx.usage(USAGE));
    };
    let Some((target, raw_amount)) = ctx.target_and_amount(1) else {
        return Err(ctx.usage(USAGE));
    };
    let amount = match (action.as_str(), raw_amount) {
        ("set", "0") => Some(0),
        _ => parse_amount(raw_amount),
    };
    let Some(amount) = amount else {
        ctx.reply("❌ The amount must be a positive whole number.").await;
        return Ok(());
    };

    let result = match action.as_str() {
        "give" => ledger.credit(&target, amount).await,
        "take" => ledger.debit(&target, amount).await,
        "set" => ledger.set_balance(&target, amount).await,
        _ => return Err(ctx.usage(USAGE)),
    };

    match result {
        Ok(done) => {
            tracing::info!("currency {action} {amount} for {target} by {}", ctx.sender_id);
            ctx.reply_committed(
                &done,
                format!(
                    "✅ {target} now has {}.",
                    ui::money(settings, done.value)
                ),
            )
            .await;
        }
        Err(EngineError::InsufficientFunds { balance, .. }) => {
            ctx.reply(format!(
                "❌ {target} only has {}.",
                ui::money(settings, balance)
            ))
            .await;
        }
        Err(EngineError::InvalidArgument(reason)) => {
            ctx.reply(format!("❌ {reason}")).await;
        }
        Err(err) => return Err(err.into()),
    }
    Ok(())
}
