use std::fmt;

use engine::EngineError;
use rand::Rng;

use crate::{
    context::CommandContext,
    parsing::parse_amount,
    registry::{CommandRegistry, CommandResult},
    ui,
};

pub(crate) fn register(registry: &mut CommandRegistry) {
    command!(registry, "slots", slots, Games, Citizen, "slots <bet>", "Spin the slot machine");
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotSymbol {
    Cherry,
    Lemon,
    Orange,
    Diamond,
    Target,
}

impl SlotSymbol {
    pub const ALL: [SlotSymbol; 5] = [
        SlotSymbol::Cherry,
        SlotSymbol::Lemon,
        SlotSymbol::Orange,
        SlotSymbol::Diamond,
        SlotSymbol::Target,
    ];

    pub fn emoji(self) -> &'static str {
        match self {
            SlotSymbol::Cherry => "🍒",
            SlotSymbol::Lemon => "🍋",
            SlotSymbol::Orange => "🍊",
            SlotSymbol::Diamond => "💎",
            SlotSymbol::Target => "🎯",
        }
    }

    /// Payout multiplier for three of a kind.
    pub fn multiplier(self) -> i64 {
        match self {
            SlotSymbol::Cherry => 3,
            SlotSymbol::Lemon => 5,
            SlotSymbol::Orange => 8,
            SlotSymbol::Diamond => 20,
            SlotSymbol::Target => 50,
        }
    }
}

/// Source of reel outcomes.
pub trait Spinner: Send + Sync + fmt::Debug {
    fn spin(&self) -> [SlotSymbol; 3];
}

/// Uniformly random reels.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomSpinner;

impl Spinner for RandomSpinner {
    fn spin(&self) -> [SlotSymbol; 3] {
        let mut rng = rand::thread_rng();
        std::array::from_fn(|_| SlotSymbol::ALL[rng.gen_range(0..SlotSymbol::ALL.len())])
    }
}

/// Winnings for `reels` at `bet`; zero unless all three reels match.
pub fn payout(reels: [SlotSymbol; 3], bet: i64) -> i64 {
    let [a, b, c] = reels;
    if a == b && b == c {
        bet.saturating_mul(a.multiplier())
    } else {
        0
    }
}

async fn slots(ctx: CommandContext) -> CommandResult {
    let settings = ctx.settings();
    let ledger = ctx.ledger();
    let Some(raw_bet) = ctx.arg(0) else {
        return Err(ctx.usage("slots <bet>"));
    };
    let bet = match parse_amount(raw_bet) {
        Some(bet) if (settings.slots_min_bet..=settings.slots_max_bet).contains(&bet) => bet,
        _ => {
            ctx.reply(format!(
                "❌ Bet between {} and {}.",
                ui::money(settings, settings.slots_min_bet),
                ui::money(settings, settings.slots_max_bet)
            ))
            .await;
            return Ok(());
        }
    };

    let debited = match ledger.debit(&ctx.sender_id, bet).await {
        Ok(debited) => debited,
        Err(EngineError::InsufficientFunds { balance, .. }) => {
            ctx.reply(format!(
                "❌ You only have {}.",
                ui::money(settings, balance)
            ))
            .await;
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };
    let mut saved = debited.is_durable();
    let mut balance = debited.value;

    let reels = ctx.services.spinner.spin();
    let won = payout(reels, bet);
    if won > 0 {
        let credited = ledger.credit(&ctx.sender_id, won).await?;
        saved &= credited.is_durable();
        balance = credited.value;
    }

    let line: Vec<&str> = reels.iter().map(|symbol| symbol.emoji()).collect();
    let outcome = if won > 0 {
        format!("🎉 Jackpot! You won {}!", ui::money(settings, won))
    } else {
        format!("😢 You lost {}.", ui::money(settings, bet))
    };
    ctx.reply_saved(
        saved,
        format!(
            "🎰 | {} |\n{outcome}\n👛 Balance: {}",
            line.join(" "),
            ui::money(settings, balance)
        ),
    )
    .await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_of_a_kind_pays_the_symbol_multiplier() {
        use SlotSymbol::*;
        assert_eq!(payout([Cherry, Cherry, Cherry], 10), 30);
        assert_eq!(payout([Lemon, Lemon, Lemon], 10), 50);
        assert_eq!(payout([Orange, Orange, Orange], 10), 80);
        assert_eq!(payout([Diamond, Diamond, Diamond], 10), 200);
        assert_eq!(payout([Target, Target, Target], 10), 500);
    }

    #[test]
    fn anything_else_loses() {
        use SlotSymbol::*;
        assert_eq!(payout([Cherry, Cherry, Lemon], 100), 0);
        assert_eq!(payout([Target, Diamond, Orange], 100), 0);
    }

    #[test]
    fn random_spinner_produces_known_symbols() {
        let reels = RandomSpinner.spin();
        assert!(reels.iter().all(|s| SlotSymbol::ALL.contains(s)));
    }
}
