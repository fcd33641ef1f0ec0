use std::{sync::Arc, time::Duration};

use chrono_tz::Tz;
use engine::{
    Clock, JsonFileStore, Ledger, MemoryStore, PermissionConfig, PermissionEngine,
    RateLimitConfig, RateLimiter, SqliteStore, Store, SystemClock,
};
use migration::{Migrator, MigratorTrait};
use settings::Database;
use telegram_bot::CommandSettings;

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;
    let mut tasks = tokio::task::JoinSet::new();

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "aamon={level},telegram_bot={level},engine={level}",
            level = settings.app.level
        ))
        .init();

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let timezone: Tz = settings
        .ledger
        .timezone
        .parse()
        .map_err(|err| format!("invalid ledger timezone: {err}"))?;

    let store = open_store(&settings.ledger.database).await?;
    let ledger = Ledger::builder()
        .store(store)
        .clock(clock.clone())
        .starting_balance(settings.ledger.starting_balance)
        .daily_bonus(settings.ledger.daily_bonus)
        .timezone(timezone)
        .persist_timeout(Duration::from_millis(settings.ledger.persist_timeout_ms))
        .build()
        .await?;

    let permissions = PermissionEngine::new(
        PermissionConfig::new(&settings.bot.owner)
            .admins(settings.bot.admins.iter().cloned())
            .sudo_bounds(settings.sudo.min_minutes, settings.sudo.max_minutes),
        clock.clone(),
    );
    let limiter = Arc::new(RateLimiter::new(
        RateLimitConfig {
            window_ms: settings.rate_limit.window_ms,
            max_per_window: settings.rate_limit.max_per_window,
        },
        clock.clone(),
    ));

    let command_settings = CommandSettings {
        bot_name: settings.bot.name.clone(),
        prefix: settings.bot.prefix.clone(),
        currency_name: settings.ledger.currency_name.clone(),
        currency_symbol: settings.ledger.currency_symbol.clone(),
        slots_min_bet: settings.slots.min_bet,
        slots_max_bet: settings.slots.max_bet,
        default_sudo_minutes: settings.sudo.default_minutes,
        leaderboard_size: settings.ledger.leaderboard_size,
    };

    let prune_every = Duration::from_secs(settings.rate_limit.prune_interval_secs.max(1));
    let pruned = limiter.clone();
    tasks.spawn(async move {
        let mut interval = tokio::time::interval(prune_every);
        loop {
            interval.tick().await;
            let dropped = pruned.prune();
            if dropped > 0 {
                tracing::debug!("dropped {dropped} expired rate windows");
            }
        }
    });

    match settings.telegram {
        Some(telegram) => {
            let ledger = Arc::new(ledger);
            let permissions = Arc::new(permissions);
            tasks.spawn(async move {
                tracing::info!("Found telegram settings...");
                match telegram_bot::Bot::builder()
                    .token(&telegram.token)
                    .ledger(ledger)
                    .permissions(permissions)
                    .limiter(limiter)
                    .clock(clock)
                    .settings(command_settings)
                    .build()
                {
                    Ok(bot) => bot.run().await,
                    Err(err) => tracing::error!("failed to initialize telegram bot: {err}"),
                }
            });
        }
        None => {
            tracing::error!("no telegram settings found, nothing to run");
            return Ok(());
        }
    }

    while tasks.join_next().await.is_some() {
        tasks.shutdown().await;
    }

    Ok(())
}

async fn open_store(
    config: &Database,
) -> Result<Arc<dyn Store>, Box<dyn std::error::Error + Send + Sync>> {
    let store: Arc<dyn Store> = match config {
        Database::Memory => {
            tracing::warn!("using an in-memory ledger, balances are lost on exit");
            Arc::new(MemoryStore::new())
        }
        Database::Sqlite(path) => {
            let database = sea_orm::Database::connect(format!("sqlite:{path}?mode=rwc")).await?;
            Migrator::up(&database, None).await?;
            Arc::new(SqliteStore::new(database))
        }
        Database::Json(path) => Arc::new(JsonFileStore::new(path)),
    };
    Ok(store)
}
