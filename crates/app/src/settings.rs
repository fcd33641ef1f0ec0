//! Application settings.
//!
//! Read from `config/settings.toml` (optional) and overlaid with `AAMON__*`
//! environment variables, e.g. `AAMON__TELEGRAM__TOKEN` or
//! `AAMON__BOT__ADMINS=123,456`.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize)]
pub struct Bot {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    pub owner: String,
    #[serde(default)]
    pub admins: Vec<String>,
}

fn default_name() -> String {
    "Aamon".to_string()
}

fn default_prefix() -> String {
    ".".to_string()
}

#[derive(Debug, Deserialize)]
pub struct Telegram {
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
    Json(String),
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Ledger {
    pub database: Database,
    pub starting_balance: i64,
    pub daily_bonus: i64,
    /// IANA zone the daily bonus resets in.
    pub timezone: String,
    pub persist_timeout_ms: u64,
    pub currency_name: String,
    pub currency_symbol: String,
    pub leaderboard_size: usize,
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            database: Database::Sqlite("./aamon.db".to_string()),
            starting_balance: 1000,
            daily_bonus: 100,
            timezone: "UTC".to_string(),
            persist_timeout_ms: 5000,
            currency_name: "cc".to_string(),
            currency_symbol: "💰".to_string(),
            leaderboard_size: 10,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RateLimit {
    pub window_ms: i64,
    pub max_per_window: u32,
    /// How often expired windows are dropped.
    pub prune_interval_secs: u64,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            window_ms: 60_000,
            max_per_window: 10,
            prune_interval_secs: 300,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Sudo {
    pub min_minutes: i64,
    pub max_minutes: i64,
    pub default_minutes: i64,
}

impl Default for Sudo {
    fn default() -> Self {
        Self {
            min_minutes: 1,
            max_minutes: 24 * 60,
            default_minutes: 60,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Slots {
    pub min_bet: i64,
    pub max_bet: i64,
}

impl Default for Slots {
    fn default() -> Self {
        Self {
            min_bet: 10,
            max_bet: 1000,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub app: App,
    pub bot: Bot,
    pub telegram: Option<Telegram>,
    #[serde(default)]
    pub ledger: Ledger,
    #[serde(default)]
    pub rate_limit: RateLimit,
    #[serde(default)]
    pub sudo: Sudo,
    #[serde(default)]
    pub slots: Slots,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/settings").required(false))
            .add_source(
                Environment::with_prefix("AAMON")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("bot.admins")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }
}
