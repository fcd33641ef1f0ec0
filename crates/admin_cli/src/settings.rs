//! Ledger settings shared with the bot.
//!
//! Only the `[ledger]` table of `config/settings.toml` matters here, with the
//! same `AAMON__LEDGER__*` environment overrides the bot reads, so accounts
//! opened here start like accounts opened by the bot.

use std::{path::Path, time::Duration};

use chrono_tz::Tz;
use config::{Config, ConfigError, Environment, File};
use engine::LedgerConfig;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Ledger {
    pub starting_balance: i64,
    pub daily_bonus: i64,
    pub timezone: String,
    pub persist_timeout_ms: u64,
}

impl Default for Ledger {
    fn default() -> Self {
        let config = LedgerConfig::default();
        Self {
            starting_balance: config.starting_balance,
            daily_bonus: config.daily_bonus,
            timezone: config.timezone.name().to_string(),
            persist_timeout_ms: config.persist_timeout.as_millis() as u64,
        }
    }
}

impl Ledger {
    pub fn ledger_config(&self) -> Result<LedgerConfig, String> {
        let timezone: Tz = self
            .timezone
            .parse()
            .map_err(|err| format!("invalid ledger timezone: {err}"))?;
        Ok(LedgerConfig {
            starting_balance: self.starting_balance,
            daily_bonus: self.daily_bonus,
            timezone,
            persist_timeout: Duration::from_millis(self.persist_timeout_ms),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub ledger: Ledger,
}

impl Settings {
    /// Reads `path` (optional) and the `AAMON__*` environment.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix("AAMON")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use std::{io::Write, sync::Arc};

    use engine::{Ledger, MemoryStore};

    use super::*;

    fn settings_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn missing_file_falls_back_to_ledger_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("absent.toml")).unwrap();
        let config = settings.ledger.ledger_config().unwrap();

        assert_eq!(config.starting_balance, 1000);
        assert_eq!(config.daily_bonus, 100);
        assert_eq!(config.timezone, Tz::UTC);
        assert_eq!(config.persist_timeout, Duration::from_secs(5));
    }

    #[test]
    fn bad_timezone_is_rejected() {
        let file = settings_file("[ledger]\ntimezone = \"Mars/Olympus\"\n");
        let settings = Settings::load(file.path()).unwrap();
        assert!(settings.ledger.ledger_config().is_err());
    }

    #[tokio::test]
    async fn accounts_opened_offline_use_the_configured_starting_balance() {
        let file = settings_file(
            "[bot]\nowner = \"1\"\n\n[ledger]\nstarting_balance = 500\ndaily_bonus = 25\ntimezone = \"Europe/Rome\"\n",
        );
        let settings = Settings::load(file.path()).unwrap();
        let config = settings.ledger.ledger_config().unwrap();
        assert_eq!(config.timezone, Tz::Europe__Rome);
        assert_eq!(config.daily_bonus, 25);

        let ledger = Ledger::builder()
            .store(Arc::new(MemoryStore::new()))
            .config(config)
            .build()
            .await
            .unwrap();
        assert_eq!(ledger.credit("newuser", 5).await.unwrap().value, 505);
    }
}
