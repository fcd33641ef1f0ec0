//! Durable storage for the ledger.
//!
//! The ledger keeps the authoritative state in memory and asks a [`Store`] to
//! write the accounts a mutation touched. At startup the whole snapshot is
//! loaded back.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ResultEngine;

mod json;
mod memory;
mod sqlite;

pub use json::JsonFileStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Persisted form of one account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    pub user_id: String,
    pub balance: i64,
    pub last_daily_claim_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub daily_claims: i64,
    /// Creation order, used to break ties between equal balances.
    #[serde(default)]
    pub position: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub accounts: Vec<AccountRecord>,
    pub last_updated: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait Store: Send + Sync + fmt::Debug {
    /// Loads the latest snapshot. `None` means nothing was ever written.
    async fn load(&self) -> ResultEngine<Option<LedgerSnapshot>>;

    /// Inserts or replaces `accounts` and moves the `lastUpdated` marker.
    async fn save_accounts(
        &self,
        accounts: &[AccountRecord],
        updated_at: DateTime<Utc>,
    ) -> ResultEngine<()>;
}
