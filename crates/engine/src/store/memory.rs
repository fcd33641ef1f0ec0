use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{AccountRecord, LedgerSnapshot, Store};
use crate::ResultEngine;

#[derive(Debug, Default)]
struct MemoryState {
    accounts: BTreeMap<String, AccountRecord>,
    last_updated: Option<DateTime<Utc>>,
    writes: usize,
}

/// Keeps the snapshot in process memory. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `save_accounts` calls.
    pub async fn writes(&self) -> usize {
        self.inner.lock().await.writes
    }

    pub async fn record(&self, user_id: &str) -> Option<AccountRecord> {
        self.inner.lock().await.accounts.get(user_id).cloned()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn load(&self) -> ResultEngine<Option<LedgerSnapshot>> {
        let guard = self.inner.lock().await;
        if guard.last_updated.is_none() {
            return Ok(None);
        }
        let mut accounts: Vec<AccountRecord> = guard.accounts.values().cloned().collect();
        accounts.sort_by_key(|record| record.position);
        Ok(Some(LedgerSnapshot {
            accounts,
            last_updated: guard.last_updated,
        }))
    }

    async fn save_accounts(
        &self,
        accounts: &[AccountRecord],
        updated_at: DateTime<Utc>,
    ) -> ResultEngine<()> {
        let mut guard = self.inner.lock().await;
        for record in accounts {
            guard
                .accounts
                .insert(record.user_id.clone(), record.clone());
        }
        guard.last_updated = Some(updated_at);
        guard.writes += 1;
        Ok(())
    }
}
