use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex as StdMutex, PoisonError},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::{AccountRecord, LedgerSnapshot, Store};
use crate::{EngineError, ResultEngine};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserEntry {
    balance: i64,
    #[serde(default)]
    last_daily_claim_at: Option<DateTime<Utc>>,
    #[serde(default)]
    daily_claims: i64,
    #[serde(default)]
    position: i64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LedgerFile {
    users: BTreeMap<String, UserEntry>,
    last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Document {
    file: Option<LedgerFile>,
    generation: u64,
}

/// Whole ledger in one JSON document, rewritten on every save.
///
/// File I/O runs on the blocking pool. A write abandoned by the ledger's
/// timeout may still land later; it is skipped if a newer document was
/// already written.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    inner: Mutex<Document>,
    written: Arc<StdMutex<u64>>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            inner: Mutex::new(Document::default()),
            written: Arc::new(StdMutex::new(0)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Store for JsonFileStore {
    async fn load(&self) -> ResultEngine<Option<LedgerSnapshot>> {
        let mut guard = self.inner.lock().await;
        let Some(file) = read_blocking(self.path.clone()).await? else {
            tracing::info!("no ledger file at {}, starting fresh", self.path.display());
            guard.file = Some(LedgerFile::default());
            return Ok(None);
        };

        let mut accounts: Vec<AccountRecord> = file
            .users
            .iter()
            .map(|(user_id, entry)| AccountRecord {
                user_id: user_id.clone(),
                balance: entry.balance,
                last_daily_claim_at: entry.last_daily_claim_at,
                daily_claims: entry.daily_claims,
                position: entry.position,
            })
            .collect();
        accounts.sort_by(|a, b| a.position.cmp(&b.position).then(a.user_id.cmp(&b.user_id)));
        let snapshot = LedgerSnapshot {
            accounts,
            last_updated: file.last_updated,
        };
        guard.file = Some(file);
        Ok(Some(snapshot))
    }

    async fn save_accounts(
        &self,
        accounts: &[AccountRecord],
        updated_at: DateTime<Utc>,
    ) -> ResultEngine<()> {
        let mut guard = self.inner.lock().await;
        if guard.file.is_none() {
            guard.file = Some(read_blocking(self.path.clone()).await?.unwrap_or_default());
        }
        guard.generation += 1;
        let generation = guard.generation;
        let file = guard
            .file
            .as_mut()
            .ok_or_else(|| EngineError::PersistenceFailure("ledger file not loaded".to_string()))?;

        for record in accounts {
            file.users.insert(
                record.user_id.clone(),
                UserEntry {
                    balance: record.balance,
                    last_daily_claim_at: record.last_daily_claim_at,
                    daily_claims: record.daily_claims,
                    position: record.position,
                },
            );
        }
        file.last_updated = Some(updated_at);
        let json = serde_json::to_string_pretty(file).map_err(io::Error::other)?;
        drop(guard);

        let path = self.path.clone();
        let written = self.written.clone();
        tokio::task::spawn_blocking(move || write_if_newer(&path, &written, generation, &json))
            .await
            .map_err(|err| EngineError::PersistenceFailure(format!("ledger write aborted: {err}")))??;
        Ok(())
    }
}

async fn read_blocking(path: PathBuf) -> ResultEngine<Option<LedgerFile>> {
    tokio::task::spawn_blocking(move || read_json_file(&path))
        .await
        .map_err(|err| EngineError::PersistenceFailure(format!("ledger read aborted: {err}")))?
}

/// Writes `json` unless a document newer than `generation` is on disk.
fn write_if_newer(
    path: &Path,
    written: &StdMutex<u64>,
    generation: u64,
    json: &str,
) -> Result<(), io::Error> {
    let mut last = written.lock().unwrap_or_else(PoisonError::into_inner);
    if *last > generation {
        tracing::debug!("skipping stale ledger write {generation}, {} is on disk", *last);
        return Ok(());
    }
    write_json_file(path, json)?;
    *last = generation;
    Ok(())
}

fn read_json_file(path: &Path) -> ResultEngine<Option<LedgerFile>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|err| EngineError::PersistenceFailure(format!("corrupt ledger file: {err}")))
}

fn write_json_file(path: &Path, json: &str) -> Result<(), io::Error> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp = path.with_extension("tmp");
    fs::write(&tmp, json)?;
    match fs::rename(&tmp, path) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(&tmp, path)?;
            let _ = fs::remove_file(&tmp);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn record(user_id: &str, balance: i64, position: i64) -> AccountRecord {
        AccountRecord {
            user_id: user_id.to_string(),
            balance,
            last_daily_claim_at: None,
            daily_claims: 0,
            position,
        }
    }

    #[tokio::test]
    async fn missing_file_is_a_fresh_install() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("currency.json"));
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn saves_are_merged_into_one_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data/currency.json");
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();

        let store = JsonFileStore::new(&path);
        store.load().await.unwrap();
        store.save_accounts(&[record("b", 900, 1)], at).await.unwrap();
        store.save_accounts(&[record("a", 1000, 0)], at).await.unwrap();
        store.save_accounts(&[record("b", 950, 1)], at).await.unwrap();

        let reopened = JsonFileStore::new(&path);
        let snapshot = reopened.load().await.unwrap().unwrap();
        assert_eq!(snapshot.last_updated, Some(at));
        assert_eq!(snapshot.accounts, vec![record("a", 1000, 0), record("b", 950, 1)]);

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"lastUpdated\""));
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn stale_writes_never_replace_a_newer_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("currency.json");
        let written = StdMutex::new(0);

        write_if_newer(&path, &written, 2, "{\"users\":{},\"lastUpdated\":null,\"v\":2}").unwrap();
        write_if_newer(&path, &written, 1, "{\"users\":{},\"lastUpdated\":null,\"v\":1}").unwrap();

        assert!(fs::read_to_string(&path).unwrap().contains("\"v\":2"));
        assert_eq!(*written.lock().unwrap(), 2);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn concurrent_saves_all_reach_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("currency.json");
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let store = Arc::new(JsonFileStore::new(&path));
        store.load().await.unwrap();

        let mut tasks = tokio::task::JoinSet::new();
        for position in 0..8 {
            let store = store.clone();
            tasks.spawn(async move {
                let user = format!("{position}");
                store
                    .save_accounts(&[record(&user, 100 + position, position)], at)
                    .await
            });
        }
        while let Some(result) = tasks.join_next().await {
            result.unwrap().unwrap();
        }

        let snapshot = JsonFileStore::new(&path).load().await.unwrap().unwrap();
        assert_eq!(snapshot.accounts.len(), 8);
        assert_eq!(snapshot.accounts[7], record("7", 107, 7));
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("currency.json");
        fs::write(&path, "{ not json").unwrap();

        let store = JsonFileStore::new(&path);
        assert!(matches!(
            store.load().await,
            Err(EngineError::PersistenceFailure(_))
        ));
    }
}
