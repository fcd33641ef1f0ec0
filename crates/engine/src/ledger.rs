//! The currency ledger.
//!
//! Balances live in memory and are the source of truth; every mutation asks
//! the [`Store`] to write the touched accounts before returning. Mutations of
//! one account are serialized by a per-account async mutex that is held
//! across the in-memory change *and* the store write, so the read-then-write
//! of a debit can never interleave with another mutation of that account.
//!
//! A failed (or timed out) store write does not undo the mutation: the result
//! is returned as a [`Committed`] carrying the persistence failure, and the
//! caller decides how to warn the user.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use chrono::{DateTime, Days, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::{
    Clock, EngineError, ResultEngine, SystemClock,
    store::{AccountRecord, MemoryStore, Store},
};

#[derive(Clone, Debug)]
pub struct LedgerConfig {
    pub starting_balance: i64,
    pub daily_bonus: i64,
    /// Zone whose midnight separates one daily-bonus day from the next.
    pub timezone: Tz,
    /// Upper bound for a single store write.
    pub persist_timeout: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            starting_balance: 1000,
            daily_bonus: 100,
            timezone: Tz::UTC,
            persist_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Account {
    pub user_id: String,
    pub balance: i64,
    pub last_daily_claim_at: Option<DateTime<Utc>>,
    pub daily_claims: i64,
    position: i64,
}

impl Account {
    fn open(user_id: &str, balance: i64, position: i64) -> Self {
        Self {
            user_id: user_id.to_string(),
            balance,
            last_daily_claim_at: None,
            daily_claims: 0,
            position,
        }
    }

    fn record(&self) -> AccountRecord {
        AccountRecord {
            user_id: self.user_id.clone(),
            balance: self.balance,
            last_daily_claim_at: self.last_daily_claim_at,
            daily_claims: self.daily_claims,
            position: self.position,
        }
    }
}

impl From<AccountRecord> for Account {
    fn from(record: AccountRecord) -> Self {
        Self {
            user_id: record.user_id,
            balance: record.balance,
            last_daily_claim_at: record.last_daily_claim_at,
            daily_claims: record.daily_claims,
            position: record.position,
        }
    }
}

/// Result of a mutation that is committed in memory.
///
/// `persistence` is `Some` when the store write failed: the value is still
/// valid, but the on-disk state lags behind memory.
#[derive(Debug)]
#[must_use]
pub struct Committed<T> {
    pub value: T,
    pub persistence: Option<EngineError>,
}

impl<T> Committed<T> {
    fn durable(value: T) -> Self {
        Self {
            value,
            persistence: None,
        }
    }

    pub fn is_durable(&self) -> bool {
        self.persistence.is_none()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransferReceipt {
    pub amount: i64,
    pub from_balance: i64,
    pub to_balance: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DailyBonus {
    pub amount: i64,
    pub balance: i64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LedgerStats {
    pub total_users: usize,
    pub total_balance: i64,
    pub average_balance: i64,
    pub total_daily_claims: i64,
}

#[derive(Debug, Default)]
struct LedgerState {
    accounts: HashMap<String, Account>,
    next_position: i64,
}

impl LedgerState {
    /// Returns the account, opening it with `starting_balance` if missing.
    /// The flag tells whether it was just created.
    fn open(&mut self, user: &str, starting_balance: i64) -> (&mut Account, bool) {
        let next_position = &mut self.next_position;
        let mut created = false;
        let account = self.accounts.entry(user.to_string()).or_insert_with(|| {
            created = true;
            let position = *next_position;
            *next_position += 1;
            Account::open(user, starting_balance, position)
        });
        if created {
            tracing::info!("opened account {user} with {starting_balance}");
        }
        (account, created)
    }
}

#[derive(Debug)]
pub struct Ledger {
    config: LedgerConfig,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    state: RwLock<LedgerState>,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl Ledger {
    /// Return a builder for `Ledger`. Help to build the struct.
    pub fn builder() -> LedgerBuilder {
        LedgerBuilder::default()
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    fn read_state(&self) -> RwLockReadGuard<'_, LedgerState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, LedgerState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn locks(&self) -> MutexGuard<'_, HashMap<String, Arc<AsyncMutex<()>>>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn lock_account(&self, user: &str) -> OwnedMutexGuard<()> {
        let lock = self.locks().entry(user.to_string()).or_default().clone();
        lock.lock_owned().await
    }

    /// Writes `records` to the store, bounded by the persistence timeout.
    /// Returns the failure instead of propagating it.
    async fn persist(&self, records: &[AccountRecord]) -> Option<EngineError> {
        let now = self.clock.now();
        let timeout = self.config.persist_timeout;
        match tokio::time::timeout(timeout, self.store.save_accounts(records, now)).await {
            Ok(Ok(())) => None,
            Ok(Err(err)) => {
                tracing::warn!("ledger write failed, memory is ahead of the store: {err}");
                Some(EngineError::PersistenceFailure(err.to_string()))
            }
            Err(_) => {
                tracing::warn!("ledger write timed out after {timeout:?}");
                Some(EngineError::PersistenceFailure(format!(
                    "store write timed out after {timeout:?}"
                )))
            }
        }
    }

    /// Runs `change` on `user`'s account under its lock and persists it.
    ///
    /// `change` must leave the account untouched when it returns `Err`.
    async fn mutate<T, F>(&self, user: &str, change: F) -> ResultEngine<Committed<T>>
    where
        F: FnOnce(&mut Account) -> ResultEngine<T>,
    {
        let _guard = self.lock_account(user).await;
        let (result, record, created) = {
            let mut state = self.write_state();
            let (account, created) = state.open(user, self.config.starting_balance);
            let result = change(account);
            (result, account.record(), created)
        };

        match result {
            Ok(value) => {
                let persistence = self.persist(&[record]).await;
                Ok(Committed { value, persistence })
            }
            Err(err) => {
                // The operation failed, but the account it opened is real.
                if created {
                    let _ = self.persist(&[record]).await;
                }
                Err(err)
            }
        }
    }

    /// Current balance. Opens the account with the starting balance on first
    /// use.
    pub async fn balance(&self, user: &str) -> Committed<i64> {
        let existing = self.read_state().accounts.get(user).map(|a| a.balance);
        if let Some(balance) = existing {
            return Committed::durable(balance);
        }

        let _guard = self.lock_account(user).await;
        let (balance, record, created) = {
            let mut state = self.write_state();
            let (account, created) = state.open(user, self.config.starting_balance);
            (account.balance, account.record(), created)
        };
        let persistence = if created {
            self.persist(&[record]).await
        } else {
            None
        };
        Committed {
            value: balance,
            persistence,
        }
    }

    /// Copy of the account without opening it.
    pub fn account(&self, user: &str) -> Option<Account> {
        self.read_state().accounts.get(user).cloned()
    }

    pub async fn credit(&self, user: &str, amount: i64) -> ResultEngine<Committed<i64>> {
        ensure_positive(amount)?;
        self.mutate(user, |account| {
            account.balance = checked_credit(account.balance, amount)?;
            Ok(account.balance)
        })
        .await
    }

    pub async fn debit(&self, user: &str, amount: i64) -> ResultEngine<Committed<i64>> {
        ensure_positive(amount)?;
        self.mutate(user, |account| {
            if account.balance < amount {
                return Err(EngineError::InsufficientFunds {
                    balance: account.balance,
                    requested: amount,
                });
            }
            account.balance -= amount;
            Ok(account.balance)
        })
        .await
    }

    /// Replaces a balance outright. Meant for administrative corrections.
    pub async fn set_balance(&self, user: &str, amount: i64) -> ResultEngine<Committed<i64>> {
        if amount < 0 {
            return Err(EngineError::InvalidArgument(
                "balance cannot be negative".to_string(),
            ));
        }
        self.mutate(user, |account| {
            account.balance = amount;
            Ok(amount)
        })
        .await
    }

    /// Moves `amount` from `from` to `to`.
    ///
    /// Both account locks are held (in a fixed order) and both balances
    /// change inside one critical section, so no reader can see the debit
    /// without the credit.
    pub async fn transfer(
        &self,
        from: &str,
        to: &str,
        amount: i64,
    ) -> ResultEngine<Committed<TransferReceipt>> {
        if from == to {
            return Err(EngineError::SelfTransfer);
        }
        ensure_positive(amount)?;

        let (first, second) = if from < to { (from, to) } else { (to, from) };
        let _first = self.lock_account(first).await;
        let _second = self.lock_account(second).await;

        let (result, records) = {
            let mut state = self.write_state();
            let starting_balance = self.config.starting_balance;

            let (source, source_created) = state.open(from, starting_balance);
            let source_balance = source.balance;
            let mut records = Vec::new();
            if source_created {
                records.push(source.record());
            }

            if source_balance < amount {
                (
                    Err(EngineError::InsufficientFunds {
                        balance: source_balance,
                        requested: amount,
                    }),
                    records,
                )
            } else {
                let (target, _) = state.open(to, starting_balance);
                match checked_credit(target.balance, amount) {
                    Err(err) => (Err(err), records),
                    Ok(to_balance) => {
                        target.balance = to_balance;
                        let target_record = target.record();

                        let (source, _) = state.open(from, starting_balance);
                        source.balance -= amount;
                        let from_balance = source.balance;

                        records.clear();
                        records.push(source.record());
                        records.push(target_record);
                        (
                            Ok(TransferReceipt {
                                amount,
                                from_balance,
                                to_balance,
                            }),
                            records,
                        )
                    }
                }
            }
        };

        match result {
            Ok(receipt) => {
                tracing::info!("transfer: {amount} from {from} to {to}");
                let persistence = self.persist(&records).await;
                Ok(Committed {
                    value: receipt,
                    persistence,
                })
            }
            Err(err) => {
                if !records.is_empty() {
                    let _ = self.persist(&records).await;
                }
                Err(err)
            }
        }
    }

    /// Credits the daily bonus if `user` has not claimed it during the
    /// current calendar day of the configured zone.
    pub async fn claim_daily_bonus(&self, user: &str) -> ResultEngine<Committed<DailyBonus>> {
        let now = self.clock.now();
        let timezone = self.config.timezone;
        let bonus = self.config.daily_bonus;

        let claimed = self
            .mutate(user, |account| {
                if let Some(last) = account.last_daily_claim_at
                    && same_day(last, now, timezone)
                {
                    return Err(EngineError::AlreadyClaimed {
                        next_claim_at: next_day_start(last, timezone),
                    });
                }
                account.balance = checked_credit(account.balance, bonus)?;
                account.last_daily_claim_at = Some(now);
                account.daily_claims += 1;
                Ok(DailyBonus {
                    amount: bonus,
                    balance: account.balance,
                })
            })
            .await?;

        tracing::info!("daily bonus claimed: {user} received {bonus}");
        Ok(claimed)
    }

    /// When the next daily bonus opens for `user`; `None` if it is
    /// claimable right now.
    pub fn next_daily_claim_at(&self, user: &str) -> Option<DateTime<Utc>> {
        let now = self.clock.now();
        let timezone = self.config.timezone;
        let last = self
            .read_state()
            .accounts
            .get(user)
            .and_then(|account| account.last_daily_claim_at)?;
        same_day(last, now, timezone).then(|| next_day_start(last, timezone))
    }

    /// Richest accounts first; equal balances keep account creation order.
    pub fn top_accounts(&self, limit: usize) -> Vec<(String, i64)> {
        let state = self.read_state();
        let mut accounts: Vec<&Account> = state.accounts.values().collect();
        accounts.sort_by(|a, b| b.balance.cmp(&a.balance).then(a.position.cmp(&b.position)));
        accounts
            .into_iter()
            .take(limit)
            .map(|account| (account.user_id.clone(), account.balance))
            .collect()
    }

    pub fn stats(&self) -> LedgerStats {
        let state = self.read_state();
        let total_users = state.accounts.len();
        let total_balance: i64 = state.accounts.values().map(|a| a.balance).sum();
        let total_daily_claims = state.accounts.values().map(|a| a.daily_claims).sum();
        let average_balance = if total_users == 0 {
            0
        } else {
            (total_balance as f64 / total_users as f64).round() as i64
        };

        LedgerStats {
            total_users,
            total_balance,
            average_balance,
            total_daily_claims,
        }
    }
}

fn ensure_positive(amount: i64) -> ResultEngine<()> {
    if amount <= 0 {
        return Err(EngineError::InvalidArgument(format!(
            "amount must be positive, got {amount}"
        )));
    }
    Ok(())
}

fn checked_credit(balance: i64, amount: i64) -> ResultEngine<i64> {
    balance
        .checked_add(amount)
        .ok_or_else(|| EngineError::InvalidArgument("balance overflow".to_string()))
}

fn same_day(a: DateTime<Utc>, b: DateTime<Utc>, timezone: Tz) -> bool {
    a.with_timezone(&timezone).date_naive() == b.with_timezone(&timezone).date_naive()
}

/// Start of the calendar day after `instant`, in `timezone`.
fn next_day_start(instant: DateTime<Utc>, timezone: Tz) -> DateTime<Utc> {
    let day = instant.with_timezone(&timezone).date_naive();
    let next = day.checked_add_days(Days::new(1)).unwrap_or(day);
    let midnight = next.and_time(NaiveTime::MIN);

    // Some zones skip midnight on DST changes; the first valid instant of the
    // day is one hour later there.
    timezone
        .from_local_datetime(&midnight)
        .earliest()
        .or_else(|| {
            timezone
                .from_local_datetime(&(midnight + chrono::Duration::hours(1)))
                .earliest()
        })
        .map(|start| start.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}

#[derive(Debug, Default)]
pub struct LedgerBuilder {
    store: Option<Arc<dyn Store>>,
    clock: Option<Arc<dyn Clock>>,
    config: LedgerConfig,
}

impl LedgerBuilder {
    /// Pass the store snapshots are loaded from and written to.
    pub fn store(mut self, store: Arc<dyn Store>) -> LedgerBuilder {
        self.store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> LedgerBuilder {
        self.clock = Some(clock);
        self
    }

    pub fn config(mut self, config: LedgerConfig) -> LedgerBuilder {
        self.config = config;
        self
    }

    pub fn starting_balance(mut self, amount: i64) -> LedgerBuilder {
        self.config.starting_balance = amount;
        self
    }

    pub fn daily_bonus(mut self, amount: i64) -> LedgerBuilder {
        self.config.daily_bonus = amount;
        self
    }

    pub fn timezone(mut self, timezone: Tz) -> LedgerBuilder {
        self.config.timezone = timezone;
        self
    }

    pub fn persist_timeout(mut self, timeout: Duration) -> LedgerBuilder {
        self.config.persist_timeout = timeout;
        self
    }

    /// Construct `Ledger`, loading the latest snapshot from the store.
    pub async fn build(self) -> ResultEngine<Ledger> {
        if self.config.starting_balance < 0 || self.config.daily_bonus <= 0 {
            return Err(EngineError::InvalidArgument(
                "starting balance must be >= 0 and daily bonus > 0".to_string(),
            ));
        }

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn Store>);
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);

        let mut state = LedgerState::default();
        match store.load().await? {
            Some(snapshot) => {
                for record in snapshot.accounts {
                    if record.balance < 0 {
                        return Err(EngineError::InvalidArgument(format!(
                            "negative balance for {} in stored snapshot",
                            record.user_id
                        )));
                    }
                    state.next_position = state.next_position.max(record.position + 1);
                    state.accounts.insert(record.user_id.clone(), record.into());
                }
                tracing::info!(
                    "loaded ledger with {} accounts (last updated {:?})",
                    state.accounts.len(),
                    snapshot.last_updated
                );
            }
            None => tracing::info!("no ledger snapshot found, starting fresh"),
        }

        Ok(Ledger {
            config: self.config,
            store,
            clock,
            state: RwLock::new(state),
            locks: Mutex::new(HashMap::new()),
        })
    }
}
