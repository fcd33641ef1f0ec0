//! Core state of the bot: the currency ledger, roles and sudo grants, group
//! mutes and the per-user rate limiter.
//!
//! Nothing in this crate knows about chat transports; the `telegram_bot`
//! crate drives it.

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::EngineError;
pub use ledger::{
    Account, Committed, DailyBonus, Ledger, LedgerBuilder, LedgerConfig, LedgerStats,
    TransferReceipt,
};
pub use permissions::{MuteRecord, PermissionConfig, PermissionEngine, SudoGrant};
pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use role::Role;
pub use store::{AccountRecord, JsonFileStore, LedgerSnapshot, MemoryStore, SqliteStore, Store};

mod clock;
mod error;
mod ledger;
mod permissions;
mod rate_limit;
mod role;
pub mod store;

pub type ResultEngine<T> = Result<T, EngineError>;
