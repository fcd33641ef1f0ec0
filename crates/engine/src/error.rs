//! The module contains the errors the engine can throw.
//!
//! Domain outcomes the caller is expected to format for the user:
//!
//! - [`InsufficientFunds`] thrown when a debit would make a balance negative.
//! - [`AlreadyClaimed`] thrown when the daily bonus was already claimed today.
//! - [`SelfTransfer`], [`InvalidArgument`], [`InvalidDuration`], [`NotFound`]
//!   for validation failures.
//! - [`PermissionDenied`] and [`RateLimited`] for authorization failures.
//!
//! [`PersistenceFailure`] is a soft failure: the ledger reports it next to a
//! committed result instead of returning it as an `Err`.
//!
//!  [`InsufficientFunds`]: EngineError::InsufficientFunds
//!  [`AlreadyClaimed`]: EngineError::AlreadyClaimed
//!  [`SelfTransfer`]: EngineError::SelfTransfer
//!  [`InvalidArgument`]: EngineError::InvalidArgument
//!  [`InvalidDuration`]: EngineError::InvalidDuration
//!  [`NotFound`]: EngineError::NotFound
//!  [`PermissionDenied`]: EngineError::PermissionDenied
//!  [`RateLimited`]: EngineError::RateLimited
//!  [`PersistenceFailure`]: EngineError::PersistenceFailure
use chrono::{DateTime, Utc};
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Rate limited")]
    RateLimited,
    #[error("Insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: i64, requested: i64 },
    #[error("Cannot transfer to yourself")]
    SelfTransfer,
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Daily bonus already claimed, next claim at {next_claim_at}")]
    AlreadyClaimed { next_claim_at: DateTime<Utc> },
    #[error("Invalid duration: {0} minutes")]
    InvalidDuration(i64),
    #[error("\"{0}\" not found!")]
    NotFound(String),
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::PermissionDenied(a), Self::PermissionDenied(b)) => a == b,
            (Self::RateLimited, Self::RateLimited) => true,
            (
                Self::InsufficientFunds {
                    balance: a,
                    requested: x,
                },
                Self::InsufficientFunds {
                    balance: b,
                    requested: y,
                },
            ) => a == b && x == y,
            (Self::SelfTransfer, Self::SelfTransfer) => true,
            (Self::InvalidArgument(a), Self::InvalidArgument(b)) => a == b,
            (
                Self::AlreadyClaimed { next_claim_at: a },
                Self::AlreadyClaimed { next_claim_at: b },
            ) => a == b,
            (Self::InvalidDuration(a), Self::InvalidDuration(b)) => a == b,
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::PersistenceFailure(a), Self::PersistenceFailure(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            (Self::Io(a), Self::Io(b)) => a.kind() == b.kind(),
            _ => false,
        }
    }
}
