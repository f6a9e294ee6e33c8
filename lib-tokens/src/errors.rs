//! Token Ledger Errors

use lib_types::{Amount, Timestamp};
use thiserror::Error;

/// Error during ledger operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Invalid construction: {0}")]
    InvalidConstruction(String),

    #[error("Transfers are locked until the crowdfund is finalized")]
    TransfersLocked,

    #[error("Insufficient balance: have {have}, need {need}")]
    InsufficientBalance { have: Amount, need: Amount },

    #[error("Insufficient allowance: have {have}, need {need}")]
    InsufficientAllowance { have: Amount, need: Amount },

    #[error("Account has no allocation")]
    NoAllocation,

    /// `unlocks_at` is `None` while the crowdfund start time is unset
    #[error("Allocation is still locked (unlocks at {unlocks_at:?})")]
    StillLocked { unlocks_at: Option<Timestamp> },

    #[error("Insufficient allocation: have {have}, need {need}")]
    InsufficientAllocation { have: Amount, need: Amount },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Crowdfund start time already set")]
    AlreadyScheduled,

    #[error("Sale pool exhausted: remaining {remaining}, requested {requested}")]
    PoolExhausted { remaining: Amount, requested: Amount },

    #[error("Arithmetic overflow")]
    Overflow,

    #[error("Conservation invariant violated: {0}")]
    ConservationViolated(String),
}

/// Result type for ledger operations
pub type TokenResult<T> = Result<T, TokenError>;
