//! Crowdfund Errors

use lib_tokens::TokenError;
use lib_types::{Amount, Timestamp};
use thiserror::Error;

/// Error during crowdfund operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CrowdfundError {
    #[error("Invalid construction: {0}")]
    InvalidConstruction(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Crowdfund already scheduled")]
    AlreadyScheduled,

    #[error("Crowdfund not scheduled")]
    NotScheduled,

    #[error("Crowdfund already finalized")]
    AlreadyFinalized,

    #[error("Crowdfund cannot be finalized before {ends_at}")]
    NotYetFinalizable { ends_at: Timestamp },

    #[error("Sale pool exhausted: remaining {remaining}, requested {requested}")]
    PoolExhausted { remaining: Amount, requested: Amount },

    #[error("Sale window is closed")]
    SaleWindowClosed,

    #[error("Start time {start_time} is before the current time {now}")]
    StartTimeInPast { start_time: Timestamp, now: Timestamp },

    #[error("Zero amount not allowed")]
    ZeroAmount,

    #[error("Arithmetic overflow")]
    Overflow,

    #[error("Payment forwarding failed: {0}")]
    PaymentFailed(String),

    #[error(transparent)]
    Ledger(#[from] TokenError),
}

/// Result type for crowdfund operations
pub type CrowdfundResult<T> = Result<T, CrowdfundError>;
