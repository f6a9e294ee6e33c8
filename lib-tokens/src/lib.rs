//! Fixed-supply token ledger with time-locked allocations.
//!
//! # Key Types
//!
//! - [`Ledger`]: balances, allocations, allowances and the global transfer lock
//! - [`Allocation`]: a time-locked balance, unlocking relative to the crowdfund start
//! - [`TokenError`]: typed failure for every ledger operation
//!
//! # Authorization
//!
//! The ledger knows two privileged identities, fixed at construction: the
//! administrator and the sale controller. Privileged entry points compare the
//! caller against these fields; there is no other permission model.

pub mod allocation;
pub mod errors;
pub mod ledger;

pub use allocation::{Allocation, AllocationGrant};
pub use errors::{TokenError, TokenResult};
pub use ledger::{Ledger, TokenMetadata, DEFAULT_DECIMALS, DEFAULT_TOKEN_NAME, DEFAULT_TOKEN_SYMBOL};
