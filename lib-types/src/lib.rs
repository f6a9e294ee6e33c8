//! Token ledger primitives.
//! Stable, behavior-free identifiers and integer units.

pub mod primitives;

pub use primitives::{Address, AddressParseError, Amount, Timestamp, SECONDS_PER_DAY};
