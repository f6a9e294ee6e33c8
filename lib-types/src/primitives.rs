//! Canonical primitive types for the token ledger and crowdfund.
//!
//! These types are the foundational building blocks for all ledger state:
//! - Fixed-size (no dynamic allocation)
//! - Deterministically serializable
//! - Exact integer arithmetic only

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// TYPE ALIASES
// ============================================================================

/// Token amounts in the smallest unit (supports up to ~340 undecillion units)
pub type Amount = u128;

/// Seconds since the Unix epoch (block timestamp equivalent)
pub type Timestamp = u64;

/// Number of seconds in one sale day
pub const SECONDS_PER_DAY: u64 = 86_400;

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// 32-byte account address
#[derive(Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, Default, PartialOrd, Ord)]
pub struct Address(pub [u8; 32]);

impl Address {
    /// Create a new Address from raw bytes
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Create a zeroed Address
    pub const fn zero() -> Self {
        Self([0u8; 32])
    }

    /// Get the underlying bytes
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Check if this is the zero address
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Parse a hex address, with or without a `0x` prefix.
    ///
    /// Short inputs are left-padded with zeros, so `"0x0"` parses to the
    /// zero address.
    pub fn from_hex(input: &str) -> Result<Self, AddressParseError> {
        let digits = input
            .strip_prefix("0x")
            .or_else(|| input.strip_prefix("0X"))
            .unwrap_or(input);

        if digits.is_empty() || digits.len() > 64 {
            return Err(AddressParseError::InvalidLength(digits.len()));
        }

        let padded = format!("{:0>64}", digits);
        let raw = hex::decode(&padded)
            .map_err(|_| AddressParseError::InvalidHex(input.to_string()))?;

        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&raw);
        Ok(Self(bytes))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", hex::encode(&self.0[..8]))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl From<[u8; 32]> for Address {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// Error parsing an [`Address`] from text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressParseError {
    #[error("address must have 1..=64 hex digits, got {0}")]
    InvalidLength(usize),

    #[error("invalid hex address: {0}")]
    InvalidHex(String),
}

// ============================================================================
// TESTS
// ============================================================================
