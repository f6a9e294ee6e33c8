//! Time-locked allocation records.
//!
//! An allocation's `unlock_time` is an offset in seconds from the crowdfund
//! start time. Nothing unlocks before the crowdfund has been scheduled.

use lib_types::{Address, Amount, Timestamp};
use serde::{Deserialize, Serialize};

/// A time-locked balance held on behalf of one account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    /// Remaining locked amount; only ever decreases
    pub amount: Amount,
    /// Seconds after the crowdfund start at which release becomes possible
    pub unlock_time: Timestamp,
}

impl Allocation {
    pub fn new(amount: Amount, unlock_time: Timestamp) -> Self {
        Self { amount, unlock_time }
    }

    /// Absolute instant at which this allocation unlocks, if the crowdfund
    /// has a start time.
    pub fn unlocks_at(&self, crowdfund_start: Option<Timestamp>) -> Option<Timestamp> {
        crowdfund_start.map(|start| start.saturating_add(self.unlock_time))
    }

    /// Inclusive: releasable at exactly `start + unlock_time`.
    pub fn is_unlocked(&self, crowdfund_start: Option<Timestamp>, now: Timestamp) -> bool {
        self.unlocks_at(crowdfund_start)
            .map(|at| now >= at)
            .unwrap_or(false)
    }
}

/// One recipient entry supplied at ledger construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationGrant {
    pub recipient: Address,
    pub amount: Amount,
    pub unlock_time: Timestamp,
}

impl AllocationGrant {
    pub fn new(recipient: Address, amount: Amount, unlock_time: Timestamp) -> Self {
        Self {
            recipient,
            amount,
            unlock_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locked_until_start_time_known() {
        let allocation = Allocation::new(1_000, 0);
        assert_eq!(allocation.unlocks_at(None), None);
        assert!(!allocation.is_unlocked(None, u64::MAX));
    }

    #[test]
    fn test_unlock_boundary_is_inclusive() {
        let allocation = Allocation::new(1_000, 600);
        let start = Some(10_000);

        assert_eq!(allocation.unlocks_at(start), Some(10_600));
        assert!(!allocation.is_unlocked(start, 10_599));
        assert!(allocation.is_unlocked(start, 10_600));
        assert!(allocation.is_unlocked(start, 20_000));
    }

    #[test]
    fn test_unlock_offset_saturates() {
        let allocation = Allocation::new(1, u64::MAX);
        assert_eq!(allocation.unlocks_at(Some(5)), Some(u64::MAX));
    }
}
