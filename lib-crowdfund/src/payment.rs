//! Payment forwarding for purchases.
//!
//! A purchase carries a payment in the native currency that must reach the
//! receiving account atomically with the token credit. The controller
//! forwards through a [`PaymentSink`]; a sink failure aborts the purchase
//! before the ledger is touched.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use lib_types::{Address, Amount};

use crate::errors::{CrowdfundError, CrowdfundResult};

/// Destination for purchase payments
pub trait PaymentSink {
    /// Move `amount` paid by `payer` to `recipient`.
    fn forward(
        &mut self,
        payer: &Address,
        recipient: &Address,
        amount: Amount,
    ) -> CrowdfundResult<()>;
}

/// In-memory record of native funds received per account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeBalances {
    received: HashMap<Address, Amount>,
}

impl NativeBalances {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total received by `account`
    pub fn received_by(&self, account: &Address) -> Amount {
        self.received.get(account).copied().unwrap_or(0)
    }
}

impl PaymentSink for NativeBalances {
    fn forward(
        &mut self,
        payer: &Address,
        recipient: &Address,
        amount: Amount,
    ) -> CrowdfundResult<()> {
        let balance = self
            .received_by(recipient)
            .checked_add(amount)
            .ok_or_else(|| {
                CrowdfundError::PaymentFailed(format!("{} cannot receive {}", recipient, amount))
            })?;
        self.received.insert(*recipient, balance);

        tracing::debug!("Forwarded payment of {} from {} to {}", amount, payer, recipient);
        Ok(())
    }
}
