//! Sale controller: crowdfund phase state machine.
//!
//! # State Machine
//! ```text
//!   ┌─────────────┐  schedule  ┌───────────┐  now >= start  ┌────────┐
//!   │ Unscheduled │ ─────────▶ │ Scheduled │ ─────────────▶ │ Active │
//!   └─────────────┘            └───────────┘                └────────┘
//!                                                                │ now >= end
//!                                                                ▼
//!                                  ┌───────────┐   close    ┌────────┐
//!                                  │ Finalized │ ◀───────── │ Ended  │
//!                                  └───────────┘            └────────┘
//! ```
//!
//! Only `Unscheduled → Scheduled` and `→ Finalized` are stored transitions.
//! `Active` and `Ended` are derived from the clock on every call.
//!
//! The controller never owns the ledger. Each operation receives the ledger
//! by `&mut` and acts on it under the controller's own address, which the
//! ledger checks against its registered sale controller.

use serde::{Deserialize, Serialize};

use lib_tokens::{Ledger, TokenError};
use lib_types::{Address, Amount, Timestamp};

use crate::errors::{CrowdfundError, CrowdfundResult};
use crate::payment::PaymentSink;
use crate::schedule::PricingSchedule;

/// Crowdfund lifecycle phase at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SalePhase {
    /// No start time yet
    Unscheduled,
    /// Start time set but not reached
    Scheduled,
    /// Purchases accepted
    Active,
    /// Window elapsed, waiting for close
    Ended,
    /// Closed; transfers unlocked
    Finalized,
}

impl SalePhase {
    pub fn accepts_purchases(&self) -> bool {
        matches!(self, SalePhase::Active)
    }
}

impl std::fmt::Display for SalePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SalePhase::Unscheduled => write!(f, "unscheduled"),
            SalePhase::Scheduled => write!(f, "scheduled"),
            SalePhase::Active => write!(f, "active"),
            SalePhase::Ended => write!(f, "ended"),
            SalePhase::Finalized => write!(f, "finalized"),
        }
    }
}

/// Crowdfund controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleController {
    /// Identity registered in the ledger as its sale controller
    address: Address,
    administrator: Address,
    schedule: PricingSchedule,
    start_time: Option<Timestamp>,
    finalized: bool,
    /// Receives every purchase payment
    receiving_account: Address,
    /// Receives the unsold pool on finalization
    forward_address: Address,
    /// Permit closing before the window ends once the pool is empty
    allow_early_close: bool,
    total_raised: Amount,
    tokens_sold: Amount,
}

impl SaleController {
    pub fn new(
        address: Address,
        administrator: Address,
        schedule: PricingSchedule,
        receiving_account: Address,
        forward_address: Address,
        allow_early_close: bool,
    ) -> Self {
        Self {
            address,
            administrator,
            schedule,
            start_time: None,
            finalized: false,
            receiving_account,
            forward_address,
            allow_early_close,
            total_raised: 0,
            tokens_sold: 0,
        }
    }

    // ========================================================================
    // READ OPERATIONS
    // ========================================================================

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn administrator(&self) -> &Address {
        &self.administrator
    }

    pub fn schedule(&self) -> &PricingSchedule {
        &self.schedule
    }

    pub fn start_time(&self) -> Option<Timestamp> {
        self.start_time
    }

    /// Exclusive end of the sale window
    pub fn end_time(&self) -> Option<Timestamp> {
        self.start_time.map(|start| self.schedule.end_time(start))
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn receiving_account(&self) -> &Address {
        &self.receiving_account
    }

    pub fn forward_address(&self) -> &Address {
        &self.forward_address
    }

    pub fn allow_early_close(&self) -> bool {
        self.allow_early_close
    }

    /// Total payment forwarded to the receiving account
    pub fn total_raised(&self) -> Amount {
        self.total_raised
    }

    /// Total tokens credited to buyers
    pub fn tokens_sold(&self) -> Amount {
        self.tokens_sold
    }

    pub fn remaining_pool(&self, ledger: &Ledger) -> Amount {
        ledger.sale_pool_remaining()
    }

    pub fn phase(&self, now: Timestamp) -> SalePhase {
        if self.finalized {
            return SalePhase::Finalized;
        }
        match self.start_time {
            None => SalePhase::Unscheduled,
            Some(start) if now < start => SalePhase::Scheduled,
            Some(start) if now < self.schedule.end_time(start) => SalePhase::Active,
            Some(_) => SalePhase::Ended,
        }
    }

    /// `start <= now < start + total_days * 86400` and not finalized
    pub fn is_activated(&self, now: Timestamp) -> bool {
        self.phase(now).accepts_purchases()
    }

    /// Tokens minted per unit of payment at `now`.
    ///
    /// # Errors
    /// - `SaleWindowClosed`: finalized, before the start, or past the last epoch
    /// - `NotScheduled`: no start time
    pub fn get_rate(&self, now: Timestamp) -> CrowdfundResult<Amount> {
        if self.finalized {
            return Err(CrowdfundError::SaleWindowClosed);
        }
        let start = self.start_time.ok_or(CrowdfundError::NotScheduled)?;
        self.schedule
            .rate_at(start, now)
            .ok_or(CrowdfundError::SaleWindowClosed)
    }

    // ========================================================================
    // STATE TRANSITIONS
    // ========================================================================

    /// Set the sale start time, here and in the ledger.
    ///
    /// `start_time` may equal `now`, which opens the sale immediately.
    pub fn schedule_crowdfund(
        &mut self,
        ledger: &mut Ledger,
        caller: &Address,
        start_time: Timestamp,
        now: Timestamp,
    ) -> CrowdfundResult<()> {
        self.ensure_administrator(caller)?;

        if self.finalized {
            return Err(CrowdfundError::AlreadyFinalized);
        }
        if self.start_time.is_some() {
            return Err(CrowdfundError::AlreadyScheduled);
        }
        if start_time < now {
            return Err(CrowdfundError::StartTimeInPast { start_time, now });
        }

        let ends_at = self.record_start_time(ledger, start_time)?;

        tracing::info!(
            "Crowdfund scheduled: start {}, end {}, {} epochs",
            start_time,
            ends_at,
            self.schedule.epochs().len()
        );
        Ok(())
    }

    /// Finalize without a sale.
    ///
    /// `now` becomes the crowdfund start time, so allocation timelocks run
    /// from the moment the sale is skipped.
    pub(crate) fn skip_sale(&mut self, ledger: &mut Ledger, now: Timestamp) -> CrowdfundResult<()> {
        if self.finalized {
            return Err(CrowdfundError::AlreadyFinalized);
        }
        if self.start_time.is_some() {
            return Err(CrowdfundError::AlreadyScheduled);
        }

        self.record_start_time(ledger, now)?;
        self.finalize(ledger)?;

        tracing::info!("Sale skipped: allocation timelocks run from {}", now);
        Ok(())
    }

    /// Store the start time here and in the ledger; returns the window end.
    ///
    /// The whole window must fit before `Timestamp::MAX`.
    fn record_start_time(
        &mut self,
        ledger: &mut Ledger,
        start_time: Timestamp,
    ) -> CrowdfundResult<Timestamp> {
        let ends_at = start_time
            .checked_add(self.schedule.duration_seconds())
            .ok_or(CrowdfundError::Overflow)?;

        ledger
            .set_crowdfund_start_time(&self.address, start_time)
            .map_err(|e| match e {
                TokenError::AlreadyScheduled => CrowdfundError::AlreadyScheduled,
                other => CrowdfundError::Ledger(other),
            })?;
        self.start_time = Some(start_time);
        Ok(ends_at)
    }

    /// Sell tokens at the current rate.
    ///
    /// Every check runs before the payment is forwarded; once the payment
    /// has moved, crediting the buyer cannot fail.
    ///
    /// # Returns
    /// Tokens credited to `buyer`
    pub fn buy_tokens<P: PaymentSink + ?Sized>(
        &mut self,
        ledger: &mut Ledger,
        payments: &mut P,
        buyer: &Address,
        payment: Amount,
        now: Timestamp,
    ) -> CrowdfundResult<Amount> {
        if self.finalized {
            return Err(CrowdfundError::SaleWindowClosed);
        }
        if self.start_time.is_none() {
            return Err(CrowdfundError::NotScheduled);
        }
        if !self.is_activated(now) {
            return Err(CrowdfundError::SaleWindowClosed);
        }
        if payment == 0 {
            return Err(CrowdfundError::ZeroAmount);
        }

        let rate = self.get_rate(now)?;
        let tokens = payment.checked_mul(rate).ok_or(CrowdfundError::Overflow)?;
        if tokens == 0 {
            return Err(CrowdfundError::ZeroAmount);
        }

        let remaining = ledger.sale_pool_remaining();
        if tokens > remaining {
            return Err(CrowdfundError::PoolExhausted {
                remaining,
                requested: tokens,
            });
        }

        let total_raised = self
            .total_raised
            .checked_add(payment)
            .ok_or(CrowdfundError::Overflow)?;
        let tokens_sold = self
            .tokens_sold
            .checked_add(tokens)
            .ok_or(CrowdfundError::Overflow)?;

        payments.forward(buyer, &self.receiving_account, payment)?;
        ledger.credit_from_sale(&self.address, buyer, tokens)?;

        self.total_raised = total_raised;
        self.tokens_sold = tokens_sold;

        tracing::info!(
            "Purchase by {}: paid {}, rate {}, credited {} ({} left in pool)",
            buyer,
            payment,
            rate,
            tokens,
            remaining - tokens
        );
        Ok(tokens)
    }

    /// Close the sale and unlock transfers.
    ///
    /// Allowed once the window has fully elapsed, or earlier when early close
    /// is enabled and the pool is empty. The unsold remainder of the pool is
    /// credited to the forward address.
    pub fn close_crowdfund(
        &mut self,
        ledger: &mut Ledger,
        caller: &Address,
        now: Timestamp,
    ) -> CrowdfundResult<()> {
        self.ensure_administrator(caller)?;

        if self.finalized {
            return Err(CrowdfundError::AlreadyFinalized);
        }
        let start = self.start_time.ok_or(CrowdfundError::NotScheduled)?;
        let ends_at = self.schedule.end_time(start);

        if now < ends_at {
            let exhausted = ledger.sale_pool_remaining() == 0;
            if !(self.allow_early_close && exhausted) {
                return Err(CrowdfundError::NotYetFinalizable { ends_at });
            }
            tracing::info!("Closing crowdfund early: sale pool exhausted");
        }

        self.finalize(ledger)
    }

    /// Move the unsold pool to the forward address, unlock transfers and
    /// mark the sale finalized.
    fn finalize(&mut self, ledger: &mut Ledger) -> CrowdfundResult<()> {
        let residual = ledger.sale_pool_remaining();
        if residual > 0 {
            ledger.credit_from_sale(&self.address, &self.forward_address, residual)?;
        }
        ledger.unlock_transfers(&self.address)?;
        self.finalized = true;

        tracing::info!(
            "Crowdfund finalized: raised {}, sold {}, {} forwarded to {}",
            self.total_raised,
            self.tokens_sold,
            residual,
            self.forward_address
        );
        Ok(())
    }

    fn ensure_administrator(&self, caller: &Address) -> CrowdfundResult<()> {
        if *caller != self.administrator {
            tracing::warn!("Rejected crowdfund administration call from {}", caller);
            return Err(CrowdfundError::Unauthorized(
                "only the administrator can manage the crowdfund".to_string(),
            ));
        }
        Ok(())
    }
}
