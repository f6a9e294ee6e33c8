//! Crowdfund deployment.
//!
//! A [`Crowdfund`] owns one [`Ledger`], the [`SaleController`] registered
//! as its sale controller, and the payment sink purchases are forwarded
//! through. It is the single entry point for every externally visible
//! operation; [`SharedCrowdfund`] serializes those operations across
//! threads so each one is observed atomically.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use lib_tokens::{Ledger, TokenError, TokenMetadata};
use lib_types::{Address, Amount, Timestamp};

use crate::controller::{SaleController, SalePhase};
use crate::errors::{CrowdfundError, CrowdfundResult};
use crate::payment::{NativeBalances, PaymentSink};
use crate::schedule::PricingSchedule;

/// Everything needed to deploy a crowdfund
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrowdfundParams {
    pub administrator: Address,
    pub sale_durations_by_epoch: Vec<u64>,
    pub unit_prices_by_epoch: Vec<Amount>,
    /// Receives purchase payments
    pub receiving_account: Address,
    /// Receives the unsold pool when the sale closes
    pub forward_address: Address,
    pub total_sale_days: u64,
    pub total_supply: Amount,
    /// Deploy with the sale already finalized and transfers unlocked
    pub skip_sale: bool,
    /// Deployment time; becomes the crowdfund start time when the sale is skipped
    pub deployed_at: Timestamp,
    /// Zero address marks the sale pool
    pub allocation_addresses: Vec<Address>,
    pub allocation_amounts: Vec<Amount>,
    /// Seconds after the crowdfund start time
    pub allocation_unlock_times: Vec<Timestamp>,
    pub token: TokenMetadata,
    pub allow_early_close: bool,
}

/// Deterministic identity of the sale controller for a deployment.
pub fn derive_controller_address(params: &CrowdfundParams) -> Address {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"crowdfund-controller");
    hasher.update(params.administrator.as_bytes());
    hasher.update(params.receiving_account.as_bytes());
    hasher.update(params.forward_address.as_bytes());
    hasher.update(&params.total_supply.to_le_bytes());
    let digest: [u8; 32] = hasher.finalize().into();
    Address::new(digest)
}

/// A deployed ledger and its sale controller
#[derive(Debug, Clone)]
pub struct Crowdfund<P: PaymentSink = NativeBalances> {
    ledger: Ledger,
    controller: SaleController,
    payments: P,
}

impl<P: PaymentSink> Crowdfund<P> {
    /// Validate `params` and build the ledger and controller.
    ///
    /// Nothing is created unless every check passes.
    pub fn deploy(params: CrowdfundParams, payments: P) -> CrowdfundResult<Self> {
        if params.receiving_account.is_zero() {
            return Err(CrowdfundError::InvalidConstruction(
                "receiving account cannot be the zero address".to_string(),
            ));
        }
        if params.forward_address.is_zero() {
            return Err(CrowdfundError::InvalidConstruction(
                "forward address cannot be the zero address".to_string(),
            ));
        }

        let schedule = PricingSchedule::new(
            &params.sale_durations_by_epoch,
            &params.unit_prices_by_epoch,
            params.total_sale_days,
        )?;

        let controller_address = derive_controller_address(&params);
        let mut ledger = Ledger::new(
            params.token,
            params.administrator,
            controller_address,
            params.total_supply,
            &params.allocation_addresses,
            &params.allocation_amounts,
            &params.allocation_unlock_times,
        )
        .map_err(|e| match e {
            TokenError::InvalidConstruction(reason) => CrowdfundError::InvalidConstruction(reason),
            other => CrowdfundError::Ledger(other),
        })?;

        let mut controller = SaleController::new(
            controller_address,
            params.administrator,
            schedule,
            params.receiving_account,
            params.forward_address,
            params.allow_early_close,
        );

        if params.skip_sale {
            controller.skip_sale(&mut ledger, params.deployed_at)?;
        }

        tracing::info!(
            "Crowdfund deployed: controller {}, supply {}, sale pool {}",
            controller_address,
            ledger.total_supply(),
            ledger.crowdfund_supply()
        );

        Ok(Self {
            ledger,
            controller,
            payments,
        })
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn controller(&self) -> &SaleController {
        &self.controller
    }

    pub fn payments(&self) -> &P {
        &self.payments
    }

    // ------------------------------------------------------------------
    // Token operations
    // ------------------------------------------------------------------

    pub fn transfer(
        &mut self,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> CrowdfundResult<()> {
        Ok(self.ledger.transfer(from, to, amount)?)
    }

    pub fn transfer_from(
        &mut self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> CrowdfundResult<()> {
        Ok(self.ledger.transfer_from(spender, from, to, amount)?)
    }

    pub fn approve(&mut self, owner: &Address, spender: &Address, amount: Amount) {
        self.ledger.approve(owner, spender, amount);
    }

    pub fn release_own_allocation(
        &mut self,
        caller: &Address,
        to: &Address,
        amount: Amount,
        now: Timestamp,
    ) -> CrowdfundResult<()> {
        Ok(self.ledger.release_own_allocation(caller, to, amount, now)?)
    }

    pub fn admin_release_allocation(
        &mut self,
        caller: &Address,
        beneficiary: &Address,
        amount: Amount,
        now: Timestamp,
    ) -> CrowdfundResult<()> {
        Ok(self
            .ledger
            .admin_release_allocation(caller, beneficiary, amount, now)?)
    }

    // ------------------------------------------------------------------
    // Sale operations
    // ------------------------------------------------------------------

    pub fn schedule_crowdfund(
        &mut self,
        caller: &Address,
        start_time: Timestamp,
        now: Timestamp,
    ) -> CrowdfundResult<()> {
        self.controller
            .schedule_crowdfund(&mut self.ledger, caller, start_time, now)
    }

    pub fn buy_tokens(
        &mut self,
        buyer: &Address,
        payment: Amount,
        now: Timestamp,
    ) -> CrowdfundResult<Amount> {
        self.controller
            .buy_tokens(&mut self.ledger, &mut self.payments, buyer, payment, now)
    }

    pub fn close_crowdfund(&mut self, caller: &Address, now: Timestamp) -> CrowdfundResult<()> {
        self.controller.close_crowdfund(&mut self.ledger, caller, now)
    }

    pub fn is_activated(&self, now: Timestamp) -> bool {
        self.controller.is_activated(now)
    }

    pub fn get_rate(&self, now: Timestamp) -> CrowdfundResult<Amount> {
        self.controller.get_rate(now)
    }

    pub fn phase(&self, now: Timestamp) -> SalePhase {
        self.controller.phase(now)
    }
}

/// Thread-safe handle to a [`Crowdfund`].
///
/// Each call holds the lock for the whole operation, so concurrent callers
/// observe a total order of complete operations.
#[derive(Debug)]
pub struct SharedCrowdfund<P: PaymentSink = NativeBalances> {
    inner: Arc<RwLock<Crowdfund<P>>>,
}

impl<P: PaymentSink> Clone for SharedCrowdfund<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: PaymentSink> SharedCrowdfund<P> {
    pub fn new(crowdfund: Crowdfund<P>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(crowdfund)),
        }
    }

    /// Run a read-only query against a consistent snapshot.
    pub fn read<R>(&self, f: impl FnOnce(&Crowdfund<P>) -> R) -> R {
        f(&*self.inner.read())
    }

    /// Run a state-changing operation under the exclusive lock.
    pub fn write<R>(&self, f: impl FnOnce(&mut Crowdfund<P>) -> R) -> R {
        f(&mut *self.inner.write())
    }

    pub fn buy_tokens(
        &self,
        buyer: &Address,
        payment: Amount,
        now: Timestamp,
    ) -> CrowdfundResult<Amount> {
        self.inner.write().buy_tokens(buyer, payment, now)
    }

    pub fn transfer(&self, from: &Address, to: &Address, amount: Amount) -> CrowdfundResult<()> {
        self.inner.write().transfer(from, to, amount)
    }

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.inner.read().ledger().balance_of(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_types::SECONDS_PER_DAY;

    fn addr(id: u8) -> Address {
        Address::new([id; 32])
    }

    fn create_test_params() -> CrowdfundParams {
        CrowdfundParams {
            administrator: addr(1),
            sale_durations_by_epoch: vec![3, 4, 7, 14],
            unit_prices_by_epoch: vec![1000, 750, 500, 250],
            receiving_account: addr(2),
            forward_address: addr(3),
            total_sale_days: 28,
            total_supply: 1_000_000,
            skip_sale: false,
            deployed_at: 0,
            allocation_addresses: vec![addr(3), addr(4), Address::zero()],
            allocation_amounts: vec![300_000, 200_000, 500_000],
            allocation_unlock_times: vec![0, 10 * SECONDS_PER_DAY, 0],
            token: TokenMetadata::default(),
            allow_early_close: false,
        }
    }

    #[test]
    fn test_deploy() {
        let crowdfund = Crowdfund::deploy(create_test_params(), NativeBalances::new()).unwrap();
        let ledger = crowdfund.ledger();

        assert_eq!(ledger.total_supply(), 1_000_000);
        assert_eq!(ledger.crowdfund_supply(), 500_000);
        assert_eq!(ledger.sale_controller(), crowdfund.controller().address());
        assert_eq!(
            *crowdfund.controller().address(),
            derive_controller_address(&create_test_params())
        );
        assert!(ledger.transfers_locked());
        assert_eq!(crowdfund.phase(0), SalePhase::Unscheduled);
    }

    #[test]
    fn test_controller_address_is_deterministic() {
        let params = create_test_params();
        let mut other = params.clone();
        other.forward_address = addr(9);

        assert_eq!(derive_controller_address(&params), derive_controller_address(&params));
        assert_ne!(derive_controller_address(&params), derive_controller_address(&other));
        assert!(!derive_controller_address(&params).is_zero());
    }

    #[test]
    fn test_deploy_rejects_invalid_params() {
        let mut params = create_test_params();
        params.receiving_account = Address::zero();
        assert!(matches!(
            Crowdfund::deploy(params, NativeBalances::new()),
            Err(CrowdfundError::InvalidConstruction(_))
        ));

        let mut params = create_test_params();
        params.total_sale_days = 27;
        assert!(matches!(
            Crowdfund::deploy(params, NativeBalances::new()),
            Err(CrowdfundError::InvalidConstruction(_))
        ));

        let mut params = create_test_params();
        params.allocation_amounts = vec![300_000, 200_000, 400_000];
        assert!(matches!(
            Crowdfund::deploy(params, NativeBalances::new()),
            Err(CrowdfundError::InvalidConstruction(_))
        ));

        // Sums that overflow cannot match the declared totals either
        let mut params = create_test_params();
        params.allocation_amounts = vec![Amount::MAX, 1, 0];
        assert!(matches!(
            Crowdfund::deploy(params, NativeBalances::new()),
            Err(CrowdfundError::InvalidConstruction(_))
        ));

        let mut params = create_test_params();
        params.sale_durations_by_epoch = vec![u64::MAX, 1, 1, 1];
        assert!(matches!(
            Crowdfund::deploy(params, NativeBalances::new()),
            Err(CrowdfundError::InvalidConstruction(_))
        ));
    }

    #[test]
    fn test_skip_sale_unlocks_immediately() {
        let mut params = create_test_params();
        params.skip_sale = true;
        params.deployed_at = 1_000;
        let mut crowdfund = Crowdfund::deploy(params, NativeBalances::new()).unwrap();

        assert_eq!(crowdfund.ledger().crowdfund_start_time(), Some(1_000));
        assert_eq!(crowdfund.controller().start_time(), Some(1_000));
        assert!(!crowdfund.ledger().transfers_locked());
        assert_eq!(crowdfund.phase(0), SalePhase::Finalized);
        assert_eq!(crowdfund.ledger().balance_of(&addr(3)), 500_000);
        assert_eq!(
            crowdfund.schedule_crowdfund(&addr(1), 10, 0),
            Err(CrowdfundError::AlreadyFinalized)
        );

        crowdfund.transfer(&addr(3), &addr(5), 1).unwrap();
        assert_eq!(crowdfund.ledger().balance_of(&addr(5)), 1);
    }

    #[test]
    fn test_skip_sale_allocations_vest_from_deployment() {
        let mut params = create_test_params();
        params.skip_sale = true;
        params.deployed_at = 1_000;
        let mut crowdfund = Crowdfund::deploy(params, NativeBalances::new()).unwrap();

        // No timelock: releasable at deployment
        crowdfund
            .release_own_allocation(&addr(3), &addr(3), 1, 1_000)
            .unwrap();
        crowdfund
            .admin_release_allocation(&addr(1), &addr(3), 1, 1_000)
            .unwrap();
        assert_eq!(crowdfund.ledger().balance_of(&addr(3)), 500_002);

        // Ten day timelock counts from deployment
        let unlocks_at = 1_000 + 10 * SECONDS_PER_DAY;
        assert_eq!(
            crowdfund.release_own_allocation(&addr(4), &addr(4), 1, unlocks_at - 1),
            Err(CrowdfundError::Ledger(TokenError::StillLocked {
                unlocks_at: Some(unlocks_at)
            }))
        );
        crowdfund
            .release_own_allocation(&addr(4), &addr(4), 200_000, unlocks_at)
            .unwrap();
        assert_eq!(crowdfund.ledger().balance_of(&addr(4)), 200_000);
        crowdfund.ledger().verify_conservation().unwrap();
    }

    #[test]
    fn test_skip_sale_rejects_unrepresentable_window() {
        let mut params = create_test_params();
        params.skip_sale = true;
        params.deployed_at = Timestamp::MAX - 10;

        assert!(matches!(
            Crowdfund::deploy(params, NativeBalances::new()),
            Err(CrowdfundError::Overflow)
        ));
    }

    #[test]
    fn test_ledger_errors_pass_through() {
        let mut crowdfund = Crowdfund::deploy(create_test_params(), NativeBalances::new()).unwrap();

        assert_eq!(
            crowdfund.transfer(&addr(3), &addr(5), 1),
            Err(CrowdfundError::Ledger(TokenError::TransfersLocked))
        );
        assert_eq!(
            crowdfund.release_own_allocation(&addr(4), &addr(4), 1, 0),
            Err(CrowdfundError::Ledger(TokenError::StillLocked { unlocks_at: None }))
        );
    }

    #[test]
    fn test_shared_crowdfund_concurrent_purchases() {
        let crowdfund = Crowdfund::deploy(create_test_params(), NativeBalances::new()).unwrap();
        let shared = SharedCrowdfund::new(crowdfund);
        shared.write(|cf| cf.schedule_crowdfund(&addr(1), 100, 100)).unwrap();

        // 8 buyers x 10 purchases x 5_000 tokens = 400_000 of a 500_000 pool
        let handles: Vec<_> = (0..8u8)
            .map(|i| {
                let shared = shared.clone();
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        shared.buy_tokens(&addr(10 + i), 5, 100).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        shared.read(|cf| {
            assert_eq!(cf.ledger().sale_pool_remaining(), 100_000);
            assert_eq!(cf.controller().tokens_sold(), 400_000);
            assert_eq!(cf.payments().received_by(&addr(2)), 400);
            cf.ledger().verify_conservation().unwrap();
        });
        assert_eq!(shared.balance_of(&addr(10)), 50_000);
    }
}
