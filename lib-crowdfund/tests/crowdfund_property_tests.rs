//! Crowdfund Property Tests
//!
//! Random interleavings of purchases, releases, transfers and a close
//! against a deployed crowdfund, with a non-decreasing clock.

use lib_crowdfund::{Crowdfund, CrowdfundParams, NativeBalances, SalePhase};
use lib_tokens::TokenMetadata;
use lib_types::{Address, Amount, Timestamp, SECONDS_PER_DAY};
use proptest::prelude::*;

const ADMIN: u8 = 1;
const WALLET: u8 = 2;
const FORWARD: u8 = 3;
const TEAM: u8 = 4;
const BUYER: u8 = 5;
const START: Timestamp = 1_000;

fn account(id: u8) -> Address {
    Address::new([id; 32])
}

fn deploy() -> Crowdfund {
    let params = CrowdfundParams {
        administrator: account(ADMIN),
        sale_durations_by_epoch: vec![2, 3],
        unit_prices_by_epoch: vec![20, 10],
        receiving_account: account(WALLET),
        forward_address: account(FORWARD),
        total_sale_days: 5,
        total_supply: 10_000,
        skip_sale: false,
        deployed_at: 0,
        allocation_addresses: vec![account(TEAM), Address::zero()],
        allocation_amounts: vec![4_000, 6_000],
        allocation_unlock_times: vec![2 * SECONDS_PER_DAY, 0],
        token: TokenMetadata::default(),
        allow_early_close: true,
    };
    let mut crowdfund = Crowdfund::deploy(params, NativeBalances::new()).unwrap();
    crowdfund
        .schedule_crowdfund(&account(ADMIN), START, 0)
        .unwrap();
    crowdfund
}

#[derive(Debug, Clone)]
enum Op {
    Buy { buyer: u8, payment: Amount },
    Release { amount: Amount },
    Transfer { from: u8, to: u8, amount: Amount },
    Close,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let holder = prop_oneof![Just(TEAM), Just(BUYER), Just(FORWARD)];
    prop_oneof![
        (Just(BUYER), 0u128..120).prop_map(|(buyer, payment)| Op::Buy { buyer, payment }),
        (0u128..1_500).prop_map(|amount| Op::Release { amount }),
        (holder.clone(), holder, 0u128..500)
            .prop_map(|(from, to, amount)| Op::Transfer { from, to, amount }),
        Just(Op::Close),
    ]
}

proptest! {
    /// Pool, sales and payments stay in agreement whatever succeeds or fails
    #[test]
    fn prop_sale_accounting_consistent(
        steps in proptest::collection::vec((op_strategy(), 0u64..SECONDS_PER_DAY), 0..40)
    ) {
        let mut crowdfund = deploy();
        let mut now = START;

        for (op, advance) in steps {
            now += advance;
            let ledger_before = crowdfund.ledger().clone();
            let controller_before = crowdfund.controller().clone();

            let ok = match op {
                Op::Buy { buyer, payment } => {
                    crowdfund.buy_tokens(&account(buyer), payment, now).is_ok()
                }
                Op::Release { amount } => crowdfund
                    .release_own_allocation(&account(TEAM), &account(TEAM), amount, now)
                    .is_ok(),
                Op::Transfer { from, to, amount } => crowdfund
                    .transfer(&account(from), &account(to), amount)
                    .is_ok(),
                Op::Close => crowdfund.close_crowdfund(&account(ADMIN), now).is_ok(),
            };

            if !ok {
                prop_assert_eq!(crowdfund.ledger(), &ledger_before);
                prop_assert_eq!(crowdfund.controller(), &controller_before);
            }

            let ledger = crowdfund.ledger();
            let controller = crowdfund.controller();
            prop_assert!(ledger.verify_conservation().is_ok());
            prop_assert_eq!(
                crowdfund.payments().received_by(&account(WALLET)),
                controller.total_raised()
            );
            if controller.is_finalized() {
                prop_assert_eq!(ledger.sale_pool_remaining(), 0);
                prop_assert!(!ledger.transfers_locked());
                prop_assert_eq!(crowdfund.phase(now), SalePhase::Finalized);
            } else {
                prop_assert_eq!(
                    ledger.sale_pool_remaining() + controller.tokens_sold(),
                    ledger.crowdfund_supply()
                );
                prop_assert!(ledger.transfers_locked());
            }
        }
    }
}
