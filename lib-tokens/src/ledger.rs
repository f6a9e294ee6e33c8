//! Token ledger with time-locked allocations.
//!
//! The ledger owns a fixed total supply split between liquid balances and
//! per-account allocations. Liquid transfers are globally locked until the
//! sale controller finalizes the crowdfund; allocations unlock independently
//! of the sale state, relative to the crowdfund start time.
//!
//! # Invariants
//!
//! - `total_supply == Σ liquid balances + Σ allocation amounts` after every call
//! - An allocation's `unlock_time` never changes after construction
//! - `transfers_locked` goes `true → false` once and never back
//! - The crowdfund start time is set at most once
//! - At most one allocation per address; sales credit liquid balances
//!
//! Every mutating method validates all preconditions before writing any
//! state, so a returned error leaves the ledger untouched.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use lib_types::{Address, Amount, Timestamp};

use crate::allocation::{Allocation, AllocationGrant};
use crate::errors::{TokenError, TokenResult};

/// Default token name
pub const DEFAULT_TOKEN_NAME: &str = "NAME";

/// Default token symbol
pub const DEFAULT_TOKEN_SYMBOL: &str = "SYMBOL";

/// Default number of decimal places
pub const DEFAULT_DECIMALS: u8 = 18;

/// Descriptive token metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

impl Default for TokenMetadata {
    fn default() -> Self {
        Self {
            name: DEFAULT_TOKEN_NAME.to_string(),
            symbol: DEFAULT_TOKEN_SYMBOL.to_string(),
            decimals: DEFAULT_DECIMALS,
        }
    }
}

impl TokenMetadata {
    /// Validate token parameters
    pub fn validate(&self) -> TokenResult<()> {
        if self.name.is_empty() {
            return Err(TokenError::InvalidConstruction(
                "Token name cannot be empty".to_string(),
            ));
        }
        if self.symbol.is_empty() {
            return Err(TokenError::InvalidConstruction(
                "Token symbol cannot be empty".to_string(),
            ));
        }
        if self.decimals > 38 {
            return Err(TokenError::InvalidConstruction(
                "Too many decimal places (max 38)".to_string(),
            ));
        }
        Ok(())
    }
}

/// Fixed-supply token ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    metadata: TokenMetadata,

    /// Fixed at construction
    total_supply: Amount,

    /// Liquid balances; zero balances are not stored
    balances: HashMap<Address, Amount>,

    /// Time-locked allocations, one per address
    allocations: HashMap<Address, Allocation>,

    /// Allowances: owner -> spender -> amount
    allowances: HashMap<Address, HashMap<Address, Amount>>,

    transfers_locked: bool,

    /// Only caller allowed to credit sales, set the start time and unlock transfers
    sale_controller: Address,

    administrator: Address,

    crowdfund_start_time: Option<Timestamp>,

    /// Size of the sale pool at construction
    crowdfund_supply: Amount,
}

impl Ledger {
    /// Create the ledger and distribute the full supply into allocations.
    ///
    /// The three allocation slices are parallel. A zero address in
    /// `allocation_addresses` designates the sale pool and is reassigned to
    /// `sale_controller`.
    ///
    /// # Errors
    /// `TokenError::InvalidConstruction` on mismatched lengths, a sum that is
    /// not exactly `total_supply`, duplicate recipients, a time-locked sale
    /// pool, or missing role identities.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        metadata: TokenMetadata,
        administrator: Address,
        sale_controller: Address,
        total_supply: Amount,
        allocation_addresses: &[Address],
        allocation_amounts: &[Amount],
        allocation_unlock_times: &[Timestamp],
    ) -> TokenResult<Self> {
        if allocation_addresses.len() != allocation_amounts.len()
            || allocation_addresses.len() != allocation_unlock_times.len()
        {
            return Err(TokenError::InvalidConstruction(format!(
                "allocation lists differ in length: {} addresses, {} amounts, {} unlock times",
                allocation_addresses.len(),
                allocation_amounts.len(),
                allocation_unlock_times.len()
            )));
        }

        let grants: Vec<AllocationGrant> = allocation_addresses
            .iter()
            .zip(allocation_amounts)
            .zip(allocation_unlock_times)
            .map(|((address, amount), unlock_time)| {
                let recipient = if address.is_zero() { sale_controller } else { *address };
                AllocationGrant::new(recipient, *amount, *unlock_time)
            })
            .collect();

        Self::from_grants(metadata, administrator, sale_controller, total_supply, &grants)
    }

    /// Create the ledger from already-resolved grants.
    pub fn from_grants(
        metadata: TokenMetadata,
        administrator: Address,
        sale_controller: Address,
        total_supply: Amount,
        grants: &[AllocationGrant],
    ) -> TokenResult<Self> {
        metadata.validate()?;

        if administrator.is_zero() {
            return Err(TokenError::InvalidConstruction(
                "administrator cannot be the zero address".to_string(),
            ));
        }
        if sale_controller.is_zero() || sale_controller == administrator {
            return Err(TokenError::InvalidConstruction(
                "sale controller must be a distinct non-zero address".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(grants.len());
        let mut sum: Amount = 0;
        for grant in grants {
            if grant.recipient.is_zero() {
                return Err(TokenError::InvalidConstruction(
                    "allocation recipient cannot be the zero address".to_string(),
                ));
            }
            if !seen.insert(grant.recipient) {
                return Err(TokenError::InvalidConstruction(format!(
                    "duplicate allocation for {}",
                    grant.recipient
                )));
            }
            if grant.recipient == sale_controller && grant.unlock_time != 0 {
                return Err(TokenError::InvalidConstruction(
                    "sale pool allocation cannot be time-locked".to_string(),
                ));
            }
            sum = sum.checked_add(grant.amount).ok_or_else(|| {
                TokenError::InvalidConstruction(format!(
                    "allocations overflow before matching total supply {}",
                    total_supply
                ))
            })?;
        }

        if sum != total_supply {
            return Err(TokenError::InvalidConstruction(format!(
                "allocations sum to {} but total supply is {}",
                sum, total_supply
            )));
        }

        let allocations: HashMap<Address, Allocation> = grants
            .iter()
            .map(|g| (g.recipient, Allocation::new(g.amount, g.unlock_time)))
            .collect();

        let crowdfund_supply = allocations
            .get(&sale_controller)
            .map(|a| a.amount)
            .unwrap_or(0);

        tracing::info!(
            "Ledger created: {} {} total supply, {} allocations, sale pool {}",
            total_supply,
            metadata.symbol,
            allocations.len(),
            crowdfund_supply
        );

        Ok(Self {
            metadata,
            total_supply,
            balances: HashMap::new(),
            allocations,
            allowances: HashMap::new(),
            transfers_locked: true,
            sale_controller,
            administrator,
            crowdfund_start_time: None,
            crowdfund_supply,
        })
    }

    // ========================================================================
    // READ OPERATIONS
    // ========================================================================

    pub fn metadata(&self) -> &TokenMetadata {
        &self.metadata
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn symbol(&self) -> &str {
        &self.metadata.symbol
    }

    pub fn decimals(&self) -> u8 {
        self.metadata.decimals
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    /// Liquid balance of an account
    pub fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Allocation record of an account, if any
    pub fn allocation_of(&self, account: &Address) -> Option<&Allocation> {
        self.allocations.get(account)
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.allowances
            .get(owner)
            .and_then(|spenders| spenders.get(spender))
            .copied()
            .unwrap_or(0)
    }

    pub fn transfers_locked(&self) -> bool {
        self.transfers_locked
    }

    pub fn crowdfund_start_time(&self) -> Option<Timestamp> {
        self.crowdfund_start_time
    }

    pub fn administrator(&self) -> &Address {
        &self.administrator
    }

    pub fn sale_controller(&self) -> &Address {
        &self.sale_controller
    }

    /// Sale pool size at construction
    pub fn crowdfund_supply(&self) -> Amount {
        self.crowdfund_supply
    }

    /// Unsold amount left in the sale pool
    pub fn sale_pool_remaining(&self) -> Amount {
        self.allocations
            .get(&self.sale_controller)
            .map(|a| a.amount)
            .unwrap_or(0)
    }

    /// Sum of all allocation amounts
    pub fn allocated_supply(&self) -> Amount {
        self.allocations.values().map(|a| a.amount).sum()
    }

    /// Sum of all liquid balances
    pub fn circulating_supply(&self) -> Amount {
        self.balances.values().sum()
    }

    /// Check that liquid plus allocated amounts equal the total supply.
    pub fn verify_conservation(&self) -> TokenResult<()> {
        let liquid = self
            .balances
            .values()
            .try_fold(0u128, |acc, b| acc.checked_add(*b))
            .ok_or(TokenError::Overflow)?;
        let locked = self
            .allocations
            .values()
            .try_fold(0u128, |acc, a| acc.checked_add(a.amount))
            .ok_or(TokenError::Overflow)?;

        match liquid.checked_add(locked) {
            Some(sum) if sum == self.total_supply => Ok(()),
            Some(sum) => Err(TokenError::ConservationViolated(format!(
                "liquid ({}) + allocated ({}) = {} != total supply ({})",
                liquid, locked, sum, self.total_supply
            ))),
            None => Err(TokenError::Overflow),
        }
    }

    // ========================================================================
    // TRANSFER OPERATIONS
    // ========================================================================

    /// Move liquid tokens from `from` to `to`.
    ///
    /// # Errors
    /// - `TransfersLocked`: the crowdfund is not finalized and `from` is not the sale controller
    /// - `InsufficientBalance`: `amount` exceeds the liquid balance of `from`
    pub fn transfer(&mut self, from: &Address, to: &Address, amount: Amount) -> TokenResult<()> {
        self.ensure_transferable(from)?;
        self.apply_transfer(from, to, amount)?;

        tracing::debug!("Transfer {} -> {}: {}", from, to, amount);
        Ok(())
    }

    /// Move liquid tokens on behalf of `from` using a prior approval.
    ///
    /// Lock gating applies exactly as for [`Ledger::transfer`].
    pub fn transfer_from(
        &mut self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> TokenResult<()> {
        self.ensure_transferable(from)?;

        let allowance = self.allowance(from, spender);
        if allowance < amount {
            return Err(TokenError::InsufficientAllowance {
                have: allowance,
                need: amount,
            });
        }

        self.apply_transfer(from, to, amount)?;
        self.approve(from, spender, allowance - amount);

        tracing::debug!(
            "Delegated transfer by {} from {} -> {}: {}",
            spender,
            from,
            to,
            amount
        );
        Ok(())
    }

    /// Set the allowance of `spender` over `owner`'s liquid balance (last write wins).
    pub fn approve(&mut self, owner: &Address, spender: &Address, amount: Amount) {
        if amount == 0 {
            if let Some(spenders) = self.allowances.get_mut(owner) {
                spenders.remove(spender);
            }
        } else {
            self.allowances
                .entry(*owner)
                .or_default()
                .insert(*spender, amount);
        }
    }

    fn ensure_transferable(&self, from: &Address) -> TokenResult<()> {
        if self.transfers_locked && *from != self.sale_controller {
            return Err(TokenError::TransfersLocked);
        }
        Ok(())
    }

    /// Debit and credit with every check done before the first write.
    fn apply_transfer(&mut self, from: &Address, to: &Address, amount: Amount) -> TokenResult<()> {
        let from_balance = self.balance_of(from);
        if from_balance < amount {
            return Err(TokenError::InsufficientBalance {
                have: from_balance,
                need: amount,
            });
        }

        if from == to {
            return Ok(());
        }

        let to_balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(TokenError::Overflow)?;

        self.set_balance(from, from_balance - amount);
        self.set_balance(to, to_balance);
        Ok(())
    }

    fn set_balance(&mut self, account: &Address, amount: Amount) {
        if amount == 0 {
            self.balances.remove(account);
        } else {
            self.balances.insert(*account, amount);
        }
    }

    // ========================================================================
    // ALLOCATION OPERATIONS
    // ========================================================================

    /// Release part of the caller's own allocation into `to`'s liquid balance.
    ///
    /// # Errors
    /// - `NoAllocation`: `caller` has no allocation record
    /// - `StillLocked`: before `crowdfund_start_time + unlock_time`, or the start time is unset
    /// - `InsufficientAllocation`: `amount` exceeds the remaining allocation
    /// - `Unauthorized`: `caller` is the sale controller (its pool drains through sales only)
    pub fn release_own_allocation(
        &mut self,
        caller: &Address,
        to: &Address,
        amount: Amount,
        now: Timestamp,
    ) -> TokenResult<()> {
        if *caller == self.sale_controller {
            return Err(TokenError::Unauthorized(
                "sale pool is released only through purchases".to_string(),
            ));
        }

        self.release_allocation(caller, to, amount, now)?;

        tracing::debug!("Allocation of {} released to {}: {}", caller, to, amount);
        Ok(())
    }

    /// Administrator-triggered release of `beneficiary`'s allocation into the
    /// beneficiary's own liquid balance.
    ///
    /// Subject to the same unlock and amount checks as
    /// [`Ledger::release_own_allocation`]; the administrator cannot bypass
    /// the timelock.
    pub fn admin_release_allocation(
        &mut self,
        caller: &Address,
        beneficiary: &Address,
        amount: Amount,
        now: Timestamp,
    ) -> TokenResult<()> {
        if *caller != self.administrator {
            tracing::warn!("Rejected admin allocation release from {}", caller);
            return Err(TokenError::Unauthorized(
                "only the administrator can release allocations on behalf of others".to_string(),
            ));
        }
        if *beneficiary == self.sale_controller {
            return Err(TokenError::Unauthorized(
                "sale pool is released only through purchases".to_string(),
            ));
        }

        self.release_allocation(beneficiary, beneficiary, amount, now)?;

        tracing::debug!(
            "Administrator released allocation of {}: {}",
            beneficiary,
            amount
        );
        Ok(())
    }

    fn release_allocation(
        &mut self,
        owner: &Address,
        to: &Address,
        amount: Amount,
        now: Timestamp,
    ) -> TokenResult<()> {
        let allocation = self
            .allocations
            .get(owner)
            .copied()
            .ok_or(TokenError::NoAllocation)?;

        if !allocation.is_unlocked(self.crowdfund_start_time, now) {
            return Err(TokenError::StillLocked {
                unlocks_at: allocation.unlocks_at(self.crowdfund_start_time),
            });
        }

        self.drain_allocation(owner, allocation, to, amount)
    }

    /// Move `amount` out of `owner`'s allocation into `to`'s liquid balance.
    fn drain_allocation(
        &mut self,
        owner: &Address,
        allocation: Allocation,
        to: &Address,
        amount: Amount,
    ) -> TokenResult<()> {
        if amount > allocation.amount {
            return Err(TokenError::InsufficientAllocation {
                have: allocation.amount,
                need: amount,
            });
        }

        let to_balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(TokenError::Overflow)?;

        if let Some(record) = self.allocations.get_mut(owner) {
            record.amount = allocation.amount - amount;
        }
        self.set_balance(to, to_balance);
        Ok(())
    }

    // ========================================================================
    // SALE CONTROLLER OPERATIONS
    // ========================================================================

    /// Credit `buyer`'s liquid balance out of the sale pool.
    ///
    /// # Errors
    /// - `Unauthorized`: `caller` is not the registered sale controller
    /// - `PoolExhausted`: the pool holds less than `amount`
    pub fn credit_from_sale(
        &mut self,
        caller: &Address,
        buyer: &Address,
        amount: Amount,
    ) -> TokenResult<()> {
        self.ensure_sale_controller(caller)?;

        let controller = self.sale_controller;
        let pool = match self.allocations.get(&controller).copied() {
            Some(pool) if pool.amount >= amount => pool,
            other => {
                return Err(TokenError::PoolExhausted {
                    remaining: other.map(|p| p.amount).unwrap_or(0),
                    requested: amount,
                })
            }
        };

        self.drain_allocation(&controller, pool, buyer, amount)
    }

    /// Record the crowdfund start time. Allowed once.
    pub fn set_crowdfund_start_time(
        &mut self,
        caller: &Address,
        start_time: Timestamp,
    ) -> TokenResult<()> {
        self.ensure_sale_controller(caller)?;

        if self.crowdfund_start_time.is_some() {
            return Err(TokenError::AlreadyScheduled);
        }

        self.crowdfund_start_time = Some(start_time);
        tracing::info!("Crowdfund start time set to {}", start_time);
        Ok(())
    }

    /// Lift the global transfer lock. A repeated call changes nothing.
    pub fn unlock_transfers(&mut self, caller: &Address) -> TokenResult<()> {
        self.ensure_sale_controller(caller)?;

        if self.transfers_locked {
            self.transfers_locked = false;
            tracing::info!("Token transfers unlocked");
        }
        Ok(())
    }

    fn ensure_sale_controller(&self, caller: &Address) -> TokenResult<()> {
        if *caller != self.sale_controller {
            tracing::warn!("Rejected sale controller call from {}", caller);
            return Err(TokenError::Unauthorized(
                "only the sale controller can call this".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================
