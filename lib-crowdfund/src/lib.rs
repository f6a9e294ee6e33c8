//! Crowdfund controller for the token ledger.
//!
//! # Key Types
//!
//! - [`SaleController`]: schedule, tiered pricing, purchases and finalization
//! - [`PricingSchedule`]: consecutive day-based epochs with a unit price each
//! - [`Crowdfund`]: a deployed ledger plus its controller and payment sink
//! - [`SharedCrowdfund`]: lock-protected handle for concurrent callers
//! - [`CrowdfundConfig`]: TOML deployment configuration
//!
//! # Lifecycle
//!
//! Deploy locks every token in allocations, with the sale pool held by the
//! controller. The administrator schedules a start time, buyers purchase
//! during the window, and closing the sale forwards the unsold pool and
//! unlocks transfers for good.

pub mod config;
pub mod controller;
pub mod deployment;
pub mod errors;
pub mod payment;
pub mod schedule;

pub use config::{
    load_config, AllocationConfig, AmountValue, ConfigError, CrowdfundConfig, EpochConfig,
};
pub use controller::{SaleController, SalePhase};
pub use deployment::{derive_controller_address, Crowdfund, CrowdfundParams, SharedCrowdfund};
pub use errors::{CrowdfundError, CrowdfundResult};
pub use payment::{NativeBalances, PaymentSink};
pub use schedule::{Epoch, PricingSchedule};
