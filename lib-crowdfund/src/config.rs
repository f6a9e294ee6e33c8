//! Crowdfund configuration loader.
//!
//! ```toml
//! administrator = "0x01..."
//! receiving_account = "0x02..."
//! forward_address = "0x03..."
//! total_sale_days = 28
//! total_supply = "1000000000000000000000000"
//!
//! [token]
//! name = "NAME"
//! symbol = "SYMBOL"
//! decimals = 18
//!
//! [[epochs]]
//! duration_days = 3
//! unit_price = 1000
//!
//! [[allocations]]
//! address = "0x0"        # sale pool
//! amount = 500000
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use lib_tokens::TokenMetadata;
use lib_types::{Address, AddressParseError, Amount, Timestamp};

use crate::deployment::CrowdfundParams;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("Configuration parsing error: {0}")]
    Parsing(#[from] toml::de::Error),

    #[error("Invalid address for {field}: {source}")]
    InvalidAddress {
        field: String,
        #[source]
        source: AddressParseError,
    },

    #[error("Invalid amount for {field}: {value}")]
    InvalidAmount { field: String, value: String },
}

/// Token amount as a TOML integer or a decimal string
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum AmountValue {
    Integer(u64),
    Text(String),
}

impl AmountValue {
    fn resolve(&self, field: &str) -> Result<Amount, ConfigError> {
        match self {
            AmountValue::Integer(value) => Ok(Amount::from(*value)),
            AmountValue::Text(text) => text.trim().replace('_', "").parse().map_err(|_| {
                ConfigError::InvalidAmount {
                    field: field.to_string(),
                    value: text.clone(),
                }
            }),
        }
    }
}

impl From<Amount> for AmountValue {
    fn from(value: Amount) -> Self {
        match u64::try_from(value) {
            Ok(small) => AmountValue::Integer(small),
            Err(_) => AmountValue::Text(value.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EpochConfig {
    pub duration_days: u64,
    pub unit_price: AmountValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AllocationConfig {
    /// Hex address; the zero address ("0x0") marks the sale pool
    pub address: String,
    pub amount: AmountValue,
    /// Seconds after the crowdfund start time
    #[serde(default)]
    pub unlock_time: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CrowdfundConfig {
    pub administrator: String,
    pub receiving_account: String,
    pub forward_address: String,
    pub total_sale_days: u64,
    pub total_supply: AmountValue,
    #[serde(default)]
    pub skip_sale: bool,
    /// Start of allocation timelocks when the sale is skipped
    #[serde(default)]
    pub deployed_at: Timestamp,
    #[serde(default)]
    pub allow_early_close: bool,
    #[serde(default)]
    pub token: TokenMetadata,
    pub epochs: Vec<EpochConfig>,
    #[serde(default)]
    pub allocations: Vec<AllocationConfig>,
}

impl CrowdfundConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Resolve addresses and amounts into deployment parameters.
    ///
    /// Only the encoding is checked here; semantic validation happens at
    /// deployment.
    pub fn into_params(&self) -> Result<CrowdfundParams, ConfigError> {
        let unit_prices_by_epoch = self
            .epochs
            .iter()
            .enumerate()
            .map(|(i, epoch)| epoch.unit_price.resolve(&format!("epochs[{}].unit_price", i)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut allocation_addresses = Vec::with_capacity(self.allocations.len());
        let mut allocation_amounts = Vec::with_capacity(self.allocations.len());
        let mut allocation_unlock_times = Vec::with_capacity(self.allocations.len());
        for (i, allocation) in self.allocations.iter().enumerate() {
            allocation_addresses.push(parse_address(
                &format!("allocations[{}].address", i),
                &allocation.address,
            )?);
            allocation_amounts.push(
                allocation
                    .amount
                    .resolve(&format!("allocations[{}].amount", i))?,
            );
            allocation_unlock_times.push(allocation.unlock_time);
        }

        Ok(CrowdfundParams {
            administrator: parse_address("administrator", &self.administrator)?,
            sale_durations_by_epoch: self.epochs.iter().map(|e| e.duration_days).collect(),
            unit_prices_by_epoch,
            receiving_account: parse_address("receiving_account", &self.receiving_account)?,
            forward_address: parse_address("forward_address", &self.forward_address)?,
            total_sale_days: self.total_sale_days,
            total_supply: self.total_supply.resolve("total_supply")?,
            skip_sale: self.skip_sale,
            deployed_at: self.deployed_at,
            allocation_addresses,
            allocation_amounts,
            allocation_unlock_times,
            token: self.token.clone(),
            allow_early_close: self.allow_early_close,
        })
    }
}

fn parse_address(field: &str, raw: &str) -> Result<Address, ConfigError> {
    raw.parse().map_err(|source| ConfigError::InvalidAddress {
        field: field.to_string(),
        source,
    })
}

/// Load a crowdfund configuration file.
pub fn load_config(path: &Path) -> Result<CrowdfundConfig, ConfigError> {
    let raw = fs::read_to_string(path)?;
    let config = CrowdfundConfig::from_toml_str(&raw)?;
    tracing::debug!(
        "Loaded crowdfund config from {}: {} epochs, {} allocations",
        path.display(),
        config.epochs.len(),
        config.allocations.len()
    );
    Ok(config)
}
