//! Tiered pricing schedule.
//!
//! The sale is split into consecutive epochs measured in whole days from the
//! start time. Each epoch covers the half-open day range
//! `[cumulative_start, cumulative_start + duration_days)` and carries the
//! number of tokens minted per unit of payment.

use serde::{Deserialize, Serialize};

use lib_types::{Amount, Timestamp, SECONDS_PER_DAY};

use crate::errors::{CrowdfundError, CrowdfundResult};

/// One pricing tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Epoch {
    pub duration_days: u64,
    /// Tokens (smallest unit) minted per unit of payment
    pub unit_price: Amount,
}

/// Ordered, non-empty list of epochs covering the whole sale
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingSchedule {
    epochs: Vec<Epoch>,
    total_days: u64,
}

impl PricingSchedule {
    /// Build a schedule from parallel duration and price lists.
    ///
    /// # Errors
    /// `CrowdfundError::InvalidConstruction` if the lists are empty or differ
    /// in length, or if the durations do not sum to `total_days`.
    pub fn new(
        durations_days: &[u64],
        unit_prices: &[Amount],
        total_days: u64,
    ) -> CrowdfundResult<Self> {
        if durations_days.len() != unit_prices.len() {
            return Err(CrowdfundError::InvalidConstruction(format!(
                "{} epoch durations but {} prices",
                durations_days.len(),
                unit_prices.len()
            )));
        }
        if durations_days.is_empty() {
            return Err(CrowdfundError::InvalidConstruction(
                "pricing schedule needs at least one epoch".to_string(),
            ));
        }
        if total_days == 0 {
            return Err(CrowdfundError::InvalidConstruction(
                "sale must last at least one day".to_string(),
            ));
        }

        let sum = durations_days
            .iter()
            .try_fold(0u64, |acc, d| acc.checked_add(*d))
            .ok_or_else(|| {
                CrowdfundError::InvalidConstruction(format!(
                    "epoch durations overflow before reaching {} days",
                    total_days
                ))
            })?;
        if sum != total_days {
            return Err(CrowdfundError::InvalidConstruction(format!(
                "epoch durations sum to {} days but the sale lasts {} days",
                sum, total_days
            )));
        }
        total_days.checked_mul(SECONDS_PER_DAY).ok_or_else(|| {
            CrowdfundError::InvalidConstruction(format!(
                "a sale of {} days does not fit in a timestamp",
                total_days
            ))
        })?;

        let epochs = durations_days
            .iter()
            .zip(unit_prices)
            .map(|(duration_days, unit_price)| Epoch {
                duration_days: *duration_days,
                unit_price: *unit_price,
            })
            .collect();

        Ok(Self { epochs, total_days })
    }

    pub fn epochs(&self) -> &[Epoch] {
        &self.epochs
    }

    pub fn total_days(&self) -> u64 {
        self.total_days
    }

    /// Length of the sale window in seconds
    pub fn duration_seconds(&self) -> u64 {
        self.total_days * SECONDS_PER_DAY
    }

    /// First instant after the sale window (exclusive end).
    ///
    /// Saturates at `Timestamp::MAX`; scheduling rejects start times whose
    /// window would not fit.
    pub fn end_time(&self, start_time: Timestamp) -> Timestamp {
        start_time.saturating_add(self.duration_seconds())
    }

    /// Index of the epoch containing `elapsed_days`, if any.
    pub fn epoch_index(&self, elapsed_days: u64) -> Option<usize> {
        let mut cumulative_start = 0u64;
        for (index, epoch) in self.epochs.iter().enumerate() {
            let cumulative_end = cumulative_start + epoch.duration_days;
            if elapsed_days >= cumulative_start && elapsed_days < cumulative_end {
                return Some(index);
            }
            cumulative_start = cumulative_end;
        }
        None
    }

    /// Rate for a whole number of days since the start
    pub fn rate_for_day(&self, elapsed_days: u64) -> Option<Amount> {
        self.epoch_index(elapsed_days)
            .map(|index| self.epochs[index].unit_price)
    }

    /// Rate at `now`, or `None` outside `[start_time, end_time)`.
    pub fn rate_at(&self, start_time: Timestamp, now: Timestamp) -> Option<Amount> {
        if now < start_time {
            return None;
        }
        let elapsed_days = (now - start_time) / SECONDS_PER_DAY;
        self.rate_for_day(elapsed_days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiered() -> PricingSchedule {
        PricingSchedule::new(&[3, 4, 7, 14], &[1000, 750, 500, 250], 28).unwrap()
    }

    #[test]
    fn test_rate_tiers() {
        let schedule = tiered();

        assert_eq!(schedule.rate_for_day(0), Some(1000));
        assert_eq!(schedule.rate_for_day(2), Some(1000));
        assert_eq!(schedule.rate_for_day(3), Some(750));
        assert_eq!(schedule.rate_for_day(5), Some(750));
        assert_eq!(schedule.rate_for_day(7), Some(500));
        assert_eq!(schedule.rate_for_day(13), Some(500));
        assert_eq!(schedule.rate_for_day(14), Some(250));
        assert_eq!(schedule.rate_for_day(27), Some(250));
        assert_eq!(schedule.rate_for_day(28), None);
    }

    #[test]
    fn test_rate_at_window_edges() {
        let schedule = tiered();
        let start = 1_000_000;
        let end = schedule.end_time(start);

        assert_eq!(end, start + 28 * SECONDS_PER_DAY);
        assert_eq!(schedule.rate_at(start, start - 1), None);
        assert_eq!(schedule.rate_at(start, start), Some(1000));
        assert_eq!(schedule.rate_at(start, start + 3 * SECONDS_PER_DAY - 1), Some(1000));
        assert_eq!(schedule.rate_at(start, start + 3 * SECONDS_PER_DAY), Some(750));
        assert_eq!(schedule.rate_at(start, end - 1), Some(250));
        assert_eq!(schedule.rate_at(start, end), None);
    }

    #[test]
    fn test_zero_length_epoch_is_skipped() {
        let schedule = PricingSchedule::new(&[0, 2], &[9, 5], 2).unwrap();
        assert_eq!(schedule.rate_for_day(0), Some(5));
        assert_eq!(schedule.epoch_index(1), Some(1));
    }

    #[test]
    fn test_invalid_schedules() {
        assert!(matches!(
            PricingSchedule::new(&[3, 4], &[1000], 7),
            Err(CrowdfundError::InvalidConstruction(_))
        ));
        assert!(matches!(
            PricingSchedule::new(&[], &[], 0),
            Err(CrowdfundError::InvalidConstruction(_))
        ));
        assert!(matches!(
            PricingSchedule::new(&[3, 4], &[1000, 750], 28),
            Err(CrowdfundError::InvalidConstruction(_))
        ));
        assert_eq!(
            PricingSchedule::new(&[u64::MAX, 1], &[1, 1], 0),
            Err(CrowdfundError::InvalidConstruction(
                "sale must last at least one day".to_string()
            ))
        );
        assert!(matches!(
            PricingSchedule::new(&[u64::MAX, 1], &[1, 1], 5),
            Err(CrowdfundError::InvalidConstruction(_))
        ));
        assert!(matches!(
            PricingSchedule::new(&[u64::MAX], &[1], u64::MAX),
            Err(CrowdfundError::InvalidConstruction(_))
        ));
    }
}
