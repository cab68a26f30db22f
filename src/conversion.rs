// src/conversion.rs
//! Fixed-rate conversion between integer coins and currency minor units.
//!
//! Every conversion is a single rational computation on the coin integer
//! followed by one rounding step, half away from zero. Inputs are never
//! negative, so this is the same as rounding half up.

use serde::Serialize;

use crate::EconomyError;
use crate::currency::{Currency, MINOR_PER_UNIT};

/// Coins that buy one currency unit.
pub const DEFAULT_COINS_PER_UNIT: u64 = 78;

/// Above two coins per minor unit, a coin amount converted to currency and
/// back can drift by more than one coin.
pub const MAX_COINS_PER_UNIT: u64 = 2 * MINOR_PER_UNIT as u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExchangeRate {
    coins_per_unit: u64,
}

impl ExchangeRate {
    pub fn new(coins_per_unit: u64) -> Result<Self, EconomyError> {
        if coins_per_unit == 0 {
            return Err(EconomyError::InvalidConfig(
                "coins_per_unit must be positive".to_string(),
            ));
        }
        if coins_per_unit > MAX_COINS_PER_UNIT {
            return Err(EconomyError::InvalidConfig(format!(
                "coins_per_unit must be at most {}",
                MAX_COINS_PER_UNIT
            )));
        }
        Ok(Self { coins_per_unit })
    }

    pub const fn coins_per_unit(&self) -> u64 {
        self.coins_per_unit
    }

    /// `coins / coins_per_unit`, rounded to minor units.
    pub fn coins_to_currency(&self, coins: i64) -> Result<Currency, EconomyError> {
        self.coins_to_minor_scaled(coins, 100)
    }

    /// `amount * coins_per_unit`, rounded to whole coins.
    pub fn currency_to_coins(&self, amount: Currency) -> Result<u64, EconomyError> {
        if amount.is_negative() {
            return Err(EconomyError::InvalidAmount);
        }
        let numerator = amount.minor() as u128 * self.coins_per_unit as u128;
        let coins = round_half_up(numerator, MINOR_PER_UNIT as u128);
        u64::try_from(coins).map_err(|_| EconomyError::InvalidAmount)
    }

    /// `coins / coins_per_unit * percent / 100`, rounded once to minor units.
    ///
    /// Shares are derived straight from the coin integer rather than from an
    /// already rounded gross amount.
    pub(crate) fn coins_to_minor_scaled(
        &self,
        coins: i64,
        percent: u8,
    ) -> Result<Currency, EconomyError> {
        if coins < 0 {
            return Err(EconomyError::InvalidAmount);
        }
        // coins / rate units * percent/100 * 100 minor = coins * percent / rate
        let numerator = coins as u128 * percent as u128;
        let minor = round_half_up(numerator, self.coins_per_unit as u128);
        i64::try_from(minor)
            .map(Currency::from_minor)
            .map_err(|_| EconomyError::InvalidAmount)
    }
}

impl Default for ExchangeRate {
    fn default() -> Self {
        Self {
            coins_per_unit: DEFAULT_COINS_PER_UNIT,
        }
    }
}

/// Nearest integer to `numerator / denominator`, ties rounding up.
fn round_half_up(numerator: u128, denominator: u128) -> u128 {
    (2 * numerator + denominator) / (2 * denominator)
}
