// src/split.rs
//! Platform / creator revenue split.
//!
//! Gift revenue converted to currency is divided between two parties:
//!
//! - **Platform**: default 60%
//! - **Creator**: default 40%
//!
//! The percentages must sum to 100. Each share is rounded on its own, so
//! `platform + creator` can sit one minor unit away from the gross amount.
//! That gap is accepted; neither share is derived as the complement of the
//! other.

use serde::Serialize;

use crate::EconomyError;
use crate::conversion::ExchangeRate;
use crate::currency::Currency;

/// Default platform share percentage.
pub const DEFAULT_PLATFORM_PCT: u8 = 60;

/// Default creator share percentage.
pub const DEFAULT_CREATOR_PCT: u8 = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RevenueSplit {
    platform_pct: u8,
    creator_pct: u8,
}

impl RevenueSplit {
    pub fn new(platform_pct: u8, creator_pct: u8) -> Result<Self, EconomyError> {
        let total = platform_pct as u16 + creator_pct as u16;
        if total != 100 {
            return Err(EconomyError::InvalidConfig(format!(
                "split percentages must sum to 100, got {}",
                total
            )));
        }
        Ok(Self {
            platform_pct,
            creator_pct,
        })
    }

    pub const fn platform_pct(&self) -> u8 {
        self.platform_pct
    }

    pub const fn creator_pct(&self) -> u8 {
        self.creator_pct
    }
}

impl Default for RevenueSplit {
    fn default() -> Self {
        Self {
            platform_pct: DEFAULT_PLATFORM_PCT,
            creator_pct: DEFAULT_CREATOR_PCT,
        }
    }
}

/// The three currency line items of a coin amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SplitBreakdown {
    pub gross: Currency,
    pub platform: Currency,
    pub creator: Currency,
}

impl SplitBreakdown {
    /// `platform + creator - gross` in minor units, always within ±1.
    pub fn rounding_gap(&self) -> i64 {
        self.platform.minor() + self.creator.minor() - self.gross.minor()
    }
}

/// Applies a [`RevenueSplit`] to coin amounts at a fixed [`ExchangeRate`].
///
/// Stateless and `Copy`; safe to share across any number of tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SplitCalculator {
    rate: ExchangeRate,
    split: RevenueSplit,
}

impl SplitCalculator {
    pub fn new(rate: ExchangeRate, split: RevenueSplit) -> Self {
        Self { rate, split }
    }

    pub fn rate(&self) -> ExchangeRate {
        self.rate
    }

    pub fn split(&self) -> RevenueSplit {
        self.split
    }

    pub fn gross(&self, coins: i64) -> Result<Currency, EconomyError> {
        self.rate.coins_to_currency(coins)
    }

    pub fn platform_share(&self, coins: i64) -> Result<Currency, EconomyError> {
        self.rate.coins_to_minor_scaled(coins, self.split.platform_pct)
    }

    pub fn creator_share(&self, coins: i64) -> Result<Currency, EconomyError> {
        self.rate.coins_to_minor_scaled(coins, self.split.creator_pct)
    }

    pub fn breakdown(&self, coins: i64) -> Result<SplitBreakdown, EconomyError> {
        Ok(SplitBreakdown {
            gross: self.gross(coins)?,
            platform: self.platform_share(coins)?,
            creator: self.creator_share(coins)?,
        })
    }
}
