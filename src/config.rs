// src/config.rs
use serde::{Deserialize, Serialize};

use crate::EconomyError;
use crate::conversion::{DEFAULT_COINS_PER_UNIT, ExchangeRate};
use crate::currency::Currency;
use crate::package::{CoinPackage, default_catalogue};
use crate::payout::{DEFAULT_MINIMUM_PAYOUT, PayoutTerms};
use crate::split::{DEFAULT_CREATOR_PCT, DEFAULT_PLATFORM_PCT, RevenueSplit, SplitCalculator};

/// Every tunable of the coin economy in one place.
///
/// Loaded once at startup and never reloaded; changing a value means
/// restarting with a new config. Currency fields are minor units, so a
/// minimum payout of 50.00 is written `5000`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    pub coins_per_unit: u64,
    pub platform_pct: u8,
    pub creator_pct: u8,
    pub minimum_payout: Currency,
    pub signup_bonus_coins: u64,
    pub packages: Vec<CoinPackage>,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            coins_per_unit: DEFAULT_COINS_PER_UNIT,
            platform_pct: DEFAULT_PLATFORM_PCT,
            creator_pct: DEFAULT_CREATOR_PCT,
            minimum_payout: DEFAULT_MINIMUM_PAYOUT,
            signup_bonus_coins: 0,
            packages: default_catalogue(),
        }
    }
}

impl EconomyConfig {
    /// Parse and validate a JSON document; missing keys take defaults.
    pub fn from_json(json: &str) -> Result<Self, EconomyError> {
        let config: EconomyConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EconomyError> {
        self.exchange_rate()?;
        self.revenue_split()?;

        if self.minimum_payout.is_negative() {
            return Err(EconomyError::InvalidConfig(
                "minimum_payout must not be negative".to_string(),
            ));
        }

        for (i, package) in self.packages.iter().enumerate() {
            if package.coins == 0 || package.price.minor() <= 0 {
                return Err(EconomyError::InvalidConfig(format!(
                    "package {} must have positive coins and price",
                    package.id
                )));
            }
            if package.coins.checked_add(package.bonus).is_none() {
                return Err(EconomyError::InvalidConfig(format!(
                    "package {} coin total overflows",
                    package.id
                )));
            }
            if self.packages[..i].iter().any(|p| p.id == package.id) {
                return Err(EconomyError::InvalidConfig(format!(
                    "duplicate package id {}",
                    package.id
                )));
            }
        }

        Ok(())
    }

    pub fn exchange_rate(&self) -> Result<ExchangeRate, EconomyError> {
        ExchangeRate::new(self.coins_per_unit)
    }

    pub fn revenue_split(&self) -> Result<RevenueSplit, EconomyError> {
        RevenueSplit::new(self.platform_pct, self.creator_pct)
    }

    pub fn payout_terms(&self) -> Result<PayoutTerms, EconomyError> {
        let calculator = SplitCalculator::new(self.exchange_rate()?, self.revenue_split()?);
        Ok(PayoutTerms::new(calculator, self.minimum_payout))
    }

    pub fn package(&self, id: u32) -> Option<&CoinPackage> {
        self.packages.iter().find(|p| p.id == id)
    }
}
