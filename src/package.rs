// src/package.rs
use serde::{Deserialize, Serialize};

use crate::currency::Currency;

/// A purchasable bundle of coins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinPackage {
    pub id: u32,
    pub coins: u64,
    pub bonus: u64,
    pub price: Currency,
    #[serde(default)]
    pub popular: bool,
}

impl CoinPackage {
    pub fn new(id: u32, coins: u64, bonus: u64, price: Currency) -> Self {
        Self {
            id,
            coins,
            bonus,
            price,
            popular: false,
        }
    }

    /// Coins credited on purchase.
    pub fn total_coins(&self) -> u64 {
        self.coins + self.bonus
    }
}

pub fn default_catalogue() -> Vec<CoinPackage> {
    vec![
        CoinPackage::new(1, 100, 0, Currency::from_minor(4_99)),
        CoinPackage::new(2, 250, 25, Currency::from_minor(9_99)),
        CoinPackage {
            popular: true,
            ..CoinPackage::new(3, 500, 75, Currency::from_minor(19_99))
        },
        CoinPackage::new(4, 1_000, 200, Currency::from_minor(34_99)),
        CoinPackage::new(5, 2_500, 600, Currency::from_minor(79_99)),
        CoinPackage::new(6, 5_000, 1_500, Currency::from_minor(149_99)),
    ]
}
