// src/balance.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::EconomyError;

/// A user's coin wallet.
///
/// `available` is what the user can spend or gift right now. `total_earned`
/// only ever grows, and only through received gifts; it is the base that
/// payout eligibility is computed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinBalance {
    pub owner: Uuid,
    pub available: u64,
    pub total_earned: u64,
    pub timestamp: DateTime<Utc>,
}

impl CoinBalance {
    pub fn new(owner: Uuid) -> Self {
        Self {
            owner,
            available: 0,
            total_earned: 0,
            timestamp: Utc::now(),
        }
    }

    /// Credit a signup bonus. The bonus is spendable but not earned, so it
    /// never counts toward payouts.
    pub fn credit_signup_bonus(&mut self, bonus: u64) -> Result<(), EconomyError> {
        self.available = self
            .available
            .checked_add(bonus)
            .ok_or(EconomyError::InvalidAmount)?;
        self.timestamp = Utc::now();
        Ok(())
    }
}
