// src/earnings.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::currency::Currency;
use crate::page::Page;
use crate::payout::Payout;

/// Server-side view of a creator's earnings dashboard.
///
/// Currency figures are derived from the coin counts at read time and are
/// estimates; a payout's own amounts are fixed when it is requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarningsSummary {
    pub creator_id: Uuid,
    pub total_earned_coins: u64,
    pub total_earned_currency: Currency,
    pub total_earned_net: Currency,
    pub available_for_payout: u64,
    pub available_net: Currency,
    pub minimum_payout: Currency,
    pub eligible: bool,
    pub payouts: Page<Payout>,
}
