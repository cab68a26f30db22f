// src/payout.rs
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::EconomyError;
use crate::currency::Currency;
use crate::split::SplitCalculator;

/// Minimum creator share a payout must reach: 50.00.
pub const DEFAULT_MINIMUM_PAYOUT: Currency = Currency::from_major(50);

/// Lifecycle of a payout request.
/// Transitions are one-way: Pending → Paid | Cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PayoutStatus {
    /// Coins reserved, waiting on the payment processor
    Pending,
    /// Money moved; terminal
    Paid,
    /// Withdrawn or failed; reservation released; terminal
    Cancelled,
}

impl PayoutStatus {
    pub fn can_transition_to(&self, target: PayoutStatus) -> bool {
        matches!(
            (self, target),
            (PayoutStatus::Pending, PayoutStatus::Paid)
                | (PayoutStatus::Pending, PayoutStatus::Cancelled)
        )
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PayoutStatus::Pending)
    }

    /// Whether payouts in this state hold coins against the creator's earnings.
    pub fn reserves_coins(&self) -> bool {
        !matches!(self, PayoutStatus::Cancelled)
    }

    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::Pending => "pending",
            PayoutStatus::Paid => "paid",
            PayoutStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Result<Self, EconomyError> {
        match s {
            "pending" => Ok(PayoutStatus::Pending),
            "paid" => Ok(PayoutStatus::Paid),
            "cancelled" => Ok(PayoutStatus::Cancelled),
            other => Err(EconomyError::Storage(format!(
                "unknown payout status: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PayoutStatus::Pending => "Pending",
            PayoutStatus::Paid => "Paid",
            PayoutStatus::Cancelled => "Cancelled",
        };
        f.write_str(label)
    }
}

/// A creator's request to cash out earned coins.
///
/// Invariants:
/// - amounts are fixed at creation and derived from `coins` alone
/// - `net_payout` and `platform_fee` are rounded independently, so their sum
///   may be one minor unit away from `gross_currency`
/// - `processed_at` is set exactly when the payout reaches a terminal state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub coins: u64,
    pub gross_currency: Currency,
    pub platform_fee: Currency,
    pub net_payout: Currency,
    pub status: PayoutStatus,
    pub requested_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl Payout {
    pub fn is_pending(&self) -> bool {
        self.status == PayoutStatus::Pending
    }

    /// Move to `target`, stamping `processed_at`.
    /// The payout is left untouched when the transition is illegal.
    pub fn transition(
        &mut self,
        target: PayoutStatus,
        notes: Option<String>,
    ) -> Result<(), EconomyError> {
        if !self.status.can_transition_to(target) {
            return Err(EconomyError::InvalidStateTransition {
                from: self.status,
                to: target,
            });
        }

        self.status = target;
        self.processed_at = Some(Utc::now());
        if notes.is_some() {
            self.notes = notes;
        }
        Ok(())
    }
}

/// `total_earned − reserved`. The subtraction saturates: adapters hold the
/// creator lock while reserving, so `reserved > total_earned` means the
/// backing store was edited out of band.
pub fn available_for_payout(total_earned: u64, reserved: u64) -> u64 {
    match total_earned.checked_sub(reserved) {
        Some(available) => available,
        None => {
            tracing::warn!(total_earned, reserved, "reserved coins exceed lifetime earnings");
            0
        }
    }
}

/// Eligibility rules and pricing for new payouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayoutTerms {
    calculator: SplitCalculator,
    minimum_payout: Currency,
}

impl PayoutTerms {
    pub fn new(calculator: SplitCalculator, minimum_payout: Currency) -> Self {
        Self {
            calculator,
            minimum_payout,
        }
    }

    pub fn calculator(&self) -> &SplitCalculator {
        &self.calculator
    }

    pub fn minimum_payout(&self) -> Currency {
        self.minimum_payout
    }

    /// Validate a payout request against the creator's available coins and
    /// build the `Pending` record.
    ///
    /// Must run while the caller holds the creator's lock, with `available`
    /// read under that same lock. `requested = None` means "everything
    /// available".
    ///
    /// # Errors
    ///
    /// Checked in this order:
    /// - [`EconomyError::InsufficientBalance`] if nothing is available and no amount was given
    /// - [`EconomyError::InvalidAmount`] if the amount is zero
    /// - [`EconomyError::BelowMinimumPayout`] if the creator share is under the minimum
    /// - [`EconomyError::InsufficientBalance`] if the amount exceeds `available`
    pub fn quote(
        &self,
        creator_id: Uuid,
        requested: Option<u64>,
        available: u64,
    ) -> Result<Payout, EconomyError> {
        let coins = match requested {
            Some(coins) => coins,
            None if available == 0 => {
                return Err(EconomyError::InsufficientBalance {
                    requested: 0,
                    available,
                });
            }
            None => available,
        };

        if coins == 0 {
            return Err(EconomyError::InvalidAmount);
        }
        let signed = i64::try_from(coins).map_err(|_| EconomyError::InvalidAmount)?;

        let breakdown = self.calculator.breakdown(signed)?;
        if breakdown.creator < self.minimum_payout {
            return Err(EconomyError::BelowMinimumPayout {
                requested: breakdown.creator,
                minimum: self.minimum_payout,
            });
        }

        if coins > available {
            return Err(EconomyError::InsufficientBalance {
                requested: coins,
                available,
            });
        }

        Ok(Payout {
            id: Uuid::now_v7(),
            creator_id,
            coins,
            gross_currency: breakdown.gross,
            platform_fee: breakdown.platform,
            net_payout: breakdown.creator,
            status: PayoutStatus::Pending,
            requested_at: Utc::now(),
            processed_at: None,
            notes: None,
        })
    }
}

impl Default for PayoutTerms {
    fn default() -> Self {
        Self::new(SplitCalculator::default(), DEFAULT_MINIMUM_PAYOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        use PayoutStatus::*;
        assert!(Pending.can_transition_to(Paid));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Pending));
        for terminal in [Paid, Cancelled] {
            assert!(terminal.is_terminal());
            for target in [Pending, Paid, Cancelled] {
                assert!(!terminal.can_transition_to(target));
            }
        }
        assert!(Pending.reserves_coins());
        assert!(Paid.reserves_coins());
        assert!(!Cancelled.reserves_coins());
    }

    #[test]
    fn test_status_storage_names() {
        for status in [PayoutStatus::Pending, PayoutStatus::Paid, PayoutStatus::Cancelled] {
            assert_eq!(PayoutStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(PayoutStatus::parse("refunded").is_err());
    }

    #[test]
    fn test_quote_reference_payout() {
        let creator = Uuid::now_v7();
        let payout = PayoutTerms::default().quote(creator, None, 10_000).unwrap();

        assert_eq!(payout.creator_id, creator);
        assert_eq!(payout.coins, 10_000);
        assert_eq!(payout.gross_currency, Currency::from_minor(128_21));
        assert_eq!(payout.platform_fee, Currency::from_minor(76_92));
        assert_eq!(payout.net_payout, Currency::from_minor(51_28));
        assert_eq!(payout.status, PayoutStatus::Pending);
        assert!(payout.processed_at.is_none());
    }

    #[test]
    fn test_quote_below_minimum() {
        let result = PayoutTerms::default().quote(Uuid::now_v7(), None, 4_000);
        assert_eq!(
            result,
            Err(EconomyError::BelowMinimumPayout {
                requested: Currency::from_minor(20_51),
                minimum: Currency::from_major(50),
            })
        );
    }

    #[test]
    fn test_quote_minimum_boundary() {
        let terms = PayoutTerms::default();
        // 9750 coins is exactly 50.00 for the creator
        assert!(terms.quote(Uuid::now_v7(), Some(9_750), 9_750).is_ok());
        // 9749 coins is 49.99
        assert!(matches!(
            terms.quote(Uuid::now_v7(), Some(9_749), 20_000),
            Err(EconomyError::BelowMinimumPayout { .. })
        ));
    }

    #[test]
    fn test_quote_insufficient_balance() {
        let terms = PayoutTerms::default();
        assert_eq!(
            terms.quote(Uuid::now_v7(), Some(10_001), 10_000),
            Err(EconomyError::InsufficientBalance {
                requested: 10_001,
                available: 10_000,
            })
        );
        assert_eq!(
            terms.quote(Uuid::now_v7(), None, 0),
            Err(EconomyError::InsufficientBalance {
                requested: 0,
                available: 0,
            })
        );
    }

    #[test]
    fn test_quote_zero_amount() {
        assert_eq!(
            PayoutTerms::default().quote(Uuid::now_v7(), Some(0), 10_000),
            Err(EconomyError::InvalidAmount)
        );
    }

    #[test]
    fn test_transition_sets_processed_at_once() {
        let mut payout = PayoutTerms::default()
            .quote(Uuid::now_v7(), Some(20_000), 20_000)
            .unwrap();

        payout.transition(PayoutStatus::Paid, None).unwrap();
        assert_eq!(payout.status, PayoutStatus::Paid);
        let processed_at = payout.processed_at;
        assert!(processed_at.is_some());

        let before = payout.clone();
        assert_eq!(
            payout.transition(PayoutStatus::Cancelled, Some("late".to_string())),
            Err(EconomyError::InvalidStateTransition {
                from: PayoutStatus::Paid,
                to: PayoutStatus::Cancelled,
            })
        );
        assert_eq!(payout, before);
    }

    #[test]
    fn test_available_for_payout_saturates() {
        assert_eq!(available_for_payout(10_000, 2_500), 7_500);
        assert_eq!(available_for_payout(100, 200), 0);
    }
}
