// src/error.rs
use std::fmt;

use crate::currency::Currency;
use crate::payout::PayoutStatus;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EconomyError {
    /// Negative, zero where a positive amount is required, non-numeric or out of range.
    InvalidAmount,
    BelowMinimumPayout {
        requested: Currency,
        minimum: Currency,
    },
    InsufficientBalance {
        requested: u64,
        available: u64,
    },
    InvalidStateTransition {
        from: PayoutStatus,
        to: PayoutStatus,
    },
    PayoutNotFound(uuid::Uuid),
    PackageNotFound(u32),
    SelfGift,
    DuplicatePayment(uuid::Uuid),
    /// Blank payment processor charge id.
    InvalidPaymentReference,
    InvalidConfig(String),
    Storage(String),
}

impl EconomyError {
    /// Validation errors the caller can correct and resubmit.
    pub fn is_validation(&self) -> bool {
        !matches!(self, Self::Storage(_))
    }
}

impl fmt::Display for EconomyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidAmount => write!(f, "Invalid amount"),
            Self::BelowMinimumPayout { requested, minimum } => write!(
                f,
                "Payout of {} is below the minimum payout of {}",
                requested, minimum
            ),
            Self::InsufficientBalance {
                requested,
                available,
            } => write!(
                f,
                "Insufficient balance: requested {} coins, {} available",
                requested, available
            ),
            Self::InvalidStateTransition { from, to } => {
                write!(f, "Invalid payout state transition: {} -> {}", from, to)
            }
            Self::PayoutNotFound(id) => write!(f, "Payout not found: {}", id),
            Self::PackageNotFound(id) => write!(f, "Coin package not found: {}", id),
            Self::SelfGift => write!(f, "Cannot gift coins to yourself"),
            Self::DuplicatePayment(id) => {
                write!(f, "Payment already credited by transaction {}", id)
            }
            Self::InvalidPaymentReference => write!(f, "Payment reference must not be blank"),
            Self::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            Self::Storage(msg) => write!(f, "Storage error: {}", msg),
        }
    }
}

impl std::error::Error for EconomyError {}

impl From<serde_json::Error> for EconomyError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}

