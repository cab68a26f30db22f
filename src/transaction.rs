// src/transaction.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::EconomyError;
use crate::currency::Currency;
use crate::payout::{Payout, PayoutStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Purchase,
    GiftSent,
    GiftReceived,
    Payout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Purchase => "purchase",
            TransactionKind::GiftSent => "gift_sent",
            TransactionKind::GiftReceived => "gift_received",
            TransactionKind::Payout => "payout",
        }
    }

    pub fn parse(s: &str) -> Result<Self, EconomyError> {
        match s {
            "purchase" => Ok(TransactionKind::Purchase),
            "gift_sent" => Ok(TransactionKind::GiftSent),
            "gift_received" => Ok(TransactionKind::GiftReceived),
            "payout" => Ok(TransactionKind::Payout),
            other => Err(EconomyError::Storage(format!(
                "unknown transaction kind: {}",
                other
            ))),
        }
    }
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Result<Self, EconomyError> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "completed" => Ok(TransactionStatus::Completed),
            "failed" => Ok(TransactionStatus::Failed),
            "cancelled" => Ok(TransactionStatus::Cancelled),
            other => Err(EconomyError::Storage(format!(
                "unknown transaction status: {}",
                other
            ))),
        }
    }
}

impl From<PayoutStatus> for TransactionStatus {
    fn from(status: PayoutStatus) -> Self {
        match status {
            PayoutStatus::Pending => TransactionStatus::Pending,
            PayoutStatus::Paid => TransactionStatus::Completed,
            PayoutStatus::Cancelled => TransactionStatus::Cancelled,
        }
    }
}

/// Audit record of one coin movement, as seen from `user_id`'s wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinTransaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: TransactionKind,
    pub coins: u64,
    pub currency_amount: Option<Currency>,
    pub related_user_id: Option<Uuid>,
    pub related_post_id: Option<Uuid>,
    pub related_payout_id: Option<Uuid>,
    pub payment_reference: Option<String>,
    pub description: String,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

impl CoinTransaction {
    fn new(user_id: Uuid, kind: TransactionKind, coins: u64, description: String) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id,
            kind,
            coins,
            currency_amount: None,
            related_user_id: None,
            related_post_id: None,
            related_payout_id: None,
            payment_reference: None,
            description,
            status: TransactionStatus::Completed,
            created_at: Utc::now(),
        }
    }

    pub fn purchase(
        user_id: Uuid,
        coins: u64,
        price: Currency,
        payment_reference: String,
        description: String,
    ) -> Self {
        Self {
            currency_amount: Some(price),
            payment_reference: Some(payment_reference),
            ..Self::new(user_id, TransactionKind::Purchase, coins, description)
        }
    }

    /// The sender's and recipient's sides of one gift, sharing a timestamp.
    pub fn gift_pair(
        sender: Uuid,
        recipient: Uuid,
        coins: u64,
        post: Option<Uuid>,
        message: Option<String>,
    ) -> (Self, Self) {
        let description = message.unwrap_or_else(|| "Gift".to_string());
        let sent = Self {
            related_user_id: Some(recipient),
            related_post_id: post,
            ..Self::new(sender, TransactionKind::GiftSent, coins, description.clone())
        };
        let received = Self {
            related_user_id: Some(sender),
            related_post_id: post,
            created_at: sent.created_at,
            ..Self::new(recipient, TransactionKind::GiftReceived, coins, description)
        };
        (sent, received)
    }

    pub fn payout(payout: &Payout) -> Self {
        Self {
            currency_amount: Some(payout.net_payout),
            related_payout_id: Some(payout.id),
            status: payout.status.into(),
            created_at: payout.requested_at,
            ..Self::new(
                payout.creator_id,
                TransactionKind::Payout,
                payout.coins,
                format!("Payout of {} coins", payout.coins),
            )
        }
    }
}
