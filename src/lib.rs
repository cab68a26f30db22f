// src/lib.rs
//! # creator-economy
//!
//! The coin economy behind a creator platform: users buy coins, gift them
//! to creators, and creators cash their earned coins out.
//!
//! - [`conversion`]: coins ⇄ currency at a fixed rate (78 coins = 1.00)
//! - [`split`]: platform / creator revenue split (60 / 40)
//! - [`payout`]: payout eligibility and the Pending → Paid | Cancelled lifecycle
//! - [`economy`]: the [`Economy`] facade tying config, rules and storage together
//! - [`adapters`]: in-memory and Postgres storage
//!
//! ```rust,ignore
//! let economy = Economy::new(Box::new(MemoryAdapter::new()), EconomyConfig::default())?;
//! economy.gift(fan, creator, 10_000, None, None).await?;
//! let payout = economy.request_payout(creator, None).await?;
//! assert_eq!(payout.net_payout.to_string(), "51.28");
//! ```

pub mod adapters;
pub mod balance;
pub mod config;
pub mod conversion;
pub mod currency;
pub mod earnings;
pub mod economy;
pub mod error;
pub mod package;
pub mod page;
pub mod payout;
pub mod split;
pub mod transaction;

pub use balance::CoinBalance;
pub use config::EconomyConfig;
pub use conversion::ExchangeRate;
pub use currency::Currency;
pub use earnings::EarningsSummary;
pub use economy::Economy;
pub use error::EconomyError;
pub use package::CoinPackage;
pub use page::{Page, PageRequest, Pagination};
pub use payout::{Payout, PayoutStatus, PayoutTerms};
pub use split::{RevenueSplit, SplitBreakdown, SplitCalculator};
pub use transaction::{CoinTransaction, TransactionKind, TransactionStatus};

use async_trait::async_trait;
use uuid::Uuid;

pub(crate) fn hash_idempotency_key(key: &str) -> String {
    blake3::hash(key.as_bytes()).to_hex().to_string()
}

/// Storage behind an [`Economy`].
///
/// Validation rules live in this crate ([`PayoutTerms::quote`],
/// [`Payout::transition`]); adapters supply the atomic frame they run in.
#[async_trait]
pub trait EconomyAdapter: Send + Sync {
    /// Credit `signup_bonus` available coins the first time `owner` is
    /// opened, creating the wallet if needed. A wallet created earlier by a
    /// purchase or gift still gets the bonus once. Returns the stored wallet.
    async fn open_account(&self, owner: Uuid, signup_bonus: u64)
    -> Result<CoinBalance, EconomyError>;

    /// Unknown owners read as an empty wallet.
    async fn get_balance(&self, owner: Uuid) -> Result<CoinBalance, EconomyError>;

    /// Credit a purchase atomically.
    /// Implementors MUST:
    /// 1. Claim `idempotency_hash`; if already claimed return
    ///    `DuplicatePayment` with the id of the transaction that claimed it
    /// 2. Credit `transaction.coins` to the owner's `available`
    /// 3. Record the transaction
    async fn execute_purchase(
        &self,
        transaction: &CoinTransaction,
        idempotency_hash: &str,
    ) -> Result<(), EconomyError>;

    /// Move gifted coins atomically.
    /// Implementors MUST:
    /// 1. Reject `sent.user_id == received.user_id` with `SelfGift` before
    ///    touching any wallet
    /// 2. Lock the sender's wallet
    /// 3. Verify `available >= coins`, else return `InsufficientBalance`
    /// 4. Debit sender `available`; credit recipient `available` and `total_earned`
    /// 5. Record both transactions
    async fn execute_gift(
        &self,
        sent: &CoinTransaction,
        received: &CoinTransaction,
    ) -> Result<(), EconomyError>;

    /// Coins held by the creator's payouts that are not cancelled.
    async fn reserved_coins(&self, creator: Uuid) -> Result<u64, EconomyError>;

    /// Reserve coins for a new payout.
    /// Implementors MUST, while holding a lock that serializes payout
    /// requests for `creator`:
    /// 1. Read `total_earned` and the reserved coins
    /// 2. Call `terms.quote(creator, requested, available)` and return its error unchanged
    /// 3. Persist the payout and its `CoinTransaction::payout` record
    async fn reserve_payout(
        &self,
        creator: Uuid,
        requested: Option<u64>,
        terms: &PayoutTerms,
    ) -> Result<Payout, EconomyError>;

    /// Apply [`Payout::transition`] under the payout's lock, persist it and
    /// carry the new status to the linked transaction record.
    /// With `creator = Some(..)`, other creators' payouts read as not found.
    async fn transition_payout(
        &self,
        payout_id: Uuid,
        creator: Option<Uuid>,
        target: PayoutStatus,
        notes: Option<String>,
    ) -> Result<Payout, EconomyError>;

    async fn get_payout(&self, payout_id: Uuid) -> Result<Payout, EconomyError>;

    /// Newest first.
    async fn list_payouts(
        &self,
        creator: Uuid,
        page: PageRequest,
    ) -> Result<Page<Payout>, EconomyError>;

    /// Newest first.
    async fn list_transactions(
        &self,
        owner: Uuid,
        page: PageRequest,
    ) -> Result<Page<CoinTransaction>, EconomyError>;
}
