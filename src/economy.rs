// src/economy.rs
use metrics::{counter, histogram};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    CoinBalance, CoinTransaction, Currency, EarningsSummary, EconomyAdapter, EconomyConfig,
    EconomyError, Page, PageRequest, Payout, PayoutStatus, PayoutTerms, SplitCalculator,
    hash_idempotency_key, payout::available_for_payout,
};

pub const DEFAULT_PAYOUT_PAGE_SIZE: u32 = 10;
pub const DEFAULT_TRANSACTION_PAGE_SIZE: u32 = 20;

/// Entry point to the coin economy.
///
/// Cheap to clone; clones share the adapter and the validated config.
#[derive(Clone)]
pub struct Economy {
    adapter: Arc<dyn EconomyAdapter>,
    config: Arc<EconomyConfig>,
    terms: PayoutTerms,
}

impl Economy {
    pub fn new(adapter: Box<dyn EconomyAdapter>, config: EconomyConfig) -> Result<Self, EconomyError> {
        Self::from_arc(adapter.into(), config)
    }

    pub fn from_arc(
        adapter: Arc<dyn EconomyAdapter>,
        config: EconomyConfig,
    ) -> Result<Self, EconomyError> {
        config.validate()?;
        let terms = config.payout_terms()?;
        Ok(Self {
            adapter,
            config: Arc::new(config),
            terms,
        })
    }

    pub fn adapter(&self) -> &dyn EconomyAdapter {
        self.adapter.as_ref()
    }

    pub fn config(&self) -> &EconomyConfig {
        &self.config
    }

    pub fn calculator(&self) -> &SplitCalculator {
        self.terms.calculator()
    }

    // ── Conversion ───────────────────────────────────────────────────────────

    pub fn coins_to_currency(&self, coins: i64) -> Result<Currency, EconomyError> {
        self.calculator().gross(coins)
    }

    pub fn currency_to_coins(&self, amount: Currency) -> Result<u64, EconomyError> {
        self.calculator().rate().currency_to_coins(amount)
    }

    pub fn platform_share(&self, coins: i64) -> Result<Currency, EconomyError> {
        self.calculator().platform_share(coins)
    }

    pub fn creator_share(&self, coins: i64) -> Result<Currency, EconomyError> {
        self.calculator().creator_share(coins)
    }

    // ── Wallets ──────────────────────────────────────────────────────────────

    pub async fn open_account(&self, user: Uuid) -> Result<CoinBalance, EconomyError> {
        let balance = self
            .adapter
            .open_account(user, self.config.signup_bonus_coins)
            .await?;
        tracing::info!(user = %user, available = balance.available, "coin account opened");
        Ok(balance)
    }

    pub async fn balance(&self, user: Uuid) -> Result<CoinBalance, EconomyError> {
        tracing::debug!(user = %user, "reading coin balance");
        self.adapter.get_balance(user).await
    }

    /// Credit a package after the payment processor has charged the user.
    /// `payment_reference` is the processor's charge id; replaying it fails
    /// with [`EconomyError::DuplicatePayment`].
    pub async fn purchase(
        &self,
        user: Uuid,
        package_id: u32,
        payment_reference: impl Into<String>,
    ) -> Result<CoinTransaction, EconomyError> {
        let package = self
            .config
            .package(package_id)
            .ok_or(EconomyError::PackageNotFound(package_id))?;

        let payment_reference = payment_reference.into();
        if payment_reference.trim().is_empty() {
            return Err(EconomyError::InvalidPaymentReference);
        }
        let key = hash_idempotency_key(&payment_reference);

        let description = if package.bonus > 0 {
            format!("{} coins + {} bonus", package.coins, package.bonus)
        } else {
            format!("{} coins", package.coins)
        };
        let transaction = CoinTransaction::purchase(
            user,
            package.total_coins(),
            package.price,
            payment_reference,
            description,
        );

        let result = self.adapter.execute_purchase(&transaction, &key).await;
        counter!("economy.purchases.total",
            "status" => if result.is_ok() { "success" } else { "failed" }
        )
        .increment(1);
        result?;

        tracing::info!(
            user = %user,
            package = package_id,
            coins = transaction.coins,
            "coin package purchased"
        );
        Ok(transaction)
    }

    /// Gift coins from one user to another, optionally attached to a post.
    /// Returns the sender's side of the transfer.
    pub async fn gift(
        &self,
        sender: Uuid,
        recipient: Uuid,
        coins: i64,
        post: Option<Uuid>,
        message: Option<String>,
    ) -> Result<CoinTransaction, EconomyError> {
        if coins <= 0 {
            return Err(EconomyError::InvalidAmount);
        }
        if sender == recipient {
            return Err(EconomyError::SelfGift);
        }

        let coins = coins as u64;
        let (sent, received) = CoinTransaction::gift_pair(sender, recipient, coins, post, message);

        let result = self.adapter.execute_gift(&sent, &received).await;
        counter!("economy.gifts.total",
            "status" => if result.is_ok() { "success" } else { "failed" }
        )
        .increment(1);
        result?;

        tracing::info!(sender = %sender, recipient = %recipient, coins, "coins gifted");
        Ok(sent)
    }

    pub async fn transactions(
        &self,
        user: Uuid,
        page: u32,
        limit: Option<u32>,
    ) -> Result<Page<CoinTransaction>, EconomyError> {
        let request = PageRequest::new(page, limit.unwrap_or(DEFAULT_TRANSACTION_PAGE_SIZE));
        self.adapter.list_transactions(user, request).await
    }

    // ── Payouts ──────────────────────────────────────────────────────────────

    /// Lifetime earned coins not yet paid out or held by a pending payout.
    pub async fn compute_available_for_payout(&self, creator: Uuid) -> Result<u64, EconomyError> {
        let balance = self.adapter.get_balance(creator).await?;
        let reserved = self.adapter.reserved_coins(creator).await?;
        Ok(available_for_payout(balance.total_earned, reserved))
    }

    /// Request a payout of `requested` coins, or of everything available when
    /// `None`. The check against available coins and the reservation happen
    /// as one step inside the adapter.
    pub async fn request_payout(
        &self,
        creator: Uuid,
        requested: Option<i64>,
    ) -> Result<Payout, EconomyError> {
        let requested = match requested {
            Some(coins) if coins <= 0 => return Err(EconomyError::InvalidAmount),
            Some(coins) => Some(coins as u64),
            None => None,
        };

        let result = self.adapter.reserve_payout(creator, requested, &self.terms).await;

        counter!("economy.payouts.total",
            "status" => if result.is_ok() { "requested" } else { "rejected" }
        )
        .increment(1);

        match result {
            Ok(payout) => {
                histogram!("economy.payout.coins").record(payout.coins as f64);
                tracing::info!(
                    creator = %creator,
                    payout = %payout.id,
                    coins = payout.coins,
                    net = %payout.net_payout,
                    "payout requested"
                );
                Ok(payout)
            }
            Err(err) => {
                tracing::warn!(creator = %creator, error = %err, "payout request rejected");
                Err(err)
            }
        }
    }

    /// Creator withdraws their own pending payout; the coins become available again.
    pub async fn cancel_payout(&self, creator: Uuid, payout_id: Uuid) -> Result<Payout, EconomyError> {
        self.finish(payout_id, Some(creator), PayoutStatus::Cancelled, None)
            .await
    }

    /// Payment processor confirms the money moved.
    pub async fn mark_paid(&self, payout_id: Uuid) -> Result<Payout, EconomyError> {
        self.finish(payout_id, None, PayoutStatus::Paid, None).await
    }

    /// Payment processor gives up on a payout; it is cancelled with `reason`
    /// and the coins are released.
    pub async fn fail_payout(
        &self,
        payout_id: Uuid,
        reason: impl Into<String>,
    ) -> Result<Payout, EconomyError> {
        self.finish(payout_id, None, PayoutStatus::Cancelled, Some(reason.into()))
            .await
    }

    async fn finish(
        &self,
        payout_id: Uuid,
        creator: Option<Uuid>,
        target: PayoutStatus,
        notes: Option<String>,
    ) -> Result<Payout, EconomyError> {
        let result = self
            .adapter
            .transition_payout(payout_id, creator, target, notes)
            .await;

        counter!("economy.payouts.total",
            "status" => match (&result, target) {
                (Ok(_), PayoutStatus::Paid) => "paid",
                (Ok(_), _) => "cancelled",
                (Err(_), _) => "transition_failed",
            }
        )
        .increment(1);

        let payout = result?;
        tracing::info!(
            payout = %payout.id,
            creator = %payout.creator_id,
            status = %payout.status,
            "payout processed"
        );
        Ok(payout)
    }

    pub async fn payout(&self, payout_id: Uuid) -> Result<Payout, EconomyError> {
        self.adapter.get_payout(payout_id).await
    }

    pub async fn payouts(
        &self,
        creator: Uuid,
        page: u32,
        limit: Option<u32>,
    ) -> Result<Page<Payout>, EconomyError> {
        let request = PageRequest::new(page, limit.unwrap_or(DEFAULT_PAYOUT_PAGE_SIZE));
        self.adapter.list_payouts(creator, request).await
    }

    pub async fn earnings(&self, creator: Uuid) -> Result<EarningsSummary, EconomyError> {
        let balance = self.adapter.get_balance(creator).await?;
        let reserved = self.adapter.reserved_coins(creator).await?;
        let available = available_for_payout(balance.total_earned, reserved);
        let payouts = self.payouts(creator, 1, None).await?;

        let calc = self.calculator();
        let total_earned = to_signed(balance.total_earned)?;
        let available_net = calc.creator_share(to_signed(available)?)?;

        Ok(EarningsSummary {
            creator_id: creator,
            total_earned_coins: balance.total_earned,
            total_earned_currency: calc.gross(total_earned)?,
            total_earned_net: calc.creator_share(total_earned)?,
            available_for_payout: available,
            available_net,
            minimum_payout: self.terms.minimum_payout(),
            eligible: available > 0 && available_net >= self.terms.minimum_payout(),
            payouts,
        })
    }
}

fn to_signed(coins: u64) -> Result<i64, EconomyError> {
    i64::try_from(coins).map_err(|_| EconomyError::InvalidAmount)
}
