// src/adapters/memory.rs
use crate::{
    CoinBalance, CoinTransaction, EconomyAdapter, EconomyError, Page, PageRequest, Payout,
    PayoutStatus, PayoutTerms, TransactionStatus, payout::available_for_payout,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, EconomyError> {
    mutex
        .lock()
        .map_err(|_| EconomyError::Storage("memory store lock poisoned".to_string()))
}

#[derive(Clone, Default)]
struct MemoryStore {
    balances: Arc<Mutex<HashMap<Uuid, CoinBalance>>>,
    opened: Arc<Mutex<HashSet<Uuid>>>,
    payouts: Arc<Mutex<HashMap<Uuid, Payout>>>,
    transactions: Arc<Mutex<HashMap<Uuid, CoinTransaction>>>,
    idempotency_keys: Arc<Mutex<HashMap<String, Uuid>>>,
}

impl MemoryStore {
    fn reserved_coins(&self, creator: Uuid) -> Result<u64, EconomyError> {
        let payouts = lock(&self.payouts)?;
        Ok(payouts
            .values()
            .filter(|p| p.creator_id == creator && p.status.reserves_coins())
            .map(|p| p.coins)
            .sum())
    }

    fn record(&self, transactions: &[&CoinTransaction]) -> Result<(), EconomyError> {
        let mut txs = lock(&self.transactions)?;
        for tx in transactions {
            txs.insert(tx.id, (*tx).clone());
        }
        Ok(())
    }
}

/// In-process storage. Tables are guarded separately and always locked in
/// the order balances → opened accounts → payouts → transactions →
/// idempotency keys.
/// Payout requests additionally take a per-creator lock.
#[derive(Default)]
pub struct MemoryAdapter {
    store: MemoryStore,
    creator_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn creator_lock(&self, creator: Uuid) -> Result<Arc<Mutex<()>>, EconomyError> {
        let mut locks = lock(&self.creator_locks)?;
        Ok(Arc::clone(locks.entry(creator).or_default()))
    }
}

#[async_trait]
impl EconomyAdapter for MemoryAdapter {
    async fn open_account(
        &self,
        owner: Uuid,
        signup_bonus: u64,
    ) -> Result<CoinBalance, EconomyError> {
        let mut balances = lock(&self.store.balances)?;
        let mut opened = lock(&self.store.opened)?;

        // A purchase or gift may have created the wallet already
        let balance = balances
            .entry(owner)
            .or_insert_with(|| CoinBalance::new(owner));
        if !opened.contains(&owner) {
            balance.credit_signup_bonus(signup_bonus)?;
            opened.insert(owner);
        }
        Ok(balance.clone())
    }

    async fn get_balance(&self, owner: Uuid) -> Result<CoinBalance, EconomyError> {
        let balances = lock(&self.store.balances)?;
        Ok(balances
            .get(&owner)
            .cloned()
            .unwrap_or_else(|| CoinBalance::new(owner)))
    }

    async fn execute_purchase(
        &self,
        transaction: &CoinTransaction,
        idempotency_hash: &str,
    ) -> Result<(), EconomyError> {
        let mut balances = lock(&self.store.balances)?;
        let mut keys = lock(&self.store.idempotency_keys)?;

        if let Some(existing) = keys.get(idempotency_hash) {
            return Err(EconomyError::DuplicatePayment(*existing));
        }

        let balance = balances
            .entry(transaction.user_id)
            .or_insert_with(|| CoinBalance::new(transaction.user_id));
        balance.available = balance
            .available
            .checked_add(transaction.coins)
            .ok_or(EconomyError::InvalidAmount)?;
        balance.timestamp = chrono::Utc::now();

        keys.insert(idempotency_hash.to_string(), transaction.id);
        drop(keys);
        drop(balances);

        self.store.record(&[transaction])
    }

    async fn execute_gift(
        &self,
        sent: &CoinTransaction,
        received: &CoinTransaction,
    ) -> Result<(), EconomyError> {
        if sent.user_id == received.user_id {
            return Err(EconomyError::SelfGift);
        }

        let coins = sent.coins;
        {
            let mut balances = lock(&self.store.balances)?;

            let available = balances.get(&sent.user_id).map_or(0, |b| b.available);
            if available < coins {
                return Err(EconomyError::InsufficientBalance {
                    requested: coins,
                    available,
                });
            }

            let recipient = balances
                .get(&received.user_id)
                .cloned()
                .unwrap_or_else(|| CoinBalance::new(received.user_id));
            let credited_available = recipient
                .available
                .checked_add(coins)
                .ok_or(EconomyError::InvalidAmount)?;
            let credited_earned = recipient
                .total_earned
                .checked_add(coins)
                .ok_or(EconomyError::InvalidAmount)?;

            let now = chrono::Utc::now();
            if let Some(sender) = balances.get_mut(&sent.user_id) {
                sender.available -= coins;
                sender.timestamp = now;
            }
            balances.insert(
                received.user_id,
                CoinBalance {
                    available: credited_available,
                    total_earned: credited_earned,
                    timestamp: now,
                    ..recipient
                },
            );
        }

        self.store.record(&[sent, received])
    }

    async fn reserved_coins(&self, creator: Uuid) -> Result<u64, EconomyError> {
        self.store.reserved_coins(creator)
    }

    async fn reserve_payout(
        &self,
        creator: Uuid,
        requested: Option<u64>,
        terms: &PayoutTerms,
    ) -> Result<Payout, EconomyError> {
        // Held from the availability read until the payout is stored
        let creator_lock = self.creator_lock(creator)?;
        let _guard = lock(&creator_lock)?;

        let total_earned = lock(&self.store.balances)?
            .get(&creator)
            .map_or(0, |b| b.total_earned);
        let reserved = self.store.reserved_coins(creator)?;

        let payout = terms.quote(
            creator,
            requested,
            available_for_payout(total_earned, reserved),
        )?;

        lock(&self.store.payouts)?.insert(payout.id, payout.clone());
        self.store.record(&[&CoinTransaction::payout(&payout)])?;

        Ok(payout)
    }

    async fn transition_payout(
        &self,
        payout_id: Uuid,
        creator: Option<Uuid>,
        target: PayoutStatus,
        notes: Option<String>,
    ) -> Result<Payout, EconomyError> {
        let updated = {
            let mut payouts = lock(&self.store.payouts)?;
            let payout = payouts
                .get_mut(&payout_id)
                .filter(|p| creator.is_none_or(|c| c == p.creator_id))
                .ok_or(EconomyError::PayoutNotFound(payout_id))?;

            payout.transition(target, notes)?;
            payout.clone()
        };

        let status = TransactionStatus::from(updated.status);
        let mut txs = lock(&self.store.transactions)?;
        for tx in txs
            .values_mut()
            .filter(|tx| tx.related_payout_id == Some(payout_id))
        {
            tx.status = status;
        }

        Ok(updated)
    }

    async fn get_payout(&self, payout_id: Uuid) -> Result<Payout, EconomyError> {
        lock(&self.store.payouts)?
            .get(&payout_id)
            .cloned()
            .ok_or(EconomyError::PayoutNotFound(payout_id))
    }

    async fn list_payouts(
        &self,
        creator: Uuid,
        page: PageRequest,
    ) -> Result<Page<Payout>, EconomyError> {
        let mut payouts: Vec<Payout> = lock(&self.store.payouts)?
            .values()
            .filter(|p| p.creator_id == creator)
            .cloned()
            .collect();
        payouts.sort_by(|a, b| b.requested_at.cmp(&a.requested_at).then(b.id.cmp(&a.id)));
        Ok(Page::from_sorted(payouts, page))
    }

    async fn list_transactions(
        &self,
        owner: Uuid,
        page: PageRequest,
    ) -> Result<Page<CoinTransaction>, EconomyError> {
        let mut txs: Vec<CoinTransaction> = lock(&self.store.transactions)?
            .values()
            .filter(|tx| tx.user_id == owner)
            .cloned()
            .collect();
        txs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(Page::from_sorted(txs, page))
    }
}
