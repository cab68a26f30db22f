// src/adapters/postgres.rs
use crate::{
    CoinBalance, CoinTransaction, Currency, EconomyAdapter, EconomyError, Page, PageRequest,
    Payout, PayoutStatus, PayoutTerms, TransactionKind, TransactionStatus,
    payout::available_for_payout,
};
use sqlx::{PgPool, Postgres, Row, postgres::PgRow};
use uuid::Uuid;

pub trait PostgresEconomyAdapter {
    fn get_pool(&self) -> sqlx::PgPool;
}

#[async_trait::async_trait]
pub trait PostgresSchemaEconomyAdapter {
    /// Create the economy tables and indexes if they do not exist.
    async fn init_economy_schema(&self) -> Result<(), EconomyError>;
}

/// Postgres storage over a shared pool.
///
/// Schema:
/// ```sql
/// economy_balances        (owner PK, available, total_earned, opened_at, updated_at)
/// economy_payouts         (id PK, creator, coins, gross_currency, platform_fee,
///                          net_payout, status, requested_at, processed_at, notes)
/// economy_transactions    (id PK, user_id, kind, coins, currency_amount, related_user_id,
///                          related_post_id, related_payout_id, payment_reference,
///                          description, status, created_at)
/// economy_idempotency_keys(key_hash PK, transaction_id)
/// ```
/// Currency columns hold minor units.
pub struct PostgresAdapter {
    pool: PgPool,
}

impl PostgresAdapter {
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl PostgresEconomyAdapter for PostgresAdapter {
    fn get_pool(&self) -> sqlx::PgPool {
        self.pool.clone()
    }
}

#[async_trait::async_trait]
impl<T> PostgresSchemaEconomyAdapter for T
where
    T: PostgresEconomyAdapter + Send + Sync,
{
    async fn init_economy_schema(&self) -> Result<(), EconomyError> {
        let mut tx = self
            .get_pool()
            .begin()
            .await
            .map_err(|e| EconomyError::Storage(e.to_string()))?;

        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS economy_balances (
                owner UUID PRIMARY KEY,
                available BIGINT NOT NULL DEFAULT 0 CHECK (available >= 0),
                total_earned BIGINT NOT NULL DEFAULT 0 CHECK (total_earned >= 0),
                opened_at TIMESTAMPTZ,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            r#"
            ALTER TABLE economy_balances ADD COLUMN IF NOT EXISTS opened_at TIMESTAMPTZ
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS economy_payouts (
                id UUID PRIMARY KEY,
                creator UUID NOT NULL,
                coins BIGINT NOT NULL CHECK (coins > 0),
                gross_currency BIGINT NOT NULL,
                platform_fee BIGINT NOT NULL,
                net_payout BIGINT NOT NULL,
                status TEXT NOT NULL CHECK (status IN ('pending', 'paid', 'cancelled')),
                requested_at TIMESTAMPTZ NOT NULL,
                processed_at TIMESTAMPTZ,
                notes TEXT
            )
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_payouts_creator_status
            ON economy_payouts(creator, status)
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_payouts_creator_requested
            ON economy_payouts(creator, requested_at DESC)
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS economy_transactions (
                id UUID PRIMARY KEY,
                user_id UUID NOT NULL,
                kind TEXT NOT NULL CHECK (kind IN ('purchase', 'gift_sent', 'gift_received', 'payout')),
                coins BIGINT NOT NULL CHECK (coins > 0),
                currency_amount BIGINT,
                related_user_id UUID,
                related_post_id UUID,
                related_payout_id UUID,
                payment_reference TEXT,
                description TEXT NOT NULL,
                status TEXT NOT NULL CHECK (status IN ('pending', 'completed', 'failed', 'cancelled')),
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_transactions_user_created
            ON economy_transactions(user_id, created_at DESC)
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_transactions_payout
            ON economy_transactions(related_payout_id)
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS economy_idempotency_keys (
                key_hash TEXT PRIMARY KEY,
                transaction_id UUID NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(|e| EconomyError::Storage(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| EconomyError::Storage(e.to_string()))?;

        Ok(())
    }
}

const PAYOUT_COLUMNS: &str = "id, creator, coins, gross_currency, platform_fee, net_payout, \
     status, requested_at, processed_at, notes";

const TRANSACTION_COLUMNS: &str = "id, user_id, kind, coins, currency_amount, related_user_id, \
     related_post_id, related_payout_id, payment_reference, description, status, created_at";

fn payout_from_row(row: &PgRow) -> Result<Payout, EconomyError> {
    let status: String = row
        .try_get("status")
        .map_err(|e| EconomyError::Storage(e.to_string()))?;

    Ok(Payout {
        id: row
            .try_get("id")
            .map_err(|e| EconomyError::Storage(e.to_string()))?,
        creator_id: row
            .try_get("creator")
            .map_err(|e| EconomyError::Storage(e.to_string()))?,
        coins: row
            .try_get::<i64, _>("coins")
            .map_err(|e| EconomyError::Storage(e.to_string()))? as u64,
        gross_currency: Currency::from_minor(
            row.try_get("gross_currency")
                .map_err(|e| EconomyError::Storage(e.to_string()))?,
        ),
        platform_fee: Currency::from_minor(
            row.try_get("platform_fee")
                .map_err(|e| EconomyError::Storage(e.to_string()))?,
        ),
        net_payout: Currency::from_minor(
            row.try_get("net_payout")
                .map_err(|e| EconomyError::Storage(e.to_string()))?,
        ),
        status: PayoutStatus::parse(&status)?,
        requested_at: row
            .try_get("requested_at")
            .map_err(|e| EconomyError::Storage(e.to_string()))?,
        processed_at: row
            .try_get("processed_at")
            .map_err(|e| EconomyError::Storage(e.to_string()))?,
        notes: row
            .try_get("notes")
            .map_err(|e| EconomyError::Storage(e.to_string()))?,
    })
}

fn transaction_from_row(row: &PgRow) -> Result<CoinTransaction, EconomyError> {
    let kind: String = row
        .try_get("kind")
        .map_err(|e| EconomyError::Storage(e.to_string()))?;
    let status: String = row
        .try_get("status")
        .map_err(|e| EconomyError::Storage(e.to_string()))?;

    Ok(CoinTransaction {
        id: row
            .try_get("id")
            .map_err(|e| EconomyError::Storage(e.to_string()))?,
        user_id: row
            .try_get("user_id")
            .map_err(|e| EconomyError::Storage(e.to_string()))?,
        kind: TransactionKind::parse(&kind)?,
        coins: row
            .try_get::<i64, _>("coins")
            .map_err(|e| EconomyError::Storage(e.to_string()))? as u64,
        currency_amount: row
            .try_get::<Option<i64>, _>("currency_amount")
            .map_err(|e| EconomyError::Storage(e.to_string()))?
            .map(Currency::from_minor),
        related_user_id: row
            .try_get("related_user_id")
            .map_err(|e| EconomyError::Storage(e.to_string()))?,
        related_post_id: row
            .try_get("related_post_id")
            .map_err(|e| EconomyError::Storage(e.to_string()))?,
        related_payout_id: row
            .try_get("related_payout_id")
            .map_err(|e| EconomyError::Storage(e.to_string()))?,
        payment_reference: row
            .try_get("payment_reference")
            .map_err(|e| EconomyError::Storage(e.to_string()))?,
        description: row
            .try_get("description")
            .map_err(|e| EconomyError::Storage(e.to_string()))?,
        status: TransactionStatus::parse(&status)?,
        created_at: row
            .try_get("created_at")
            .map_err(|e| EconomyError::Storage(e.to_string()))?,
    })
}

fn balance_from_row(row: &PgRow) -> Result<CoinBalance, EconomyError> {
    Ok(CoinBalance {
        owner: row
            .try_get("owner")
            .map_err(|e| EconomyError::Storage(e.to_string()))?,
        available: row
            .try_get::<i64, _>("available")
            .map_err(|e| EconomyError::Storage(e.to_string()))? as u64,
        total_earned: row
            .try_get::<i64, _>("total_earned")
            .map_err(|e| EconomyError::Storage(e.to_string()))? as u64,
        timestamp: row
            .try_get("updated_at")
            .map_err(|e| EconomyError::Storage(e.to_string()))?,
    })
}

async fn ensure_wallet_tx(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    owner: Uuid,
) -> Result<(), EconomyError> {
    sqlx::query(
        r#"
        INSERT INTO economy_balances (owner, available, total_earned, updated_at)
        VALUES ($1, 0, 0, NOW())
        ON CONFLICT (owner) DO NOTHING
        "#,
    )
    .bind(owner)
    .execute(&mut **tx)
    .await
    .map_err(|e| EconomyError::Storage(e.to_string()))?;

    Ok(())
}

async fn record_transaction_tx(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    transaction: &CoinTransaction,
) -> Result<(), EconomyError> {
    sqlx::query(
        r#"
        INSERT INTO economy_transactions (
            id, user_id, kind, coins, currency_amount, related_user_id, related_post_id,
            related_payout_id, payment_reference, description, status, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(transaction.id)
    .bind(transaction.user_id)
    .bind(transaction.kind.as_str())
    .bind(transaction.coins as i64)
    .bind(transaction.currency_amount.map(Currency::minor))
    .bind(transaction.related_user_id)
    .bind(transaction.related_post_id)
    .bind(transaction.related_payout_id)
    .bind(transaction.payment_reference.as_deref())
    .bind(&transaction.description)
    .bind(transaction.status.as_str())
    .bind(transaction.created_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| EconomyError::Storage(e.to_string()))?;

    Ok(())
}

#[async_trait::async_trait]
impl<T> EconomyAdapter for T
where
    T: PostgresEconomyAdapter + Send + Sync,
{
    async fn open_account(
        &self,
        owner: Uuid,
        signup_bonus: u64,
    ) -> Result<CoinBalance, EconomyError> {
        sqlx::query(
            r#"
            INSERT INTO economy_balances (owner, available, total_earned, opened_at, updated_at)
            VALUES ($1, $2, 0, NOW(), NOW())
            ON CONFLICT (owner) DO UPDATE
            SET available = economy_balances.available + EXCLUDED.available,
                opened_at = NOW(),
                updated_at = NOW()
            WHERE economy_balances.opened_at IS NULL
            "#,
        )
        .bind(owner)
        .bind(signup_bonus as i64)
        .execute(&self.get_pool())
        .await
        .map_err(|e| EconomyError::Storage(e.to_string()))?;

        let row = sqlx::query(
            r#"
            SELECT owner, available, total_earned, updated_at
            FROM economy_balances
            WHERE owner = $1
            "#,
        )
        .bind(owner)
        .fetch_one(&self.get_pool())
        .await
        .map_err(|e| EconomyError::Storage(e.to_string()))?;

        balance_from_row(&row)
    }

    async fn get_balance(&self, owner: Uuid) -> Result<CoinBalance, EconomyError> {
        let row = sqlx::query(
            r#"
            SELECT owner, available, total_earned, updated_at
            FROM economy_balances
            WHERE owner = $1
            "#,
        )
        .bind(owner)
        .fetch_optional(&self.get_pool())
        .await
        .map_err(|e| EconomyError::Storage(e.to_string()))?;

        match row {
            Some(row) => balance_from_row(&row),
            None => Ok(CoinBalance::new(owner)),
        }
    }

    async fn execute_purchase(
        &self,
        transaction: &CoinTransaction,
        idempotency_hash: &str,
    ) -> Result<(), EconomyError> {
        let mut tx = self
            .get_pool()
            .begin()
            .await
            .map_err(|e| EconomyError::Storage(e.to_string()))?;

        // Blocks on a concurrent claim of the same key until that one commits
        let claimed = sqlx::query(
            r#"
            INSERT INTO economy_idempotency_keys (key_hash, transaction_id)
            VALUES ($1, $2)
            ON CONFLICT (key_hash) DO NOTHING
            "#,
        )
        .bind(idempotency_hash)
        .bind(transaction.id)
        .execute(&mut *tx)
        .await
        .map_err(|e| EconomyError::Storage(e.to_string()))?
        .rows_affected();

        if claimed == 0 {
            let existing: Uuid = sqlx::query_scalar(
                "SELECT transaction_id FROM economy_idempotency_keys WHERE key_hash = $1",
            )
            .bind(idempotency_hash)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| EconomyError::Storage(e.to_string()))?;
            tx.rollback().await.ok();
            return Err(EconomyError::DuplicatePayment(existing));
        }

        sqlx::query(
            r#"
            INSERT INTO economy_balances (owner, available, total_earned, updated_at)
            VALUES ($1, $2, 0, NOW())
            ON CONFLICT (owner) DO UPDATE
            SET available = economy_balances.available + EXCLUDED.available,
                updated_at = NOW()
            "#,
        )
        .bind(transaction.user_id)
        .bind(transaction.coins as i64)
        .execute(&mut *tx)
        .await
        .map_err(|e| EconomyError::Storage(e.to_string()))?;

        record_transaction_tx(&mut tx, transaction).await?;

        tx.commit()
            .await
            .map_err(|e| EconomyError::Storage(e.to_string()))?;
        Ok(())
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
        let mut tx = self
            .get_pool()
            .begin()
            .await
            .map_err(|e| EconomyError::Storage(e.to_string()))?;

        ensure_wallet_tx(&mut tx, sent.user_id).await?;
        ensure_wallet_tx(&mut tx, received.user_id).await?;

        // Both wallets, in key order, so opposing gifts cannot deadlock
        let rows = sqlx::query(
            r#"
            SELECT owner, available
            FROM economy_balances
            WHERE owner = ANY($1)
            ORDER BY owner
            FOR UPDATE
            "#,
        )
        .bind(vec![sent.user_id, received.user_id])
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| EconomyError::Storage(e.to_string()))?;

        let mut available = 0u64;
        for row in &rows {
            let owner: Uuid = row
                .try_get("owner")
                .map_err(|e| EconomyError::Storage(e.to_string()))?;
            if owner == sent.user_id {
                available = row
                    .try_get::<i64, _>("available")
                    .map_err(|e| EconomyError::Storage(e.to_string()))?
                    as u64;
            }
        }

        // Checked INSIDE the lock
        if available < coins {
            tx.rollback().await.ok();
            return Err(EconomyError::InsufficientBalance {
                requested: coins,
                available,
            });
        }

        sqlx::query(
            r#"
            UPDATE economy_balances
            SET available = available - $2, updated_at = NOW()
            WHERE owner = $1
            "#,
        )
        .bind(sent.user_id)
        .bind(coins as i64)
        .execute(&mut *tx)
        .await
        .map_err(|e| EconomyError::Storage(e.to_string()))?;

        sqlx::query(
            r#"
            UPDATE economy_balances
            SET available = available + $2, total_earned = total_earned + $2, updated_at = NOW()
            WHERE owner = $1
            "#,
        )
        .bind(received.user_id)
        .bind(coins as i64)
        .execute(&mut *tx)
        .await
        .map_err(|e| EconomyError::Storage(e.to_string()))?;

        record_transaction_tx(&mut tx, sent).await?;
        record_transaction_tx(&mut tx, received).await?;

        tx.commit()
            .await
            .map_err(|e| EconomyError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn reserved_coins(&self, creator: Uuid) -> Result<u64, EconomyError> {
        // SUM returns NUMERIC, cast to BIGINT
        let reserved: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(coins), 0)::BIGINT
            FROM economy_payouts
            WHERE creator = $1 AND status <> 'cancelled'
            "#,
        )
        .bind(creator)
        .fetch_one(&self.get_pool())
        .await
        .map_err(|e| EconomyError::Storage(e.to_string()))?;

        Ok(reserved as u64)
    }

    async fn reserve_payout(
        &self,
        creator: Uuid,
        requested: Option<u64>,
        terms: &PayoutTerms,
    ) -> Result<Payout, EconomyError> {
        let mut tx = self
            .get_pool()
            .begin()
            .await
            .map_err(|e| EconomyError::Storage(e.to_string()))?;

        ensure_wallet_tx(&mut tx, creator).await?;

        // ── Phase 1: Lock the creator's wallet row ─────────────────────────────
        // Concurrent requests for this creator queue here until we commit
        let total_earned: i64 = sqlx::query_scalar(
            r#"
            SELECT total_earned
            FROM economy_balances
            WHERE owner = $1
            FOR UPDATE
            "#,
        )
        .bind(creator)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| EconomyError::Storage(e.to_string()))?;

        let reserved: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(coins), 0)::BIGINT
            FROM economy_payouts
            WHERE creator = $1 AND status <> 'cancelled'
            "#,
        )
        .bind(creator)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| EconomyError::Storage(e.to_string()))?;

        // ── Phase 2: Validate ──────────────────────────────────────────────────
        let available = available_for_payout(total_earned as u64, reserved as u64);
        let payout = match terms.quote(creator, requested, available) {
            Ok(payout) => payout,
            Err(err) => {
                tx.rollback().await.ok();
                return Err(err);
            }
        };

        // ── Phase 3: Persist ───────────────────────────────────────────────────
        sqlx::query(
            r#"
            INSERT INTO economy_payouts (
                id, creator, coins, gross_currency, platform_fee, net_payout,
                status, requested_at, processed_at, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(payout.id)
        .bind(payout.creator_id)
        .bind(payout.coins as i64)
        .bind(payout.gross_currency.minor())
        .bind(payout.platform_fee.minor())
        .bind(payout.net_payout.minor())
        .bind(payout.status.as_str())
        .bind(payout.requested_at)
        .bind(payout.processed_at)
        .bind(payout.notes.as_deref())
        .execute(&mut *tx)
        .await
        .map_err(|e| EconomyError::Storage(e.to_string()))?;

        record_transaction_tx(&mut tx, &CoinTransaction::payout(&payout)).await?;

        tx.commit()
            .await
            .map_err(|e| EconomyError::Storage(e.to_string()))?;
        Ok(payout)
    }

    async fn transition_payout(
        &self,
        payout_id: Uuid,
        creator: Option<Uuid>,
        target: PayoutStatus,
        notes: Option<String>,
    ) -> Result<Payout, EconomyError> {
        let mut tx = self
            .get_pool()
            .begin()
            .await
            .map_err(|e| EconomyError::Storage(e.to_string()))?;

        let row = sqlx::query(&format!(
            "SELECT {} FROM economy_payouts WHERE id = $1 FOR UPDATE",
            PAYOUT_COLUMNS
        ))
        .bind(payout_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| EconomyError::Storage(e.to_string()))?;

        let mut payout = match row {
            Some(row) => payout_from_row(&row)?,
            None => {
                tx.rollback().await.ok();
                return Err(EconomyError::PayoutNotFound(payout_id));
            }
        };

        if creator.is_some_and(|c| c != payout.creator_id) {
            tx.rollback().await.ok();
            return Err(EconomyError::PayoutNotFound(payout_id));
        }

        if let Err(err) = payout.transition(target, notes) {
            tx.rollback().await.ok();
            return Err(err);
        }

        sqlx::query(
            r#"
            UPDATE economy_payouts
            SET status = $2, processed_at = $3, notes = $4
            WHERE id = $1
            "#,
        )
        .bind(payout.id)
        .bind(payout.status.as_str())
        .bind(payout.processed_at)
        .bind(payout.notes.as_deref())
        .execute(&mut *tx)
        .await
        .map_err(|e| EconomyError::Storage(e.to_string()))?;

        sqlx::query("UPDATE economy_transactions SET status = $2 WHERE related_payout_id = $1")
            .bind(payout.id)
            .bind(TransactionStatus::from(payout.status).as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| EconomyError::Storage(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| EconomyError::Storage(e.to_string()))?;
        Ok(payout)
    }

    async fn get_payout(&self, payout_id: Uuid) -> Result<Payout, EconomyError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM economy_payouts WHERE id = $1",
            PAYOUT_COLUMNS
        ))
        .bind(payout_id)
        .fetch_optional(&self.get_pool())
        .await
        .map_err(|e| EconomyError::Storage(e.to_string()))?
        .ok_or(EconomyError::PayoutNotFound(payout_id))?;

        payout_from_row(&row)
    }

    async fn list_payouts(
        &self,
        creator: Uuid,
        page: PageRequest,
    ) -> Result<Page<Payout>, EconomyError> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM economy_payouts WHERE creator = $1")
                .bind(creator)
                .fetch_one(&self.get_pool())
                .await
                .map_err(|e| EconomyError::Storage(e.to_string()))?;

        let rows = sqlx::query(&format!(
            "SELECT {} FROM economy_payouts WHERE creator = $1 \
             ORDER BY requested_at DESC, id DESC LIMIT $2 OFFSET $3",
            PAYOUT_COLUMNS
        ))
        .bind(creator)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.get_pool())
        .await
        .map_err(|e| EconomyError::Storage(e.to_string()))?;

        let payouts = rows
            .iter()
            .map(payout_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(payouts, page, total as u64))
    }

    async fn list_transactions(
        &self,
        owner: Uuid,
        page: PageRequest,
    ) -> Result<Page<CoinTransaction>, EconomyError> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM economy_transactions WHERE user_id = $1")
                .bind(owner)
                .fetch_one(&self.get_pool())
                .await
                .map_err(|e| EconomyError::Storage(e.to_string()))?;

        let rows = sqlx::query(&format!(
            "SELECT {} FROM economy_transactions WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3",
            TRANSACTION_COLUMNS
        ))
        .bind(owner)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.get_pool())
        .await
        .map_err(|e| EconomyError::Storage(e.to_string()))?;

        let transactions = rows
            .iter()
            .map(transaction_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(transactions, page, total as u64))
    }
}
