// tests/integration_tests.rs
use creator_economy::{
    CoinTransaction, Currency, Economy, EconomyAdapter, EconomyConfig, EconomyError, PageRequest,
    PayoutStatus, TransactionKind, TransactionStatus, adapters::MemoryAdapter,
};
use uuid::Uuid;

const FAN_BONUS: u64 = 100_000;

fn setup() -> (Economy, Uuid) {
    let config = EconomyConfig {
        signup_bonus_coins: FAN_BONUS,
        ..EconomyConfig::default()
    };
    let economy = Economy::new(Box::new(MemoryAdapter::new()), config).unwrap();
    let creator = Uuid::now_v7();

    (economy, creator)
}

/// Give `creator` `coins` of lifetime earnings through a fan's gift.
async fn earn(economy: &Economy, creator: Uuid, coins: i64) {
    let fan = Uuid::now_v7();
    economy.open_account(fan).await.unwrap();
    economy
        .gift(fan, creator, coins, None, Some("thanks".to_string()))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_conversion_reference_values() {
    let (economy, _) = setup();

    assert_eq!(economy.coins_to_currency(780).unwrap().to_string(), "10.00");
    assert_eq!(economy.platform_share(780).unwrap().to_string(), "6.00");
    assert_eq!(economy.creator_share(780).unwrap().to_string(), "4.00");
    assert_eq!(economy.creator_share(4000).unwrap().to_string(), "20.51");
    assert_eq!(
        economy.currency_to_coins("10.00".parse().unwrap()).unwrap(),
        780
    );
    assert!(matches!(
        economy.coins_to_currency(-1),
        Err(EconomyError::InvalidAmount)
    ));
}

#[tokio::test]
async fn test_payout_below_minimum() {
    let (economy, creator) = setup();
    earn(&economy, creator, 4000).await;

    assert_eq!(
        economy.compute_available_for_payout(creator).await.unwrap(),
        4000
    );

    let result = economy.request_payout(creator, None).await;
    assert!(matches!(
        result,
        Err(EconomyError::BelowMinimumPayout { requested, minimum })
            if requested == Currency::from_minor(20_51) && minimum == Currency::from_major(50)
    ));

    // Nothing was reserved
    assert_eq!(
        economy.compute_available_for_payout(creator).await.unwrap(),
        4000
    );
}

#[tokio::test]
async fn test_payout_full_balance() {
    let (economy, creator) = setup();
    earn(&economy, creator, 10_000).await;

    let payout = economy.request_payout(creator, None).await.unwrap();
    assert_eq!(payout.status, PayoutStatus::Pending);
    assert_eq!(payout.creator_id, creator);
    assert_eq!(payout.coins, 10_000);
    assert_eq!(payout.gross_currency.to_string(), "128.21");
    assert_eq!(payout.platform_fee.to_string(), "76.92");
    assert_eq!(payout.net_payout.to_string(), "51.28");
    assert!(payout.processed_at.is_none());

    assert_eq!(economy.compute_available_for_payout(creator).await.unwrap(), 0);

    // A second request before the first resolves has nothing left
    let second = economy.request_payout(creator, None).await;
    assert!(matches!(
        second,
        Err(EconomyError::InsufficientBalance { available: 0, .. })
    ));
}

#[tokio::test]
async fn test_payout_partial_amount() {
    let (economy, creator) = setup();
    earn(&economy, creator, 30_000).await;

    let payout = economy.request_payout(creator, Some(10_000)).await.unwrap();
    assert_eq!(payout.coins, 10_000);
    assert_eq!(
        economy.compute_available_for_payout(creator).await.unwrap(),
        20_000
    );

    let too_much = economy.request_payout(creator, Some(20_001)).await;
    assert!(matches!(
        too_much,
        Err(EconomyError::InsufficientBalance {
            requested: 20_001,
            available: 20_000
        })
    ));
}

#[tokio::test]
async fn test_payout_rejects_non_positive_amounts() {
    let (economy, creator) = setup();
    earn(&economy, creator, 10_000).await;

    for amount in [0, -1, i64::MIN] {
        let result = economy.request_payout(creator, Some(amount)).await;
        assert!(
            matches!(result, Err(EconomyError::InvalidAmount)),
            "accepted {}",
            amount
        );
    }
}

#[tokio::test]
async fn test_cancel_releases_reservation() {
    let (economy, creator) = setup();
    earn(&economy, creator, 10_000).await;

    let payout = economy.request_payout(creator, None).await.unwrap();
    let cancelled = economy.cancel_payout(creator, payout.id).await.unwrap();

    assert_eq!(cancelled.status, PayoutStatus::Cancelled);
    assert!(cancelled.processed_at.is_some());
    assert_eq!(
        economy.compute_available_for_payout(creator).await.unwrap(),
        10_000
    );

    // The released coins can be requested again
    let again = economy.request_payout(creator, None).await.unwrap();
    assert_eq!(again.coins, 10_000);
}

#[tokio::test]
async fn test_mark_paid_keeps_reservation() {
    let (economy, creator) = setup();
    earn(&economy, creator, 10_000).await;

    let payout = economy.request_payout(creator, None).await.unwrap();
    let paid = economy.mark_paid(payout.id).await.unwrap();

    assert_eq!(paid.status, PayoutStatus::Paid);
    assert!(paid.processed_at.is_some());
    assert_eq!(economy.compute_available_for_payout(creator).await.unwrap(), 0);

    // New earnings only
    earn(&economy, creator, 12_000).await;
    assert_eq!(
        economy.compute_available_for_payout(creator).await.unwrap(),
        12_000
    );
}

#[tokio::test]
async fn test_terminal_payouts_do_not_move() {
    let (economy, creator) = setup();
    earn(&economy, creator, 20_000).await;

    let paid = economy.request_payout(creator, Some(10_000)).await.unwrap();
    let paid = economy.mark_paid(paid.id).await.unwrap();

    let cancelled = economy.request_payout(creator, Some(10_000)).await.unwrap();
    let cancelled = economy.cancel_payout(creator, cancelled.id).await.unwrap();

    let result = economy.cancel_payout(creator, paid.id).await;
    assert!(matches!(
        result,
        Err(EconomyError::InvalidStateTransition {
            from: PayoutStatus::Paid,
            to: PayoutStatus::Cancelled
        })
    ));
    let result = economy.mark_paid(cancelled.id).await;
    assert!(matches!(
        result,
        Err(EconomyError::InvalidStateTransition {
            from: PayoutStatus::Cancelled,
            to: PayoutStatus::Paid
        })
    ));
    let result = economy.mark_paid(paid.id).await;
    assert!(matches!(
        result,
        Err(EconomyError::InvalidStateTransition { .. })
    ));

    // Stored records are unchanged by the failed attempts
    assert_eq!(economy.payout(paid.id).await.unwrap(), paid);
    assert_eq!(economy.payout(cancelled.id).await.unwrap(), cancelled);
}

#[tokio::test]
async fn test_fail_payout_records_reason() {
    let (economy, creator) = setup();
    earn(&economy, creator, 10_000).await;

    let payout = economy.request_payout(creator, None).await.unwrap();
    let failed = economy
        .fail_payout(payout.id, "bank account closed")
        .await
        .unwrap();

    assert_eq!(failed.status, PayoutStatus::Cancelled);
    assert_eq!(failed.notes.as_deref(), Some("bank account closed"));
    assert_eq!(
        economy.compute_available_for_payout(creator).await.unwrap(),
        10_000
    );
}

#[tokio::test]
async fn test_cancel_other_creators_payout() {
    let (economy, creator) = setup();
    let other = Uuid::now_v7();
    earn(&economy, creator, 10_000).await;

    let payout = economy.request_payout(creator, None).await.unwrap();
    let result = economy.cancel_payout(other, payout.id).await;
    assert!(matches!(result, Err(EconomyError::PayoutNotFound(id)) if id == payout.id));

    assert_eq!(
        economy.payout(payout.id).await.unwrap().status,
        PayoutStatus::Pending
    );
}

#[tokio::test]
async fn test_unknown_payout() {
    let (economy, _) = setup();
    let missing = Uuid::now_v7();

    assert!(matches!(
        economy.payout(missing).await,
        Err(EconomyError::PayoutNotFound(_))
    ));
    assert!(matches!(
        economy.mark_paid(missing).await,
        Err(EconomyError::PayoutNotFound(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_payout_requests_reserve_once() {
    let (economy, creator) = setup();
    earn(&economy, creator, 10_000).await;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let economy = economy.clone();
            tokio::spawn(async move { economy.request_payout(creator, None).await })
        })
        .collect();

    let mut succeeded = 0;
    let mut insufficient = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(EconomyError::InsufficientBalance { .. }) => insufficient += 1,
            Err(other) => panic!("unexpected error: {}", other),
        }
    }

    assert_eq!(succeeded, 1, "exactly one request should reserve the coins");
    assert_eq!(insufficient, 7);
    assert_eq!(economy.compute_available_for_payout(creator).await.unwrap(), 0);

    let payouts = economy.payouts(creator, 1, None).await.unwrap();
    assert_eq!(payouts.pagination.total, 1);
}

#[tokio::test]
async fn test_gift_moves_coins() {
    let (economy, creator) = setup();
    let fan = Uuid::now_v7();
    let post = Uuid::now_v7();
    economy.open_account(fan).await.unwrap();

    let sent = economy
        .gift(fan, creator, 2_500, Some(post), None)
        .await
        .unwrap();
    assert_eq!(sent.kind, TransactionKind::GiftSent);
    assert_eq!(sent.related_user_id, Some(creator));
    assert_eq!(sent.related_post_id, Some(post));
    assert_eq!(sent.status, TransactionStatus::Completed);

    let fan_balance = economy.balance(fan).await.unwrap();
    assert_eq!(fan_balance.available, FAN_BONUS - 2_500);
    assert_eq!(fan_balance.total_earned, 0);

    let creator_balance = economy.balance(creator).await.unwrap();
    assert_eq!(creator_balance.available, 2_500);
    assert_eq!(creator_balance.total_earned, 2_500);

    let received = economy.transactions(creator, 1, None).await.unwrap();
    assert_eq!(received.items.len(), 1);
    assert_eq!(received.items[0].kind, TransactionKind::GiftReceived);
    assert_eq!(received.items[0].related_user_id, Some(fan));
}

#[tokio::test]
async fn test_gift_validation() {
    let (economy, creator) = setup();
    let fan = Uuid::now_v7();
    economy.open_account(fan).await.unwrap();

    assert!(matches!(
        economy.gift(fan, fan, 10, None, None).await,
        Err(EconomyError::SelfGift)
    ));
    assert!(matches!(
        economy.gift(fan, creator, 0, None, None).await,
        Err(EconomyError::InvalidAmount)
    ));

    let result = economy
        .gift(fan, creator, FAN_BONUS as i64 + 1, None, None)
        .await;
    assert!(matches!(
        result,
        Err(EconomyError::InsufficientBalance { available, .. }) if available == FAN_BONUS
    ));

    // Nothing moved
    assert_eq!(economy.balance(fan).await.unwrap().available, FAN_BONUS);
    assert_eq!(economy.balance(creator).await.unwrap().total_earned, 0);
    assert_eq!(
        economy.transactions(fan, 1, None).await.unwrap().pagination.total,
        0
    );
}

#[tokio::test]
async fn test_adapter_rejects_self_gift() {
    let adapter = MemoryAdapter::new();
    let user = Uuid::now_v7();
    adapter.open_account(user, 100).await.unwrap();

    let (sent, received) = CoinTransaction::gift_pair(user, user, 50, None, None);
    let result = adapter.execute_gift(&sent, &received).await;
    assert!(matches!(result, Err(EconomyError::SelfGift)));

    // No coins or earnings appear from nowhere
    let balance = adapter.get_balance(user).await.unwrap();
    assert_eq!(balance.available, 100);
    assert_eq!(balance.total_earned, 0);
    let history = adapter
        .list_transactions(user, PageRequest::new(1, 20))
        .await
        .unwrap();
    assert_eq!(history.pagination.total, 0);
}

#[tokio::test]
async fn test_signup_bonus_after_purchase() {
    let (economy, _) = setup();
    let user = Uuid::now_v7();

    economy.purchase(user, 1, "pi_005").await.unwrap();
    let account = economy.open_account(user).await.unwrap();
    assert_eq!(account.available, 100 + FAN_BONUS);
    assert_eq!(account.total_earned, 0);

    let again = economy.open_account(user).await.unwrap();
    assert_eq!(again.available, 100 + FAN_BONUS);
}

#[tokio::test]
async fn test_signup_bonus_after_receiving_gift() {
    let (economy, creator) = setup();
    earn(&economy, creator, 4_000).await;

    let account = economy.open_account(creator).await.unwrap();
    assert_eq!(account.available, 4_000 + FAN_BONUS);
    assert_eq!(account.total_earned, 4_000);
    assert_eq!(
        economy.compute_available_for_payout(creator).await.unwrap(),
        4_000
    );
}

#[tokio::test]
async fn test_spending_gifted_coins_keeps_earnings() {
    let (economy, creator) = setup();
    let other_creator = Uuid::now_v7();
    earn(&economy, creator, 10_000).await;

    // Creator regifts everything; lifetime earnings are untouched
    economy
        .gift(creator, other_creator, 10_000, None, None)
        .await
        .unwrap();

    let balance = economy.balance(creator).await.unwrap();
    assert_eq!(balance.available, 0);
    assert_eq!(balance.total_earned, 10_000);
    assert_eq!(
        economy.compute_available_for_payout(creator).await.unwrap(),
        10_000
    );
}

#[tokio::test]
async fn test_purchase_credits_package() {
    let (economy, _) = setup();
    let user = Uuid::now_v7();

    let tx = economy.purchase(user, 3, "pi_001").await.unwrap();
    assert_eq!(tx.kind, TransactionKind::Purchase);
    assert_eq!(tx.coins, 575);
    assert_eq!(tx.currency_amount, Some(Currency::from_minor(19_99)));
    assert_eq!(tx.payment_reference.as_deref(), Some("pi_001"));

    let balance = economy.balance(user).await.unwrap();
    assert_eq!(balance.available, 575);
    assert_eq!(balance.total_earned, 0);
}

#[tokio::test]
async fn test_purchase_replay_is_rejected() {
    let (economy, _) = setup();
    let user = Uuid::now_v7();

    let first = economy.purchase(user, 1, "pi_002").await.unwrap();
    let replay = economy.purchase(user, 1, "pi_002").await;
    assert!(matches!(replay, Err(EconomyError::DuplicatePayment(id)) if id == first.id));

    assert_eq!(economy.balance(user).await.unwrap().available, 100);
}

#[tokio::test]
async fn test_purchase_validation() {
    let (economy, _) = setup();
    let user = Uuid::now_v7();

    assert!(matches!(
        economy.purchase(user, 42, "pi_003").await,
        Err(EconomyError::PackageNotFound(42))
    ));
    assert!(matches!(
        economy.purchase(user, 1, "  ").await,
        Err(EconomyError::InvalidPaymentReference)
    ));
    assert_eq!(economy.balance(user).await.unwrap().available, 0);
}

#[tokio::test]
async fn test_payout_transaction_follows_status() {
    let (economy, creator) = setup();
    earn(&economy, creator, 20_000).await;

    let paid = economy.request_payout(creator, Some(10_000)).await.unwrap();
    let cancelled = economy.request_payout(creator, Some(10_000)).await.unwrap();

    let status_of = |page: &creator_economy::Page<creator_economy::CoinTransaction>, id| {
        page.items
            .iter()
            .find(|tx| tx.related_payout_id == Some(id))
            .map(|tx| tx.status)
    };

    let history = economy.transactions(creator, 1, None).await.unwrap();
    assert_eq!(status_of(&history, paid.id), Some(TransactionStatus::Pending));

    economy.mark_paid(paid.id).await.unwrap();
    economy.cancel_payout(creator, cancelled.id).await.unwrap();

    let history = economy.transactions(creator, 1, None).await.unwrap();
    assert_eq!(status_of(&history, paid.id), Some(TransactionStatus::Completed));
    assert_eq!(
        status_of(&history, cancelled.id),
        Some(TransactionStatus::Cancelled)
    );
}

#[tokio::test]
async fn test_transaction_pagination() {
    let (economy, _) = setup();
    let fan = Uuid::now_v7();
    economy.open_account(fan).await.unwrap();

    for _ in 0..25 {
        economy
            .gift(fan, Uuid::now_v7(), 1, None, None)
            .await
            .unwrap();
    }

    let first = economy.transactions(fan, 1, None).await.unwrap();
    assert_eq!(first.items.len(), 20);
    assert_eq!(first.pagination.total, 25);
    assert_eq!(first.pagination.pages, 2);
    assert!(
        first
            .items
            .windows(2)
            .all(|w| w[0].created_at >= w[1].created_at)
    );

    let second = economy.transactions(fan, 2, None).await.unwrap();
    assert_eq!(second.items.len(), 5);

    let beyond = economy.transactions(fan, 3, None).await.unwrap();
    assert!(beyond.items.is_empty());

    let clamped = economy.transactions(fan, 1, Some(1_000)).await.unwrap();
    assert_eq!(clamped.pagination.limit, 100);
    assert_eq!(clamped.items.len(), 25);
}

#[tokio::test]
async fn test_earnings_summary() {
    let (economy, creator) = setup();
    earn(&economy, creator, 4_000).await;

    let summary = economy.earnings(creator).await.unwrap();
    assert_eq!(summary.total_earned_coins, 4_000);
    assert_eq!(summary.available_for_payout, 4_000);
    assert_eq!(summary.available_net.to_string(), "20.51");
    assert!(!summary.eligible);

    earn(&economy, creator, 6_000).await;
    let summary = economy.earnings(creator).await.unwrap();
    assert_eq!(summary.total_earned_currency.to_string(), "128.21");
    assert_eq!(summary.total_earned_net.to_string(), "51.28");
    assert!(summary.eligible);

    economy.request_payout(creator, None).await.unwrap();
    let summary = economy.earnings(creator).await.unwrap();
    assert_eq!(summary.available_for_payout, 0);
    assert!(!summary.eligible);
    assert_eq!(summary.payouts.items.len(), 1);
}

#[tokio::test]
async fn test_configured_minimum_and_bonus() {
    let config = EconomyConfig::from_json(r#"{ "minimum_payout": 500, "signup_bonus_coins": 25 }"#)
        .unwrap();
    let economy = Economy::new(Box::new(MemoryAdapter::new()), config).unwrap();
    let creator = Uuid::now_v7();

    let account = economy.open_account(creator).await.unwrap();
    assert_eq!(account.available, 25);
    assert_eq!(account.total_earned, 0);

    // Opening twice does not pay the bonus twice
    let again = economy.open_account(creator).await.unwrap();
    assert_eq!(again.available, 25);

    let fan = Uuid::now_v7();
    economy.purchase(fan, 4, "pi_004").await.unwrap();
    economy.gift(fan, creator, 1_000, None, None).await.unwrap();

    // 1000 coins: creator share 5.13, above the configured 5.00
    let payout = economy.request_payout(creator, None).await.unwrap();
    assert_eq!(payout.net_payout.to_string(), "5.13");
}

#[tokio::test]
async fn test_exchange_rate_above_minor_unit_precision_is_rejected() {
    let config = EconomyConfig {
        coins_per_unit: 1_000,
        ..EconomyConfig::default()
    };
    let result = Economy::new(Box::new(MemoryAdapter::new()), config);
    assert!(matches!(result, Err(EconomyError::InvalidConfig(_))));
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let config = EconomyConfig {
        platform_pct: 50,
        creator_pct: 40,
        ..EconomyConfig::default()
    };
    let result = Economy::new(Box::new(MemoryAdapter::new()), config);
    assert!(matches!(result, Err(EconomyError::InvalidConfig(_))));
}
