//! End-to-end order lifecycle tests against a real SQLite backend.
mod common;

use ap_common::Credits;
use arena_payment_engine::{
    db_types::{FulfillmentOutcome, OrderStatusType, PaymentMethod},
    order_objects::Pagination,
    traits::{LedgerManagement, NicknameManagement, SettlementError},
};
use common::{new_context, provider_order, seed_balance, settle};

#[tokio::test]
async fn provider_credits_purchase_settles_once() {
    let ctx = new_context().await;
    let order = ctx.api.create_order("alice", "credits-500", PaymentMethod::Provider, None).await.unwrap();
    assert_eq!(order.status, OrderStatusType::Created);
    assert_eq!(order.total_price, Credits::from(499));

    let (order, intent) = ctx.api.register_provider_intent("alice", &order.order_id).await.unwrap();
    assert_eq!(order.status, OrderStatusType::AwaitingProviderApproval);
    assert_eq!(order.provider_intent_id.as_deref(), Some(intent.intent_id.as_str()));

    let completed = ctx.api.capture_and_complete(&order.order_id, &intent.intent_id).await.unwrap();
    assert!(completed.first_settlement);
    assert_eq!(completed.order.status, OrderStatusType::Completed);
    assert_eq!(completed.fulfillment, FulfillmentOutcome::CreditsGranted { amount: Credits::from(500) });
    assert_eq!(ctx.db.balance_for_user("alice").await.unwrap(), Credits::from(500));

    // A duplicate settlement call returns the stored result and grants nothing twice.
    let replay = ctx.api.capture_and_complete(&order.order_id, &intent.intent_id).await.unwrap();
    assert!(!replay.first_settlement);
    assert_eq!(replay.fulfillment, completed.fulfillment);
    assert_eq!(ctx.db.balance_for_user("alice").await.unwrap(), Credits::from(500));
    assert_eq!(ctx.provider.captures_made(), 1);
}

#[tokio::test]
async fn capture_quoting_the_wrong_intent_is_a_conflict() {
    let ctx = new_context().await;
    let order = provider_order(&ctx, "alice", "credits-500", None).await;
    let intent_id = order.provider_intent_id.clone().unwrap();

    // Knowing the order id is not enough: the capture must quote the registered intent.
    let bogus = format!("{intent_id}-bogus");
    let err = ctx.api.capture_and_complete(&order.order_id, &bogus).await.unwrap_err();
    assert!(matches!(err, SettlementError::Conflict(_)), "Expected Conflict, got {err}");
    let order = ctx.api.fetch_order(&order.order_id).await.unwrap();
    assert_eq!(order.status, OrderStatusType::AwaitingProviderApproval);
    assert_eq!(ctx.provider.captures_made(), 0);
    assert_eq!(ctx.db.balance_for_user("alice").await.unwrap(), Credits::from(0));

    // The genuine intent still settles, and a later mismatched replay is still rejected.
    ctx.api.capture_and_complete(&order.order_id, &intent_id).await.unwrap();
    let err = ctx.api.capture_and_complete(&order.order_id, &bogus).await.unwrap_err();
    assert!(matches!(err, SettlementError::Conflict(_)), "Expected Conflict, got {err}");
    assert_eq!(ctx.db.balance_for_user("alice").await.unwrap(), Credits::from(500));
}

#[tokio::test]
async fn only_the_owner_can_act_on_an_order() {
    let ctx = new_context().await;
    let order = ctx.api.create_order("alice", "credits-500", PaymentMethod::Provider, None).await.unwrap();

    let err = ctx.api.register_provider_intent("mallory", &order.order_id).await.unwrap_err();
    assert!(matches!(err, SettlementError::Forbidden(_)), "Expected Forbidden, got {err}");
    let err = ctx.api.cancel_order("mallory", &order.order_id).await.unwrap_err();
    assert!(matches!(err, SettlementError::Forbidden(_)), "Expected Forbidden, got {err}");

    seed_balance(&ctx, "alice", 1).await;
    let order = ctx.api.create_order("alice", "svc-reset", PaymentMethod::Balance, None).await.unwrap();
    let err = ctx.api.complete_with_balance("mallory", &order.order_id).await.unwrap_err();
    assert!(matches!(err, SettlementError::Forbidden(_)), "Expected Forbidden, got {err}");

    // The owner is unaffected.
    ctx.api.complete_with_balance("alice", &order.order_id).await.unwrap();
}

#[tokio::test]
async fn orders_are_readable_as_soon_as_creation_returns() {
    let ctx = new_context().await;
    // Every fetch can land on a different pool connection than the insert; the order must be
    // durable by the time create_order returns.
    for _ in 0..20 {
        let order = ctx.api.create_order("alice", "credits-500", PaymentMethod::Provider, None).await.unwrap();
        let fetched = ctx.api.fetch_order(&order.order_id).await.unwrap();
        assert_eq!(fetched.order_id, order.order_id);
        assert_eq!(fetched.status, OrderStatusType::Created);
    }
}

#[tokio::test]
async fn balance_membership_purchase_debits_and_extends() {
    let ctx = new_context().await;
    seed_balance(&ctx, "bob", 2).await;
    assert_eq!(ctx.db.balance_for_user("bob").await.unwrap(), Credits::from(1000));

    let order = ctx.api.create_order("bob", "premium-30", PaymentMethod::Balance, None).await.unwrap();
    let completed = ctx.api.complete_with_balance("bob", &order.order_id).await.unwrap();
    assert!(completed.first_settlement);
    let FulfillmentOutcome::MembershipExtended { tier, ends_at } = &completed.fulfillment else {
        panic!("Expected a membership extension, got {:?}", completed.fulfillment);
    };
    assert_eq!(tier, "premium");
    assert_eq!(ctx.db.balance_for_user("bob").await.unwrap(), Credits::from(1));

    let membership = ctx.db.membership_for_user("bob").await.unwrap().unwrap();
    assert_eq!(membership.ends_at, *ends_at);
    assert!(membership.is_active_at(chrono::Utc::now()));

    // Extending again stacks on top of the current expiry.
    seed_balance(&ctx, "bob", 2).await;
    let order = ctx.api.create_order("bob", "premium-30", PaymentMethod::Balance, None).await.unwrap();
    let extended = ctx.api.complete_with_balance("bob", &order.order_id).await.unwrap();
    let FulfillmentOutcome::MembershipExtended { ends_at: new_end, .. } = &extended.fulfillment else {
        panic!("Expected a membership extension, got {:?}", extended.fulfillment);
    };
    assert_eq!(*new_end, *ends_at + chrono::Duration::days(30));
}

#[tokio::test]
async fn insufficient_balance_leaves_order_created() {
    let ctx = new_context().await;
    seed_balance(&ctx, "carol", 1).await;
    let order = ctx.api.create_order("carol", "premium-30", PaymentMethod::Balance, None).await.unwrap();
    let err = ctx.api.complete_with_balance("carol", &order.order_id).await.unwrap_err();
    match err {
        SettlementError::InsufficientFunds { required, available } => {
            assert_eq!(required, Credits::from(999));
            assert_eq!(available, Credits::from(500));
        },
        e => panic!("Expected InsufficientFunds, got {e}"),
    }
    // Nothing changed: no debit, order still payable.
    assert_eq!(ctx.db.balance_for_user("carol").await.unwrap(), Credits::from(500));
    let order = ctx.api.fetch_order(&order.order_id).await.unwrap();
    assert_eq!(order.status, OrderStatusType::Created);
}

#[tokio::test]
async fn credits_cannot_be_bought_with_credits() {
    let ctx = new_context().await;
    let err = ctx.api.create_order("dave", "credits-500", PaymentMethod::Balance, None).await.unwrap_err();
    assert!(matches!(err, SettlementError::Validation(_)));
}

#[tokio::test]
async fn rename_completes_with_conflict_when_handle_is_taken() {
    let ctx = new_context().await;
    let order = provider_order(&ctx, "erin", "svc-rename", Some("Falcon")).await;
    let completed = settle(&ctx, &order).await.unwrap();
    assert_eq!(completed.fulfillment, FulfillmentOutcome::NicknameChanged { nickname: "Falcon".to_string() });
    assert_eq!(ctx.db.nickname_for_user("erin").await.unwrap().as_deref(), Some("Falcon"));

    // The comparison is case-insensitive, so "falcon" collides with "Falcon". The order still
    // completes; the outcome records the conflict.
    let order = provider_order(&ctx, "frank", "svc-rename", Some("falcon")).await;
    let completed = settle(&ctx, &order).await.unwrap();
    assert_eq!(completed.order.status, OrderStatusType::Completed);
    assert_eq!(completed.fulfillment, FulfillmentOutcome::NicknameConflict { nickname: "falcon".to_string() });
    assert_eq!(ctx.db.nickname_for_user("frank").await.unwrap(), None);
}

#[tokio::test]
async fn stats_reset_runs_exactly_once() {
    let ctx = new_context().await;
    seed_balance(&ctx, "gina", 1).await;
    let order = ctx.api.create_order("gina", "svc-reset", PaymentMethod::Balance, None).await.unwrap();
    let completed = ctx.api.complete_with_balance("gina", &order.order_id).await.unwrap();
    assert_eq!(completed.fulfillment, FulfillmentOutcome::StatsReset);
    // Replay does not re-run the side effect and does not debit again.
    let replay = ctx.api.complete_with_balance("gina", &order.order_id).await.unwrap();
    assert!(!replay.first_settlement);
    assert_eq!(ctx.db.balance_for_user("gina").await.unwrap(), Credits::from(300));
}

#[tokio::test]
async fn cancellation_is_limited_to_uncaptured_orders() {
    let ctx = new_context().await;
    let order = provider_order(&ctx, "hank", "credits-500", None).await;
    let cancelled = ctx.api.cancel_order("hank", &order.order_id).await.unwrap();
    assert_eq!(cancelled.status, OrderStatusType::Cancelled);

    // A cancelled order can no longer be captured.
    let err = settle(&ctx, &order).await.unwrap_err();
    assert!(matches!(err, SettlementError::InvalidStateTransition { .. }));

    // A settled order can no longer be cancelled.
    let order = provider_order(&ctx, "hank", "credits-500", None).await;
    settle(&ctx, &order).await.unwrap();
    let err = ctx.api.cancel_order("hank", &order.order_id).await.unwrap_err();
    assert!(matches!(err, SettlementError::InvalidStateTransition { .. }));
}

#[tokio::test]
async fn declined_capture_fails_the_order_without_fulfillment() {
    let ctx = new_context().await;
    let order = provider_order(&ctx, "ivan", "credits-500", None).await;
    ctx.provider.decline_captures(true);
    let err = settle(&ctx, &order).await.unwrap_err();
    assert!(matches!(err, SettlementError::GatewayFailed(_)));
    let order = ctx.api.fetch_order(&order.order_id).await.unwrap();
    assert_eq!(order.status, OrderStatusType::Failed);
    assert!(order.failure_reason.is_some());
    assert_eq!(ctx.db.balance_for_user("ivan").await.unwrap(), Credits::from(0));
}

#[tokio::test]
async fn captured_amount_mismatch_aborts_settlement() {
    let ctx = new_context().await;
    let order = provider_order(&ctx, "judy", "credits-500", None).await;
    // The provider settles the wrong figure; nothing may be fulfilled against it.
    ctx.provider.override_capture_amount(Credits::from(1));
    let err = settle(&ctx, &order).await.unwrap_err();
    assert!(matches!(err, SettlementError::Validation(_)), "Expected Validation, got {err}");
    let order = ctx.api.fetch_order(&order.order_id).await.unwrap();
    assert_eq!(order.status, OrderStatusType::AwaitingProviderApproval);
    assert_eq!(ctx.db.balance_for_user("judy").await.unwrap(), Credits::from(0));
}

#[tokio::test]
async fn transient_provider_errors_are_retried() {
    let ctx = new_context().await;
    ctx.provider.fail_next(2);
    let order = provider_order(&ctx, "judy", "credits-500", None).await;
    ctx.provider.fail_next(2);
    let completed = settle(&ctx, &order).await.unwrap();
    assert!(completed.first_settlement);
    assert_eq!(ctx.db.balance_for_user("judy").await.unwrap(), Credits::from(500));
}

#[tokio::test]
async fn history_is_newest_first_with_total_spend() {
    let ctx = new_context().await;
    seed_balance(&ctx, "kim", 2).await;
    let order = ctx.api.create_order("kim", "svc-reset", PaymentMethod::Balance, None).await.unwrap();
    ctx.api.complete_with_balance("kim", &order.order_id).await.unwrap();
    let cancelled = ctx.api.create_order("kim", "premium-30", PaymentMethod::Balance, None).await.unwrap();
    ctx.api.cancel_order("kim", &cancelled.order_id).await.unwrap();

    let history = ctx.api.history_for_user("kim", Pagination::default()).await.unwrap();
    assert_eq!(history.orders.len(), 4);
    assert_eq!(history.orders[0].order_id, cancelled.order_id);
    // 2 credit packs at 499 plus the 200 reset; the cancelled order does not count.
    assert_eq!(history.total_spend, Credits::from(499 * 2 + 200));
}
