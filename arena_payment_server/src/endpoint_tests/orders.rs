use actix_web::http::StatusCode;
use ap_common::Credits;
use arena_payment_engine::{
    db_types::{CompletedOrder, FulfillmentOutcome, Order, OrderStatusType, PaymentMethod},
    order_objects::OrderHistory,
    NicknameCheck,
};

use super::helpers::{get_request, new_backend, post_request, user_token, TestBackend};
use crate::data_objects::{
    AccountSummary,
    BalanceResult,
    CaptureOrderParams,
    NewOrderParams,
    OrderIdParams,
    PaymentIntentResult,
};

fn new_order_params(item_id: &str, method: PaymentMethod, nickname: Option<&str>) -> NewOrderParams {
    NewOrderParams {
        item_id: item_id.to_string(),
        payment_method: method,
        nickname: nickname.map(String::from),
    }
}

/// Buys and settles `packs` 500-credit packs directly through the engine API.
async fn seed_balance(backend: &TestBackend, user_id: &str, packs: usize) {
    let api = backend.order_api();
    for _ in 0..packs {
        let order = api.create_order(user_id, "credits-500", PaymentMethod::Provider, None).await.unwrap();
        let (_, intent) = api.register_provider_intent(user_id, &order.order_id).await.unwrap();
        api.capture_and_complete(&order.order_id, &intent.intent_id).await.unwrap();
    }
}

#[actix_web::test]
async fn orders_require_a_token() {
    let _ = env_logger::try_init().ok();
    let backend = new_backend().await;
    let params = new_order_params("credits-500", PaymentMethod::Provider, None);
    let err = post_request("", "/order", &params, backend.configure()).await.expect_err("Expected error");
    assert_eq!(err, "Authentication Error. No access token supplied.");
}

#[actix_web::test]
async fn orders_require_the_user_role() {
    let _ = env_logger::try_init().ok();
    let backend = new_backend().await;
    let token = super::helpers::issue_token("alice", vec![]);
    let params = new_order_params("credits-500", PaymentMethod::Provider, None);
    let err = post_request(&token, "/order", &params, backend.configure()).await.expect_err("Expected error");
    assert!(err.contains("Insufficient Permissions"), "Unexpected error: {err}");
}

#[actix_web::test]
async fn provider_purchase_end_to_end() {
    let _ = env_logger::try_init().ok();
    let backend = new_backend().await;
    let token = user_token("alice");

    let params = new_order_params("credits-500", PaymentMethod::Provider, None);
    let (status, body) = post_request(&token, "/order", &params, backend.configure()).await.unwrap();
    assert_eq!(status, StatusCode::CREATED);
    let order: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(order.status, OrderStatusType::Created);
    assert_eq!(order.total_price, Credits::from(499));

    let params = OrderIdParams { order_id: order.order_id.clone() };
    let (status, body) = post_request(&token, "/order/provider", &params, backend.configure()).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let intent: PaymentIntentResult = serde_json::from_str(&body).unwrap();
    assert_eq!(intent.order.status, OrderStatusType::AwaitingProviderApproval);
    assert!(intent.approval_url.contains(&intent.intent_id));

    let capture =
        CaptureOrderParams { order_id: order.order_id.clone(), intent_id: intent.intent_id.clone() };
    let (status, body) =
        post_request(&token, "/order/provider/capture", &capture, backend.configure()).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let completed: CompletedOrder = serde_json::from_str(&body).unwrap();
    assert!(completed.first_settlement);
    assert_eq!(completed.fulfillment, FulfillmentOutcome::CreditsGranted { amount: Credits::from(500) });

    // A repeated capture call replays the stored result.
    let (status, body) =
        post_request(&token, "/order/provider/capture", &capture, backend.configure()).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let replay: CompletedOrder = serde_json::from_str(&body).unwrap();
    assert!(!replay.first_settlement);
    assert_eq!(backend.provider.captures_made(), 1);

    let (status, body) = get_request(&token, "/balance", backend.configure()).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let balance: BalanceResult = serde_json::from_str(&body).unwrap();
    assert_eq!(balance.balance, Credits::from(500));
}

#[actix_web::test]
async fn captures_must_quote_the_registered_intent() {
    let _ = env_logger::try_init().ok();
    let backend = new_backend().await;
    let token = user_token("alice");

    let params = new_order_params("credits-500", PaymentMethod::Provider, None);
    let (_, body) = post_request(&token, "/order", &params, backend.configure()).await.unwrap();
    let order: Order = serde_json::from_str(&body).unwrap();
    let params = OrderIdParams { order_id: order.order_id.clone() };
    let (_, body) = post_request(&token, "/order/provider", &params, backend.configure()).await.unwrap();
    let intent: PaymentIntentResult = serde_json::from_str(&body).unwrap();

    // Quoting a different intent must not settle the order.
    let capture = CaptureOrderParams {
        order_id: order.order_id.clone(),
        intent_id: format!("{}-bogus", intent.intent_id),
    };
    let err = post_request(&token, "/order/provider/capture", &capture, backend.configure())
        .await
        .expect_err("Expected error");
    assert!(err.contains("does not match"), "Unexpected error: {err}");
    assert_eq!(backend.provider.captures_made(), 0);

    let fetched = backend.order_api().fetch_order(&order.order_id).await.unwrap();
    assert_eq!(fetched.status, OrderStatusType::AwaitingProviderApproval);

    // The genuine intent settles as usual.
    let capture = CaptureOrderParams { order_id: order.order_id, intent_id: intent.intent_id };
    let (status, _) = post_request(&token, "/order/provider/capture", &capture, backend.configure()).await.unwrap();
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn balance_purchase_and_account_summary() {
    let _ = env_logger::try_init().ok();
    let backend = new_backend().await;
    seed_balance(&backend, "bob", 1).await;
    let token = user_token("bob");

    let params = new_order_params("svc-rename", PaymentMethod::Balance, Some("Maverick"));
    let (_, body) = post_request(&token, "/order", &params, backend.configure()).await.unwrap();
    let order: Order = serde_json::from_str(&body).unwrap();

    let params = OrderIdParams { order_id: order.order_id };
    let (status, body) = post_request(&token, "/order/balance", &params, backend.configure()).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let completed: CompletedOrder = serde_json::from_str(&body).unwrap();
    assert_eq!(completed.fulfillment, FulfillmentOutcome::NicknameChanged { nickname: "Maverick".to_string() });

    let (status, body) = get_request(&token, "/account", backend.configure()).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let account: AccountSummary = serde_json::from_str(&body).unwrap();
    assert_eq!(account.user_id, "bob");
    assert_eq!(account.balance, Credits::from(200));
    assert_eq!(account.nickname.as_deref(), Some("Maverick"));
    assert!(account.membership.is_none());
}

#[actix_web::test]
async fn insufficient_balance_is_a_payment_required_error() {
    let _ = env_logger::try_init().ok();
    let backend = new_backend().await;
    let token = user_token("carol");

    let params = new_order_params("premium-30", PaymentMethod::Balance, None);
    let (_, body) = post_request(&token, "/order", &params, backend.configure()).await.unwrap();
    let order: Order = serde_json::from_str(&body).unwrap();

    let params = OrderIdParams { order_id: order.order_id };
    let err = post_request(&token, "/order/balance", &params, backend.configure())
        .await
        .expect_err("Expected error");
    assert!(err.contains("Insufficient funds"), "Unexpected error: {err}");
}

#[actix_web::test]
async fn users_cannot_touch_each_others_orders() {
    let _ = env_logger::try_init().ok();
    let backend = new_backend().await;
    let alice = user_token("alice");
    let mallory = user_token("mallory");

    let params = new_order_params("credits-500", PaymentMethod::Provider, None);
    let (_, body) = post_request(&alice, "/order", &params, backend.configure()).await.unwrap();
    let order: Order = serde_json::from_str(&body).unwrap();

    let path = format!("/order/{}/cancel", order.order_id.as_str());
    let err = post_request(&mallory, &path, &(), backend.configure()).await.expect_err("Expected error");
    assert!(err.contains("Insufficient Permissions"), "Unexpected error: {err}");

    let path = format!("/order/{}", order.order_id.as_str());
    let err = get_request(&mallory, &path, backend.configure()).await.expect_err("Expected error");
    assert!(err.contains("Insufficient Permissions"), "Unexpected error: {err}");

    // The owner can still cancel.
    let path = format!("/order/{}/cancel", order.order_id.as_str());
    let (status, body) = post_request(&alice, &path, &(), backend.configure()).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let cancelled: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(cancelled.status, OrderStatusType::Cancelled);
}

#[actix_web::test]
async fn nickname_verification_is_advisory() {
    let _ = env_logger::try_init().ok();
    let backend = new_backend().await;
    let token = user_token("erin");

    let (status, body) = get_request(&token, "/nickname/verify/Shadow", backend.configure()).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let check: NicknameCheck = serde_json::from_str(&body).unwrap();
    assert!(check.valid);
    assert_eq!(check.available, Some(true));

    // Too short to be a valid handle: no availability lookup happens.
    let (status, body) = get_request(&token, "/nickname/verify/x", backend.configure()).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let check: NicknameCheck = serde_json::from_str(&body).unwrap();
    assert!(!check.valid);
    assert!(check.available.is_none());
}

#[actix_web::test]
async fn history_shows_total_spend() {
    let _ = env_logger::try_init().ok();
    let backend = new_backend().await;
    seed_balance(&backend, "kim", 1).await;
    let token = user_token("kim");

    let params = new_order_params("svc-reset", PaymentMethod::Balance, None);
    let (_, body) = post_request(&token, "/order", &params, backend.configure()).await.unwrap();
    let order: Order = serde_json::from_str(&body).unwrap();
    let params = OrderIdParams { order_id: order.order_id };
    post_request(&token, "/order/balance", &params, backend.configure()).await.unwrap();

    let (status, body) = get_request(&token, "/history", backend.configure()).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let history: OrderHistory = serde_json::from_str(&body).unwrap();
    assert_eq!(history.orders.len(), 2);
    assert_eq!(history.total_spend, Credits::from(499 + 200));
}
