use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use ap_common::{Credits, Secret};
use arena_payment_engine::{
    catalog::StaticCatalog,
    db_types::{Order, OrderStatusType, PaymentMethod},
    test_utils::mocks::MockPayVault,
    traits::LedgerManagement,
    SqliteDatabase,
};

use super::helpers::{new_backend, send_request, TestBackend};
use crate::{
    data_objects::{JsonResponse, PayVaultWebhookEvent},
    helpers::calculate_hmac,
    middleware::HmacMiddlewareFactory,
    routes::PayvaultWebhookRoute,
    server::PAYVAULT_SIGNATURE_HEADER,
};

const WEBHOOK_SECRET: &str = "webhook-test-secret";

/// Registers the webhook scope the way the real server does, with HMAC checks on.
fn webhook_config(backend: &TestBackend) -> impl FnOnce(&mut ServiceConfig) {
    let orders_api = backend.order_api();
    move |cfg: &mut ServiceConfig| {
        let scope = web::scope("/webhook")
            .wrap(HmacMiddlewareFactory::new(
                PAYVAULT_SIGNATURE_HEADER,
                Secret::new(WEBHOOK_SECRET.to_string()),
                true,
            ))
            .service(PayvaultWebhookRoute::<SqliteDatabase, StaticCatalog, MockPayVault>::new());
        cfg.app_data(web::Data::new(orders_api)).service(scope);
    }
}

fn signed_event(event: &str, intent_id: &str, reference: &str) -> TestRequest {
    let body = serde_json::to_string(&PayVaultWebhookEvent {
        event: event.to_string(),
        intent_id: intent_id.to_string(),
        reference: reference.to_string(),
    })
    .unwrap();
    let signature = calculate_hmac(WEBHOOK_SECRET, body.as_bytes());
    TestRequest::post()
        .uri("/webhook/payvault")
        .insert_header(("Content-Type", "application/json"))
        .insert_header((PAYVAULT_SIGNATURE_HEADER, signature))
        .set_payload(body)
}

/// Creates a provider-paid order and registers its payment intent. Returns the order and intent id.
async fn pending_order(backend: &TestBackend, user_id: &str) -> (Order, String) {
    let api = backend.order_api();
    let order = api.create_order(user_id, "credits-500", PaymentMethod::Provider, None).await.unwrap();
    let (order, intent) = api.register_provider_intent(user_id, &order.order_id).await.unwrap();
    (order, intent.intent_id)
}

#[actix_web::test]
async fn approved_notifications_settle_the_order() {
    let _ = env_logger::try_init().ok();
    let backend = new_backend().await;
    let (order, intent_id) = pending_order(&backend, "alice").await;

    let req = signed_event("intent.approved", &intent_id, order.order_id.as_str());
    let (status, body) = send_request(req, "", webhook_config(&backend)).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let response: JsonResponse = serde_json::from_str(&body).unwrap();
    assert!(response.success);

    let api = backend.order_api();
    let settled = api.fetch_order(&order.order_id).await.unwrap();
    assert_eq!(settled.status, OrderStatusType::Completed);
    let balance = api.db().balance_for_user("alice").await.unwrap();
    assert_eq!(balance, Credits::from(500));
}

#[actix_web::test]
async fn duplicate_notifications_are_answered_from_the_stored_result() {
    let _ = env_logger::try_init().ok();
    let backend = new_backend().await;
    let (order, intent_id) = pending_order(&backend, "bob").await;

    let req = signed_event("intent.approved", &intent_id, order.order_id.as_str());
    send_request(req, "", webhook_config(&backend)).await.unwrap();
    // PayVault delivers at least once; the second delivery must not fulfill again.
    let req = signed_event("intent.approved", &intent_id, order.order_id.as_str());
    let (status, body) = send_request(req, "", webhook_config(&backend)).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let response: JsonResponse = serde_json::from_str(&body).unwrap();
    assert!(response.success);
    assert!(response.message.contains("already settled"), "Unexpected message: {}", response.message);

    assert_eq!(backend.provider.captures_made(), 1);
    let balance = backend.order_api().db().balance_for_user("bob").await.unwrap();
    assert_eq!(balance, Credits::from(500));
}

#[actix_web::test]
async fn notifications_for_the_wrong_intent_do_not_settle() {
    let _ = env_logger::try_init().ok();
    let backend = new_backend().await;
    let (order, intent_id) = pending_order(&backend, "grace").await;

    // A correctly signed notification quoting a different intent is a conflict, not a settlement.
    let bogus = format!("{intent_id}-bogus");
    let req = signed_event("intent.approved", &bogus, order.order_id.as_str());
    let err = send_request(req, "", webhook_config(&backend)).await.expect_err("Expected error");
    assert!(err.contains("does not match"), "Unexpected error: {err}");

    let api = backend.order_api();
    let untouched = api.fetch_order(&order.order_id).await.unwrap();
    assert_eq!(untouched.status, OrderStatusType::AwaitingProviderApproval);
    assert_eq!(backend.provider.captures_made(), 0);
    assert_eq!(api.db().balance_for_user("grace").await.unwrap(), Credits::from(0));

    // The genuine notification still settles the order.
    let req = signed_event("intent.approved", &intent_id, order.order_id.as_str());
    let (status, _) = send_request(req, "", webhook_config(&backend)).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let settled = api.fetch_order(&order.order_id).await.unwrap();
    assert_eq!(settled.status, OrderStatusType::Completed);
}

#[actix_web::test]
async fn declined_notifications_fail_the_order() {
    let _ = env_logger::try_init().ok();
    let backend = new_backend().await;
    let (order, intent_id) = pending_order(&backend, "carol").await;

    let req = signed_event("intent.declined", &intent_id, order.order_id.as_str());
    let (status, _) = send_request(req, "", webhook_config(&backend)).await.unwrap();
    assert_eq!(status, StatusCode::OK);

    let failed = backend.order_api().fetch_order(&order.order_id).await.unwrap();
    assert_eq!(failed.status, OrderStatusType::Failed);
    assert!(failed.failure_reason.as_deref().unwrap_or_default().contains("declined"));
}

#[actix_web::test]
async fn cancelled_notifications_cancel_the_order() {
    let _ = env_logger::try_init().ok();
    let backend = new_backend().await;
    let (order, intent_id) = pending_order(&backend, "dave").await;

    let req = signed_event("intent.cancelled", &intent_id, order.order_id.as_str());
    let (status, _) = send_request(req, "", webhook_config(&backend)).await.unwrap();
    assert_eq!(status, StatusCode::OK);

    let cancelled = backend.order_api().fetch_order(&order.order_id).await.unwrap();
    assert_eq!(cancelled.status, OrderStatusType::Cancelled);
}

#[actix_web::test]
async fn unsigned_notifications_are_rejected() {
    let _ = env_logger::try_init().ok();
    let backend = new_backend().await;
    let (order, intent_id) = pending_order(&backend, "erin").await;

    let body = serde_json::to_string(&PayVaultWebhookEvent {
        event: "intent.approved".to_string(),
        intent_id,
        reference: order.order_id.as_str().to_string(),
    })
    .unwrap();

    // No signature header at all.
    let req = TestRequest::post()
        .uri("/webhook/payvault")
        .insert_header(("Content-Type", "application/json"))
        .set_payload(body.clone());
    let err = send_request(req, "", webhook_config(&backend)).await.expect_err("Expected error");
    assert_eq!(err, "No HMAC signature found.");

    // Signed with the wrong secret.
    let signature = calculate_hmac("not-the-webhook-secret", body.as_bytes());
    let req = TestRequest::post()
        .uri("/webhook/payvault")
        .insert_header(("Content-Type", "application/json"))
        .insert_header((PAYVAULT_SIGNATURE_HEADER, signature))
        .set_payload(body);
    let err = send_request(req, "", webhook_config(&backend)).await.expect_err("Expected error");
    assert_eq!(err, "Invalid HMAC signature.");

    let order = backend.order_api().fetch_order(&order.order_id).await.unwrap();
    assert_eq!(order.status, OrderStatusType::AwaitingProviderApproval);
}

#[actix_web::test]
async fn unsupported_events_are_acknowledged_but_flagged() {
    let _ = env_logger::try_init().ok();
    let backend = new_backend().await;
    let (order, intent_id) = pending_order(&backend, "frank").await;

    let req = signed_event("intent.refunded", &intent_id, order.order_id.as_str());
    let (status, body) = send_request(req, "", webhook_config(&backend)).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let response: JsonResponse = serde_json::from_str(&body).unwrap();
    assert!(!response.success);
    assert!(response.message.contains("Unsupported event type"), "Unexpected message: {}", response.message);
}
