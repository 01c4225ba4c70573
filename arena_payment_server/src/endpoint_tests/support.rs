use actix_web::http::StatusCode;
use arena_payment_engine::{
    db_types::{
        ClaimOutcome,
        FulfillmentOutcome,
        PaymentMethod,
        SupportKind,
        SupportRequest,
        SupportStatus,
    },
    support_objects::SupportResolution,
    traits::NicknameManagement,
};

use super::helpers::{admin_token, get_request, new_backend, post_request, user_token, TestBackend};
use crate::data_objects::ResolveSupportParams;

/// Buys a reclaim-nickname service for `user_id` and returns the support request it opened.
async fn seed_reclaim(backend: &TestBackend, user_id: &str, nickname: &str) -> i64 {
    let api = backend.order_api();
    let order = api
        .create_order(user_id, "svc-reclaim", PaymentMethod::Provider, Some(nickname))
        .await
        .unwrap();
    let (_, intent) = api.register_provider_intent(user_id, &order.order_id).await.unwrap();
    let completed = api.capture_and_complete(&order.order_id, &intent.intent_id).await.unwrap();
    match completed.fulfillment {
        FulfillmentOutcome::SupportRequestOpened { request_id } => request_id,
        other => panic!("Expected a support request, got {other:?}"),
    }
}

/// Claims `nickname` for `user_id` by buying and settling a rename service.
async fn seed_nickname(backend: &TestBackend, user_id: &str, nickname: &str) {
    let api = backend.order_api();
    let order = api
        .create_order(user_id, "svc-rename", PaymentMethod::Provider, Some(nickname))
        .await
        .unwrap();
    let (_, intent) = api.register_provider_intent(user_id, &order.order_id).await.unwrap();
    let completed = api.capture_and_complete(&order.order_id, &intent.intent_id).await.unwrap();
    assert_eq!(completed.fulfillment, FulfillmentOutcome::NicknameChanged { nickname: nickname.to_string() });
}

#[actix_web::test]
async fn support_queue_requires_the_admin_role() {
    let _ = env_logger::try_init().ok();
    let backend = new_backend().await;
    let token = user_token("alice");
    let err = get_request(&token, "/support", backend.configure()).await.expect_err("Expected error");
    assert!(err.contains("Insufficient Permissions"), "Unexpected error: {err}");
}

#[actix_web::test]
async fn reclaim_requests_go_through_review_and_approval() {
    let _ = env_logger::try_init().ok();
    let backend = new_backend().await;
    let request_id = seed_reclaim(&backend, "ana", "Legend").await;
    let admin = admin_token("supervisor");

    let (status, body) = get_request(&admin, "/support?status=pendiente", backend.configure()).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let requests: Vec<SupportRequest> = serde_json::from_str(&body).unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].id, request_id);
    assert_eq!(requests[0].kind, SupportKind::ReclaimNickname);
    assert_eq!(requests[0].requested_nickname.as_deref(), Some("Legend"));

    let path = format!("/support/{request_id}/review");
    let (status, body) = post_request(&admin, &path, &(), backend.configure()).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let request: SupportRequest = serde_json::from_str(&body).unwrap();
    assert_eq!(request.status, SupportStatus::EnRevision);

    let params = ResolveSupportParams { request_id, approve: true, notes: "Verified ownership".to_string() };
    let (status, body) = post_request(&admin, "/support/resolve", &params, backend.configure()).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let resolution: SupportResolution = serde_json::from_str(&body).unwrap();
    assert_eq!(resolution.request.status, SupportStatus::Aprobado);
    assert_eq!(resolution.request.resolved_by.as_deref(), Some("supervisor"));
    assert_eq!(resolution.claim, Some(ClaimOutcome::Claimed));

    // Terminal requests cannot be resolved twice.
    let err = post_request(&admin, "/support/resolve", &params, backend.configure())
        .await
        .expect_err("Expected error");
    assert!(err.contains("already aprobado"), "Unexpected error: {err}");
}

#[actix_web::test]
async fn losing_the_nickname_race_leaves_the_request_open() {
    let _ = env_logger::try_init().ok();
    let backend = new_backend().await;
    let request_id = seed_reclaim(&backend, "ana", "Phoenix").await;
    // The handle gets taken while the request sits in the queue.
    seed_nickname(&backend, "rival", "Phoenix").await;
    let admin = admin_token("supervisor");

    let params = ResolveSupportParams { request_id, approve: true, notes: String::new() };
    let err = post_request(&admin, "/support/resolve", &params, backend.configure())
        .await
        .expect_err("Expected error");
    assert!(err.contains("already in use"), "Unexpected error: {err}");

    let path = format!("/support/{request_id}");
    let (status, body) = get_request(&admin, &path, backend.configure()).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let request: SupportRequest = serde_json::from_str(&body).unwrap();
    assert_eq!(request.status, SupportStatus::Pendiente);
}

#[actix_web::test]
async fn rejected_requests_do_not_claim_the_nickname() {
    let _ = env_logger::try_init().ok();
    let backend = new_backend().await;
    let request_id = seed_reclaim(&backend, "ana", "Shadow").await;
    let admin = admin_token("supervisor");

    let params =
        ResolveSupportParams { request_id, approve: false, notes: "Could not verify ownership".to_string() };
    let (status, body) = post_request(&admin, "/support/resolve", &params, backend.configure()).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let resolution: SupportResolution = serde_json::from_str(&body).unwrap();
    assert_eq!(resolution.request.status, SupportStatus::Rechazado);
    assert!(resolution.claim.is_none());

    let api = backend.order_api();
    let check = api.db().claim_nickname("someone-else", "Shadow").await.unwrap();
    assert_eq!(check, ClaimOutcome::Claimed);
}
