mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::TestHarness;
use content_generator::{
    billing::{stripe::sign_payload, wompi::signed_event},
    database::entities::Plan,
    test_utils::{TEST_STRIPE_WEBHOOK_SECRET, TEST_WOMPI_EVENTS_SECRET},
};
use serde_json::{Value, json};

fn stripe_request(payload: &str, signature: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/v1/webhooks/stripe")
        .header("Content-Type", "application/json");
    if let Some(signature) = signature {
        builder = builder.header("Stripe-Signature", signature);
    }
    builder.body(Body::from(payload.to_string())).unwrap()
}

fn subscription_event(event_type: &str, user_id: i32, plan: &str) -> String {
    json!({
        "id": "evt_test",
        "type": event_type,
        "data": {
            "object": {
                "id": "sub_123",
                "customer": "cus_123",
                "status": "active",
                "metadata": { "user_id": user_id.to_string(), "plan": plan }
            }
        }
    })
    .to_string()
}

async fn plan_of(harness: &TestHarness, user_id: i32) -> Plan {
    harness.server.ledger.entitlement(user_id).await.unwrap().plan
}

#[tokio::test]
async fn test_stripe_subscription_upgrades_account() {
    let harness = TestHarness::new().await;
    let (user, _) = harness.user("subscriber@example.com", Plan::Free).await;

    let payload = subscription_event("customer.subscription.updated", user.id, "pro");
    let signature = sign_payload(
        payload.as_bytes(),
        TEST_STRIPE_WEBHOOK_SECRET,
        chrono::Utc::now().timestamp(),
    )
    .unwrap();

    let (status, body) = harness.send(stripe_request(&payload, Some(&signature))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "applied");
    assert_eq!(body["plan"], "pro");
    assert_eq!(plan_of(&harness, user.id).await, Plan::Pro);

    let cancelled = subscription_event("customer.subscription.deleted", user.id, "pro");
    let signature = sign_payload(
        cancelled.as_bytes(),
        TEST_STRIPE_WEBHOOK_SECRET,
        chrono::Utc::now().timestamp(),
    )
    .unwrap();
    let (status, _) = harness.send(stripe_request(&cancelled, Some(&signature))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(plan_of(&harness, user.id).await, Plan::Free);
}

#[tokio::test]
async fn test_stripe_rejects_bad_or_missing_signature() {
    let harness = TestHarness::new().await;
    let (user, _) = harness.user("victim@example.com", Plan::Free).await;
    let payload = subscription_event("customer.subscription.updated", user.id, "enterprise");

    let forged = sign_payload(payload.as_bytes(), "whsec_wrong", chrono::Utc::now().timestamp())
        .unwrap();
    let (status, _) = harness.send(stripe_request(&payload, Some(&forged))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = harness.send(stripe_request(&payload, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(plan_of(&harness, user.id).await, Plan::Free);
}

#[tokio::test]
async fn test_stripe_unknown_event_is_ignored() {
    let harness = TestHarness::new().await;
    let payload = json!({"id": "evt_1", "type": "charge.refunded", "data": {"object": {}}}).to_string();
    let signature = sign_payload(
        payload.as_bytes(),
        TEST_STRIPE_WEBHOOK_SECRET,
        chrono::Utc::now().timestamp(),
    )
    .unwrap();

    let (status, body) = harness.send(stripe_request(&payload, Some(&signature))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ignored");
}

fn approved_transaction(email: &str, amount: u64) -> Value {
    json!({
        "id": "1234-1610641025-49201",
        "status": "APPROVED",
        "amount_in_cents": amount,
        "reference": "ref-1",
        "customer_email": email
    })
}

#[tokio::test]
async fn test_wompi_approved_payment_upgrades_account() {
    let harness = TestHarness::new().await;
    let (user, token) = harness.user_with_usage("payer@example.com", Plan::Free, 10).await;
    assert_eq!(harness.generate(&token).await.0, StatusCode::PAYMENT_REQUIRED);

    let event = signed_event(
        "transaction.updated",
        approved_transaction("payer@example.com", 2900),
        chrono::Utc::now().timestamp(),
        TEST_WOMPI_EVENTS_SECRET,
    )
    .unwrap();

    let (status, body) = harness.post("/api/v1/webhooks/wompi", None, event).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "applied");
    assert_eq!(plan_of(&harness, user.id).await, Plan::Pro);

    // Usage carries over, but the new limit leaves room
    assert_eq!(harness.used(user.id).await, 10);
    assert_eq!(harness.generate(&token).await.0, StatusCode::OK);
}

#[tokio::test]
async fn test_wompi_tampered_event_rejected() {
    let harness = TestHarness::new().await;
    let (user, _) = harness.user("cheap@example.com", Plan::Free).await;

    let mut event = signed_event(
        "transaction.updated",
        approved_transaction("cheap@example.com", 2900),
        chrono::Utc::now().timestamp(),
        TEST_WOMPI_EVENTS_SECRET,
    )
    .unwrap();
    event["data"]["transaction"]["amount_in_cents"] = json!(9900);

    let (status, _) = harness.post("/api/v1/webhooks/wompi", None, event).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(plan_of(&harness, user.id).await, Plan::Free);
}

#[tokio::test]
async fn test_wompi_unmatched_amount_is_acknowledged_without_change() {
    let harness = TestHarness::new().await;
    let (user, _) = harness.user("odd@example.com", Plan::Free).await;

    let event = signed_event(
        "transaction.updated",
        approved_transaction("odd@example.com", 1234),
        chrono::Utc::now().timestamp(),
        TEST_WOMPI_EVENTS_SECRET,
    )
    .unwrap();

    let (status, body) = harness.post("/api/v1/webhooks/wompi", None, event).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "acknowledged");
    assert_eq!(plan_of(&harness, user.id).await, Plan::Free);
}
