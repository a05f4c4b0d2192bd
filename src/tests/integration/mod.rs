//! Integration tests for the HTTP surface
//!
//! Requests go through the full route tree with `warp::test`, over the
//! mock gateway and notifier and a fresh in-memory repository per test.
//! Customer routes carry a token for the customer in the path; batch and
//! sweep routes carry a service token.

use rust_decimal_macros::dec;
use serde_json::{json, Value};
use uuid::Uuid;
use warp::http::StatusCode;
use warp::test::request;

use crate::{
    infrastructure::adapters::{BillingRepository, SIGNATURE_HEADER},
    tests::{common::TestHarness, fixtures, TestResult},
};

fn body_json(body: &[u8]) -> Value {
    serde_json::from_slice(body).expect("response body should be JSON")
}

#[tokio::test]
async fn test_payment_method_lifecycle_over_http() -> TestResult<()> {
    let harness = TestHarness::new();
    let (customer, _) = harness.seed_customer_with_order().await;
    let routes = harness.routes();
    let token = harness.customer_token(customer.id);

    let res = request()
        .method("POST")
        .path(&format!("/payment-methods/{}", customer.id))
        .header("authorization", token.as_str())
        .json(&fixtures::add_card(true))
        .reply(&routes)
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let card = body_json(res.body());
    assert_eq!(card["display_name"], "VISA Card ***4242");
    assert!(card.get("encrypted_details").is_none());
    let card_id = card["id"].as_str().unwrap_or_default().to_string();

    let res = request()
        .method("POST")
        .path(&format!("/payment-methods/{}", customer.id))
        .header("authorization", token.as_str())
        .json(&fixtures::add_eft(false))
        .reply(&routes)
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let eft_id = body_json(res.body())["id"].as_str().unwrap_or_default().to_string();

    let res = request()
        .method("GET")
        .path(&format!("/payment-methods/{}", customer.id))
        .header("authorization", token.as_str())
        .reply(&routes)
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let listed = body_json(res.body());
    assert_eq!(listed.as_array().map(Vec::len), Some(2));
    assert_eq!(listed[0]["id"], card_id.as_str());

    let res = request()
        .method("PUT")
        .path(&format!("/payment-methods/{}/{}/primary", customer.id, eft_id))
        .header("authorization", token.as_str())
        .reply(&routes)
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = request()
        .method("GET")
        .path(&format!("/payment-methods/{}/primary", customer.id))
        .header("authorization", token.as_str())
        .reply(&routes)
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res.body())["id"], eft_id.as_str());

    let res = request()
        .method("DELETE")
        .path(&format!("/payment-methods/{}/{}", customer.id, card_id))
        .header("authorization", token.as_str())
        .reply(&routes)
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res.body())["removed"], true);

    Ok(())
}

#[tokio::test]
async fn test_removing_primary_with_balance_returns_conflict() -> TestResult<()> {
    let harness = TestHarness::new();
    let customer = fixtures::customer_with_balance(dec!(200));
    harness.repo.seed_customer(customer.clone()).await;
    let card = harness.services.store.add(customer.id, fixtures::add_card(true)).await?;

    let res = request()
        .method("DELETE")
        .path(&format!("/payment-methods/{}/{}", customer.id, card.id))
        .header("authorization", harness.customer_token(customer.id))
        .reply(&harness.routes())
        .await;

    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert_eq!(
        body_json(res.body())["error"],
        "Set a different primary payment method before removing this one"
    );
    Ok(())
}

#[tokio::test]
async fn test_mandate_flow_over_http() -> TestResult<()> {
    let harness = TestHarness::new();
    let (customer, order) = harness.seed_customer_with_order().await;
    let routes = harness.routes();
    let customer_token = harness.customer_token(customer.id);
    let service_token = harness.service_token();

    let res = request()
        .method("POST")
        .path("/mandates")
        .header("authorization", customer_token.as_str())
        .json(&json!({
            "order_id": order.id,
            "mandate_amount": "599.00",
            "debit_frequency": "monthly",
            "debit_day": 25,
            "notes": "Fibre 50Mbps"
        }))
        .reply(&routes)
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let created = body_json(res.body());
    assert_eq!(created["status"], "sent");
    assert_eq!(created["account_reference"], fixtures::ACCOUNT_REFERENCE);
    assert_eq!(
        created["signing_url"],
        format!("https://portal.example.test/orders/{}/mandate", order.id).as_str()
    );

    let res = request()
        .method("GET")
        .path(&format!("/mandates/{}/load-report", order.id))
        .header("authorization", service_token.as_str())
        .reply(&routes)
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res.body())["result"], "successful");

    let postback = serde_json::to_vec(&fixtures::signed_postback(order.id))?;
    let res = request()
        .method("POST")
        .path("/webhooks/netcash/mandate")
        .header(SIGNATURE_HEADER, format!("sha256={}", harness.sign(&postback)))
        .body(postback)
        .reply(&routes)
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res.body())["outcome"], "signed");

    let res = request()
        .method("GET")
        .path(&format!("/mandates/{}", order.id))
        .header("authorization", customer_token.as_str())
        .reply(&routes)
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let status = body_json(res.body());
    assert_eq!(status["status"], "signed");
    assert_eq!(status["payment_method"]["display_name"], "Debit Order - FNB ***1234");
    assert_eq!(status["payment_method"]["is_primary"], true);

    let res = request()
        .method("POST")
        .path("/mandates/sweep")
        .header("authorization", service_token.as_str())
        .reply(&routes)
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res.body())["expired"], 0);

    Ok(())
}

#[tokio::test]
async fn test_gateway_failure_maps_to_bad_gateway() -> TestResult<()> {
    let harness = TestHarness::new();
    let (customer, order) = harness.seed_customer_with_order().await;
    harness
        .gateway
        .fail_submissions_with(crate::shared::error::AppError::gateway("102", "Invalid service key"))
        .await;

    let res = request()
        .method("POST")
        .path("/mandates")
        .header("authorization", harness.customer_token(customer.id))
        .json(&fixtures::initiate_request(order.id))
        .reply(&harness.routes())
        .await;

    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(
        body_json(res.body())["error"],
        "Could not complete the request with the payment provider"
    );
    Ok(())
}

#[tokio::test]
async fn test_failed_collection_and_settlement_over_http() -> TestResult<()> {
    let harness = TestHarness::new();
    let (_, invoice) = harness.seed_customer_with_invoice().await;
    let routes = harness.routes();

    let res = request()
        .method("POST")
        .path("/collections/failed")
        .header("authorization", harness.service_token())
        .json(&fixtures::failed_collection(invoice.id))
        .reply(&routes)
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let outcome = body_json(res.body());
    assert_eq!(outcome["amount"], "599");
    assert_eq!(outcome["email"]["success"], true);
    assert_eq!(outcome["sms"]["success"], true);
    let reference = outcome["transaction_reference"].as_str().unwrap_or_default().to_string();

    let notice = serde_json::to_vec(&fixtures::pay_now_notice(&reference, 59900, true))?;
    let signature = harness.sign(&notice);
    for expected in ["settled", "duplicate", "duplicate"] {
        let res = request()
            .method("POST")
            .path("/webhooks/netcash/paynow")
            .header(SIGNATURE_HEADER, signature.as_str())
            .body(notice.clone())
            .reply(&routes)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res.body())["outcome"], expected);
    }

    let stored = harness.repo.get_invoice(invoice.id).await?.unwrap();
    assert_eq!(stored.status, crate::domain::billing::InvoiceStatus::Paid);
    Ok(())
}

#[tokio::test]
async fn test_uncollectable_sweep_over_http() -> TestResult<()> {
    let harness = TestHarness::new();
    let (_, invoice) = harness.seed_customer_with_invoice().await;

    let res = request()
        .method("POST")
        .path("/collections/uncollectable")
        .header("authorization", harness.service_token())
        .json(&json!({}))
        .reply(&harness.routes())
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let summary = body_json(res.body());
    assert_eq!(summary["examined"], 1);
    assert_eq!(summary["issued"][0]["invoice_id"], invoice.id.to_string().as_str());
    assert_eq!(harness.notifier.sms().await.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_invalid_collection_report_is_bad_request() {
    let harness = TestHarness::new();
    let res = request()
        .method("POST")
        .path("/collections/failed")
        .header("authorization", harness.service_token())
        .json(&json!({ "invoice_id": Uuid::new_v4(), "reason": "" }))
        .reply(&harness.routes())
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let harness = TestHarness::new();
    let res = request()
        .method("POST")
        .path("/mandates")
        .header("authorization", harness.service_token())
        .header("content-type", "application/json")
        .body("{\"order_id\": ")
        .reply(&harness.routes())
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(res.body())["error"].is_string());
}

#[tokio::test]
async fn test_unknown_route_is_json_not_found() {
    let harness = TestHarness::new();
    let res = request().method("GET").path("/nope").reply(&harness.routes()).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert!(body_json(res.body())["error"].is_string());
}

#[tokio::test]
async fn test_unknown_order_status_is_not_found() {
    let harness = TestHarness::new();
    let res = request()
        .method("GET")
        .path(&format!("/mandates/{}", Uuid::new_v4()))
        .header("authorization", harness.customer_token(Uuid::new_v4()))
        .reply(&harness.routes())
        .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_and_metrics_endpoints() {
    let harness = TestHarness::new();
    let routes = harness.routes();

    let res = request().method("GET").path("/health").reply(&routes).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res.body())["status"], "degraded");

    harness.services.metrics.record_webhook("paynow", "settled");
    let res = request().method("GET").path("/metrics").reply(&routes).await;
    assert_eq!(res.status(), StatusCode::OK);
    let text = String::from_utf8_lossy(res.body());
    assert!(text.contains("webhooks_total"));
}
