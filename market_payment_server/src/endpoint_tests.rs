//! HTTP-level tests for the checkout and webhook surfaces. These run against a real SQLite
//! store; only paths that would leave the process (gateway verification, collaborator calls) are
//! out of scope here and covered by the engine and gateway crates' own tests.
use actix_web::{http::StatusCode, test, web, App};
use fulfillment_engine::{
    events::EventProducers,
    test_utils::{prepare_env::prepare_test_env, seed},
    CheckoutApi,
    ExchangeRateApi,
    FulfillmentApi,
    SqliteDatabase,
};
use gateway_tools::GatewayConfig;
use mps_common::Money;

use crate::{
    config::ServerOptions,
    integrations::gateways::GatewaySelector,
    routes::{health, CheckoutReferenceRoute, VerifyPaymentRoute},
    stripe_routes::StripeWebhookRoute,
};

async fn test_db(url: &str) -> SqliteDatabase {
    prepare_test_env(url).await;
    let db = SqliteDatabase::new_with_url(url, 5).await.expect("Error creating database");
    seed::seed_buyer(&db, "buyer-1", "Ada Obi", "ada@example.com").await;
    seed::seed_shop(&db, "shop-1", "Aso Oke & Co", "owner-1").await;
    seed::seed_product(&db, "prod-1", "shop-1", "sku-1", Money::from_naira(5_000), 10, false).await;
    let address = seed::seed_address(&db, "buyer-1").await;
    let basket = seed::seed_basket(&db, "buyer-1", address).await;
    seed::seed_basket_item(&db, basket, "prod-1", "sku-1", 1).await;
    db
}

macro_rules! test_app {
    ($db:expr) => {{
        let selector = GatewaySelector::new(&GatewayConfig::default()).expect("Error building gateway clients");
        test::init_service(
            App::new()
                .app_data(web::Data::new(FulfillmentApi::new($db.clone(), EventProducers::default())))
                .app_data(web::Data::new(CheckoutApi::new($db.clone())))
                .app_data(web::Data::new(ExchangeRateApi::new($db.clone())))
                .app_data(web::Data::new(selector))
                .app_data(web::Data::new(ServerOptions { use_x_forwarded_for: false, use_forwarded: false }))
                .service(health)
                .service(CheckoutReferenceRoute::<SqliteDatabase, SqliteDatabase>::new())
                .service(VerifyPaymentRoute::<SqliteDatabase>::new())
                .service(StripeWebhookRoute::<SqliteDatabase>::new()),
        )
        .await
    }};
}

#[actix_web::test]
async fn health_answers() {
    let db = test_db("sqlite://../data/test_endpoint_health.db").await;
    let app = test_app!(db);
    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn reference_requires_identity_headers() {
    let db = test_db("sqlite://../data/test_endpoint_identity.db").await;
    let app = test_app!(db);
    let req = test::TestRequest::get().uri("/checkout/reference?country=NG").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn reference_is_issued_for_the_ngn_flow() {
    let db = test_db("sqlite://../data/test_endpoint_reference.db").await;
    let app = test_app!(db);
    let req = test::TestRequest::get()
        .uri("/checkout/reference?country=NG&method=standard")
        .insert_header(("x-buyer-id", "buyer-1"))
        .insert_header(("x-buyer-name", "Ada Obi"))
        .insert_header(("x-buyer-email", "ada@example.com"))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert!(body["reference"].as_str().unwrap().starts_with("MPS-"));
    assert_eq!(body["currency"], "NGN");
    // NGN 5,000 items + NGN 1,000 standard delivery, in kobo
    assert_eq!(body["amount"], 600_000);
    assert_eq!(body["payment_status"], "Pending");
    assert_eq!(body["full_name"], "Ada Obi");
    assert!(body.get("stripe_client_secret").is_none(), "NGN flow must not mint a Stripe intent");
}

#[actix_web::test]
async fn verifying_an_unknown_reference_is_not_found() {
    let db = test_db("sqlite://../data/test_endpoint_verify_404.db").await;
    let app = test_app!(db);
    let req = test::TestRequest::post()
        .uri("/checkout/verify")
        .set_json(serde_json::json!({"reference": "MPS-DOESNOTEXIST"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn verifying_without_a_reference_is_rejected() {
    let db = test_db("sqlite://../data/test_endpoint_verify_400.db").await;
    let app = test_app!(db);
    let req = test::TestRequest::post()
        .uri("/checkout/verify")
        .set_json(serde_json::json!({"reference": "  "}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

fn stripe_signature(payload: &[u8], secret: &str) -> String {
    use hmac::{Hmac, Mac};
    let timestamp = chrono::Utc::now().timestamp();
    let mut mac = Hmac::<sha2::Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{timestamp}.").as_bytes());
    mac.update(payload);
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}

#[actix_web::test]
async fn a_signed_webhook_drives_fulfillment_and_replays_are_deduped() {
    use fulfillment_engine::traits::{FulfillmentDatabase, TaskQueue};

    let db = test_db("sqlite://../data/test_endpoint_webhook_flow.db").await;
    let app = test_app!(db);

    // the checkout front door first: USD routes to Stripe, but without a cached rate or a live
    // gateway the intent cannot be minted here, so seed the pending payment the direct way
    let checkout = CheckoutApi::new(db.clone());
    let (payment, _) = checkout
        .issue_reference("buyer-1", "NG", fulfillment_engine::pricing::DeliveryMethod::Standard, "USD")
        .await
        .unwrap();
    db.attach_stripe_intent(&payment.reference, "pi_3PtTestIntent", "pi_3PtTestIntent_secret_x").await.unwrap();

    let event = serde_json::json!({
        "type": "payment_intent.succeeded",
        "data": { "object": {
            "id": "pi_3PtTestIntent",
            "status": "succeeded",
            "currency": "usd",
            "metadata": { "reference": payment.reference },
            "latest_charge": {
                "id": "ch_3PtTestCharge",
                "status": "succeeded",
                "created": chrono::Utc::now().timestamp(),
                "payment_method_details": { "type": "card", "card": { "brand": "visa", "country": "US" } },
                "balance_transaction": { "fee": 59 },
                "outcome": { "seller_message": "Payment complete." }
            }
        }}
    })
    .to_string();
    // GatewayConfig::default() leaves the webhook secret empty; sign with the same
    let header = stripe_signature(event.as_bytes(), "");

    for _ in 0..2 {
        // the gateway redelivers; both deliveries must be acknowledged
        let req = test::TestRequest::post()
            .uri("/webhook/stripe")
            .insert_header(("stripe-signature", header.clone()))
            .set_payload(event.clone())
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["received"], true);
    }

    let paid = db.fetch_payment_by_reference(&payment.reference).await.unwrap().unwrap();
    assert_eq!(paid.status.to_string(), "Success");
    let order = db.fetch_order_by_payment_id(paid.id).await.unwrap().expect("webhook must create the order");
    // one queue job for the reference, however many times the event landed
    let job = db.fetch_job(&payment.reference).await.unwrap().expect("no job enqueued");
    assert_eq!(job.job_id, payment.reference);
    assert_eq!(order.buyer_id, "buyer-1");
}

#[actix_web::test]
async fn webhook_always_acknowledges() {
    let db = test_db("sqlite://../data/test_endpoint_webhook_ack.db").await;
    let app = test_app!(db);
    // no signature header at all: internally rejected, externally acknowledged
    let req = test::TestRequest::post()
        .uri("/webhook/stripe")
        .set_payload(r#"{"type":"payment_intent.succeeded"}"#)
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["received"], true);

    // a garbage signature fares no better, and no worse
    let req = test::TestRequest::post()
        .uri("/webhook/stripe")
        .insert_header(("stripe-signature", "t=0,v1=deadbeef"))
        .set_payload(r#"{"type":"payment_intent.succeeded"}"#)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}
