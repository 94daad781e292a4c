//! End-to-end pipeline tests against a real SQLite store: reference issuance, verification
//! replay, the dedup guarantees, and the queue-level idempotency key.
use chrono::Utc;
use fulfillment_engine::{
    events::EventProducers,
    pricing::DeliveryMethod,
    test_utils::{prepare_env::prepare_test_env, seed},
    traits::{BasketStore, FulfillmentDatabase, FulfillmentError, TaskQueue},
    CheckoutApi,
    FulfillmentApi,
    SqliteDatabase,
};
use mps_common::{Money, VerifiedPayment, NGN_CURRENCY_CODE};

fn verified() -> VerifiedPayment {
    VerifiedPayment {
        paid_at: Utc::now(),
        channel: "card".to_string(),
        currency: NGN_CURRENCY_CODE.to_string(),
        fees: Money::from(15_000),
        card_type: Some("visa".to_string()),
        bank: Some("Test Bank".to_string()),
        country_code: Some("NG".to_string()),
        gateway_response: "Successful".to_string(),
        log: serde_json::json!({"status": "success"}),
    }
}

async fn setup(url: &str) -> SqliteDatabase {
    prepare_test_env(url).await;
    let db = SqliteDatabase::new_with_url(url, 5).await.expect("Error creating database");
    seed::seed_buyer(&db, "buyer-1", "Ada Obi", "ada@example.com").await;
    seed::seed_shop(&db, "shop-1", "Aso Oke & Co", "owner-1").await;
    seed::seed_shop(&db, "shop-2", "Gele World", "owner-2").await;
    seed::seed_product(&db, "prod-1", "shop-1", "sku-1", Money::from_naira(5_000), 10, false).await;
    seed::seed_product(&db, "prod-2", "shop-2", "sku-2", Money::from_naira(3_000), 4, false).await;
    let address = seed::seed_address(&db, "buyer-1").await;
    let basket = seed::seed_basket(&db, "buyer-1", address).await;
    seed::seed_basket_item(&db, basket, "prod-1", "sku-1", 1).await;
    seed::seed_basket_item(&db, basket, "prod-2", "sku-2", 1).await;
    db
}

#[tokio::test]
async fn reference_is_stable_across_checkout_calls() {
    let url = "sqlite://../data/test_reference_stability.db";
    let db = setup(url).await;
    let api = CheckoutApi::new(db);

    let (first, inserted) = api
        .issue_reference("buyer-1", "NG", DeliveryMethod::Standard, NGN_CURRENCY_CODE)
        .await
        .expect("Error issuing reference");
    assert!(inserted);
    assert_eq!(first.total, Money::from_naira(9_000));
    assert_eq!(first.items_total, Money::from_naira(8_000));
    assert_eq!(first.delivery_fee, Money::from_naira(1_000));

    let (second, inserted) = api
        .issue_reference("buyer-1", "NG", DeliveryMethod::Standard, NGN_CURRENCY_CODE)
        .await
        .expect("Error re-issuing reference");
    assert!(!inserted);
    assert_eq!(second.reference, first.reference);
    assert_eq!(second.id, first.id);
}

#[tokio::test]
async fn voucher_reduces_the_charged_total() {
    let url = "sqlite://../data/test_voucher_pricing.db";
    let db = setup(url).await;
    let basket = db.fetch_basket_for_buyer("buyer-1").await.unwrap().unwrap();
    seed::seed_voucher(&db, "WELCOME2000", "buyer-1", Money::from_naira(2_000), basket.id).await;

    let api = CheckoutApi::new(db);
    let (_, costing) =
        api.price_basket_for_buyer("buyer-1", "NG", DeliveryMethod::Standard).await.expect("Error pricing basket");
    assert_eq!(costing.total, Money::from_naira(7_000));
    assert_eq!(costing.total_without_voucher, Money::from_naira(9_000));
}

#[tokio::test]
async fn second_verification_returns_the_same_order() {
    let url = "sqlite://../data/test_repeat_verification.db";
    let db = setup(url).await;
    let checkout = CheckoutApi::new(db.clone());
    let (payment, _) =
        checkout.issue_reference("buyer-1", "NG", DeliveryMethod::Standard, NGN_CURRENCY_CODE).await.unwrap();

    let api = FulfillmentApi::new(db.clone(), EventProducers::default());
    let first = api.process_payment(&payment.reference, &verified()).await.expect("First verification failed");
    assert!(!first.already_processed);
    assert_eq!(first.payment.status.to_string(), "Success");
    assert_eq!(first.product_orders.len(), 2);
    assert_eq!(first.added_points, 8);

    // the frontend retry, 50ms later
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let second = api.process_payment(&payment.reference, &verified()).await.expect("Second verification failed");
    assert!(second.already_processed);
    assert_eq!(second.order.order_id, first.order.order_id);
    assert_eq!(second.added_points, first.added_points);

    // exactly one job in the queue for this reference
    let job = db.fetch_job(&payment.reference).await.unwrap().expect("No job enqueued");
    assert_eq!(job.job_id, payment.reference);
    assert!(!db.enqueue_job(&payment.reference, &job.tasks).await.unwrap(), "duplicate enqueue must be rejected");
}

#[tokio::test]
async fn fulfillment_decrements_stock_and_clears_the_basket() {
    let url = "sqlite://../data/test_fulfillment_side_effects.db";
    let db = setup(url).await;
    let checkout = CheckoutApi::new(db.clone());
    let (payment, _) =
        checkout.issue_reference("buyer-1", "NG", DeliveryMethod::Standard, NGN_CURRENCY_CODE).await.unwrap();

    let api = FulfillmentApi::new(db.clone(), EventProducers::default());
    let outcome = api.process_payment(&payment.reference, &verified()).await.expect("Verification failed");

    assert_eq!(seed::variation_quantity(&db, "prod-1", "sku-1").await, 9);
    assert_eq!(seed::variation_quantity(&db, "prod-2", "sku-2").await, 3);
    assert!(db.fetch_basket_for_buyer("buyer-1").await.unwrap().is_none(), "basket must be deleted");

    // prices locked at catalog price at fulfillment time
    let prices: Vec<Money> = outcome.product_orders.iter().map(|po| po.unit_price).collect();
    assert!(prices.contains(&Money::from_naira(5_000)));
    assert!(prices.contains(&Money::from_naira(3_000)));
    // vendor revenue carries the commission deduction
    let revenue: Money = outcome.product_orders.iter().map(|po| po.shop_revenue).sum();
    assert_eq!(revenue, Money::from_naira(7_200));
}

#[tokio::test]
async fn bespoke_lines_are_exempt_from_stock_tracking() {
    let url = "sqlite://../data/test_bespoke_exemption.db";
    prepare_test_env(url).await;
    let db = SqliteDatabase::new_with_url(url, 5).await.unwrap();
    seed::seed_buyer(&db, "buyer-1", "Ada Obi", "ada@example.com").await;
    seed::seed_shop(&db, "shop-1", "Aso Oke & Co", "owner-1").await;
    seed::seed_product(&db, "prod-made", "shop-1", "sku-m", Money::from_naira(12_000), 0, true).await;
    let address = seed::seed_address(&db, "buyer-1").await;
    let basket = seed::seed_basket(&db, "buyer-1", address).await;
    seed::seed_basket_item(&db, basket, "prod-made", "sku-m", 2).await;

    let checkout = CheckoutApi::new(db.clone());
    let (payment, _) =
        checkout.issue_reference("buyer-1", "NG", DeliveryMethod::Standard, NGN_CURRENCY_CODE).await.unwrap();
    let api = FulfillmentApi::new(db.clone(), EventProducers::default());
    let outcome = api.process_payment(&payment.reference, &verified()).await.expect("Verification failed");

    assert_eq!(outcome.product_orders.len(), 1);
    // quantity was zero and stays zero; bespoke stock is never decremented
    assert_eq!(seed::variation_quantity(&db, "prod-made", "sku-m").await, 0);
}

#[tokio::test]
async fn exchange_rates_convert_for_display_only() {
    use fulfillment_engine::{exchange_objects::ExchangeRate, ExchangeRateApi};

    let url = "sqlite://../data/test_exchange_rates.db";
    prepare_test_env(url).await;
    let db = SqliteDatabase::new_with_url(url, 5).await.unwrap();
    let fx = ExchangeRateApi::new(db);

    assert!(fx.fetch_last_rate("USD").await.is_err(), "no rate cached yet");
    fx.set_exchange_rate(&ExchangeRate::new("USD".to_string(), 0.00065)).await.unwrap();
    fx.set_exchange_rate(&ExchangeRate::new("USD".to_string(), 0.0007)).await.unwrap();

    // the most recent rate wins
    let rate = fx.fetch_last_rate("USD").await.unwrap();
    assert!((rate.rate - 0.0007).abs() < 1e-12);
    let display = rate.convert(Money::from_naira(10_000));
    assert!((display - 7.0).abs() < 1e-9);
}

#[tokio::test]
async fn unknown_reference_is_not_found() {
    let url = "sqlite://../data/test_unknown_reference.db";
    let db = setup(url).await;
    let api = FulfillmentApi::new(db, EventProducers::default());
    let err = api.process_payment("MPS-DOESNOTEXIST", &verified()).await.unwrap_err();
    assert!(matches!(err, FulfillmentError::PaymentNotFound(_)));
}

#[tokio::test]
async fn verification_metadata_is_never_overwritten() {
    let url = "sqlite://../data/test_metadata_monotonic.db";
    let db = setup(url).await;
    let checkout = CheckoutApi::new(db.clone());
    let (payment, _) =
        checkout.issue_reference("buyer-1", "NG", DeliveryMethod::Standard, NGN_CURRENCY_CODE).await.unwrap();

    let first = verified();
    let (confirmed, flipped) = db.confirm_payment(&payment.reference, &first).await.unwrap();
    assert!(flipped);
    assert_eq!(confirmed.channel.as_deref(), Some("card"));

    let mut replay = verified();
    replay.channel = "bank_transfer".to_string();
    let (unchanged, flipped) = db.confirm_payment(&payment.reference, &replay).await.unwrap();
    assert!(!flipped);
    // the first verification's metadata wins; status never leaves Success
    assert_eq!(unchanged.channel.as_deref(), Some("card"));
    assert_eq!(unchanged.status.to_string(), "Success");
}
