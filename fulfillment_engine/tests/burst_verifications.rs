//! Burst tests: duplicate verification signals arriving at a sustained rate must produce exactly
//! one order, one queue job, and exactly the stock decrements the orders imply.
use std::time::Duration;

use chrono::Utc;
use fulfillment_engine::{
    events::EventProducers,
    pricing::DeliveryMethod,
    test_utils::{prepare_env::prepare_test_env, seed},
    traits::{FulfillmentError, TaskQueue},
    CheckoutApi,
    FulfillmentApi,
    SqliteDatabase,
};
use log::*;
use mps_common::{Money, VerifiedPayment, NGN_CURRENCY_CODE};
use tokio::runtime::Runtime;

const NUM_SIGNALS: u64 = 20;
const RATE: u64 = 100; // signals per second

fn verified() -> VerifiedPayment {
    VerifiedPayment {
        paid_at: Utc::now(),
        channel: "card".to_string(),
        currency: NGN_CURRENCY_CODE.to_string(),
        fees: Money::from(15_000),
        card_type: None,
        bank: None,
        country_code: Some("NG".to_string()),
        gateway_response: "Successful".to_string(),
        log: serde_json::json!({"status": "success"}),
    }
}

#[test]
fn duplicate_signal_burst_yields_one_order() {
    info!("🚀️ Starting duplicate signal burst test");

    let sys = Runtime::new().unwrap();
    let delay = Duration::from_millis(1000 / RATE);

    sys.block_on(async move {
        let url = "sqlite://../data/test_burst_duplicates.db";
        prepare_test_env(url).await;
        let db = SqliteDatabase::new_with_url(url, 5).await.expect("Error creating database");
        seed::seed_buyer(&db, "buyer-1", "Ada Obi", "ada@example.com").await;
        seed::seed_shop(&db, "shop-1", "Aso Oke & Co", "owner-1").await;
        seed::seed_product(&db, "prod-1", "shop-1", "sku-1", Money::from_naira(5_000), 100, false).await;
        let address = seed::seed_address(&db, "buyer-1").await;
        let basket = seed::seed_basket(&db, "buyer-1", address).await;
        seed::seed_basket_item(&db, basket, "prod-1", "sku-1", 2).await;

        let checkout = CheckoutApi::new(db.clone());
        let (payment, _) =
            checkout.issue_reference("buyer-1", "NG", DeliveryMethod::Standard, NGN_CURRENCY_CODE).await.unwrap();
        let api = FulfillmentApi::new(db.clone(), EventProducers::default());

        let mut timer = tokio::time::interval(delay);
        let mut created = 0u64;
        let mut replayed = 0u64;
        info!("🚀️ Injecting {NUM_SIGNALS} duplicate verification signals for [{}]", payment.reference);
        let mut order_id = None;
        for i in 0..NUM_SIGNALS {
            timer.tick().await;
            let outcome = api
                .process_payment(&payment.reference, &verified())
                .await
                .unwrap_or_else(|e| panic!("Error processing signal {i}: {e}"));
            match order_id {
                None => order_id = Some(outcome.order.order_id.clone()),
                Some(ref oid) => assert_eq!(&outcome.order.order_id, oid, "a different order appeared on signal {i}"),
            }
            if outcome.already_processed {
                replayed += 1;
            } else {
                created += 1;
            }
        }
        assert_eq!(created, 1, "exactly one signal may create the order");
        assert_eq!(replayed, NUM_SIGNALS - 1);

        // only the two ordered units left the shelf, once
        assert_eq!(seed::variation_quantity(&db, "prod-1", "sku-1").await, 98);
        // and the queue holds exactly one job for the reference
        let job = db.fetch_job(&payment.reference).await.unwrap().expect("No job enqueued");
        assert_eq!(job.attempts, 0);
    });
    info!("🚀️ test complete");
}

#[test]
fn stock_floor_rejects_the_oversold_buyer() {
    let sys = Runtime::new().unwrap();

    sys.block_on(async move {
        let url = "sqlite://../data/test_burst_stock_floor.db";
        prepare_test_env(url).await;
        let db = SqliteDatabase::new_with_url(url, 5).await.expect("Error creating database");
        seed::seed_shop(&db, "shop-1", "Aso Oke & Co", "owner-1").await;
        // a single unit on the shelf, wanted by two buyers
        seed::seed_product(&db, "prod-rare", "shop-1", "sku-r", Money::from_naira(20_000), 1, false).await;

        let checkout = CheckoutApi::new(db.clone());
        let api = FulfillmentApi::new(db.clone(), EventProducers::default());
        let mut references = Vec::new();
        for buyer in ["buyer-a", "buyer-b"] {
            seed::seed_buyer(&db, buyer, "Test Buyer", "buyer@example.com").await;
            let address = seed::seed_address(&db, buyer).await;
            let basket = seed::seed_basket(&db, buyer, address).await;
            seed::seed_basket_item(&db, basket, "prod-rare", "sku-r", 1).await;
            let (payment, _) =
                checkout.issue_reference(buyer, "NG", DeliveryMethod::Standard, NGN_CURRENCY_CODE).await.unwrap();
            references.push(payment.reference);
        }

        let first = api.process_payment(&references[0], &verified()).await;
        let second = api.process_payment(&references[1], &verified()).await;

        assert!(first.is_ok(), "the first buyer gets the unit");
        // the second buyer's payment succeeded but the order cannot be created; this is the
        // reconciliation path, not a silent failure
        let err = second.unwrap_err();
        assert!(matches!(err, FulfillmentError::OrderCreationFailed { .. }), "unexpected error: {err}");

        // stock never goes negative, and the sum of decrements equals the units actually ordered
        assert_eq!(seed::variation_quantity(&db, "prod-rare", "sku-r").await, 0);
    });
}
