//! Seed helpers for tests: the catalog, buyer and basket state that, in production, the wider
//! application writes before the pipeline ever runs.
use mps_common::Money;

use crate::SqliteDatabase;

pub async fn seed_buyer(db: &SqliteDatabase, buyer_id: &str, full_name: &str, email: &str) {
    sqlx::query("INSERT INTO buyers (buyer_id, full_name, email) VALUES ($1, $2, $3)")
        .bind(buyer_id)
        .bind(full_name)
        .bind(email)
        .execute(db.pool())
        .await
        .expect("Error seeding buyer");
}

pub async fn seed_shop(db: &SqliteDatabase, shop_id: &str, name: &str, owner_id: &str) {
    sqlx::query("INSERT INTO shops (shop_id, name, owner_id) VALUES ($1, $2, $3)")
        .bind(shop_id)
        .bind(name)
        .bind(owner_id)
        .execute(db.pool())
        .await
        .expect("Error seeding shop");
}

pub async fn seed_product(
    db: &SqliteDatabase,
    product_id: &str,
    shop_id: &str,
    sku: &str,
    price: Money,
    quantity: i64,
    bespoke: bool,
) {
    sqlx::query("INSERT OR IGNORE INTO products (product_id, shop_id, name) VALUES ($1, $2, $3)")
        .bind(product_id)
        .bind(shop_id)
        .bind(format!("{product_id} test product"))
        .execute(db.pool())
        .await
        .expect("Error seeding product");
    sqlx::query("INSERT INTO product_variations (product_id, sku, price, quantity, bespoke) VALUES ($1, $2, $3, $4, $5)")
        .bind(product_id)
        .bind(sku)
        .bind(price)
        .bind(quantity)
        .bind(bespoke)
        .execute(db.pool())
        .await
        .expect("Error seeding variation");
}

pub async fn seed_address(db: &SqliteDatabase, buyer_id: &str) -> i64 {
    let row: (i64,) = sqlx::query_as(
        "INSERT INTO delivery_addresses (buyer_id, recipient, line1, city, country) VALUES ($1, $2, $3, $4, $5) \
         RETURNING id",
    )
    .bind(buyer_id)
    .bind("Test Recipient")
    .bind("1 Marina Road")
    .bind("Lagos")
    .bind("NG")
    .fetch_one(db.pool())
    .await
    .expect("Error seeding address");
    row.0
}

pub async fn seed_basket(db: &SqliteDatabase, buyer_id: &str, address_id: i64) -> i64 {
    let row: (i64,) = sqlx::query_as(
        "INSERT INTO baskets (buyer_id, delivery_country, delivery_method, delivery_address_id) VALUES ($1, 'NG', \
         'standard', $2) RETURNING id",
    )
    .bind(buyer_id)
    .bind(address_id)
    .fetch_one(db.pool())
    .await
    .expect("Error seeding basket");
    row.0
}

pub async fn seed_basket_item(db: &SqliteDatabase, basket_id: i64, product_id: &str, sku: &str, quantity: i64) {
    sqlx::query("INSERT INTO basket_items (basket_id, product_id, sku, quantity) VALUES ($1, $2, $3, $4)")
        .bind(basket_id)
        .bind(product_id)
        .bind(sku)
        .bind(quantity)
        .execute(db.pool())
        .await
        .expect("Error seeding basket item");
}

pub async fn seed_voucher(db: &SqliteDatabase, code: &str, buyer_id: &str, amount: Money, basket_id: i64) {
    sqlx::query("INSERT INTO vouchers (code, buyer_id, amount, basket_id) VALUES ($1, $2, $3, $4)")
        .bind(code)
        .bind(buyer_id)
        .bind(amount)
        .bind(basket_id)
        .execute(db.pool())
        .await
        .expect("Error seeding voucher");
}

pub async fn variation_quantity(db: &SqliteDatabase, product_id: &str, sku: &str) -> i64 {
    let row: (i64,) = sqlx::query_as("SELECT quantity FROM product_variations WHERE product_id = $1 AND sku = $2")
        .bind(product_id)
        .bind(sku)
        .fetch_one(db.pool())
        .await
        .expect("Error fetching variation quantity");
    row.0
}
