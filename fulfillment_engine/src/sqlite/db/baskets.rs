use log::debug;
use mps_common::Money;
use sqlx::{FromRow, SqliteConnection};

use crate::db_types::{Basket, BasketItem, PricedLine};

pub async fn fetch_basket(basket_id: i64, conn: &mut SqliteConnection) -> Result<Option<Basket>, sqlx::Error> {
    let basket = sqlx::query_as("SELECT * FROM baskets WHERE id = $1").bind(basket_id).fetch_optional(conn).await?;
    Ok(basket)
}

pub async fn fetch_basket_for_buyer(
    buyer_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Basket>, sqlx::Error> {
    let basket =
        sqlx::query_as("SELECT * FROM baskets WHERE buyer_id = $1").bind(buyer_id).fetch_optional(conn).await?;
    Ok(basket)
}

pub async fn fetch_basket_items(basket_id: i64, conn: &mut SqliteConnection) -> Result<Vec<BasketItem>, sqlx::Error> {
    let items = sqlx::query_as("SELECT * FROM basket_items WHERE basket_id = $1 ORDER BY id")
        .bind(basket_id)
        .fetch_all(conn)
        .await?;
    Ok(items)
}

#[derive(FromRow)]
struct PricedLineRow {
    product_id: String,
    sku: String,
    quantity: i64,
    price: Option<Money>,
    shop_id: Option<String>,
    bespoke: Option<bool>,
    bespoke_notes: Option<String>,
}

/// Fetches the basket lines left-joined against the catalog. A line whose variation (or product)
/// has been deleted comes back without a price or shop and is skipped downstream rather than
/// failing the basket.
pub async fn fetch_priced_lines(basket_id: i64, conn: &mut SqliteConnection) -> Result<Vec<PricedLine>, sqlx::Error> {
    let rows: Vec<PricedLineRow> = sqlx::query_as(
        r#"
        SELECT
            bi.product_id AS product_id,
            bi.sku AS sku,
            bi.quantity AS quantity,
            pv.price AS price,
            p.shop_id AS shop_id,
            pv.bespoke AS bespoke,
            bi.bespoke_notes AS bespoke_notes
        FROM basket_items bi
        LEFT JOIN product_variations pv ON pv.product_id = bi.product_id AND pv.sku = bi.sku
        LEFT JOIN products p ON p.product_id = bi.product_id
        WHERE bi.basket_id = $1
        ORDER BY bi.id
        "#,
    )
    .bind(basket_id)
    .fetch_all(conn)
    .await?;
    let lines = rows
        .into_iter()
        .map(|r| PricedLine {
            product_id: r.product_id,
            sku: r.sku,
            quantity: r.quantity,
            unit_price: r.price,
            shop_id: r.shop_id,
            // a catalog-bespoke variation and a line with made-to-order notes are both exempt
            // from stock tracking
            bespoke: r.bespoke.unwrap_or(false) || r.bespoke_notes.is_some(),
        })
        .collect();
    Ok(lines)
}

/// Deletes the basket and its items. Called inside the order-creation transaction once the order
/// rows are in place.
pub async fn delete_basket(basket_id: i64, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM basket_items WHERE basket_id = $1").bind(basket_id).execute(&mut *conn).await?;
    sqlx::query("DELETE FROM baskets WHERE id = $1").bind(basket_id).execute(conn).await?;
    debug!("🗃️ Basket #{basket_id} deleted");
    Ok(())
}
