use sqlx::SqliteConnection;

use crate::db_types::ProductVariation;

pub async fn fetch_variation(
    product_id: &str,
    sku: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<ProductVariation>, sqlx::Error> {
    let variation = sqlx::query_as("SELECT * FROM product_variations WHERE product_id = $1 AND sku = $2")
        .bind(product_id)
        .bind(sku)
        .fetch_optional(conn)
        .await?;
    Ok(variation)
}

/// Decrements a variation's stock by `quantity` as a single guarded update, so concurrent
/// purchases of the same variation can never drive the count negative. Returns false when the
/// remaining stock does not cover the decrement (or the row is bespoke or missing); nothing is
/// changed in that case.
pub async fn decrement_stock(
    product_id: &str,
    sku: &str,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE product_variations
            SET quantity = quantity - $3
            WHERE product_id = $1 AND sku = $2 AND bespoke = 0 AND quantity >= $3
        "#,
    )
    .bind(product_id)
    .bind(sku)
    .bind(quantity)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}
