use sqlx::SqliteConnection;

use crate::db_types::Voucher;

/// Fetches the voucher marked for this basket, applying the ownership rule: the voucher must
/// belong to the requesting buyer and must not have been redeemed yet.
pub async fn fetch_voucher_for_basket(
    basket_id: i64,
    buyer_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Voucher>, sqlx::Error> {
    let voucher =
        sqlx::query_as("SELECT * FROM vouchers WHERE basket_id = $1 AND buyer_id = $2 AND redeemed = 0 LIMIT 1")
            .bind(basket_id)
            .bind(buyer_id)
            .fetch_optional(conn)
            .await?;
    Ok(voucher)
}

/// Marks a voucher redeemed. Guarded so a replay changes nothing.
pub async fn redeem_voucher(voucher_id: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE vouchers SET redeemed = 1 WHERE id = $1 AND redeemed = 0")
        .bind(voucher_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() == 1)
}
