use log::debug;
use mps_common::VerifiedPayment;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewPayment, Payment},
    traits::FulfillmentError,
};

pub async fn fetch_payment_by_reference(
    reference: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    let payment =
        sqlx::query_as("SELECT * FROM payments WHERE reference = $1").bind(reference).fetch_optional(conn).await?;
    Ok(payment)
}

/// Returns the most recent pending payment for the basket, if any. The reference issuer uses this
/// to hand the same reference back on repeated checkout calls.
pub async fn fetch_pending_payment_for_basket(
    basket_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    let payment = sqlx::query_as(
        "SELECT * FROM payments WHERE basket_id = $1 AND status = 'Pending' ORDER BY created_at DESC LIMIT 1",
    )
    .bind(basket_id)
    .fetch_optional(conn)
    .await?;
    Ok(payment)
}

/// Inserts a new pending payment. A collision on the UNIQUE reference index is reported as
/// [`FulfillmentError::ReferenceCollision`] so the caller can mint another reference.
pub async fn insert_pending_payment(
    payment: NewPayment,
    conn: &mut SqliteConnection,
) -> Result<Payment, FulfillmentError> {
    let result = sqlx::query_as(
        r#"
            INSERT INTO payments (
                reference,
                basket_id,
                buyer_id,
                amount,
                items_total,
                delivery_fee,
                voucher_amount,
                total,
                currency,
                stripe_intent_id,
                stripe_client_secret
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *;
        "#,
    )
    .bind(&payment.reference)
    .bind(payment.basket_id)
    .bind(&payment.buyer_id)
    .bind(payment.amount)
    .bind(payment.items_total)
    .bind(payment.delivery_fee)
    .bind(payment.voucher_amount)
    .bind(payment.total)
    .bind(&payment.currency)
    .bind(&payment.stripe_intent_id)
    .bind(&payment.stripe_client_secret)
    .fetch_one(conn)
    .await;
    match result {
        Ok(p) => {
            debug!("🗃️ Payment [{}] saved as pending", payment.reference);
            Ok(p)
        },
        Err(sqlx::Error::Database(de)) if de.is_unique_violation() => {
            Err(FulfillmentError::ReferenceCollision(payment.reference))
        },
        Err(e) => Err(e.into()),
    }
}

/// The payment state machine's single edge, as one guarded update.
///
/// Only a payment that is not already `Success` is mutated; the returned flag says whether this
/// call performed the flip. When the row was already successful, the stored record comes back
/// untouched; the first verification's metadata always wins.
pub async fn confirm_payment(
    reference: &str,
    verified: &VerifiedPayment,
    conn: &mut SqliteConnection,
) -> Result<(Payment, bool), FulfillmentError> {
    let log = verified.log.to_string();
    let flipped: Option<Payment> = sqlx::query_as(
        r#"
            UPDATE payments SET
                status = 'Success',
                channel = $2,
                paid_at = $3,
                fees = $4,
                gateway_log = $5,
                updated_at = CURRENT_TIMESTAMP
            WHERE reference = $1 AND status != 'Success'
            RETURNING *;
        "#,
    )
    .bind(reference)
    .bind(&verified.channel)
    .bind(verified.paid_at)
    .bind(verified.fees)
    .bind(log)
    .fetch_optional(&mut *conn)
    .await?;
    match flipped {
        Some(payment) => Ok((payment, true)),
        None => {
            let existing = fetch_payment_by_reference(reference, conn)
                .await?
                .ok_or_else(|| FulfillmentError::PaymentNotFound(reference.to_string()))?;
            Ok((existing, false))
        },
    }
}

/// Records the Stripe intent minted for a pending payment. Already-successful payments are left
/// alone and returned as-is.
pub async fn attach_stripe_intent(
    reference: &str,
    intent_id: &str,
    client_secret: &str,
    conn: &mut SqliteConnection,
) -> Result<Payment, FulfillmentError> {
    let updated: Option<Payment> = sqlx::query_as(
        r#"
            UPDATE payments SET
                stripe_intent_id = $2,
                stripe_client_secret = $3,
                updated_at = CURRENT_TIMESTAMP
            WHERE reference = $1 AND status = 'Pending'
            RETURNING *;
        "#,
    )
    .bind(reference)
    .bind(intent_id)
    .bind(client_secret)
    .fetch_optional(&mut *conn)
    .await?;
    match updated {
        Some(p) => Ok(p),
        None => fetch_payment_by_reference(reference, conn)
            .await?
            .ok_or_else(|| FulfillmentError::PaymentNotFound(reference.to_string())),
    }
}

/// Finds the payment whose Stripe intent matches `intent_id`. The webhook path uses this when an
/// event arrives without the reference in its metadata.
pub async fn fetch_payment_by_stripe_intent(
    intent_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    let payment = sqlx::query_as("SELECT * FROM payments WHERE stripe_intent_id = $1")
        .bind(intent_id)
        .fetch_optional(conn)
        .await?;
    Ok(payment)
}
