use log::*;
use mps_common::Money;

use crate::{
    db_types::{Basket, NewPayment, Payment},
    helpers::new_reference,
    pricing::{self, BasketCosting, DeliveryMethod},
    traits::{FulfillmentDatabase, FulfillmentError},
};

/// How many fresh references to try before giving up on the astronomically unlucky session.
const MAX_REFERENCE_ATTEMPTS: usize = 5;

/// The reference issuer and basket-pricing frontend.
///
/// Issues a payment reference that stays stable for the life of one pending payment: repeated
/// checkout calls for the same basket get the same reference back instead of a fresh pending
/// payment each time.
pub struct CheckoutApi<B> {
    db: B,
}

impl<B> CheckoutApi<B>
where B: FulfillmentDatabase
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Prices the buyer's open basket: catalog-joined lines, voucher (ownership and
    /// marked-for-basket checks applied), and the delivery tariff for the destination.
    pub async fn price_basket_for_buyer(
        &self,
        buyer_id: &str,
        country: &str,
        method: DeliveryMethod,
    ) -> Result<(Basket, BasketCosting), FulfillmentError> {
        let basket = self
            .db
            .fetch_basket_for_buyer(buyer_id)
            .await?
            .ok_or_else(|| FulfillmentError::NoOpenBasket(buyer_id.to_string()))?;
        let lines = self.db.fetch_priced_lines(basket.id).await?;
        if lines.is_empty() {
            return Err(FulfillmentError::EmptyBasket(basket.id));
        }
        let voucher_amount = match self.db.fetch_voucher_for_basket(basket.id, buyer_id).await? {
            Some(v) => v.amount,
            None => Money::from(0),
        };
        let fee = pricing::delivery_fee_for(country, method);
        Ok((basket, pricing::price_basket(&lines, voucher_amount, fee)))
    }

    /// Issues (or re-issues) the payment reference for the buyer's basket.
    ///
    /// If a pending payment already exists for the basket, its reference is returned unchanged;
    /// this is what keeps a buyer who refreshes the checkout page on one reference. Otherwise the
    /// basket is priced, a collision-checked reference is minted and a pending payment is
    /// persisted.
    pub async fn issue_reference(
        &self,
        buyer_id: &str,
        country: &str,
        method: DeliveryMethod,
        currency: &str,
    ) -> Result<(Payment, bool), FulfillmentError> {
        let (basket, costing) = self.price_basket_for_buyer(buyer_id, country, method).await?;
        if let Some(pending) = self.db.fetch_pending_payment_for_basket(basket.id).await? {
            debug!("🧾️ Re-issuing reference [{}] for basket #{}", pending.reference, basket.id);
            return Ok((pending, false));
        }

        let mut last_err = None;
        for _ in 0..MAX_REFERENCE_ATTEMPTS {
            let reference = new_reference();
            let new_payment = NewPayment {
                reference: reference.clone(),
                basket_id: basket.id,
                buyer_id: buyer_id.to_string(),
                amount: costing.total,
                items_total: costing.items_total,
                delivery_fee: costing.delivery_fee,
                voucher_amount: costing.voucher_amount,
                total: costing.total,
                currency: currency.to_string(),
                stripe_intent_id: None,
                stripe_client_secret: None,
            };
            match self.db.insert_pending_payment(new_payment).await {
                Ok(payment) => {
                    info!("🧾️ Issued reference [{}] for basket #{} ({})", payment.reference, basket.id, payment.total);
                    return Ok((payment, true));
                },
                Err(FulfillmentError::ReferenceCollision(r)) => {
                    warn!("🧾️ Reference collision on [{r}]. Minting a new one.");
                    last_err = Some(FulfillmentError::ReferenceCollision(r));
                },
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or_else(|| FulfillmentError::DatabaseError("reference issuance failed".to_string())))
    }

    /// Records the Stripe intent created for a payment so later checkout calls can hand the same
    /// client secret back.
    pub async fn attach_stripe_intent(
        &self,
        reference: &str,
        intent_id: &str,
        client_secret: &str,
    ) -> Result<Payment, FulfillmentError> {
        self.db.attach_stripe_intent(reference, intent_id, client_secret).await
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
