use fulfillment_engine::db_types::Payment;
use gateway_tools::{
    ChargeLocator,
    GatewayApiError,
    GatewayConfig,
    GatewayVerifier,
    PaystackApi,
    StripeApi,
    VerificationOutcome,
};
use log::trace;
use mps_common::NGN_CURRENCY_CODE;

/// Routes verification calls to the right gateway for a payment's currency: base-currency
/// charges go through Paystack, everything else through Stripe.
#[derive(Clone)]
pub struct GatewaySelector {
    paystack: PaystackApi,
    stripe: StripeApi,
}

impl GatewaySelector {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayApiError> {
        Ok(Self { paystack: PaystackApi::new(config)?, stripe: StripeApi::new(config)? })
    }

    pub fn verifier_for(&self, currency: &str) -> &dyn GatewayVerifier {
        if currency.eq_ignore_ascii_case(NGN_CURRENCY_CODE) {
            &self.paystack
        } else {
            &self.stripe
        }
    }

    pub fn stripe(&self) -> &StripeApi {
        &self.stripe
    }

    /// True when payments in this currency need a Stripe intent minted at reference time.
    pub fn routes_to_stripe(&self, currency: &str) -> bool {
        !currency.eq_ignore_ascii_case(NGN_CURRENCY_CODE)
    }

    pub async fn verify_payment(&self, payment: &Payment) -> Result<VerificationOutcome, GatewayApiError> {
        trace!("Verifying [{}] in {} via the matching gateway", payment.reference, payment.currency);
        let locator = ChargeLocator {
            reference: payment.reference.clone(),
            stripe_intent_id: payment.stripe_intent_id.clone(),
        };
        self.verifier_for(&payment.currency).verify(&locator).await
    }
}
