//! REST adapters for the two payment gateways the marketplace charges through.
//!
//! Paystack handles the base-currency (NGN) flow with a synchronous verify-by-reference call;
//! Stripe handles everything else via payment intents, verified either by a retrieve-intent call
//! or by a signed webhook event. Both adapters normalize their answers into the shared
//! [`mps_common::VerifiedPayment`] shape behind the [`GatewayVerifier`] trait, so the pipeline
//! never branches on gateway specifics.
mod config;
pub mod data_objects;
mod error;
mod paystack;
mod stripe;

pub use config::{GatewayConfig, GatewayEnvironment};
pub use data_objects::{ChargeLocator, VerificationOutcome};
pub use error::GatewayApiError;
pub use paystack::PaystackApi;
pub use stripe::{normalize_stripe_intent, StripeApi, StripeEvent, STRIPE_SIGNATURE_TOLERANCE_SECS};

use std::{future::Future, pin::Pin};

pub type VerifyFuture = Pin<Box<dyn Future<Output = Result<VerificationOutcome, GatewayApiError>> + Send>>;

/// One shape over both gateways' verification calls. The caller picks the implementation by the
/// payment's currency and never sees which wire format answered.
pub trait GatewayVerifier: Send + Sync {
    fn verify(&self, locator: &ChargeLocator) -> VerifyFuture;
}
