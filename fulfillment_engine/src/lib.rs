//! Marketplace Fulfillment Engine
//!
//! The fulfillment engine owns the payment-confirmation-to-order-fulfillment pipeline: it takes
//! a verified gateway signal, converts it exactly once into a durable order, adjusts inventory,
//! and fans the follow-up side effects out through a durable task queue. It is
//! transport-agnostic; the HTTP server and the gateway adapters live in sibling crates.
//!
//! The library is divided into three main sections:
//! 1. Database management and control ([`mod@sqlite`]). SQLite is the supported backend. You
//!    should never need to access the database directly. Instead, use the public API provided by
//!    the engine. The exception is the data types used in the database, defined in the
//!    [`mod@db_types`] module.
//! 2. The engine public API ([`mod@mpe_api`]): the reference issuer, the pricing frontend and
//!    the fulfillment orchestrator. Backends implement the traits in [`mod@traits`] to drive it.
//! 3. The side-effect machinery ([`mod@tasks`]): the queued task vocabulary and the worker that
//!    drains jobs against the external notification and mailer collaborators.
//!
//! The engine also provides a set of events that can be subscribed to. These events are emitted
//! when certain actions occur within the pipeline; most importantly, a fulfillment failure after
//! money has moved emits an event that operator tooling is expected to hook.
pub mod db_types;
pub mod events;
pub mod helpers;
mod mpe_api;
pub mod pricing;
pub mod tasks;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(all(feature = "sqlite", any(feature = "test_utils", test)))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use mpe_api::{
    checkout_api::CheckoutApi,
    exchange_objects,
    exchange_rate_api::ExchangeRateApi,
    fulfillment_api::{FulfillmentApi, FulfillmentOutcome},
};
