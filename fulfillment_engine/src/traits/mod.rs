//! The behaviour contracts a storage backend must implement to drive the fulfillment pipeline,
//! plus the collaborator seams the task worker calls out through.
//!
//! Backends implement [`BasketStore`], [`FulfillmentDatabase`], [`TaskQueue`] and
//! [`ExchangeRates`]; the SQLite implementation lives in the `sqlite` module. The collaborator
//! traits ([`NotificationSink`], [`ReceiptMailer`]) are implemented by the server crate against
//! the real notification and mailer services.
mod basket_store;
mod collaborators;
mod data_objects;
mod exchange_rates;
mod fulfillment_database;
mod task_queue;

pub use basket_store::BasketStore;
pub use collaborators::{
    CollaboratorError,
    CollaboratorFuture,
    Notification,
    NotificationRecipient,
    NotificationSink,
    Receipt,
    ReceiptLine,
    ReceiptMailer,
};
pub use data_objects::FulfilledOrder;
pub use exchange_rates::{ExchangeRateError, ExchangeRates};
pub use fulfillment_database::{FulfillmentDatabase, FulfillmentError, PipelineDatabase};
pub use task_queue::{JobStatus, QueuedJob, TaskQueue};
