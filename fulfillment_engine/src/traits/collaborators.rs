//! Seams to the external collaborators the task worker drives: the push/in-app notification
//! service and the transactional mailer (which renders and attaches the PDF receipt on its side).
//!
//! The traits return boxed futures rather than using `async fn` so the worker can hold them as
//! trait objects and so implementations stay free to clone what they need into the future.
use futures_util::future::BoxFuture;
use mps_common::Money;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type CollaboratorFuture = BoxFuture<'static, Result<(), CollaboratorError>>;

#[derive(Debug, Clone, Error)]
pub enum CollaboratorError {
    #[error("The collaborator could not be reached: {0}")]
    Transport(String),
    #[error("The collaborator rejected the request. Status {status}. {message}")]
    Rejected { status: u16, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationRecipient {
    Buyer(String),
    ShopOwner(String),
    Admins,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: NotificationRecipient,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptLine {
    pub description: String,
    pub quantity: i64,
    pub unit_price: Money,
}

/// Everything the mailer needs to render and send a receipt. Self-contained so the task can be
/// replayed without touching mutable state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub email: String,
    pub full_name: String,
    pub order_id: String,
    pub total: Money,
    pub currency: String,
    pub lines: Vec<ReceiptLine>,
}

pub trait NotificationSink: Send + Sync {
    fn push(&self, note: Notification) -> CollaboratorFuture;
}

pub trait ReceiptMailer: Send + Sync {
    fn send_receipt(&self, receipt: Receipt) -> CollaboratorFuture;
}
