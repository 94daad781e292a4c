//! REST clients for the external collaborators the task worker drives. Both services accept a
//! JSON body and answer 2xx on acceptance; delivery beyond that point is their problem, which is
//! what makes the worker's at-least-once retries safe.
use std::sync::Arc;

use fulfillment_engine::traits::{
    CollaboratorError,
    CollaboratorFuture,
    Notification,
    NotificationSink,
    Receipt,
    ReceiptMailer,
};
use log::trace;
use reqwest::Client;
use serde::Serialize;

async fn post_json<T: Serialize>(client: Arc<Client>, url: String, body: &T) -> Result<(), CollaboratorError> {
    trace!("Posting to collaborator: {url}");
    let response =
        client.post(url).json(body).send().await.map_err(|e| CollaboratorError::Transport(e.to_string()))?;
    if response.status().is_success() {
        Ok(())
    } else {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        Err(CollaboratorError::Rejected { status, message })
    }
}

/// Client for the push/in-app notification service.
#[derive(Clone)]
pub struct HttpNotifier {
    client: Arc<Client>,
    base_url: String,
}

impl HttpNotifier {
    pub fn new(base_url: &str) -> Self {
        Self { client: Arc::new(Client::new()), base_url: base_url.trim_end_matches('/').to_string() }
    }
}

impl NotificationSink for HttpNotifier {
    fn push(&self, note: Notification) -> CollaboratorFuture {
        let client = self.client.clone();
        let url = format!("{}/notifications", self.base_url);
        Box::pin(async move { post_json(client, url, &note).await })
    }
}

/// Client for the transactional mailer. The mailer renders the PDF receipt from the line data;
/// this side only ships the facts.
#[derive(Clone)]
pub struct HttpMailer {
    client: Arc<Client>,
    base_url: String,
}

impl HttpMailer {
    pub fn new(base_url: &str) -> Self {
        Self { client: Arc::new(Client::new()), base_url: base_url.trim_end_matches('/').to_string() }
    }
}

impl ReceiptMailer for HttpMailer {
    fn send_receipt(&self, receipt: Receipt) -> CollaboratorFuture {
        let client = self.client.clone();
        let url = format!("{}/receipts", self.base_url);
        Box::pin(async move { post_json(client, url, &receipt).await })
    }
}
