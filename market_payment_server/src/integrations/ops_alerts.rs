use std::sync::Arc;

use fulfillment_engine::{
    events::{EventHandlers, EventHooks},
    traits::{Notification, NotificationRecipient, NotificationSink},
};
use log::*;

use crate::integrations::collaborators::HttpNotifier;

pub const OPS_EVENT_BUFFER_SIZE: usize = 25;

/// Wires the pipeline's event hooks to operator-facing sinks.
///
/// Two events matter here:
///
/// 1. OrderCreatedEvent - logged for the ops feed; the buyer/shop-facing side effects run through
///    the task queue, not through hooks.
/// 2. FulfillmentFailedEvent - money has moved but no order exists. This one wakes a human: it is
///    pushed to the admin notification channel as well as logged, because a lost log line here
///    costs real reconciliation work.
pub fn create_ops_event_handlers(notifier: Arc<HttpNotifier>) -> EventHandlers {
    let mut hooks = EventHooks::default();
    hooks.on_order_created(|ev| {
        let order = ev.order;
        Box::pin(async move {
            info!("🧭️ Order {} created for buyer {}", order.order_id, order.buyer_id);
        })
    });
    hooks.on_fulfillment_failed(move |ev| {
        let notifier = notifier.clone();
        Box::pin(async move {
            error!(
                "🚨️ Fulfillment failed after successful payment. Reference: {}, payment id: {}. Reason: {}",
                ev.reference, ev.payment_id, ev.reason
            );
            let note = Notification {
                recipient: NotificationRecipient::Admins,
                subject: "Fulfillment failure: manual reconciliation needed".to_string(),
                body: format!(
                    "Payment {} (id {}) is successful but no order was created: {}",
                    ev.reference, ev.payment_id, ev.reason
                ),
            };
            if let Err(e) = notifier.push(note).await {
                error!("🚨️ Could not page the admins about [{}]: {e}", ev.reference);
            }
        })
    });
    EventHandlers::new(OPS_EVENT_BUFFER_SIZE, hooks)
}
