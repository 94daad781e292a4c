//----------------------------------------------   Stripe webhook  ----------------------------------------------
//
// The second, independent door into the orchestrator: the gateway pushes a signed event instead
// of the frontend polling. Same idempotency guarantees as the poll path, because both run through
// the same `FulfillmentApi`.
use actix_web::{web, HttpRequest, HttpResponse};
use fulfillment_engine::{
    traits::{FulfillmentDatabase, PipelineDatabase},
    FulfillmentApi,
};
use gateway_tools::{normalize_stripe_intent, VerificationOutcome};
use log::*;

use crate::{config::ServerOptions, helpers::get_remote_ip, integrations::gateways::GatewaySelector, route};

const INTENT_SUCCEEDED: &str = "payment_intent.succeeded";

route!(stripe_webhook => Post "/webhook/stripe" impl PipelineDatabase);
/// Handles a signed Stripe event.
///
/// Webhook responses must always be 200, whatever happened internally; anything else triggers
/// the gateway's own retry storm. Failures are logged (and, for fulfillment failures, paged
/// through the event hooks); the gateway only ever learns "received".
pub async fn stripe_webhook<B>(
    req: HttpRequest,
    body: web::Bytes,
    api: web::Data<FulfillmentApi<B>>,
    gateways: web::Data<GatewaySelector>,
    options: web::Data<ServerOptions>,
) -> HttpResponse
where
    B: PipelineDatabase,
{
    let remote = get_remote_ip(&req, options.use_x_forwarded_for, options.use_forwarded);
    trace!("💳️ Received stripe webhook ({} bytes) from {remote:?}", body.len());
    if let Err(e) = handle_stripe_event(&req, &body, &api, &gateways).await {
        warn!("💳️ Webhook delivery was not processed: {e}");
    }
    HttpResponse::Ok().json(serde_json::json!({ "received": true }))
}

async fn handle_stripe_event<B>(
    req: &HttpRequest,
    body: &web::Bytes,
    api: &FulfillmentApi<B>,
    gateways: &GatewaySelector,
) -> Result<(), String>
where
    B: PipelineDatabase,
{
    let signature = req
        .headers()
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| "no stripe-signature header".to_string())?;
    // never trust the payload before the signature checks out
    let event = gateways.stripe().parse_webhook_event(body, signature).map_err(|e| e.to_string())?;
    if event.event_type != INTENT_SUCCEEDED {
        debug!("💳️ Ignoring {} event", event.event_type);
        return Ok(());
    }

    let reference = match event.reference() {
        Some(r) => r.to_string(),
        None => {
            // older intents were minted without metadata; fall back to the intent id
            let intent_id = event
                .data
                .object
                .get("id")
                .and_then(|v| v.as_str())
                .ok_or_else(|| "event object has no intent id".to_string())?;
            let payment = api
                .db()
                .fetch_payment_by_stripe_intent(intent_id)
                .await
                .map_err(|e| e.to_string())?
                .ok_or_else(|| format!("no payment for intent {intent_id}"))?;
            payment.reference
        },
    };

    // the event embeds the full intent, so normalization needs no second round trip
    match normalize_stripe_intent(event.data.object.clone()).map_err(|e| e.to_string())? {
        VerificationOutcome::Declined { status } => {
            debug!("💳️ {INTENT_SUCCEEDED} event for [{reference}] carries status {status}. Nothing to do.");
            Ok(())
        },
        VerificationOutcome::Success(verified) => {
            let outcome = api.process_payment(&reference, &verified).await.map_err(|e| e.to_string())?;
            info!(
                "💳️ Webhook fulfilled [{reference}]: order {} ({})",
                outcome.order.order_id,
                if outcome.already_processed { "already processed" } else { "created" }
            );
            Ok(())
        },
    }
}
