//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current
//! thread will cause the current worker to stop processing new requests. For this reason, any
//! long, non-cpu-bound operation (gateway calls, database operations, queue writes) is expressed
//! as an async function so worker threads keep serving other requests at the await points.
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use fulfillment_engine::{
    pricing::DeliveryMethod,
    traits::{ExchangeRates, FulfillmentDatabase, PipelineDatabase},
    CheckoutApi,
    ExchangeRateApi,
    FulfillmentApi,
};
use gateway_tools::VerificationOutcome;
use log::*;
use mps_common::{Money, NGN_CURRENCY_CODE};

use crate::{
    data_objects::{
        BasketTotalParams,
        BasketTotalResponse,
        ReferenceParams,
        ReferenceResponse,
        VerifyParams,
        VerifyResponse,
    },
    errors::ServerError,
    helpers::buyer_identity,
    integrations::gateways::GatewaySelector,
};

// Actix cannot handle generics in handler attribute macros, so routes over generic handlers are
// registered manually through the `route!` macro.
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Basket total  ------------------------------------------------
route!(basket_total => Get "/basket/total" impl FulfillmentDatabase, ExchangeRates);
/// Prices the caller's open basket, optionally converting the total into a display currency with
/// the cached exchange rate. The stored base-currency amounts are never touched.
pub async fn basket_total<BPay, BFx>(
    req: HttpRequest,
    query: web::Query<BasketTotalParams>,
    api: web::Data<CheckoutApi<BPay>>,
    fx: web::Data<ExchangeRateApi<BFx>>,
) -> Result<HttpResponse, ServerError>
where
    BPay: FulfillmentDatabase,
    BFx: ExchangeRates,
{
    let identity = buyer_identity(&req)?;
    let params = query.into_inner();
    let method = DeliveryMethod::parse_or_standard(params.method.as_deref());
    trace!("💻️ Basket total request for buyer {}", identity.buyer_id);
    let (_, costing) = api.price_basket_for_buyer(&identity.buyer_id, &params.country, method).await?;
    let (display_currency, display_total) = match params.display_currency {
        Some(currency) if !currency.eq_ignore_ascii_case(NGN_CURRENCY_CODE) => {
            let currency = currency.to_uppercase();
            let rate =
                fx.fetch_last_rate(&currency).await.map_err(|e| ServerError::NoRecordFound(e.to_string()))?;
            let converted = rate.convert(costing.total);
            (Some(currency), Some(converted))
        },
        _ => (None, None),
    };
    Ok(HttpResponse::Ok().json(BasketTotalResponse {
        items_total: costing.items_total,
        delivery_fee: costing.delivery_fee,
        voucher_amount: costing.voucher_amount,
        total: costing.total,
        total_without_voucher: costing.total_without_voucher,
        display_currency,
        display_total,
    }))
}

//----------------------------------------------   Checkout reference  ------------------------------------------
route!(checkout_reference => Get "/checkout/reference" impl FulfillmentDatabase, ExchangeRates);
/// Issues (or re-issues) the payment reference for the caller's basket.
///
/// NGN charges go through Paystack and need nothing beyond the reference. Any other currency is
/// routed to Stripe: the total is converted at the cached rate, an intent is created (once) and
/// its client secret is handed back for the frontend to complete the charge.
pub async fn checkout_reference<BPay, BFx>(
    req: HttpRequest,
    query: web::Query<ReferenceParams>,
    api: web::Data<CheckoutApi<BPay>>,
    fx: web::Data<ExchangeRateApi<BFx>>,
    gateways: web::Data<GatewaySelector>,
) -> Result<HttpResponse, ServerError>
where
    BPay: FulfillmentDatabase,
    BFx: ExchangeRates,
{
    let identity = buyer_identity(&req)?;
    let params = query.into_inner();
    if params.country.trim().is_empty() {
        return Err(ServerError::InvalidRequestBody("country must be provided".to_string()));
    }
    let method = DeliveryMethod::parse_or_standard(params.method.as_deref());
    let currency = params.currency.unwrap_or_else(|| NGN_CURRENCY_CODE.to_string()).to_uppercase();
    debug!("💻️ Reference request for buyer {} in {currency}", identity.buyer_id);

    let (mut payment, _) = api.issue_reference(&identity.buyer_id, &params.country, method, &currency).await?;
    let mut charge_amount = payment.total;
    if gateways.routes_to_stripe(&payment.currency) {
        let rate = fx
            .fetch_last_rate(&payment.currency)
            .await
            .map_err(|e| ServerError::NoRecordFound(e.to_string()))?;
        charge_amount = Money::from((rate.convert(payment.total) * 100.0).round() as i64);
        if payment.stripe_intent_id.is_none() {
            let intent = gateways.stripe().create_intent(charge_amount, &payment.currency, &payment.reference).await?;
            payment = api.attach_stripe_intent(&payment.reference, &intent.id, &intent.client_secret).await?;
            info!("💻️ Stripe intent [{}] minted for [{}]", intent.id, payment.reference);
        }
    }
    Ok(HttpResponse::Ok().json(ReferenceResponse {
        reference: payment.reference.clone(),
        stripe_client_secret: payment.stripe_client_secret.clone(),
        amount: charge_amount,
        currency: payment.currency.clone(),
        full_name: identity.full_name,
        email: identity.email,
        payment_status: payment.status.to_string(),
    }))
}

//----------------------------------------------   Verify payment  ----------------------------------------------
route!(verify_payment => Post "/checkout/verify" impl PipelineDatabase);
/// The frontend-poll door into the orchestrator.
///
/// Verifies the charge with the payment's gateway and, on success, runs the fulfillment
/// pipeline. A declined charge mutates nothing and leaves the payment pending; a gateway
/// transport failure is a 502 the frontend is expected to retry.
pub async fn verify_payment<B>(
    body: web::Json<VerifyParams>,
    api: web::Data<FulfillmentApi<B>>,
    gateways: web::Data<GatewaySelector>,
) -> Result<HttpResponse, ServerError>
where
    B: PipelineDatabase,
{
    let VerifyParams { reference } = body.into_inner();
    if reference.trim().is_empty() {
        return Err(ServerError::InvalidRequestBody("reference must be provided".to_string()));
    }
    trace!("💻️ Verify request for [{reference}]");
    let payment = api
        .db()
        .fetch_payment_by_reference(&reference)
        .await
        .map_err(ServerError::from)?
        .ok_or_else(|| ServerError::NoRecordFound(format!("No payment for reference {reference}")))?;

    match gateways.verify_payment(&payment).await? {
        VerificationOutcome::Declined { status } => {
            info!("💻️ Gateway declined [{reference}]: {status}. Payment stays pending.");
            Err(ServerError::PaymentDeclined(status))
        },
        VerificationOutcome::Success(verified) => {
            let outcome = api.process_payment(&reference, &verified).await?;
            info!(
                "💻️ [{reference}] verified. Order {} ({}).",
                outcome.order.order_id,
                if outcome.already_processed { "already processed" } else { "created" }
            );
            Ok(HttpResponse::Ok().json(VerifyResponse {
                payment: outcome.payment,
                order: outcome.order,
                product_orders: outcome.product_orders,
                added_points: outcome.added_points,
                already_processed: outcome.already_processed,
            }))
        },
    }
}
