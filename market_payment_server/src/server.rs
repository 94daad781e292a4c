use std::sync::Arc;

use actix_web::{dev::Server, middleware::Logger, web, App, HttpServer};
use fulfillment_engine::{
    events::EventProducers,
    tasks::start_task_worker,
    CheckoutApi,
    ExchangeRateApi,
    FulfillmentApi,
    SqliteDatabase,
};
use log::info;

use crate::{
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    integrations::{
        collaborators::{HttpMailer, HttpNotifier},
        gateways::GatewaySelector,
        ops_alerts::create_ops_event_handlers,
    },
    routes::{health, BasketTotalRoute, CheckoutReferenceRoute, VerifyPaymentRoute},
    stripe_routes::StripeWebhookRoute,
};

/// Builds every long-lived collaborator once, starts the event handlers and the queue worker,
/// and runs the HTTP server until shutdown. The queue and its connection pool are constructed
/// here and injected; nothing in the pipeline reaches for process-global state.
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;

    let notifier = Arc::new(HttpNotifier::new(&config.notify_base_url));
    let mailer = Arc::new(HttpMailer::new(&config.mailer_base_url));

    let handlers = create_ops_event_handlers(notifier.clone());
    let producers = handlers.producers();
    handlers.start_handlers().await;

    start_task_worker(db.clone(), notifier, mailer, config.worker_poll_interval);
    info!("⚙️️ Task queue worker launched (poll interval {:?})", config.worker_poll_interval);

    let srv = create_server_instance(config, db, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let gateways =
        GatewaySelector::new(&config.gateway).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let options = ServerOptions::from_config(&config);
    let srv = HttpServer::new(move || {
        let fulfillment_api = FulfillmentApi::new(db.clone(), producers.clone());
        let checkout_api = CheckoutApi::new(db.clone());
        let fx_api = ExchangeRateApi::new(db.clone());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("mps::access_log"))
            .app_data(web::Data::new(fulfillment_api))
            .app_data(web::Data::new(checkout_api))
            .app_data(web::Data::new(fx_api))
            .app_data(web::Data::new(gateways.clone()))
            .app_data(web::Data::new(options))
            .service(health)
            .service(BasketTotalRoute::<SqliteDatabase, SqliteDatabase>::new())
            .service(CheckoutReferenceRoute::<SqliteDatabase, SqliteDatabase>::new())
            .service(VerifyPaymentRoute::<SqliteDatabase>::new())
            .service(StripeWebhookRoute::<SqliteDatabase>::new())
    })
    .bind((config.host.clone(), config.port))
    .map_err(|e| ServerError::InitializeError(format!("Could not bind {}:{}. {e}", config.host, config.port)))?
    .run();
    Ok(srv)
}
