// src/main.rs
use std::io;
use std::sync::Arc;

use actix_web::middleware::{DefaultHeaders, Logger};
use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use dotenvy::dotenv;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use inapp_purchases::config::Settings;
use inapp_purchases::gateway::http::HttpGateway;
use inapp_purchases::gateway::simulated::SimulatedGateway;
use inapp_purchases::gateway::PaymentGateway;
use inapp_purchases::store::{MemoryStore, PgStore, Store};
use inapp_purchases::{api, docs, AppState};

async fn index() -> impl Responder {
    HttpResponse::Ok().body("Service ready!")
}

async fn open_store(settings: &Settings) -> io::Result<Arc<dyn Store>> {
    match &settings.database_url {
        Some(url) => {
            let store = PgStore::connect(url)
                .await
                .map_err(io::Error::other)?
                .with_options(settings.tx_options());
            store.migrate().await.map_err(io::Error::other)?;
            log::info!("using postgres store");
            Ok(Arc::new(store))
        }
        None => {
            log::warn!("DATABASE_URL not set, using in-memory store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

fn payment_gateway(settings: &Settings) -> Arc<dyn PaymentGateway> {
    match &settings.gateway_url {
        Some(url) => {
            log::info!("using payment gateway at {url}");
            Arc::new(HttpGateway::new(url.clone(), settings.gateway_api_key.clone()))
        }
        None => {
            log::warn!("PAYMENT_GATEWAY_URL not set, payments are simulated");
            Arc::new(SimulatedGateway::new(settings.simulated_gateway_delay))
        }
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let settings = Settings::from_env().map_err(io::Error::other)?;
    let store = open_store(&settings).await?;
    let gateway = payment_gateway(&settings);
    let bind = (settings.bind_addr.clone(), settings.port);
    log::info!(
        "purchase ordering {:?}, store deadline {:?}",
        settings.purchase_ordering,
        settings.store_deadline
    );

    let state = web::Data::new(AppState::new(store, gateway, settings));

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Logger::default())
            .wrap(
                DefaultHeaders::new()
                    .add(("X-Content-Type-Options", "nosniff"))
                    .add(("X-Frame-Options", "DENY")),
            )
            .route("/", web::get().to(index))
            .service(
                SwaggerUi::new("/docs/{_:.*}")
                    .url("/api-docs/openapi.json", docs::ApiDoc::openapi()),
            )
            .configure(api::configure)
    })
    .bind(bind)?
    .run()
    .await
}
