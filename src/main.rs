use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use dotenvy::dotenv;
use std::sync::Arc;

mod api;
mod config;
mod db;
mod docs;
mod error;
mod model;
mod notify;
mod routes;
mod service;
mod store;
mod utils;

use config::Config;
use db::init_db;

use crate::api::{AppCorrectionService, AppEntityRegistry, AppSessionService, AppSweeper};
use crate::model::settings::SettingsMap;
use crate::notify::TracingSink;
use crate::service::correction::CorrectionService;
use crate::service::session::SessionService;
use crate::service::sweeper::ExpirySweeper;
use crate::store::EntityRegistry;
use crate::store::mysql::{MySqlAttendanceStore, MySqlEntityStore};
use crate::utils::entity_cache;
use crate::utils::entity_filter;
use tracing::info;
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::docs::ApiDoc;

#[get("/")]
async fn index() -> impl Responder {
    "Attendly"
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    let config = Config::from_env();

    // Rolling daily log
    let file_appender = rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let pool = init_db(&config.database_url).await;

    let pool_for_filter_warmup = pool.clone();
    let pool_for_cache_warmup = pool.clone();

    actix_web::rt::spawn(async move {
        if let Err(e) = entity_filter::warmup_badge_filter(&pool_for_filter_warmup, 250).await {
            eprintln!("Failed to warmup badge filter: {:?}", e);
        }
    });

    actix_web::rt::spawn(async move {
        // Warm up entities seen in the last 30 days in batches of 250
        if let Err(e) = entity_cache::warmup_entity_cache(&pool_for_cache_warmup, 30, 250).await {
            eprintln!("Failed to warmup entity cache: {:?}", e);
        }
    });

    // One entity store per configured type, all backed by the same pool;
    // settings and registry are built once and shared immutably
    let settings = Arc::new(SettingsMap::from_spec(&config.entity_types));
    let mut registry = EntityRegistry::new();
    for entity_type in settings.types() {
        registry = registry.with(
            entity_type,
            Arc::new(MySqlEntityStore::new(pool.clone(), entity_type)),
        );
    }
    let registry: Arc<AppEntityRegistry> = Arc::new(registry);

    let records = Arc::new(MySqlAttendanceStore::new(pool.clone()));
    let notifier = Arc::new(TracingSink);

    let sessions: Arc<AppSessionService> = Arc::new(SessionService::new(
        records.clone(),
        registry.clone(),
        settings.clone(),
        notifier.clone(),
    ));
    let corrections: Arc<AppCorrectionService> = Arc::new(CorrectionService::new(
        records,
        registry.clone(),
        settings,
        notifier,
    ));
    let sweeper: Arc<AppSweeper> =
        Arc::new(ExpirySweeper::new(sessions.clone(), registry.clone()));

    let server_addr = config.server_addr.clone();
    let config_data = config.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(config.clone()))
            .app_data(Data::from(sessions.clone()))
            .app_data(Data::from(corrections.clone()))
            .app_data(Data::from(sweeper.clone()))
            .app_data(Data::from(registry.clone()))
            .service(index)
            .configure(|cfg| routes::configure(cfg, config_data.clone()))
    })
    .bind(server_addr)?
    .run()
    .await
}
