#[macro_use]
extern crate log;
extern crate pretty_env_logger;

use actix_web::{rt, web, App, HttpResponse, HttpServer, Responder};
use dotenvy::dotenv;
use std::sync::Arc;
use tablebook::api;
use tablebook::config::EngineConfig;
use tablebook::services::billing_scheduler::run_billing_scheduler;
use tablebook::services::notifier::LogNotifier;
use tablebook::services::waiting_sweep::run_waiting_sweep;
use tablebook::AppState;
use utoipa::openapi::OpenApi;
use utoipa_actix_web::AppExt;

async fn openapi_json(doc: web::Data<OpenApi>) -> impl Responder {
    HttpResponse::Ok().json(doc.get_ref())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(e) = dotenv() {
        eprintln!("Failed to load .env file: {}", e);
    }

    // Setup logging
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    pretty_env_logger::init();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let config = EngineConfig::from_env();
    info!(
        "Engine config: tz {}, {} min sittings on a {} min grid",
        config.tz, config.dining_minutes, config.slot_granularity_minutes
    );

    info!("Initializing database connection pool...");
    let state = AppState::new(&database_url, config.clone(), Arc::new(LogNotifier));

    rt::spawn(run_billing_scheduler(
        state.billing_ops.clone(),
        config.billing_interval_secs,
    ));
    rt::spawn(run_waiting_sweep(
        state.waiting_ops.clone(),
        state.reservation_ops.clone(),
        config.waiting_sweep_interval_secs,
    ));

    let host = std::env::var("BIND_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("BIND_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8080);

    info!("Starting server at http://{}:{}", host, port);

    HttpServer::new(move || {
        let (app, doc) = App::new()
            .into_utoipa_app()
            .app_data(web::JsonConfig::default().error_handler(api::default_error_handler))
            .configure(|cfg| api::configure(cfg, &state))
            .split_for_parts();
        app.app_data(web::Data::new(doc))
            .route("/api-docs/openapi.json", web::get().to(openapi_json))
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}
