use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use std::sync::Arc;
use std::time::Duration;

mod config;
mod controllers;
mod db;
mod dispatch;
mod models;

use config::Config;
use db::Database;
use dispatch::enrichment::{Enricher, ScrapeClient};
use dispatch::invoker::InvokerConfig;
use dispatch::Dispatcher;

pub struct AppState {
    pub db: Arc<Database>,
    pub config: Config,
    pub dispatcher: Arc<Dispatcher>,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = Config::from_env();
    let port = config.port;

    log::info!("Initializing database at {}", config.database_url);
    let db = Database::new(&config.database_url).unwrap_or_else(|e| {
        log::error!("Failed to initialize database: {}", e);
        std::process::exit(1);
    });
    let db = Arc::new(db);

    let enricher: Option<Arc<dyn Enricher>> = match &config.scrape_base_url {
        Some(base_url) => {
            log::info!("Website enrichment enabled via {}", base_url);
            Some(Arc::new(ScrapeClient::new(base_url)))
        }
        None => {
            log::info!("Website enrichment disabled (no scrape service configured)");
            None
        }
    };

    let invoker_config = InvokerConfig::for_agent_cli(
        &config.agent_cmd,
        &config.agent_workdir,
        &config.agent_system_prompt_path,
        config.agent_timeout_secs,
        config.agent_max_concurrent,
    );

    log::info!(
        "Agent command: {} (timeout {}s, {} concurrent slots)",
        config.agent_cmd,
        config.agent_timeout_secs,
        config.agent_max_concurrent
    );
    let dispatcher = Arc::new(Dispatcher::new(
        db.clone(),
        invoker_config,
        config.rate_limit_max_requests,
        Duration::from_secs(config.rate_limit_window_secs),
        enricher,
    ));

    log::info!("Starting onboarding agent server on port {}", port);

    let allowed_origins = config.allowed_origins.clone();
    HttpServer::new(move || {
        let mut cors = Cors::default()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);
        for origin in &allowed_origins {
            cors = cors.allowed_origin(origin);
        }

        App::new()
            .app_data(web::Data::new(AppState {
                db: Arc::clone(&db),
                config: config.clone(),
                dispatcher: Arc::clone(&dispatcher),
            }))
            .wrap(Logger::default())
            .wrap(cors)
            .configure(controllers::health::config)
            .configure(controllers::chat::config)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
