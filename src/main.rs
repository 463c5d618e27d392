mod account;
mod auth;
mod config;
mod cursor;
mod db;
mod entity;
mod error;
mod feed;
mod graph;
mod pagination;
mod profanity;
mod publish;
mod response;
mod routes;
mod storage;
mod validate;

use std::sync::Arc;

use actix_web::{middleware, web, App, HttpServer};
use config::AppConfig;
use db::connect_db;
use log::{error, info};
use profanity::ProfanityFilter;
use storage::{ObjectStore, S3Store};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    info!("loaded configuration: {:?}", config);

    let db = match connect_db(&config).await {
        Ok(db) => db,
        Err(e) => {
            error!("failed to connect database: {}", e);
            std::process::exit(1);
        }
    };
    let filter = match ProfanityFilter::new(&config.profanity_extra_words) {
        Ok(filter) => filter,
        Err(e) => {
            error!("invalid PROFANITY_EXTRA_WORDS: {}", e);
            std::process::exit(1);
        }
    };
    let store: Arc<dyn ObjectStore> = Arc::new(S3Store::new(&config).await);
    let server_port = config.server_port;

    let routes = routes::app(
        web::Data::new(config),
        web::Data::new(db),
        web::Data::from(store),
        web::Data::new(filter),
    );

    let server = HttpServer::new(move || {
        App::new()
            .configure(routes.clone())
            .wrap(middleware::Logger::default())
            .wrap(middleware::from_fn(routes::cors::cors_handler))
    })
    .bind(("0.0.0.0", server_port))?;
    info!("server started at http://0.0.0.0:{}", server_port);
    server.run().await
}
