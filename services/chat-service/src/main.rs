//! BloxTrade chat service
//!
//! REST API for chats, messages, participants, and unread counters, plus
//! the WebSocket realtime channel that fans mutations out to connected
//! clients.

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use clap::Parser;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

mod api;
mod auth;
mod config;
mod error;
mod service;
mod ws;

use api::AppState;
use auth::TokenRegistry;
use bloxtrade_realtime::RealtimeHub;
use bloxtrade_store::MemoryChatStore;
use config::ServiceConfig;
use service::ChatService;

/// Chat Service CLI arguments
#[derive(Parser, Debug)]
#[command(name = "chat-service")]
#[command(about = "BloxTrade Chat Service")]
struct Args {
    /// Host to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = ServiceConfig {
        host: args.host,
        port: args.port,
        ..Default::default()
    };
    config.validate().map_err(anyhow::Error::msg)?;

    info!("Starting chat service on {}", config.bind_addr());

    let hub = Arc::new(RealtimeHub::new());
    let store = Arc::new(MemoryChatStore::new());
    let service = Arc::new(ChatService::new(store, hub));
    let auth = Arc::new(TokenRegistry::new());

    let bind_addr = (config.host.clone(), config.port);
    let app_state = web::Data::new(AppState {
        service,
        auth,
        config,
    });

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(app_state.clone())
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .configure(api::configure)
            .route("/realtime", web::get().to(ws::realtime))
    })
    .bind(bind_addr)?
    .run()
    .await?;

    Ok(())
}
