mod auth;
mod config;
mod db;
mod docs;
mod exec;
mod handlers;
mod hub;
mod models;
mod routes;
mod ws;

use std::panic;
use std::sync::Arc;

use axum::{http::HeaderValue, routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use config::Config;
use docs::ApiDoc;
use exec::judge::JudgeClient;
use hub::AppState;
use routes::api::create_api_routes;
use ws::handler::websocket_handler;

#[tokio::main]
async fn main() {
    // Set panic hook for better error messages
    panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
    }));

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            // Default to info level, but allow debug for our app
            "codestream_hub=debug,tower_http=debug,axum::rejection=trace,info".into()
        }))
        .init();

    info!("Starting server...");

    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        error!("Failed to load configuration: {}", e);
        warn!("Using default configuration");
        Config::default()
    });
    config::set_config(config.clone());

    // Initialize database connection if URL is provided
    if let Some(db_url) = &config.db_url {
        match db::store::init_db(db_url).await {
            Ok(_) => info!("Database initialized successfully"),
            Err(e) => {
                error!("Failed to initialize database: {}", e);
                warn!("Rooms will not survive restarts");
            }
        }
    } else {
        warn!("No database URL configured - rooms will not survive restarts");
    }

    if config.judge_api_key.is_none() {
        warn!("No judge API key configured - code execution requests will fail");
    }

    // Shared hub state
    let state = AppState::new(Arc::new(JudgeClient::from_config(&config)));

    // CORS: restrict to the configured origins, or allow any in development
    let cors = match &config.cors_origins {
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|o| o.trim().parse().ok())
                .collect();
            CorsLayer::new().allow_origin(origins).allow_headers(Any)
        }
        None => CorsLayer::new().allow_origin(Any).allow_headers(Any),
    };

    // Combine all routes
    let app_routes = Router::new()
        // Mount API routes
        .nest("/api", create_api_routes(state.clone()))
        // Mount the collaborative session endpoint
        .route("/ws", get(websocket_handler).with_state(state))
        // Mount Swagger UI
        .merge(SwaggerUi::new("/swagger").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        // Add tracing layer
        .layer(TraceLayer::new_for_http());

    // Start the server
    let listener = tokio::net::TcpListener::bind(config.server_address())
        .await
        .unwrap_or_else(|_| panic!("Failed to bind to {}", config.server_address()));

    info!("🚀 Server running on http://{}", config.server_address());
    info!("📡 WebSocket available at ws://{}/ws", config.server_address());
    info!("📚 Swagger UI available at http://{}/swagger", config.server_address());

    axum::serve(listener, app_routes)
        .await
        .expect("Server failed to start");
}
