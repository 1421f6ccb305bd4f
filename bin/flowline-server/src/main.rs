//! flowline conversational flow engine server
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `PORT` (alias `APP_PORT`) | `3000` | HTTP port |
//! | `HOST` | `0.0.0.0` | HTTP bind address |
//! | `MONGODB_URI` | `mongodb://localhost:27017/...` | MongoDB connection string |
//! | `MONGODB_DATABASE` | `flowline` | MongoDB database name |
//! | `META_GRAPH_BASE_URL` | `https://graph.facebook.com` | Meta Graph API base URL |
//! | `META_GRAPH_API_VERSION` | `v23.0` | Meta Graph API version |
//! | `META_HTTP_TIMEOUT_SECS` | `15` | Outbound Meta HTTP deadline |
//! | `META_VERIFY_TOKEN` (aliases `WHATSAPP_VERIFY_TOKEN`, `VERIFY_TOKEN`) | - | Webhook verification secret |
//! | `DEV_MODE` | `false` | Verbose logging defaults |
//! | `RUST_LOG` | `info` | Log level |
//! | `LOG_FORMAT` | `text` | `text` or `json` |

mod flows;
mod state;
mod trigger;
mod webhook;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::Json;
use axum::{routing::get, Router};
use flowline_config::AppConfig;
use flowline_engine::broadcast::BroadcastRepository;
use flowline_engine::contact::ContactRepository;
use flowline_engine::flow::repository::FlowRepository;
use flowline_engine::indexes::initialize_indexes;
use flowline_engine::log::LogRepository;
use flowline_engine::session::SessionRepository;
use flowline_engine::user::UserRepository;
use flowline_whatsapp::{WhatsAppClient, WhatsAppClientConfig};
use tokio::{net::TcpListener, signal};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa_axum::router::OpenApiRouter;
use utoipa_swagger_ui::SwaggerUi;

use state::EngineState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    flowline_common::logging::init_logging("flowline-server");

    info!("Starting flowline conversational flow engine");

    let config = AppConfig::load()?;
    info!(database = %config.mongodb.database, "Configuration loaded");

    let mongo_client = mongodb::Client::with_uri_str(&config.mongodb.uri).await?;
    let db = mongo_client.database(&config.mongodb.database);
    info!(database = %config.mongodb.database, "Connected to MongoDB");

    initialize_indexes(&db).await?;

    let user_repo = Arc::new(UserRepository::new(&db));
    let contact_repo = Arc::new(ContactRepository::new(&db));
    let flow_repo = Arc::new(FlowRepository::new(&db));
    let session_repo = Arc::new(SessionRepository::new(&db));
    let broadcast_repo = Arc::new(BroadcastRepository::new(&db));
    let log_repo = Arc::new(LogRepository::new(&db));
    info!("Repositories initialized");

    let whatsapp = Arc::new(WhatsAppClient::new(WhatsAppClientConfig {
        base_url: config.meta.base_url.clone(),
        api_version: config.meta.api_version.clone(),
        timeout: Duration::from_secs(config.meta.timeout_secs),
    }));

    if config.verify_token.is_empty() {
        tracing::warn!("no webhook verify token configured; the verification handshake will always return 403");
    }

    let state = EngineState {
        user_repo,
        contact_repo,
        flow_repo,
        session_repo,
        broadcast_repo,
        log_repo,
        whatsapp,
        verify_token: Arc::new(config.verify_token.clone()),
    };

    let flows_router = flows::router(state.clone()).merge(trigger::router(state.clone()));

    let (api_router, mut openapi) = OpenApiRouter::new()
        .nest("/meta/webhook", webhook::router(state.clone()))
        .nest("/flows", flows_router)
        .split_for_parts();

    openapi.info.title = "flowline".to_string();
    openapi.info.version = env!("CARGO_PKG_VERSION").to_string();
    openapi.info.description = Some("WhatsApp conversational flow engine".to_string());

    let app = Router::new()
        .route("/health", get(health))
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/openapi.json", openapi))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any));

    let addr: SocketAddr = format!("{}:{}", config.http.host, config.http.port).parse()?;
    info!(%addr, "HTTP server listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    info!("flowline server shutdown complete");
    Ok(())
}

async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
