//! HTTP/WebSocket server for the interview engine
//!
//! JSON API under `/api`, engine events streamed over `/ws/events`.

mod events;
pub mod routes;
pub mod state;

pub use events::{EventBroadcaster, ServerEvent};
pub use state::ServerAppState;

use axum::{
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderValue,
    },
    routing::get,
    Json, Router,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::config::ServerConfig;

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct VersionInfo {
    version: String,
    prompt_version: String,
    model_client: String,
}

fn cors_layer(cors_origins: Option<&[String]>) -> CorsLayer {
    match cors_origins {
        Some(origins) if !origins.is_empty() => {
            let allowed_origins: Vec<HeaderValue> =
                origins.iter().filter_map(|o| o.parse().ok()).collect();
            CorsLayer::new()
                .allow_origin(allowed_origins)
                .allow_methods(Any)
                .allow_headers([CONTENT_TYPE, ACCEPT])
        }
        _ => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers([CONTENT_TYPE, ACCEPT]),
    }
}

/// The full application router
pub fn build_router(state: ServerAppState, cors_origins: Option<&[String]>) -> Router {
    routes::api_router()
        .route("/ws/events", get(events::ws_handler))
        .route("/health", get(health_handler))
        .route("/api/version", get(version_handler))
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

/// Run the HTTP/WebSocket server until shutdown is requested
pub async fn run_server(config: &ServerConfig, state: ServerAppState) -> Result<(), String> {
    let app = build_router(state.clone(), config.cors_origins.as_deref());

    let addr: SocketAddr = format!("{}:{}", config.bind, config.port)
        .parse()
        .map_err(|e| format!("Invalid address: {}", e))?;

    let cors_display = match &config.cors_origins {
        Some(origins) if !origins.is_empty() => origins.join(", "),
        _ => "*".to_string(),
    };

    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║                  Diagnostic Engine Server                     ║");
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║  Server URL: http://{}:{:<24}  ║", config.bind, config.port);
    println!("║  CORS Origins: {:<45}║", cors_display);
    println!("║  Model client: {:<45}║", state.engine.model_client_name());
    println!("║                                                               ║");
    println!("║  Endpoints:                                                   ║");
    println!("║    POST /api/sessions                - Start an interview     ║");
    println!("║    GET  /api/sessions/:id/next       - Next question          ║");
    println!("║    POST /api/sessions/:id/answers    - Submit an answer       ║");
    println!("║    POST /api/sessions/:id/complete   - Generate diagnostic    ║");
    println!("║    GET  /api/diagnostics/:id         - Fetch a diagnostic     ║");
    println!("║    GET  /ws/events                   - WebSocket events       ║");
    println!("║    GET  /health                      - Health check           ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", addr, e))?;

    log::info!("Server listening on http://{}", addr);

    let shutdown_state = state.shutdown_state.clone();
    let shutdown_signal = async move {
        shutdown_state.wait().await;
        log::info!("Shutdown signal received, stopping server...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .map_err(|e| format!("Server error: {}", e))
}

async fn health_handler() -> &'static str {
    "OK"
}

async fn version_handler(
    axum::extract::State(state): axum::extract::State<ServerAppState>,
) -> Json<VersionInfo> {
    Json(VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        prompt_version: crate::orchestration::PROMPT_VERSION.to_string(),
        model_client: state.engine.model_client_name().to_string(),
    })
}
