use axum::{
    Router,
    routing::{delete, get, post},
};
use tower_http::{
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};

use crate::config::Config;
use crate::handlers::{
    delete_file, file_status, health_check, register_file, reprocess_file, upload_chunk,
    ws_handler,
};
use crate::state::AppState;
use crate::utils::shutdown_signal;

/// build the api router
pub fn build_router(state: Arc<AppState>, config: &Config) -> Router {
    tracing::debug!(
        "Building router with max chunk size: {} bytes",
        config.max_chunk_size
    );

    // configure rate limiting
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(2) // Burst size
            .burst_size(20)
            .finish()
            .unwrap(),
    );

    // configure cors
    let cors = CorsLayer::new()
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::DELETE,
        ])
        .allow_origin(tower_http::cors::Any) // For development, should be stricter in prod
        .allow_headers(tower_http::cors::Any);

    Router::new()
        .route("/files", post(register_file))
        .route("/files/:id", get(file_status))
        .route("/files/:id", delete(delete_file))
        .route("/files/:id/process", post(reprocess_file))
        .route("/chunks", post(upload_chunk))
        .route("/ws", get(ws_handler))
        .route("/health", get(health_check))
        // a little above the chunk ceiling, the handler enforces the real limit
        .layer(RequestBodyLimitLayer::new(config.max_chunk_size + 1024))
        .layer(GovernorLayer { config: governor_conf })
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the api server
pub async fn start_server(app: Router, addr: SocketAddr) {
    tracing::info!("Starting server...");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind server");

    tracing::debug!("Listener bound to {}", addr);

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .tcp_nodelay(true);

    tracing::info!("Server running and ready to accept connections");
    if let Err(e) = server.await {
        tracing::error!("Server error: {}", e);
    }
}

/// print startup banner with server info
pub fn print_startup_banner(config: &Config) {
    tracing::info!("Mosaic starting...");
    tracing::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    tracing::info!("📡 INGEST API: http://{}:{}", config.host, config.port);
    tracing::info!("🔌 EVENTS: ws://{}:{}/ws", config.host, config.port);
    tracing::info!("📁 Data directory: {:?}", config.data_dir.canonicalize().unwrap_or(config.data_dir.clone()));
    tracing::info!("📐 Max chunk size: {} bytes", config.max_chunk_size);
    tracing::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}
