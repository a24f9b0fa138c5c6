//! API Module
//!
//! HTTP surface of server mode: job submission, status and gallery lookups,
//! plus the static web UI.

pub mod error;
pub mod health;
pub mod wallpaper;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tokio_util::sync::CancellationToken;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::context::AppContext;

/// Create the main API router with all endpoints
pub fn create_router(ctx: AppContext) -> Router {
    let static_dir = ctx.config.static_dir.clone();
    let body_limit = ctx.config.max_upload_bytes;

    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Wallpaper endpoints
        .route("/api/create", post(wallpaper::create_wallpaper))
        .route("/api/status/{id}", get(wallpaper::get_status))
        .route("/api/gallery", get(wallpaper::get_gallery))
        // Web UI
        .route_service("/", ServeFile::new(static_dir.join("index.html")))
        .nest_service("/static", ServeDir::new(static_dir))
        // Add state and middleware
        .with_state(ctx)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
}

/// Serves the router until `shutdown` is cancelled
pub async fn serve(ctx: AppContext, shutdown: CancellationToken) -> anyhow::Result<()> {
    let addr = ctx.config.bind_addr.clone();
    let app = create_router(ctx);

    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!("API server stopped");
    Ok(())
}
