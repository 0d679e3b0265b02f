//! Web layer module
//!
//! HTTP interface of the image service. Handlers are thin: they normalize
//! request input and delegate to the render cache and renderer.
//!
//! Middleware, outermost first: request logging, security headers, CORS,
//! compression.

use anyhow::Result;
use axum::{Router, routing::get};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::{
    config::Config,
    errors::AppResult,
    models::RenderLimits,
    services::{RenderCache, Renderer},
};

pub mod compression;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod responses;

pub use compression::CompressionPools;
pub use responses::{ApiResponse, handle_error, handle_result};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub renderer: Arc<Renderer>,
    pub cache: RenderCache,
    pub compression: CompressionPools,
    pub render_limits: RenderLimits,
    /// `Cache-Control: max-age` for image responses
    pub max_age: Duration,
    /// Application start time for uptime calculation
    pub start_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    /// Build state from configuration, loading fonts for a new renderer
    pub fn new(config: Config) -> AppResult<Self> {
        let renderer = Renderer::new(&config.render);
        Self::with_renderer(config, Arc::new(renderer))
    }

    /// Build state around an existing renderer
    pub fn with_renderer(config: Config, renderer: Arc<Renderer>) -> AppResult<Self> {
        let cache = RenderCache::new(config.cache.capacity()?);
        let max_age = config.cache.max_age()?;

        Ok(Self {
            render_limits: config.render.limits(),
            compression: CompressionPools::new(&config.compression),
            config: Arc::new(config),
            renderer,
            cache,
            max_age,
            start_time: chrono::Utc::now(),
        })
    }
}

/// Create the router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/avatar", get(handlers::images::avatar_by_query))
        .route("/avatar/{name}", get(handlers::images::avatar_by_path))
        .route("/placeholder/{dims}", get(handlers::images::placeholder))
        .fallback(handlers::fallback);

    // Middleware (applied in reverse order)
    if state.config.compression.enabled {
        router = router.layer(axum::middleware::from_fn_with_state(
            state.compression.clone(),
            compression::compression_middleware,
        ));
    }

    router
        .layer(CorsLayer::permissive())
        .layer(axum::middleware::from_fn(
            middleware::security_headers_middleware,
        ))
        .layer(axum::middleware::from_fn(
            middleware::request_logging_middleware,
        ))
        .with_state(state)
}

/// Web server configuration and setup
pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub fn new(config: &Config, state: AppState) -> Result<Self> {
        let addr: SocketAddr = format!("{}:{}", config.web.host, config.web.port).parse()?;
        Ok(Self {
            app: create_router(state),
            addr,
        })
    }

    /// Serve until SIGINT or SIGTERM, then drain in-flight requests
    pub async fn serve(self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", self.addr, e))?;
        info!("Listening on http://{}", self.addr);

        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        info!("Web server stopped");
        Ok(())
    }

    /// Get the host address
    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    /// Get the port number
    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM, shutting down gracefully");
                    }
                    _ = sigint.recv() => {
                        info!("Received SIGINT (Ctrl+C), shutting down gracefully");
                    }
                }
                return;
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!("Failed to install signal handlers: {}", e);
            }
        }
    }

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down gracefully"),
        Err(e) => {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
