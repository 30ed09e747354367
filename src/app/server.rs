use crate::adapters::{GeminiClient, LocalImageStore, PerplexityClient, StaticMapClient};
use crate::app::handlers;
use crate::app::session::{session_middleware, SessionStore};
use crate::app::views::Views;
use crate::config::AppConfig;
use crate::core::AnalysisService;
use crate::utils::error::{GreenwardError, Result};
use axum::extract::{DefaultBodyLimit, Request};
use axum::http::header;
use axum::http::{HeaderValue, Method};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; \
     script-src 'self' 'unsafe-inline' 'unsafe-eval' *.googleapis.com *.google.com *.gstatic.com; \
     style-src 'self' 'unsafe-inline' *.googleapis.com *.gstatic.com; \
     font-src 'self' data: *.gstatic.com; \
     connect-src 'self' data: https://raw.githubusercontent.com *.googleapis.com *.google.com *.gstatic.com maps.gstatic.com; \
     img-src 'self' data: *.googleapis.com *.gstatic.com; \
     frame-src *.google.com; \
     worker-src blob:;";

/// Shared state behind every handler.
pub struct AppState {
    pub config: AppConfig,
    pub analysis: AnalysisService,
    pub sessions: SessionStore,
    pub views: Views,
}

impl AppState {
    pub fn new(config: AppConfig, analysis: AnalysisService) -> Result<Self> {
        Ok(Self {
            config,
            analysis,
            sessions: SessionStore::new(),
            views: Views::new()?,
        })
    }

    /// Wires the real Gemini, Perplexity and Static Maps clients and the
    /// on-disk image store.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let analysis = AnalysisService::new(
            Arc::new(GeminiClient::new(config.gemini.clone())?),
            Arc::new(PerplexityClient::new(config.perplexity.clone())?),
            Arc::new(StaticMapClient::new(config.maps.clone())?),
            Arc::new(LocalImageStore::new(config.server.image_dir())),
        );
        Self::new(config, analysis)
    }

    /// Where "back to map" links point.
    pub fn back_to_map_url(&self) -> &str {
        self.config.server.frontend_origin().unwrap_or("/")
    }
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .server
        .cors_origins()
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(CONTENT_SECURITY_POLICY),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
    response
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.server.max_upload_bytes;
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/", get(handlers::home))
        .route("/upload", get(handlers::home))
        .route("/analyze", post(handlers::analyze))
        .route("/analysis/latest", get(handlers::latest_analysis))
        .route("/analysis/image/{token}", get(handlers::analysis_image))
        .route("/recommend", post(handlers::recommend))
        .route("/health", get(handlers::health))
        .route("/api/maps/sdk_url", get(handlers::maps_sdk_url))
        .layer(middleware::from_fn_with_state(state.clone(), session_middleware))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(security_headers))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}

/// Binds the configured address and serves until Ctrl+C or SIGTERM.
pub async fn serve(state: Arc<AppState>) -> Result<()> {
    let addr = state.config.server.bind_address();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Starting greenward server");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(GreenwardError::IoError)?;

    tracing::info!("Server shutdown complete");
    Ok(())
}
