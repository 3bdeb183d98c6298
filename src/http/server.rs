//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, timeout, request ID, nosniff)
//! - Bind server to listener with graceful shutdown
//! - Run the resolver for each call and record the outcome

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::http::request::{request_id, UuidRequestId};
use crate::http::response::image_response;
use crate::observability::metrics;
use crate::resolver::{Fetch, HttpFetcher, ResolveError, Resolver};
use crate::security::headers::nosniff_layer;
use crate::security::HostGuard;

/// Path of the resolution endpoint.
pub const RESOLVE_PATH: &str = "/api/image-proxy";

/// Application state injected into handlers.
pub struct AppState<F = HttpFetcher> {
    pub resolver: Arc<Resolver<F>>,
    pub cache_control: HeaderValue,
}

impl<F> Clone for AppState<F> {
    fn clone(&self) -> Self {
        Self {
            resolver: Arc::clone(&self.resolver),
            cache_control: self.cache_control.clone(),
        }
    }
}

impl<F: Fetch> AppState<F> {
    pub fn new(resolver: Resolver<F>, config: &ProxyConfig) -> Self {
        let cache_control = HeaderValue::from_str(&config.cache.header_value())
            .unwrap_or_else(|_| HeaderValue::from_static("public, max-age=3600"));
        Self {
            resolver: Arc::new(resolver),
            cache_control,
        }
    }
}

/// HTTP server for the image proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, reqwest::Error> {
        let fetcher = HttpFetcher::new(&config)?;
        Ok(Self::with_fetcher(config, fetcher))
    }

    /// Create a server around an already-built fetcher.
    pub fn with_fetcher(config: ProxyConfig, fetcher: HttpFetcher) -> Self {
        let resolver = Resolver::new(
            fetcher,
            HostGuard::from_config(&config.security),
            &config.fetch,
        );
        let state = AppState::new(resolver, &config);
        let router = build_router(&config, state);
        Self { router, config }
    }

    /// Run the server until the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        let config = self.config();
        tracing::info!(
            address = %addr,
            request_timeout_secs = config.timeouts.request_secs,
            max_redirects = config.fetch.max_redirects,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router<F: Fetch>(config: &ProxyConfig, state: AppState<F>) -> Router {
    Router::new()
        .route(RESOLVE_PATH, get(resolve_handler::<F>))
        .route("/healthz", get(health_handler))
        .with_state(state)
        .layer(nosniff_layer())
        .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
}

#[derive(Debug, Deserialize)]
pub struct ResolveQuery {
    pub url: Option<String>,
}

/// Resolve `?url=` to an image and stream it back.
async fn resolve_handler<F: Fetch>(
    State(state): State<AppState<F>>,
    headers: HeaderMap,
    query: Result<Query<ResolveQuery>, QueryRejection>,
) -> Response {
    let start = Instant::now();
    let request_id = request_id(&headers);

    let outcome = match query {
        Ok(Query(query)) => state.resolver.resolve(query.url.as_deref()).await,
        Err(rejection) => Err(ResolveError::InvalidInput(format!(
            "Invalid query string: {}",
            rejection.body_text()
        ))),
    };

    match outcome {
        Ok(image) => {
            tracing::info!(
                request_id = %request_id,
                source = image.source.as_str(),
                content_type = %image.content_type,
                content_length = ?image.content_length,
                "Relaying image"
            );
            metrics::record_resolution("ok", 200, start);
            image_response(image, &state.cache_control)
        }
        Err(err) => {
            report_failure(&request_id, &err);
            metrics::record_resolution(err.kind(), err.status_code().as_u16(), start);
            err.into_response()
        }
    }
}

fn report_failure(request_id: &str, err: &ResolveError) {
    match err {
        // Reason label only: the target stays out of the logs.
        ResolveError::ForbiddenHost(reason) => {
            metrics::record_blocked(reason.as_str());
            tracing::warn!(request_id = %request_id, reason = %reason, "Target refused by host guard");
        }
        ResolveError::Internal(detail) => {
            tracing::error!(request_id = %request_id, detail = %detail, "Unexpected resolver failure");
        }
        other => {
            tracing::info!(request_id = %request_id, kind = other.kind(), error = %other, "Resolution failed");
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
}

async fn health_handler() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
