//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Create Axum Router with the proxy endpoint and static fallback
//! - Wire up middleware (tracing, timeout, request ID)
//! - Bind server to listener and serve until shutdown
//! - Drive the fetch/rewrite pipeline for proxied requests
//!
//! # Design Decisions
//! - One handler owns the whole pipeline; stages stay free of HTTP types
//! - Everything that is not `/p/` falls back to the static file handler
//! - State is immutable and cheaply cloneable (Arcs all the way down)

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, Response, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use url::Url;

use crate::assets::StaticFiles;
use crate::config::ProxyConfig;
use crate::http::error::RequestError;
use crate::proxy::uri::RewriteContext;
use crate::proxy::{address, assemble, guard, UpstreamFetcher};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("rewrite.external_url is not a valid URL: {0}")]
    ExternalUrl(#[source] url::ParseError),
    #[error("couldn't build the upstream HTTP client")]
    Client(#[source] reqwest::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ProxyConfig>,
    pub external_url: Url,
    pub fetcher: Arc<UpstreamFetcher>,
    pub assets: Arc<StaticFiles>,
}

#[derive(Debug, Deserialize)]
struct ProxyParams {
    u: Option<String>,
}

/// HTTP server for the rewriting proxy.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: Arc<ProxyConfig>, assets: Arc<StaticFiles>) -> Result<Self, ServerError> {
        let external_url =
            Url::parse(&config.rewrite.external_url).map_err(ServerError::ExternalUrl)?;
        let fetcher = UpstreamFetcher::new(
            Duration::from_secs(config.timeouts.connect_secs),
            Duration::from_secs(config.timeouts.request_secs),
        )
        .map_err(ServerError::Client)?;

        let state = AppState {
            config: config.clone(),
            external_url,
            fetcher: Arc::new(fetcher),
            assets,
        };

        let router = Self::build_router(&config, state);
        Ok(Self { router })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        Router::new()
            .route(address::PROXY_PATH, get(proxy_handler))
            .fallback(get(static_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.timeouts.request_secs,
            )))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Run the server, accepting connections on the given listener until the
    /// shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Proxy endpoint: decode the target, vet it, fetch it, rewrite it.
async fn proxy_handler(
    State(state): State<AppState>,
    Query(params): Query<ProxyParams>,
    headers: HeaderMap,
) -> axum::response::Response {
    match run_pipeline(&state, params, &headers).await {
        Ok(response) => response.into_response(),
        Err(err) => err.into_response(),
    }
}

async fn run_pipeline(
    state: &AppState,
    params: ProxyParams,
    headers: &HeaderMap,
) -> Result<Response<Body>, RequestError> {
    let token = params.u.ok_or(RequestError::MissingTarget)?;
    let target = address::decode(&token)?;

    if !state.config.security.allow_private_targets {
        guard::check_port(&target)?;
        let dns_timeout = Duration::from_secs(state.config.timeouts.dns_secs);
        guard::check_addresses(&target, dns_timeout).await?;
    }

    tracing::debug!(target = %target, "Fetching upstream");
    let user_agent = headers.get(header::USER_AGENT);
    let fetched = state.fetcher.fetch(&target, user_agent).await?;

    // Relative references resolve against where the fetch ended up, not where
    // it started, so redirected pages rewrite correctly.
    let ctx = RewriteContext {
        base: fetched.final_url.clone(),
        external: state.external_url.clone(),
    };
    Ok(assemble::assemble(&state.config.rewrite, &ctx, fetched)?)
}

/// Fallback handler serving files from the public directory.
async fn static_handler(State(state): State<AppState>, uri: Uri) -> axum::response::Response {
    match state.assets.read(uri.path()).await {
        Some(file) => (
            [(header::CONTENT_TYPE, file.content_type)],
            file.body,
        )
            .into_response(),
        None => {
            let page = state.assets.not_found_page().await;
            (
                StatusCode::NOT_FOUND,
                [(header::CONTENT_TYPE, page.content_type)],
                page.body,
            )
                .into_response()
        }
    }
}
