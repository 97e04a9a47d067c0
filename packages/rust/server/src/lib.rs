//! HTTP surface for SiteSense.
//!
//! - `POST /scrape` scrape one page with optional enrichment
//! - `GET /scrape?url=` extraction only
//! - `POST /crawl` bounded same-host crawl, no enrichment
//! - `GET /health` liveness plus browser state

pub mod error;

use std::future::{Future, IntoFuture};
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, Request, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, info_span, warn};
use uuid::Uuid;

use sitesense_core::{CrawlRequest, CrawlSummary, ScrapeOutput, ScrapeRequest, SiteSense};
use sitesense_crawler::SilentProgress;
use sitesense_shared::{Result, SiteSenseError};

pub use error::ApiError;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub sitesense: SiteSense,
}

impl AppState {
    pub fn new(sitesense: SiteSense) -> Self {
        Self { sitesense }
    }
}

/// Body of every successful response.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct ScrapeQuery {
    #[serde(default)]
    url: String,
}

/// Build the HTTP router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/scrape", post(scrape_handler).get(quick_scrape_handler))
        .route("/crawl", post(crawl_handler))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            info_span!(
                "http",
                method = %request.method(),
                path = %request.uri().path(),
                request_id = %Uuid::now_v7(),
            )
        }))
        .with_state(state)
}

/// Serve the router on `listener` until `shutdown` resolves.
///
/// In-flight requests get up to `drain_timeout` to finish once `shutdown`
/// resolves; after that they are abandoned and this returns.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
    drain_timeout: Duration,
) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "listening");
    }

    let (signalled_tx, mut signalled_rx) = tokio::sync::watch::channel(false);
    let graceful = async move {
        shutdown.await;
        let _ = signalled_tx.send(true);
    };
    let server = axum::serve(listener, build_router(state))
        .with_graceful_shutdown(graceful)
        .into_future();
    let deadline = async move {
        if signalled_rx.wait_for(|signalled| *signalled).await.is_err() {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(drain_timeout).await;
    };

    tokio::select! {
        result = server => {
            result.map_err(|e| SiteSenseError::Network(format!("server error: {e}")))
        }
        () = deadline => {
            warn!(
                timeout_secs = drain_timeout.as_secs_f64(),
                "in-flight requests still running after drain timeout, abandoning them"
            );
            Ok(())
        }
    }
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "browserInitialized": state.sitesense.fetcher().is_ready(),
    }))
}

async fn scrape_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ScrapeRequest>, JsonRejection>,
) -> std::result::Result<Json<ApiResponse<ScrapeOutput>>, ApiError> {
    let Json(request) = payload?;
    info!(
        url = %request.url,
        enrichment = request.wants_enrichment(),
        "scrape request"
    );
    let output = state.sitesense.scrape(&request).await?;
    Ok(ApiResponse::ok(output))
}

async fn quick_scrape_handler(
    State(state): State<AppState>,
    Query(query): Query<ScrapeQuery>,
) -> std::result::Result<Json<ApiResponse<ScrapeOutput>>, ApiError> {
    info!(url = %query.url, "quick scrape request");
    let output = state
        .sitesense
        .scrape(&ScrapeRequest::extract_only(query.url))
        .await?;
    Ok(ApiResponse::ok(output))
}

async fn crawl_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CrawlRequest>, JsonRejection>,
) -> std::result::Result<Json<ApiResponse<CrawlSummary>>, ApiError> {
    let Json(request) = payload?;
    info!(url = %request.url, max_pages = ?request.max_pages, "crawl request");
    let outcome = state
        .sitesense
        .crawl(&request.url, request.max_pages, &SilentProgress)
        .await?;
    Ok(ApiResponse::ok(CrawlSummary::from(outcome)))
}
