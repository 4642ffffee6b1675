//! `vl serve` -- HTTP JSON API over the calculation pipeline.
//!
//! Exposes analysis, calculation, lifecycle and reconciliation as an
//! async HTTP service using `axum` + `tokio`, backed by the in-memory
//! store. Supports concurrent request handling; concurrent runs on the
//! same (period, rule set) key are serialized by the engine's run lock.
//!
//! Endpoints:
//! - GET  /health                     - Server status
//! - POST /analyze                    - Classify tab profiles into content units
//! - POST /execute                    - Commit confirmed content units as rows
//! - POST /runs                       - Run a calculation, producing a batch
//! - GET  /batches/{id}               - Batch summary with results
//! - POST /batches/{id}/transition    - Batch lifecycle transition
//! - POST /compare                    - Reconcile results against a benchmark
//!
//! All responses use Content-Type: application/json; errors are
//! `{"error": message}` with a meaningful status code.

mod execute;
mod handlers;
mod state;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use vl_storage::MemoryStore;

use self::execute::handle_execute;
use self::handlers::{
    handle_analyze, handle_compare, handle_get_batch, handle_health, handle_not_found, handle_run,
    handle_transition,
};
use self::state::AppState;

/// Maximum request body size: 10 MB.
const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Construct a JSON error response with the given status code and message.
fn json_error(status: StatusCode, message: &str) -> axum::response::Response {
    (status, Json(serde_json::json!({"error": message}))).into_response()
}

pub(crate) fn app(state: Arc<AppState>) -> Router {
    // CORS: permissive for local dev.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/analyze", post(handle_analyze))
        .route("/execute", post(handle_execute))
        .route("/runs", post(handle_run))
        .route("/batches/{id}", get(handle_get_batch))
        .route("/batches/{id}/transition", post(handle_transition))
        .route("/compare", post(handle_compare))
        .fallback(handle_not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state)
}

/// Start the HTTP server on the given port, optionally pre-loading data
/// bundles into the in-memory store.
pub async fn start_server(
    port: u16,
    bundle_paths: Vec<std::path::PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = MemoryStore::new();
    for path in &bundle_paths {
        let bundle = crate::bundle::load_bundle(path)?;
        tracing::info!("loaded bundle {} (tenant {})", path.display(), bundle.tenant_id);
        bundle.seed_into(&store);
    }

    let state = Arc::new(AppState::new(store));
    let router = app(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Vantage Ledger listening on http://{}", addr);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shut down");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to install Ctrl+C handler: {}", e);
    }
}
