//! HTTP route handlers: health, analysis, runs, batches, reconciliation.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use vl_analyze::{negotiate, TabProfile};
use vl_core::{BatchState, TenantContext};
use vl_eval::EngineError;
use vl_recon::{compare, parse_benchmark_str, CompareConfig};
use vl_storage::{StorageError, VantageStore};

use super::json_error;
use super::state::AppState;

/// Fallback handler for unmatched routes.
pub(crate) async fn handle_not_found() -> Response {
    json_error(StatusCode::NOT_FOUND, "not found")
}

/// GET /health
pub(crate) async fn handle_health() -> impl IntoResponse {
    let response = serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(response))
}

fn engine_error(e: &EngineError) -> Response {
    let status = match e {
        EngineError::Storage(StorageError::NotFound { .. }) => StatusCode::NOT_FOUND,
        EngineError::Storage(StorageError::RunInProgress { .. })
        | EngineError::Storage(StorageError::DuplicateResult { .. })
        | EngineError::Lifecycle(_)
        | EngineError::BatchBusy { .. } => StatusCode::CONFLICT,
        EngineError::Plan(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::Storage(StorageError::Backend(_)) | EngineError::Internal { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    json_error(status, &e.to_string())
}

fn storage_error(e: StorageError) -> Response {
    engine_error(&EngineError::Storage(e))
}

// ── Analysis ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(crate) struct AnalyzeRequest {
    pub tabs: Vec<TabProfile>,
}

/// POST /analyze
pub(crate) async fn handle_analyze(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyzeRequest>,
) -> Response {
    if request.tabs.is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "no tabs provided");
    }
    let proposal = negotiate(&request.tabs);
    let proposal_id = state.next_proposal_id();
    state
        .proposals
        .write()
        .await
        .insert(proposal_id.clone(), proposal.clone());

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "proposal_id": proposal_id,
            "proposal": proposal,
        })),
    )
        .into_response()
}

// ── Calculation ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(crate) struct RunRequest {
    pub tenant_id: String,
    pub period_id: String,
    pub rule_set_id: String,
}

/// POST /runs
///
/// A run over an empty roster is still a success; `entity_count: 0` is
/// the signal, not an error body.
pub(crate) async fn handle_run(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RunRequest>,
) -> Response {
    let ctx = TenantContext::new(request.tenant_id);
    match vl_eval::run(&state.store, &ctx, &request.period_id, &request.rule_set_id).await {
        Ok(outcome) => {
            let mut body = serde_json::to_value(&outcome).unwrap_or(serde_json::Value::Null);
            if let Some(map) = body.as_object_mut() {
                map.insert("success".into(), serde_json::Value::Bool(true));
            }
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => engine_error(&e),
    }
}

// ── Batches ───────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(crate) struct TenantQuery {
    pub tenant_id: String,
}

/// GET /batches/{id}
pub(crate) async fn handle_get_batch(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<TenantQuery>,
) -> Response {
    let ctx = TenantContext::new(query.tenant_id);
    let batch = match state.store.get_batch(&ctx, &id).await {
        Ok(batch) => batch,
        Err(e) => return storage_error(e),
    };
    let results = match state.store.list_results(&ctx, &id).await {
        Ok(results) => results,
        Err(e) => return storage_error(e),
    };
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "batch": batch,
            "results": results,
        })),
    )
        .into_response()
}

#[derive(Deserialize)]
pub(crate) struct TransitionRequest {
    pub tenant_id: String,
    pub to: BatchState,
}

/// POST /batches/{id}/transition
pub(crate) async fn handle_transition(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<TransitionRequest>,
) -> Response {
    let ctx = TenantContext::new(request.tenant_id);
    match vl_eval::transition_batch(&state.store, &ctx, &id, request.to).await {
        Ok(batch) => (StatusCode::OK, Json(serde_json::json!({ "batch": batch }))).into_response(),
        Err(e) => engine_error(&e),
    }
}

// ── Reconciliation ────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(crate) struct CompareRequest {
    pub tenant_id: String,
    pub batch_id: String,
    pub config: CompareConfig,
    /// Raw benchmark CSV text.
    pub csv: String,
}

/// POST /compare
pub(crate) async fn handle_compare(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CompareRequest>,
) -> Response {
    let ctx = TenantContext::new(request.tenant_id);
    let results = match state.store.list_results(&ctx, &request.batch_id).await {
        Ok(results) => results,
        Err(e) => return storage_error(e),
    };
    let rows = match parse_benchmark_str(&request.csv, &request.config) {
        Ok(rows) => rows,
        Err(e) => return json_error(StatusCode::UNPROCESSABLE_ENTITY, &e.to_string()),
    };
    let comparison = compare(&results, &rows, &request.config);
    (StatusCode::OK, Json(comparison)).into_response()
}
