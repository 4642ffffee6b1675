//! POST /execute -- commit confirmed content units as committed rows.
//!
//! Once the analyst confirms (or amends) an analysis proposal, each
//! confirmed unit's sheet rows become committed fact rows: periods are
//! detected and created as needed, rows are bound to entities by external
//! id and to periods by their mapped date columns, and everything lands
//! in a single snapshot.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use vl_analyze::{detect_periods, parse_period_value, SheetData, TargetField};
use vl_core::{canonical_key, CommittedDataRow, Period, TenantContext};
use vl_storage::VantageStore;

use super::json_error;
use super::state::AppState;

#[derive(Deserialize)]
pub(crate) struct ExecuteRequest {
    pub tenant_id: String,
    /// Proposal being confirmed; consumed on success.
    #[serde(default)]
    pub proposal_id: Option<String>,
    pub units: Vec<ExecuteUnit>,
}

#[derive(Deserialize)]
pub(crate) struct ExecuteUnit {
    pub unit_id: String,
    /// Stamped on every committed row (e.g. "transactions", "roster").
    pub data_type: String,
    /// Column holding the entity's external id, when rows are per-entity.
    #[serde(default)]
    pub entity_id_field: Option<String>,
    pub sheet: SheetData,
}

pub(crate) async fn handle_execute(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ExecuteRequest>,
) -> Response {
    if request.units.is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "no content units provided");
    }
    let ctx = TenantContext::new(request.tenant_id.clone());

    let existing_periods = match state.store.list_periods(&ctx).await {
        Ok(periods) => periods,
        Err(e) => return json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    };
    let entities = match state.store.list_entities(&ctx).await {
        Ok(entities) => entities,
        Err(e) => return json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    };
    let external_ids: BTreeMap<String, String> = entities
        .into_iter()
        .map(|e| (e.external_id, e.id))
        .collect();

    let sheets: Vec<SheetData> = request.units.iter().map(|u| u.sheet.clone()).collect();
    let detection = detect_periods(&sheets);

    let mut period_ids: BTreeMap<String, String> = existing_periods
        .into_iter()
        .map(|p| (p.canonical_key.clone(), p.id))
        .collect();
    let mut new_periods = Vec::new();
    for detected in &detection.periods {
        if period_ids.contains_key(&detected.canonical_key) {
            continue;
        }
        let id = format!("per_{}", detected.canonical_key);
        period_ids.insert(detected.canonical_key.clone(), id.clone());
        new_periods.push(Period {
            id,
            tenant_id: request.tenant_id.clone(),
            canonical_key: detected.canonical_key.clone(),
            label: detected.canonical_key.clone(),
            start_date: detected.start_date.clone(),
            end_date: detected.end_date.clone(),
            status: "open".to_string(),
        });
    }

    let mut rows = Vec::new();
    for unit in &request.units {
        let year_col = mapped_column(&unit.sheet, TargetField::Year);
        let month_col = mapped_column(&unit.sheet, TargetField::Month);
        let date_col = mapped_column(&unit.sheet, TargetField::Date);

        for (index, data) in unit.sheet.rows.iter().enumerate() {
            if data.is_empty() {
                continue;
            }
            let period_id = row_period_key(data, &year_col, &month_col, &date_col)
                .and_then(|key| period_ids.get(&key).cloned());
            let entity_id = unit
                .entity_id_field
                .as_deref()
                .and_then(|field| cell_text(data.get(field)))
                .and_then(|external| external_ids.get(&external).cloned());

            rows.push(CommittedDataRow {
                id: format!("{}_r{}", unit.unit_id, index),
                tenant_id: request.tenant_id.clone(),
                entity_id,
                period_id,
                data_type: unit.data_type.clone(),
                row_data: data.clone(),
                metadata: serde_json::json!({
                    "unit_id": unit.unit_id,
                    "sheet": unit.sheet.name,
                }),
            });
        }
    }

    let periods_created = new_periods.len();
    let rows_committed = rows.len();

    let mut snapshot = match state.store.begin_snapshot().await {
        Ok(snapshot) => snapshot,
        Err(e) => return json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    };
    let staged = async {
        state.store.insert_periods(&mut snapshot, new_periods).await?;
        state.store.insert_committed_rows(&mut snapshot, rows).await
    }
    .await;
    if let Err(e) = staged {
        let _ = state.store.abort_snapshot(snapshot).await;
        return json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string());
    }
    if let Err(e) = state.store.commit_snapshot(snapshot).await {
        return json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string());
    }

    if let Some(proposal_id) = &request.proposal_id {
        state.proposals.write().await.remove(proposal_id);
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "success": true,
            "rows_committed": rows_committed,
            "periods_created": periods_created,
            "period_detection": detection,
        })),
    )
        .into_response()
}

fn mapped_column(sheet: &SheetData, target: TargetField) -> Option<String> {
    sheet
        .field_mapping
        .iter()
        .find(|(_, t)| **t == target)
        .map(|(column, _)| column.clone())
}

fn row_period_key(
    data: &serde_json::Map<String, serde_json::Value>,
    year_col: &Option<String>,
    month_col: &Option<String>,
    date_col: &Option<String>,
) -> Option<String> {
    if let (Some(yc), Some(mc)) = (year_col, month_col) {
        let year = data.get(yc.as_str()).and_then(|v| v.as_i64());
        let month = data.get(mc.as_str()).and_then(|v| v.as_i64());
        if let (Some(year), Some(month)) = (year, month) {
            if (1..=12).contains(&month) && (2000..=2100).contains(&year) {
                return Some(canonical_key(year as i32, month as u8));
            }
        }
        return None;
    }
    date_col
        .as_ref()
        .and_then(|dc| data.get(dc.as_str()))
        .and_then(parse_period_value)
        .map(|(year, month)| canonical_key(year, month))
}

fn cell_text(value: Option<&serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
