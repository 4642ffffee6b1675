//! The calculation run: lock, load, evaluate, replace, commit.
//!
//! A run replaces all live results for one `(tenant, period, rule_set)`
//! key inside a single snapshot, so readers never observe a partial
//! batch. The per-key run lock serializes concurrent runs; the lock is
//! released on every exit path.

use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use vl_analyze::build_component_metrics;
use vl_core::{BatchState, Entity, Period, RuleSet, TenantContext};
use vl_storage::{CalculationBatchRecord, CalculationResultRecord, VantageStore};

use crate::aggregate::{derive_semantic_values, entity_rows};
use crate::component::evaluate_component;
use crate::numeric::round_money;
use crate::types::{EngineError, RunOutcome};

/// Execute a full calculation run for one period and rule set.
///
/// Produces a new batch in `DRAFT` and replaces any previous results for
/// the key. Entities with no matching rows still get a result (zero
/// payouts with traces), so roster coverage is visible in the output.
pub async fn run<S: VantageStore>(
    store: &S,
    ctx: &TenantContext,
    period_id: &str,
    rule_set_id: &str,
) -> Result<RunOutcome, EngineError> {
    store.try_lock_run(ctx, period_id, rule_set_id).await?;
    let outcome = run_locked_inner(store, ctx, period_id, rule_set_id).await;
    store.unlock_run(ctx, period_id, rule_set_id).await?;
    outcome
}

async fn run_locked_inner<S: VantageStore>(
    store: &S,
    ctx: &TenantContext,
    period_id: &str,
    rule_set_id: &str,
) -> Result<RunOutcome, EngineError> {
    let period = store.get_period(ctx, period_id).await?;
    let plan_json = store.get_rule_set_json(ctx, rule_set_id).await?;
    let rule_set = RuleSet::from_json(&plan_json)?;
    let entities = store.list_entities(ctx).await?;
    let rows = store.list_committed_rows(ctx, period_id).await?;

    let started_at = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|e| EngineError::Internal {
            message: format!("clock format: {}", e),
        })?;
    let batch_id = batch_id(ctx, &period, &rule_set, &started_at);

    let mut log = Vec::new();
    let mut results = Vec::new();
    let mut total_payout = Decimal::ZERO;

    for entity in &entities {
        let record = evaluate_entity(ctx, entity, &period, &rule_set, &rows, &batch_id, &mut log);
        total_payout += record.total_payout;
        results.push(record);
    }
    total_payout = round_money(total_payout);

    let batch = CalculationBatchRecord {
        id: batch_id.clone(),
        tenant_id: ctx.tenant_id.clone(),
        period_id: period.id.clone(),
        rule_set_id: rule_set.id.clone(),
        state: BatchState::Draft,
        entity_count: entities.len(),
        result_count: results.len(),
        total_payout,
        started_at,
        completed_at: Some(
            OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .map_err(|e| EngineError::Internal {
                    message: format!("clock format: {}", e),
                })?,
        ),
    };

    let mut snapshot = store.begin_snapshot().await?;
    let replaced = match persist(
        store,
        &mut snapshot,
        ctx,
        period_id,
        rule_set_id,
        &results,
        &batch,
    )
    .await
    {
        Ok(replaced) => replaced,
        Err(e) => {
            store.abort_snapshot(snapshot).await?;
            return Err(e.into());
        }
    };
    store.commit_snapshot(snapshot).await?;

    if replaced > 0 {
        log.push(format!("replaced {} previous results", replaced));
    }

    Ok(RunOutcome {
        batch_id,
        entity_count: entities.len(),
        result_count: results.len(),
        total_payout,
        results,
        log,
    })
}

async fn persist<S: VantageStore>(
    store: &S,
    snapshot: &mut S::Snapshot,
    ctx: &TenantContext,
    period_id: &str,
    rule_set_id: &str,
    results: &[CalculationResultRecord],
    batch: &CalculationBatchRecord,
) -> Result<usize, vl_storage::StorageError> {
    let replaced = store
        .delete_results(snapshot, ctx, period_id, rule_set_id)
        .await?;
    for record in results {
        store.insert_result(snapshot, record.clone()).await?;
    }
    store.insert_batch(snapshot, batch.clone()).await?;
    Ok(replaced)
}

fn evaluate_entity(
    ctx: &TenantContext,
    entity: &Entity,
    period: &Period,
    rule_set: &RuleSet,
    rows: &[vl_core::CommittedDataRow],
    batch_id: &str,
    log: &mut Vec<String>,
) -> CalculationResultRecord {
    let mine = entity_rows(entity, rows, rule_set.input_bindings.group_field.as_deref());
    let values = derive_semantic_values(
        &rule_set.input_bindings.metric_derivations,
        &mine,
        log,
    );

    let mut components = Vec::with_capacity(rule_set.components.len());
    let mut total = Decimal::ZERO;
    for component in &rule_set.components {
        let (metrics, warnings) = build_component_metrics(component, &values);
        let result = evaluate_component(component, &metrics, &warnings);
        total += result.payout;
        components.push(result);
    }

    CalculationResultRecord {
        tenant_id: ctx.tenant_id.clone(),
        entity_id: entity.id.clone(),
        external_id: entity.external_id.clone(),
        period_id: period.id.clone(),
        rule_set_id: rule_set.id.clone(),
        batch_id: batch_id.to_string(),
        total_payout: round_money(total),
        components,
        metrics: serde_json::to_value(&values).unwrap_or(serde_json::Value::Null),
        metadata: serde_json::Value::Null,
    }
}

fn batch_id(ctx: &TenantContext, period: &Period, rule_set: &RuleSet, started_at: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ctx.tenant_id.as_bytes());
    hasher.update(b"|");
    hasher.update(period.id.as_bytes());
    hasher.update(b"|");
    hasher.update(rule_set.id.as_bytes());
    hasher.update(b"|");
    hasher.update(started_at.as_bytes());
    let digest = hasher.finalize();
    let mut id = String::with_capacity(16);
    for byte in digest.iter().take(8) {
        id.push_str(&format!("{:02x}", byte));
    }
    id
}
