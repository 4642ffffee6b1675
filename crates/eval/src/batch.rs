//! Batch lifecycle transitions.

use vl_core::{BatchState, TenantContext};
use vl_storage::{CalculationBatchRecord, VantageStore};

use crate::types::EngineError;

/// Move a batch to `to`, enforcing the lifecycle transition table.
///
/// A batch whose `(tenant, period, rule_set)` key is mid-recalculation
/// cannot transition; the caller retries after the run releases the lock.
pub async fn transition_batch<S: VantageStore>(
    store: &S,
    ctx: &TenantContext,
    batch_id: &str,
    to: BatchState,
) -> Result<CalculationBatchRecord, EngineError> {
    let batch = store.get_batch(ctx, batch_id).await?;
    if store
        .run_locked(ctx, &batch.period_id, &batch.rule_set_id)
        .await?
    {
        return Err(EngineError::BatchBusy {
            batch_id: batch_id.to_string(),
        });
    }
    let next = batch.state.transition(to)?;
    store.update_batch_state(ctx, batch_id, next).await?;
    Ok(CalculationBatchRecord {
        state: next,
        ..batch
    })
}
