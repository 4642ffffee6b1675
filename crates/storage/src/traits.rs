use async_trait::async_trait;

use vl_core::{CommittedDataRow, Entity, Period, TenantContext};

use crate::error::StorageError;
use crate::record::{CalculationBatchRecord, CalculationResultRecord};
use vl_core::BatchState;

/// The storage trait for Vantage Ledger backends.
///
/// ## Snapshot semantics
///
/// All mutating operations take `&mut Self::Snapshot`, an in-progress
/// transaction. The lifecycle is:
///
/// 1. `begin_snapshot()` — start a transaction
/// 2. mutate with `&mut snapshot`
/// 3. `commit_snapshot(snapshot)` — commit and consume,
///    OR `abort_snapshot(snapshot)` — roll back and consume
///
/// A snapshot dropped without committing must be rolled back.
///
/// ## Run serialization
///
/// The delete-then-insert sequence of a calculation run is a critical
/// section per `(tenant, period, rule_set)` key. `try_lock_run` /
/// `unlock_run` serialize concurrent runs on the same key;
/// `run_locked` lets the lifecycle layer reject transitions on a batch
/// that is mid-recalculation.
///
/// ## Tenant scoping
///
/// Every query takes a `&TenantContext` and must filter by its
/// `tenant_id`. No cross-tenant read path exists at this layer.
///
/// Implementations must be `Send + Sync + 'static` for use in axum
/// application state.
#[async_trait]
pub trait VantageStore: Send + Sync + 'static {
    /// The snapshot (transaction) type used by this backend.
    type Snapshot: Send;

    // ── Snapshot lifecycle ────────────────────────────────────────────────

    async fn begin_snapshot(&self) -> Result<Self::Snapshot, StorageError>;
    async fn commit_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;
    async fn abort_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    // ── Tenant-scoped reads ───────────────────────────────────────────────

    async fn list_periods(&self, ctx: &TenantContext) -> Result<Vec<Period>, StorageError>;

    async fn get_period(&self, ctx: &TenantContext, period_id: &str)
        -> Result<Period, StorageError>;

    async fn list_entities(&self, ctx: &TenantContext) -> Result<Vec<Entity>, StorageError>;

    /// Raw plan JSON. Validation into the typed plan model happens at the
    /// engine boundary (`RuleSet::from_json`), not here.
    async fn get_rule_set_json(
        &self,
        ctx: &TenantContext,
        rule_set_id: &str,
    ) -> Result<serde_json::Value, StorageError>;

    /// Committed rows for a period, plus period-less rows (rosters) that
    /// carry entity attributes used for group joins.
    async fn list_committed_rows(
        &self,
        ctx: &TenantContext,
        period_id: &str,
    ) -> Result<Vec<CommittedDataRow>, StorageError>;

    // ── Classification commit (within snapshot) ───────────────────────────

    async fn insert_committed_rows(
        &self,
        snapshot: &mut Self::Snapshot,
        rows: Vec<CommittedDataRow>,
    ) -> Result<(), StorageError>;

    async fn insert_periods(
        &self,
        snapshot: &mut Self::Snapshot,
        periods: Vec<Period>,
    ) -> Result<(), StorageError>;

    // ── Run critical section ──────────────────────────────────────────────

    /// Acquire the per-key run lock, or fail with `RunInProgress`.
    async fn try_lock_run(
        &self,
        ctx: &TenantContext,
        period_id: &str,
        rule_set_id: &str,
    ) -> Result<(), StorageError>;

    async fn unlock_run(
        &self,
        ctx: &TenantContext,
        period_id: &str,
        rule_set_id: &str,
    ) -> Result<(), StorageError>;

    /// Whether a run currently holds the lock for this key.
    async fn run_locked(
        &self,
        ctx: &TenantContext,
        period_id: &str,
        rule_set_id: &str,
    ) -> Result<bool, StorageError>;

    /// Delete all live results for the `(tenant, period, rule_set)` key.
    /// Returns how many were removed.
    async fn delete_results(
        &self,
        snapshot: &mut Self::Snapshot,
        ctx: &TenantContext,
        period_id: &str,
        rule_set_id: &str,
    ) -> Result<usize, StorageError>;

    /// Insert one calculation result.
    ///
    /// Backstop for the uniqueness invariant: a second live result for the
    /// same `(tenant, entity, period, rule_set)` key — counting mutations
    /// already staged in this snapshot — is `DuplicateResult`.
    async fn insert_result(
        &self,
        snapshot: &mut Self::Snapshot,
        record: CalculationResultRecord,
    ) -> Result<(), StorageError>;

    async fn insert_batch(
        &self,
        snapshot: &mut Self::Snapshot,
        record: CalculationBatchRecord,
    ) -> Result<(), StorageError>;

    // ── Batch queries ─────────────────────────────────────────────────────

    async fn get_batch(
        &self,
        ctx: &TenantContext,
        batch_id: &str,
    ) -> Result<CalculationBatchRecord, StorageError>;

    async fn list_results(
        &self,
        ctx: &TenantContext,
        batch_id: &str,
    ) -> Result<Vec<CalculationResultRecord>, StorageError>;

    /// Persist a batch state already validated by the lifecycle layer.
    async fn update_batch_state(
        &self,
        ctx: &TenantContext,
        batch_id: &str,
        state: BatchState,
    ) -> Result<(), StorageError>;
}
