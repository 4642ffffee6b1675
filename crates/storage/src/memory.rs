//! In-memory VantageStore backend.
//!
//! Used by tests and the HTTP server. Snapshots stage mutations locally
//! and apply them against a clone of the store on commit, so a failed
//! commit leaves the base state untouched and a dropped snapshot is a
//! rollback for free.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use vl_core::{BatchState, CommittedDataRow, Entity, Period, TenantContext};

use crate::error::StorageError;
use crate::record::{CalculationBatchRecord, CalculationResultRecord};
use crate::traits::VantageStore;

type RunKey = (String, String, String);
type ResultKey = (String, String, String, String);

#[derive(Default, Clone)]
struct Inner {
    periods: Vec<Period>,
    entities: Vec<Entity>,
    rule_sets: HashMap<(String, String), serde_json::Value>,
    rows: Vec<CommittedDataRow>,
    results: Vec<CalculationResultRecord>,
    batches: Vec<CalculationBatchRecord>,
    run_locks: HashSet<RunKey>,
}

#[derive(Debug, Clone)]
enum StagedOp {
    InsertRows(Vec<CommittedDataRow>),
    InsertPeriods(Vec<Period>),
    DeleteResults {
        tenant_id: String,
        period_id: String,
        rule_set_id: String,
    },
    InsertResult(CalculationResultRecord),
    InsertBatch(CalculationBatchRecord),
}

/// A staged in-memory transaction. Dropping it discards the staged ops.
pub struct MemorySnapshot {
    staged: Vec<StagedOp>,
}

/// The in-memory backend. Cheap to clone; all clones share state.
#[derive(Default, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    // Seeding helpers for tests, the CLI, and the demo server. The
    // platform's real import path lives outside this subsystem.

    pub fn seed_period(&self, period: Period) {
        self.lock().periods.push(period);
    }

    pub fn seed_entity(&self, entity: Entity) {
        self.lock().entities.push(entity);
    }

    pub fn seed_rule_set(&self, tenant_id: &str, rule_set_id: &str, json: serde_json::Value) {
        self.lock()
            .rule_sets
            .insert((tenant_id.to_string(), rule_set_id.to_string()), json);
    }

    pub fn seed_row(&self, row: CommittedDataRow) {
        self.lock().rows.push(row);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn result_key(r: &CalculationResultRecord) -> ResultKey {
    (
        r.tenant_id.clone(),
        r.entity_id.clone(),
        r.period_id.clone(),
        r.rule_set_id.clone(),
    )
}

/// Apply one staged op to a working copy of the store.
fn apply(inner: &mut Inner, op: &StagedOp) -> Result<(), StorageError> {
    match op {
        StagedOp::InsertRows(rows) => inner.rows.extend(rows.iter().cloned()),
        StagedOp::InsertPeriods(periods) => {
            for period in periods {
                let exists = inner.periods.iter().any(|p| {
                    p.tenant_id == period.tenant_id && p.canonical_key == period.canonical_key
                });
                if !exists {
                    inner.periods.push(period.clone());
                }
            }
        }
        StagedOp::DeleteResults {
            tenant_id,
            period_id,
            rule_set_id,
        } => inner.results.retain(|r| {
            !(r.tenant_id == *tenant_id
                && r.period_id == *period_id
                && r.rule_set_id == *rule_set_id)
        }),
        StagedOp::InsertResult(record) => {
            let key = result_key(record);
            if inner.results.iter().any(|r| result_key(r) == key) {
                return Err(StorageError::DuplicateResult {
                    entity_id: record.entity_id.clone(),
                    period_id: record.period_id.clone(),
                    rule_set_id: record.rule_set_id.clone(),
                });
            }
            inner.results.push(record.clone());
        }
        StagedOp::InsertBatch(record) => inner.batches.push(record.clone()),
    }
    Ok(())
}

#[async_trait]
impl VantageStore for MemoryStore {
    type Snapshot = MemorySnapshot;

    async fn begin_snapshot(&self) -> Result<MemorySnapshot, StorageError> {
        Ok(MemorySnapshot { staged: Vec::new() })
    }

    async fn commit_snapshot(&self, snapshot: MemorySnapshot) -> Result<(), StorageError> {
        let mut guard = self.lock();
        // Apply against a working copy so a mid-commit failure leaves the
        // base state untouched.
        let mut working = guard.clone();
        for op in &snapshot.staged {
            apply(&mut working, op)?;
        }
        *guard = working;
        Ok(())
    }

    async fn abort_snapshot(&self, _snapshot: MemorySnapshot) -> Result<(), StorageError> {
        Ok(())
    }

    async fn list_periods(&self, ctx: &TenantContext) -> Result<Vec<Period>, StorageError> {
        Ok(self
            .lock()
            .periods
            .iter()
            .filter(|p| p.tenant_id == ctx.tenant_id)
            .cloned()
            .collect())
    }

    async fn get_period(
        &self,
        ctx: &TenantContext,
        period_id: &str,
    ) -> Result<Period, StorageError> {
        self.lock()
            .periods
            .iter()
            .find(|p| p.tenant_id == ctx.tenant_id && p.id == period_id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                kind: "period",
                id: period_id.to_string(),
            })
    }

    async fn list_entities(&self, ctx: &TenantContext) -> Result<Vec<Entity>, StorageError> {
        Ok(self
            .lock()
            .entities
            .iter()
            .filter(|e| e.tenant_id == ctx.tenant_id)
            .cloned()
            .collect())
    }

    async fn get_rule_set_json(
        &self,
        ctx: &TenantContext,
        rule_set_id: &str,
    ) -> Result<serde_json::Value, StorageError> {
        self.lock()
            .rule_sets
            .get(&(ctx.tenant_id.clone(), rule_set_id.to_string()))
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                kind: "rule set",
                id: rule_set_id.to_string(),
            })
    }

    async fn list_committed_rows(
        &self,
        ctx: &TenantContext,
        period_id: &str,
    ) -> Result<Vec<CommittedDataRow>, StorageError> {
        Ok(self
            .lock()
            .rows
            .iter()
            .filter(|r| {
                r.tenant_id == ctx.tenant_id
                    && (r.period_id.as_deref() == Some(period_id) || r.period_id.is_none())
            })
            .cloned()
            .collect())
    }

    async fn insert_committed_rows(
        &self,
        snapshot: &mut MemorySnapshot,
        rows: Vec<CommittedDataRow>,
    ) -> Result<(), StorageError> {
        snapshot.staged.push(StagedOp::InsertRows(rows));
        Ok(())
    }

    async fn insert_periods(
        &self,
        snapshot: &mut MemorySnapshot,
        periods: Vec<Period>,
    ) -> Result<(), StorageError> {
        snapshot.staged.push(StagedOp::InsertPeriods(periods));
        Ok(())
    }

    async fn try_lock_run(
        &self,
        ctx: &TenantContext,
        period_id: &str,
        rule_set_id: &str,
    ) -> Result<(), StorageError> {
        let key = (
            ctx.tenant_id.clone(),
            period_id.to_string(),
            rule_set_id.to_string(),
        );
        let mut guard = self.lock();
        if guard.run_locks.contains(&key) {
            return Err(StorageError::RunInProgress {
                period_id: period_id.to_string(),
                rule_set_id: rule_set_id.to_string(),
            });
        }
        guard.run_locks.insert(key);
        Ok(())
    }

    async fn unlock_run(
        &self,
        ctx: &TenantContext,
        period_id: &str,
        rule_set_id: &str,
    ) -> Result<(), StorageError> {
        let key = (
            ctx.tenant_id.clone(),
            period_id.to_string(),
            rule_set_id.to_string(),
        );
        self.lock().run_locks.remove(&key);
        Ok(())
    }

    async fn run_locked(
        &self,
        ctx: &TenantContext,
        period_id: &str,
        rule_set_id: &str,
    ) -> Result<bool, StorageError> {
        let key = (
            ctx.tenant_id.clone(),
            period_id.to_string(),
            rule_set_id.to_string(),
        );
        Ok(self.lock().run_locks.contains(&key))
    }

    async fn delete_results(
        &self,
        snapshot: &mut MemorySnapshot,
        ctx: &TenantContext,
        period_id: &str,
        rule_set_id: &str,
    ) -> Result<usize, StorageError> {
        let existing = {
            let guard = self.lock();
            guard
                .results
                .iter()
                .filter(|r| {
                    r.tenant_id == ctx.tenant_id
                        && r.period_id == period_id
                        && r.rule_set_id == rule_set_id
                })
                .count()
        };
        snapshot.staged.push(StagedOp::DeleteResults {
            tenant_id: ctx.tenant_id.clone(),
            period_id: period_id.to_string(),
            rule_set_id: rule_set_id.to_string(),
        });
        Ok(existing)
    }

    async fn insert_result(
        &self,
        snapshot: &mut MemorySnapshot,
        record: CalculationResultRecord,
    ) -> Result<(), StorageError> {
        // Early duplicate detection over base state + staged ops, so the
        // engine fails inside the snapshot rather than at commit.
        let mut working = self.lock().clone();
        for op in &snapshot.staged {
            apply(&mut working, op)?;
        }
        apply(&mut working, &StagedOp::InsertResult(record.clone()))?;
        snapshot.staged.push(StagedOp::InsertResult(record));
        Ok(())
    }

    async fn insert_batch(
        &self,
        snapshot: &mut MemorySnapshot,
        record: CalculationBatchRecord,
    ) -> Result<(), StorageError> {
        snapshot.staged.push(StagedOp::InsertBatch(record));
        Ok(())
    }

    async fn get_batch(
        &self,
        ctx: &TenantContext,
        batch_id: &str,
    ) -> Result<CalculationBatchRecord, StorageError> {
        self.lock()
            .batches
            .iter()
            .find(|b| b.tenant_id == ctx.tenant_id && b.id == batch_id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                kind: "batch",
                id: batch_id.to_string(),
            })
    }

    async fn list_results(
        &self,
        ctx: &TenantContext,
        batch_id: &str,
    ) -> Result<Vec<CalculationResultRecord>, StorageError> {
        Ok(self
            .lock()
            .results
            .iter()
            .filter(|r| r.tenant_id == ctx.tenant_id && r.batch_id == batch_id)
            .cloned()
            .collect())
    }

    async fn update_batch_state(
        &self,
        ctx: &TenantContext,
        batch_id: &str,
        state: BatchState,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock();
        let batch = guard
            .batches
            .iter_mut()
            .find(|b| b.tenant_id == ctx.tenant_id && b.id == batch_id)
            .ok_or_else(|| StorageError::NotFound {
                kind: "batch",
                id: batch_id.to_string(),
            })?;
        batch.state = state;
        Ok(())
    }
}

// ──────────────────────────────────────────────
// Backend behavior tests
// ──────────────────────────────────────────────
