use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use vl_core::BatchState;

/// Per-component payout plus its execution trace, as persisted.
///
/// The trace is stored as opaque JSON: the engine owns the trace-entry
/// shapes, storage just keeps them inspectable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentResultRecord {
    pub component_id: String,
    pub name: String,
    pub payout: Decimal,
    pub metrics_used: BTreeMap<String, Decimal>,
    pub trace: Vec<serde_json::Value>,
}

/// One entity's calculation result for one (period, rule set) run.
///
/// Invariant: at most one live record per
/// `(tenant_id, entity_id, period_id, rule_set_id)` -- re-calculation
/// deletes then recomputes, never appends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationResultRecord {
    pub tenant_id: String,
    pub entity_id: String,
    /// Natural key used to join against external files.
    pub external_id: String,
    pub period_id: String,
    pub rule_set_id: String,
    pub batch_id: String,
    pub total_payout: Decimal,
    pub components: Vec<ComponentResultRecord>,
    /// Aggregated semantic metric values the run resolved for this entity.
    pub metrics: serde_json::Value,
    pub metadata: serde_json::Value,
}

/// Summary record for one calculation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationBatchRecord {
    pub id: String,
    pub tenant_id: String,
    pub period_id: String,
    pub rule_set_id: String,
    pub state: BatchState,
    pub entity_count: usize,
    pub result_count: usize,
    pub total_payout: Decimal,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub started_at: String,
    /// ISO 8601 / RFC 3339 timestamp string. None if the run died mid-write.
    pub completed_at: Option<String>,
}
