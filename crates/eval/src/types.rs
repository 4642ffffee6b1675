//! Engine error taxonomy and run output types.
//!
//! The split follows the failure semantics of the pipeline: data-absence
//! and ambiguous-inference degrade locally (trace entries, never errors);
//! everything in `EngineError` aborts the whole run with enough context to
//! diagnose without re-running, and leaves previously committed results
//! untouched.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use vl_core::{LifecycleError, PlanError};
use vl_storage::{CalculationResultRecord, StorageError};

/// Errors that abort a calculation run or batch operation.
#[derive(Debug)]
pub enum EngineError {
    /// Structural plan error (malformed JSON, invalid component shape).
    Plan(PlanError),
    /// Storage failure, including run-lock contention and unknown ids.
    Storage(StorageError),
    /// Invalid batch state transition.
    Lifecycle(LifecycleError),
    /// A lifecycle transition was attempted while the batch's run key is
    /// mid-recalculation.
    BatchBusy { batch_id: String },
    /// Internal failure (clock formatting and the like).
    Internal { message: String },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Plan(e) => write!(f, "{}", e),
            EngineError::Storage(e) => write!(f, "{}", e),
            EngineError::Lifecycle(e) => write!(f, "{}", e),
            EngineError::BatchBusy { batch_id } => {
                write!(f, "batch {} is mid-recalculation", batch_id)
            }
            EngineError::Internal { message } => write!(f, "internal error: {}", message),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<PlanError> for EngineError {
    fn from(e: PlanError) -> Self {
        EngineError::Plan(e)
    }
}

impl From<StorageError> for EngineError {
    fn from(e: StorageError) -> Self {
        EngineError::Storage(e)
    }
}

impl From<LifecycleError> for EngineError {
    fn from(e: LifecycleError) -> Self {
        EngineError::Lifecycle(e)
    }
}

/// One entry in a component's execution trace.
///
/// Serialized into the persisted result record so a payout can always be
/// explained after the fact: which band matched, which rate applied, what
/// degraded and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEntry {
    /// The component's bound data was entirely absent. Zero payout.
    NoData { metric: String },
    /// Metric name matched no semantic pattern; the amount value was used.
    FallbackAmount { metric: String, message: String },
    /// No band covered the value (below the lowest lower bound).
    NoBand { metric: String, value: Decimal },
    MatrixCell {
        row_index: usize,
        column_index: usize,
        payout: Decimal,
    },
    Tier {
        index: usize,
        lower: Decimal,
        upper: Option<Decimal>,
        payout: Decimal,
    },
    Rate {
        base: Decimal,
        rate: Decimal,
        payout: Decimal,
    },
    Branch {
        value: Decimal,
        threshold: Decimal,
        met: bool,
        rate: Decimal,
    },
    RatioValue {
        numerator: Decimal,
        denominator: Decimal,
        ratio: Decimal,
    },
    /// Ratio denominator was zero; the component evaluated to zero.
    ZeroDenominator { metric: String },
}

/// Output of one calculation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub batch_id: String,
    pub entity_count: usize,
    pub result_count: usize,
    pub total_payout: Decimal,
    pub results: Vec<CalculationResultRecord>,
    pub log: Vec<String>,
}
