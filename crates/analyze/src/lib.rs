//! Vantage Ledger interpretation layer.
//!
//! Three pure analyses over uploaded sheet data, run before any
//! calculation:
//!
//! - `periods` -- detect canonical calendar periods from arbitrary
//!   field mappings (no hardcoded column names).
//! - `metrics` -- infer the semantic category of plan-authored metric
//!   names and assemble per-component metric values.
//! - `negotiate` -- score each uploaded tab against the four content
//!   domains (plan / entity / target / transaction) and arbitrate full
//!   vs. split claims.
//!
//! Everything here is side-effect-free: input structs in, serializable
//! result structs out.

pub mod metrics;
pub mod negotiate;
pub mod periods;

pub use metrics::{
    build_component_metrics, infer_semantic_type, resolve_component_metrics, MetricWarning,
    SemanticType, SemanticValues,
};
pub use negotiate::{
    negotiate, requires_human_review, AgentScore, Claim, ContentUnit, Domain, SciProposal,
    TabProfile,
};
pub use periods::{
    detect_periods, parse_period_value, DetectedPeriod, Frequency, PeriodDetection, SheetData,
    TargetField,
};
