//! Reconciliation of calculation output against a tenant benchmark file.
//!
//! The benchmark is typically an export from the system being replaced;
//! agreement is the adoption gate. The engine is pure and synchronous:
//! load rows, compare, bucket. The false-green bucket exists because a
//! matching total can hide offsetting component errors, and those are the
//! findings most worth a human's time.

pub mod compare;
pub mod load;
pub mod model;

pub use compare::{compare, within_tolerance};
pub use load::{load_benchmark_csv, parse_benchmark_str, LoadError};
pub use model::{
    CompareConfig, ComparisonDepth, ComparisonResult, ComponentDelta, FileRow, Finding,
    FindingType, MatchKind, Matched, Summary, Tolerances,
};
