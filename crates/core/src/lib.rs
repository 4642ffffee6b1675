//! Vantage Ledger core domain model.
//!
//! Shared types for the interpretation-and-calculation pipeline: tenant
//! context, calendar periods, compensated entities, committed fact rows,
//! the declarative plan (rule set) model, and the calculation-batch
//! lifecycle state machine.
//!
//! Plan payloads are validated at the boundary (`RuleSet::from_json`);
//! everything past that point can trust the model.

pub mod entity;
pub mod error;
pub mod lifecycle;
pub mod period;
pub mod plan;
pub mod row;
pub mod tenant;

pub use entity::Entity;
pub use error::{LifecycleError, PlanError};
pub use lifecycle::BatchState;
pub use period::{canonical_key, Period};
pub use plan::{
    Aggregation, Band, Component, InputBindings, MatrixRow, MetricDerivation, RowFilter, RuleSet,
};
pub use row::{decimal_from_json, CommittedDataRow};
pub use tenant::TenantContext;
