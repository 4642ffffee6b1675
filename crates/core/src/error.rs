//! Core error types.
//!
//! Structural plan errors and lifecycle violations always surface to the
//! caller with enough context (plan id, component id, attempted from/to
//! pair) to diagnose without re-running.

use crate::lifecycle::BatchState;

/// A structural plan error. Fatal to any run that loads the plan.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    /// The stored JSON could not be deserialized into the plan model.
    #[error("malformed plan JSON: {0}")]
    Malformed(String),

    /// The plan deserialized but violates a structural invariant.
    #[error("plan '{plan_id}': {message}")]
    Invalid { plan_id: String, message: String },

    /// A specific component violates a structural invariant.
    #[error("plan '{plan_id}', component '{component_id}': {message}")]
    InvalidComponent {
        plan_id: String,
        component_id: String,
        message: String,
    },
}

/// An invalid batch state transition was requested. State is unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("invalid batch transition: {from} -> {to}")]
    InvalidTransition { from: BatchState, to: BatchState },
}
