//! Calculation batch lifecycle.
//!
//! Batches walk a strict chain from DRAFT to PUBLISHED; REJECTED is
//! reachable from every pre-APPROVED state and is terminal. Transitions
//! are validated against an explicit allow-list -- an invalid request is
//! rejected with the attempted pair, never silently coerced.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LifecycleError;

/// Lifecycle state of a calculation batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchState {
    Draft,
    Preview,
    Reconcile,
    Official,
    Approved,
    Posted,
    Closed,
    Paid,
    Published,
    Rejected,
}

impl BatchState {
    /// States reachable from `self` in one transition.
    pub fn allowed_transitions(self) -> &'static [BatchState] {
        use BatchState::*;
        match self {
            Draft => &[Preview, Rejected],
            Preview => &[Reconcile, Rejected],
            Reconcile => &[Official, Rejected],
            Official => &[Approved, Rejected],
            Approved => &[Posted],
            Posted => &[Closed],
            Closed => &[Paid],
            Paid => &[Published],
            Published => &[],
            Rejected => &[],
        }
    }

    /// Validate a requested transition. On failure the state is unchanged
    /// and the attempted pair is reported.
    pub fn transition(self, to: BatchState) -> Result<BatchState, LifecycleError> {
        if self.allowed_transitions().contains(&to) {
            Ok(to)
        } else {
            Err(LifecycleError::InvalidTransition { from: self, to })
        }
    }

    /// Parse the wire form (`"PREVIEW"`, `"POSTED"`, ...).
    pub fn parse(s: &str) -> Option<BatchState> {
        serde_json::from_value(serde_json::Value::String(s.to_string())).ok()
    }
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BatchState::Draft => "DRAFT",
            BatchState::Preview => "PREVIEW",
            BatchState::Reconcile => "RECONCILE",
            BatchState::Official => "OFFICIAL",
            BatchState::Approved => "APPROVED",
            BatchState::Posted => "POSTED",
            BatchState::Closed => "CLOSED",
            BatchState::Paid => "PAID",
            BatchState::Published => "PUBLISHED",
            BatchState::Rejected => "REJECTED",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use BatchState::*;

    #[test]
    fn full_chain_is_valid() {
        let chain = [
            Draft, Preview, Reconcile, Official, Approved, Posted, Closed, Paid, Published,
        ];
        for pair in chain.windows(2) {
            assert_eq!(pair[0].transition(pair[1]).unwrap(), pair[1]);
        }
    }

    #[test]
    fn preview_to_posted_is_rejected() {
        let err = Preview.transition(Posted).unwrap_err();
        match err {
            LifecycleError::InvalidTransition { from, to } => {
                assert_eq!(from, Preview);
                assert_eq!(to, Posted);
            }
        }
    }

    #[test]
    fn rejected_reachable_only_pre_approved() {
        assert!(Draft.transition(Rejected).is_ok());
        assert!(Preview.transition(Rejected).is_ok());
        assert!(Reconcile.transition(Rejected).is_ok());
        assert!(Official.transition(Rejected).is_ok());
        assert!(Approved.transition(Rejected).is_err());
        assert!(Posted.transition(Rejected).is_err());
    }

    #[test]
    fn terminal_states_allow_nothing() {
        assert!(Published.allowed_transitions().is_empty());
        assert!(Rejected.allowed_transitions().is_empty());
    }

    #[test]
    fn wire_form_round_trips() {
        assert_eq!(BatchState::parse("RECONCILE"), Some(Reconcile));
        assert_eq!(BatchState::parse("reconcile"), None);
        assert_eq!(Posted.to_string(), "POSTED");
    }
}
