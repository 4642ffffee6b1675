//! Compensated participants.

use serde::{Deserialize, Serialize};

/// A compensated participant (employee, agent, store).
///
/// `external_id` is the natural key used to reconcile the same participant
/// across sheets, periods, and external benchmark files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub tenant_id: String,
    pub external_id: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Entity {
    /// Read a string attribute from entity metadata, e.g. a store number
    /// used to join group-level data rows.
    pub fn metadata_str(&self, field: &str) -> Option<&str> {
        self.metadata.get(field).and_then(|v| v.as_str())
    }
}
