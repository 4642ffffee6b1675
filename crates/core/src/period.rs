//! Calendar periods and the canonical period key.
//!
//! The canonical key (`"2024-01"`) is the normalized identifier used for
//! joins and sorting everywhere in the pipeline. Periods are unique per
//! tenant by canonical key and ordered by it.

use serde::{Deserialize, Serialize};

/// Format a (year, month) pair as the canonical period key, e.g. `"2024-01"`.
pub fn canonical_key(year: i32, month: u8) -> String {
    format!("{:04}-{:02}", year, month)
}

/// A stored calendar period.
///
/// `start_date` / `end_date` are ISO 8601 date strings (`YYYY-MM-DD`),
/// matching the record convention used throughout the storage layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub id: String,
    pub tenant_id: String,
    pub canonical_key: String,
    pub label: String,
    pub start_date: String,
    pub end_date: String,
    pub status: String,
}
