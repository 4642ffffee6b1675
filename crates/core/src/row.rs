//! Committed fact rows.
//!
//! A `CommittedDataRow` is a tenant-scoped fact produced by import and
//! classification. Rows are immutable once committed: calculation reads
//! them, never mutates them; superseded rows are replaced, not edited in
//! place.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// One committed fact row. `entity_id` / `period_id` stay `None` until
/// resolution completes; a row with `entity_id: None` is group-level data
/// joined to entities via a roster group field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommittedDataRow {
    pub id: String,
    pub tenant_id: String,
    pub entity_id: Option<String>,
    pub period_id: Option<String>,
    /// Sheet / category label assigned by classification (e.g. "transactions").
    pub data_type: String,
    pub row_data: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl CommittedDataRow {
    /// Read a field from `row_data` as a decimal, accepting numbers and
    /// numeric strings with `$`, thousands separators, or a trailing `%`.
    pub fn decimal_field(&self, field: &str) -> Option<Decimal> {
        self.row_data.get(field).and_then(decimal_from_json)
    }

    /// Read a field from `row_data` as text. Numbers are rendered with
    /// `to_string` so store numbers survive being typed as integers.
    pub fn text_field(&self, field: &str) -> Option<String> {
        match self.row_data.get(field)? {
            serde_json::Value::String(s) => Some(s.trim().to_string()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

/// Parse a JSON value into a `Decimal`.
///
/// Numbers go through their string rendering (avoids binary-float
/// artifacts); strings are cleaned of `$`, commas, whitespace, and a
/// trailing `%` before parsing. Anything else is `None`.
pub fn decimal_from_json(value: &serde_json::Value) -> Option<Decimal> {
    match value {
        serde_json::Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        serde_json::Value::String(s) => {
            let cleaned: String = s
                .trim()
                .trim_end_matches('%')
                .chars()
                .filter(|c| *c != '$' && *c != ',')
                .collect();
            if cleaned.is_empty() {
                None
            } else {
                Decimal::from_str(cleaned.trim()).ok()
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn decimal_from_plain_number() {
        assert_eq!(decimal_from_json(&serde_json::json!(125000.5)), Some(dec("125000.5")));
        assert_eq!(decimal_from_json(&serde_json::json!(42)), Some(dec("42")));
    }

    #[test]
    fn decimal_from_formatted_string() {
        assert_eq!(decimal_from_json(&serde_json::json!("$1,250.75")), Some(dec("1250.75")));
        assert_eq!(decimal_from_json(&serde_json::json!(" 98.5% ")), Some(dec("98.5")));
    }

    #[test]
    fn decimal_from_garbage_is_none() {
        assert_eq!(decimal_from_json(&serde_json::json!("n/a")), None);
        assert_eq!(decimal_from_json(&serde_json::json!(true)), None);
        assert_eq!(decimal_from_json(&serde_json::json!("")), None);
    }

    #[test]
    fn text_field_renders_numbers() {
        let row = CommittedDataRow {
            id: "r1".into(),
            tenant_id: "t1".into(),
            entity_id: None,
            period_id: None,
            data_type: "transactions".into(),
            row_data: serde_json::json!({"store": 4417})
                .as_object()
                .unwrap()
                .clone(),
            metadata: serde_json::Value::Null,
        };
        assert_eq!(row.text_field("store").as_deref(), Some("4417"));
    }
}
