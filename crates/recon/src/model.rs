use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// A single normalized row from the benchmark file.
#[derive(Debug, Clone)]
pub struct FileRow {
    pub line: usize,
    pub external_id: String,
    pub total: Option<Decimal>,
    /// Component values keyed by component id (mapped from file columns).
    pub components: BTreeMap<String, Decimal>,
    /// Canonical period key ("YYYY-MM") when a period column is mapped and
    /// its value parsed.
    pub period_key: Option<String>,
}

/// How benchmark columns map onto the calculation output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareConfig {
    pub entity_id_field: String,
    pub total_amount_field: String,
    /// File column -> component id.
    #[serde(default)]
    pub component_columns: BTreeMap<String, String>,
    #[serde(default)]
    pub period_column: Option<String>,
    /// Canonical period keys to keep. Empty means no period filtering.
    #[serde(default)]
    pub target_periods: Vec<String>,
    #[serde(default)]
    pub tolerances: Tolerances,
}

/// Two-sided tolerance: a total matches when the absolute delta is within
/// `absolute` or the relative delta (against the larger magnitude) is
/// within `relative`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tolerances {
    pub relative: Decimal,
    pub absolute: Decimal,
}

impl Default for Tolerances {
    fn default() -> Self {
        Tolerances {
            // 0.5% relative, one cent absolute.
            relative: Decimal::new(5, 3),
            absolute: Decimal::new(1, 2),
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    Tolerance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingType {
    /// Total within tolerance but at least one mapped component diverges.
    FalseGreen,
    Mismatch,
    FileOnly,
    VlOnly,
}

impl std::fmt::Display for FindingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FalseGreen => write!(f, "false_green"),
            Self::Mismatch => write!(f, "mismatch"),
            Self::FileOnly => write!(f, "file_only"),
            Self::VlOnly => write!(f, "vl_only"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentDelta {
    pub component_id: String,
    pub file_value: Decimal,
    pub vl_value: Decimal,
    pub delta: Decimal,
    pub within_tolerance: bool,
}

/// One matched entity whose total agrees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Matched {
    pub external_id: String,
    pub kind: MatchKind,
    pub file_total: Decimal,
    pub vl_total: Decimal,
}

/// One entity needing attention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub finding_type: FindingType,
    pub external_id: String,
    /// 1-based line in the benchmark file, when the finding has a file side.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_total: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vl_total: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<Decimal>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub component_deltas: Vec<ComponentDelta>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonDepth {
    TotalOnly,
    Component,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Summary {
    pub exact: usize,
    pub tolerance: usize,
    pub false_green: usize,
    pub mismatch: usize,
    pub file_only: usize,
    pub vl_only: usize,
    /// File rows excluded by the period filter.
    pub filtered_out: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub depth_achieved: ComparisonDepth,
    pub matches: Vec<Matched>,
    /// Ordered by attention priority: false-green first, then mismatches
    /// by absolute delta descending, then file-only, then vl-only.
    pub findings: Vec<Finding>,
    pub summary: Summary,
}
