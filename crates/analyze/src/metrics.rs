//! Semantic metric resolution.
//!
//! Plan-authored metric names are free text ("sales_attainment",
//! "new_customers_quota"); inference classifies each into a semantic
//! category via ordered pattern groups checked in strict priority:
//! attainment, then goal, then quantity, then amount. The ordering is a
//! hard invariant -- "sales_attainment" must resolve to attainment even
//! though "sales" is amount-like, because the attainment group is checked
//! first.
//!
//! Names matching no group fall back to the amount value with a warning.
//! This is deliberate best-effort degradation, not a fatal condition.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use vl_core::Component;

/// Semantic category of a metric name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Attainment,
    Amount,
    Goal,
    Quantity,
    Unknown,
}

/// Ordered pattern groups. First match wins; order is the invariant.
static PATTERN_GROUPS: LazyLock<[(SemanticType, Regex); 4]> = LazyLock::new(|| {
    [
        (
            SemanticType::Attainment,
            Regex::new(r"attain|achiev|completion|rate|ratio|percent|pct").unwrap(),
        ),
        (
            SemanticType::Goal,
            Regex::new(r"goal|quota|target|objective|budget|expected").unwrap(),
        ),
        (
            SemanticType::Quantity,
            Regex::new(r"count|qty|quantit|units?|number|deals|customers|heads").unwrap(),
        ),
        (
            SemanticType::Amount,
            Regex::new(r"amount|amt|revenue|sales|commission|value|dollar|total|pay|price|volume")
                .unwrap(),
        ),
    ]
});

/// Infer the semantic category of a plan-authored metric name.
///
/// Pure function; matching is case-insensitive over the whole name.
pub fn infer_semantic_type(metric_name: &str) -> SemanticType {
    let lowered = metric_name.to_ascii_lowercase();
    for (semantic, pattern) in PATTERN_GROUPS.iter() {
        if pattern.is_match(&lowered) {
            return *semantic;
        }
    }
    SemanticType::Unknown
}

/// Map every metric name a component references to its inferred category.
pub fn resolve_component_metrics(component: &Component) -> BTreeMap<String, SemanticType> {
    component
        .metric_names()
        .into_iter()
        .map(|name| (name.to_string(), infer_semantic_type(name)))
        .collect()
}

/// Pre-aggregated semantic values for one entity, one period.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SemanticValues {
    pub attainment: Option<Decimal>,
    pub amount: Option<Decimal>,
    pub goal: Option<Decimal>,
    pub quantity: Option<Decimal>,
}

impl SemanticValues {
    pub fn get(&self, semantic: SemanticType) -> Option<Decimal> {
        match semantic {
            SemanticType::Attainment => self.attainment,
            SemanticType::Amount => self.amount,
            SemanticType::Goal => self.goal,
            SemanticType::Quantity => self.quantity,
            SemanticType::Unknown => None,
        }
    }
}

/// A traceable degradation emitted during metric resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricWarning {
    pub metric: String,
    pub message: String,
}

/// Republish semantic values under the plan's own metric-name vocabulary.
///
/// Each component evaluator reads values by the plan-declared names; this
/// builds that map from the semantic aggregates. Unclassifiable names fall
/// back to the amount value and emit a warning. Names whose semantic value
/// is absent are simply left out of the map -- absence is the evaluator's
/// concern (zero payout with a no-data trace), not resolution's.
pub fn build_component_metrics(
    component: &Component,
    values: &SemanticValues,
) -> (BTreeMap<String, Decimal>, Vec<MetricWarning>) {
    let mut resolved = BTreeMap::new();
    let mut warnings = Vec::new();

    for name in component.metric_names() {
        let semantic = infer_semantic_type(name);
        let value = match semantic {
            SemanticType::Unknown => {
                warnings.push(MetricWarning {
                    metric: name.to_string(),
                    message: format!(
                        "metric '{}' matched no semantic pattern; falling back to amount",
                        name
                    ),
                });
                values.amount
            }
            other => values.get(other),
        };
        if let Some(v) = value {
            resolved.insert(name.to_string(), v);
        }
    }

    (resolved, warnings)
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
