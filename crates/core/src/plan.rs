//! Declarative compensation plans (rule sets).
//!
//! A plan is a list of payout components plus input bindings describing how
//! named metrics are derived from committed rows. Component payloads arrive
//! as JSONB-style dynamic data; they are represented as a serde-tagged enum
//! with an explicit `type` discriminant and validated once, at the boundary
//! (`RuleSet::from_json`), so downstream evaluation can trust the shapes.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::PlanError;

/// A declarative compensation plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    pub id: String,
    pub tenant_id: String,
    pub status: String,
    pub components: Vec<Component>,
    pub input_bindings: InputBindings,
}

/// One payout-computing unit within a plan.
///
/// Band boundaries everywhere are inclusive-lower / exclusive-upper; a
/// missing `upper` means unbounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Component {
    /// Row/column matrix lookup: the row band is selected by `row_metric`,
    /// the cell band within it by `column_metric`.
    TieredMatrix {
        id: String,
        name: String,
        row_metric: String,
        column_metric: String,
        rows: Vec<MatrixRow>,
    },
    /// Single-axis tier lookup over `metric`.
    TierLookup {
        id: String,
        name: String,
        metric: String,
        tiers: Vec<Band>,
    },
    /// `applied_to` value multiplied by a flat rate.
    Percentage {
        id: String,
        name: String,
        applied_to: String,
        rate: Decimal,
    },
    /// Threshold branch: pays `rate_if_met` x base when
    /// `applied_to >= threshold`, else `rate_otherwise` x base.
    Conditional {
        id: String,
        name: String,
        applied_to: String,
        threshold: Decimal,
        rate_if_met: Decimal,
        rate_otherwise: Decimal,
    },
    /// Derived-metric division (`numerator / denominator`) times a rate.
    /// A zero denominator evaluates to zero, never an error.
    Ratio {
        id: String,
        name: String,
        numerator: String,
        denominator: String,
        rate: Decimal,
    },
}

impl Component {
    pub fn id(&self) -> &str {
        match self {
            Component::TieredMatrix { id, .. }
            | Component::TierLookup { id, .. }
            | Component::Percentage { id, .. }
            | Component::Conditional { id, .. }
            | Component::Ratio { id, .. } => id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Component::TieredMatrix { name, .. }
            | Component::TierLookup { name, .. }
            | Component::Percentage { name, .. }
            | Component::Conditional { name, .. }
            | Component::Ratio { name, .. } => name,
        }
    }

    /// Every plan-authored metric name this component reads.
    pub fn metric_names(&self) -> Vec<&str> {
        match self {
            Component::TieredMatrix {
                row_metric,
                column_metric,
                ..
            } => vec![row_metric, column_metric],
            Component::TierLookup { metric, .. } => vec![metric],
            Component::Percentage { applied_to, .. } => vec![applied_to],
            Component::Conditional { applied_to, .. } => vec![applied_to],
            Component::Ratio {
                numerator,
                denominator,
                ..
            } => vec![numerator, denominator],
        }
    }
}

/// One band in a tier list or matrix cell list: `[lower, upper)` with an
/// open upper end when `upper` is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub lower: Decimal,
    pub upper: Option<Decimal>,
    pub payout: Decimal,
}

/// One row of a tiered matrix: a band over the row metric plus the cell
/// bands over the column metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixRow {
    pub lower: Decimal,
    pub upper: Option<Decimal>,
    pub cells: Vec<Band>,
}

/// How named metrics are derived from committed rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputBindings {
    pub metric_derivations: Vec<MetricDerivation>,
    /// Row-data field holding the entity's group key (e.g. store number),
    /// used to join group-level rows (`entity_id: None`) via roster rows.
    #[serde(default)]
    pub group_field: Option<String>,
}

/// A declared aggregation recipe turning raw rows into one named metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDerivation {
    /// The metric name this derivation produces.
    pub metric: String,
    /// Case-insensitive substring matched against `CommittedDataRow.data_type`.
    pub source_pattern: String,
    pub operation: Aggregation,
    #[serde(default)]
    pub filters: Vec<RowFilter>,
}

/// Aggregation operation applied over the matching rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Aggregation {
    Sum { field: String },
    Count,
    /// Division of two already-derived metrics (by name).
    Ratio { numerator: String, denominator: String },
}

/// Equality filter on a row-data field, applied before aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowFilter {
    pub field: String,
    pub equals: serde_json::Value,
}

impl RuleSet {
    /// Deserialize and validate a plan from its stored JSON form.
    ///
    /// This is the single trust boundary for plan payloads: malformed JSON
    /// or structurally invalid components are `PlanError` (fatal to a run),
    /// never partial acceptance.
    pub fn from_json(value: &serde_json::Value) -> Result<RuleSet, PlanError> {
        let plan: RuleSet = serde_json::from_value(value.clone())
            .map_err(|e| PlanError::Malformed(e.to_string()))?;
        plan.validate()?;
        Ok(plan)
    }

    /// Structural validation. Checks ids, band ordering, and that ratio
    /// aggregations reference metrics some derivation actually produces.
    pub fn validate(&self) -> Result<(), PlanError> {
        if self.id.is_empty() {
            return Err(PlanError::Invalid {
                plan_id: "<unset>".into(),
                message: "plan id must not be empty".into(),
            });
        }

        for component in &self.components {
            if component.id().is_empty() {
                return Err(PlanError::Invalid {
                    plan_id: self.id.clone(),
                    message: "component id must not be empty".into(),
                });
            }
            match component {
                Component::TieredMatrix { id, rows, .. } => {
                    if rows.is_empty() {
                        return Err(self.component_error(id, "matrix has no rows"));
                    }
                    validate_bands(
                        rows.iter().map(|r| (r.lower, r.upper)),
                        &self.id,
                        id,
                        "row bands",
                    )?;
                    for row in rows {
                        if row.cells.is_empty() {
                            return Err(self.component_error(id, "matrix row has no cells"));
                        }
                        validate_bands(
                            row.cells.iter().map(|c| (c.lower, c.upper)),
                            &self.id,
                            id,
                            "cell bands",
                        )?;
                    }
                }
                Component::TierLookup { id, tiers, .. } => {
                    if tiers.is_empty() {
                        return Err(self.component_error(id, "tier lookup has no tiers"));
                    }
                    validate_bands(
                        tiers.iter().map(|t| (t.lower, t.upper)),
                        &self.id,
                        id,
                        "tiers",
                    )?;
                }
                Component::Ratio {
                    id,
                    numerator,
                    denominator,
                    ..
                } => {
                    if numerator == denominator {
                        return Err(self.component_error(
                            id,
                            "ratio numerator and denominator must be distinct metrics",
                        ));
                    }
                }
                Component::Percentage { .. } | Component::Conditional { .. } => {}
            }
        }

        // Ratio aggregations must reference other derived metrics.
        let derived: Vec<&str> = self
            .input_bindings
            .metric_derivations
            .iter()
            .map(|d| d.metric.as_str())
            .collect();
        for derivation in &self.input_bindings.metric_derivations {
            if let Aggregation::Ratio {
                numerator,
                denominator,
            } = &derivation.operation
            {
                for operand in [numerator, denominator] {
                    if !derived.contains(&operand.as_str()) {
                        return Err(PlanError::Invalid {
                            plan_id: self.id.clone(),
                            message: format!(
                                "derivation '{}' divides by '{}', which no derivation produces",
                                derivation.metric, operand
                            ),
                        });
                    }
                }
            }
        }

        Ok(())
    }

    fn component_error(&self, component_id: &str, message: &str) -> PlanError {
        PlanError::InvalidComponent {
            plan_id: self.id.clone(),
            component_id: component_id.to_string(),
            message: message.to_string(),
        }
    }
}

/// Bands must ascend by lower bound, and each upper bound (when present)
/// must exceed its lower bound.
fn validate_bands(
    bands: impl Iterator<Item = (Decimal, Option<Decimal>)>,
    plan_id: &str,
    component_id: &str,
    what: &str,
) -> Result<(), PlanError> {
    let mut previous_lower: Option<Decimal> = None;
    for (lower, upper) in bands {
        if let Some(upper) = upper {
            if upper <= lower {
                return Err(PlanError::InvalidComponent {
                    plan_id: plan_id.to_string(),
                    component_id: component_id.to_string(),
                    message: format!("{}: upper bound {} not above lower {}", what, upper, lower),
                });
            }
        }
        if let Some(prev) = previous_lower {
            if lower <= prev {
                return Err(PlanError::InvalidComponent {
                    plan_id: plan_id.to_string(),
                    component_id: component_id.to_string(),
                    message: format!("{}: not in ascending order at lower bound {}", what, lower),
                });
            }
        }
        previous_lower = Some(lower);
    }
    Ok(())
}
