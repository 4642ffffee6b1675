//! Metric aggregation: committed rows in, semantic values out.
//!
//! The plan's `metric_derivations` declare how named metrics are computed
//! from raw rows (aggregation op, source pattern, filters); the derived
//! values are then slotted into the four semantic categories by the same
//! name inference the component evaluators use, so plan vocabulary and
//! data vocabulary meet in one place.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use vl_analyze::{infer_semantic_type, SemanticType, SemanticValues};
use vl_core::{Aggregation, CommittedDataRow, Entity, MetricDerivation};

use crate::numeric::safe_ratio;

/// Select the rows belonging to one entity: rows bound to its id, plus
/// group-level rows (`entity_id: None`) whose `group_field` value matches
/// the group key recorded on the entity's roster rows (or entity
/// metadata).
pub fn entity_rows<'a>(
    entity: &Entity,
    rows: &'a [CommittedDataRow],
    group_field: Option<&str>,
) -> Vec<&'a CommittedDataRow> {
    let group_key = group_field.and_then(|field| entity_group_key(entity, rows, field));

    rows.iter()
        .filter(|row| match &row.entity_id {
            Some(id) => id == &entity.id,
            None => match (&group_key, group_field) {
                (Some(key), Some(field)) => row.text_field(field).as_deref() == Some(key),
                _ => false,
            },
        })
        .collect()
}

/// The entity's group key: first from its own roster rows, then from
/// entity metadata.
fn entity_group_key(entity: &Entity, rows: &[CommittedDataRow], field: &str) -> Option<String> {
    rows.iter()
        .filter(|r| r.entity_id.as_deref() == Some(entity.id.as_str()))
        .find_map(|r| r.text_field(field))
        .or_else(|| entity.metadata_str(field).map(str::to_string))
}

/// Apply the plan's derivations to one entity's rows.
///
/// Base derivations (sum/count) run first; ratio derivations divide two
/// already-derived metrics. Each derived metric lands in the semantic slot
/// its NAME infers to; the first derivation to claim a slot wins and later
/// claims are logged, not merged.
pub fn derive_semantic_values(
    derivations: &[MetricDerivation],
    rows: &[&CommittedDataRow],
    log: &mut Vec<String>,
) -> SemanticValues {
    let mut derived: BTreeMap<String, Decimal> = BTreeMap::new();

    for derivation in derivations {
        if let Aggregation::Ratio { .. } = derivation.operation {
            continue;
        }
        let matching = matching_rows(derivation, rows);
        let value = match &derivation.operation {
            Aggregation::Sum { field } => matching
                .iter()
                .filter_map(|r| r.decimal_field(field))
                .sum::<Decimal>(),
            Aggregation::Count => Decimal::from(matching.len()),
            Aggregation::Ratio { .. } => unreachable!(),
        };
        derived.insert(derivation.metric.clone(), value);
    }

    for derivation in derivations {
        if let Aggregation::Ratio {
            numerator,
            denominator,
        } = &derivation.operation
        {
            let n = derived.get(numerator).copied().unwrap_or(Decimal::ZERO);
            let d = derived.get(denominator).copied().unwrap_or(Decimal::ZERO);
            derived.insert(derivation.metric.clone(), safe_ratio(n, d));
        }
    }

    let mut values = SemanticValues::default();
    for (metric, value) in &derived {
        let slot = match infer_semantic_type(metric) {
            SemanticType::Unknown => SemanticType::Amount,
            other => other,
        };
        let taken = match slot {
            SemanticType::Attainment => &mut values.attainment,
            SemanticType::Amount => &mut values.amount,
            SemanticType::Goal => &mut values.goal,
            SemanticType::Quantity => &mut values.quantity,
            SemanticType::Unknown => unreachable!(),
        };
        if taken.is_some() {
            log.push(format!(
                "derivation '{}' also resolves to {:?}; keeping the first value",
                metric, slot
            ));
        } else {
            *taken = Some(*value);
        }
    }
    values
}

fn matching_rows<'a>(
    derivation: &MetricDerivation,
    rows: &[&'a CommittedDataRow],
) -> Vec<&'a CommittedDataRow> {
    let pattern = derivation.source_pattern.to_ascii_lowercase();
    rows.iter()
        .filter(|row| row.data_type.to_ascii_lowercase().contains(&pattern))
        .filter(|row| {
            derivation.filters.iter().all(|f| {
                match (row.row_data.get(&f.field), &f.equals) {
                    (Some(actual), expected) if actual == expected => true,
                    // Loose fallback: compare text renderings so "4417"
                    // matches 4417 across sheet typing quirks.
                    (Some(_), expected) => {
                        row.text_field(&f.field).as_deref()
                            == text_of(expected).as_deref()
                    }
                    (None, _) => false,
                }
            })
        })
        .copied()
        .collect()
}

fn text_of(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
