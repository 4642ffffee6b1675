//! Per-component payout evaluation.
//!
//! Each evaluator is a pure function of the component definition and the
//! resolved metric map. Absent data degrades to a zero payout with a trace
//! entry; the only hard failures live upstream (plan validation, storage).

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use vl_analyze::MetricWarning;
use vl_core::{Band, Component, MatrixRow};
use vl_storage::ComponentResultRecord;

use crate::numeric::{round_money, safe_ratio, select_band};
use crate::types::TraceEntry;

/// Evaluate one component against the entity's resolved metrics.
pub fn evaluate_component(
    component: &Component,
    metrics: &BTreeMap<String, Decimal>,
    warnings: &[MetricWarning],
) -> ComponentResultRecord {
    let mut trace: Vec<TraceEntry> = warnings
        .iter()
        .map(|w| TraceEntry::FallbackAmount {
            metric: w.metric.clone(),
            message: w.message.clone(),
        })
        .collect();

    let payout = match component {
        Component::TieredMatrix {
            row_metric,
            column_metric,
            rows,
            ..
        } => matrix_payout(row_metric, column_metric, rows, metrics, &mut trace),
        Component::TierLookup { metric, tiers, .. } => {
            tier_payout(metric, tiers, metrics, &mut trace)
        }
        Component::Percentage {
            applied_to, rate, ..
        } => rate_payout(applied_to, *rate, metrics, &mut trace),
        Component::Conditional {
            applied_to,
            threshold,
            rate_if_met,
            rate_otherwise,
            ..
        } => conditional_payout(
            applied_to,
            *threshold,
            *rate_if_met,
            *rate_otherwise,
            metrics,
            &mut trace,
        ),
        Component::Ratio {
            numerator,
            denominator,
            rate,
            ..
        } => ratio_payout(numerator, denominator, *rate, metrics, &mut trace),
    };

    ComponentResultRecord {
        component_id: component.id().to_string(),
        name: component.name().to_string(),
        payout,
        metrics_used: metrics.clone(),
        trace: trace
            .into_iter()
            .map(|e| serde_json::to_value(e).unwrap_or(serde_json::Value::Null))
            .collect(),
    }
}

fn metric_or_trace(
    name: &str,
    metrics: &BTreeMap<String, Decimal>,
    trace: &mut Vec<TraceEntry>,
) -> Option<Decimal> {
    match metrics.get(name) {
        Some(v) => Some(*v),
        None => {
            trace.push(TraceEntry::NoData {
                metric: name.to_string(),
            });
            None
        }
    }
}

fn matrix_payout(
    row_metric: &str,
    column_metric: &str,
    rows: &[MatrixRow],
    metrics: &BTreeMap<String, Decimal>,
    trace: &mut Vec<TraceEntry>,
) -> Decimal {
    let (Some(row_value), Some(col_value)) = (
        metric_or_trace(row_metric, metrics, trace),
        metric_or_trace(column_metric, metrics, trace),
    ) else {
        return Decimal::ZERO;
    };

    let Some(row_index) = select_band(row_value, rows.iter().map(|r| (r.lower, r.upper))) else {
        trace.push(TraceEntry::NoBand {
            metric: row_metric.to_string(),
            value: row_value,
        });
        return Decimal::ZERO;
    };
    let cells = &rows[row_index].cells;
    let Some(column_index) = select_band(col_value, cells.iter().map(|c| (c.lower, c.upper)))
    else {
        trace.push(TraceEntry::NoBand {
            metric: column_metric.to_string(),
            value: col_value,
        });
        return Decimal::ZERO;
    };

    let payout = round_money(cells[column_index].payout);
    trace.push(TraceEntry::MatrixCell {
        row_index,
        column_index,
        payout,
    });
    payout
}

fn tier_payout(
    metric: &str,
    tiers: &[Band],
    metrics: &BTreeMap<String, Decimal>,
    trace: &mut Vec<TraceEntry>,
) -> Decimal {
    let Some(value) = metric_or_trace(metric, metrics, trace) else {
        return Decimal::ZERO;
    };
    let Some(index) = select_band(value, tiers.iter().map(|t| (t.lower, t.upper))) else {
        trace.push(TraceEntry::NoBand {
            metric: metric.to_string(),
            value,
        });
        return Decimal::ZERO;
    };
    let tier = &tiers[index];
    let payout = round_money(tier.payout);
    trace.push(TraceEntry::Tier {
        index,
        lower: tier.lower,
        upper: tier.upper,
        payout,
    });
    payout
}

fn rate_payout(
    applied_to: &str,
    rate: Decimal,
    metrics: &BTreeMap<String, Decimal>,
    trace: &mut Vec<TraceEntry>,
) -> Decimal {
    let Some(base) = metric_or_trace(applied_to, metrics, trace) else {
        return Decimal::ZERO;
    };
    let payout = round_money(base * rate);
    trace.push(TraceEntry::Rate { base, rate, payout });
    payout
}

fn conditional_payout(
    applied_to: &str,
    threshold: Decimal,
    rate_if_met: Decimal,
    rate_otherwise: Decimal,
    metrics: &BTreeMap<String, Decimal>,
    trace: &mut Vec<TraceEntry>,
) -> Decimal {
    let Some(value) = metric_or_trace(applied_to, metrics, trace) else {
        return Decimal::ZERO;
    };
    let met = value >= threshold;
    let rate = if met { rate_if_met } else { rate_otherwise };
    trace.push(TraceEntry::Branch {
        value,
        threshold,
        met,
        rate,
    });
    let payout = round_money(value * rate);
    trace.push(TraceEntry::Rate {
        base: value,
        rate,
        payout,
    });
    payout
}

fn ratio_payout(
    numerator: &str,
    denominator: &str,
    rate: Decimal,
    metrics: &BTreeMap<String, Decimal>,
    trace: &mut Vec<TraceEntry>,
) -> Decimal {
    let (Some(n), Some(d)) = (
        metric_or_trace(numerator, metrics, trace),
        metric_or_trace(denominator, metrics, trace),
    ) else {
        return Decimal::ZERO;
    };
    if d.is_zero() {
        trace.push(TraceEntry::ZeroDenominator {
            metric: denominator.to_string(),
        });
        return Decimal::ZERO;
    }
    let ratio = safe_ratio(n, d);
    trace.push(TraceEntry::RatioValue {
        numerator: n,
        denominator: d,
        ratio,
    });
    let payout = round_money(ratio * rate);
    trace.push(TraceEntry::Rate {
        base: ratio,
        rate,
        payout,
    });
    payout
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
