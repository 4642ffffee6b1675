//! Pure comparison of benchmark rows against calculation results.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use vl_storage::CalculationResultRecord;

use crate::model::{
    CompareConfig, ComparisonDepth, ComparisonResult, ComponentDelta, FileRow, Finding,
    FindingType, MatchKind, Matched, Summary, Tolerances,
};

/// Whether two totals agree under the tolerance policy. The relative
/// delta is taken against the larger magnitude so the check is symmetric.
pub fn within_tolerance(a: Decimal, b: Decimal, tol: &Tolerances) -> bool {
    let delta = (a - b).abs();
    if delta <= tol.absolute {
        return true;
    }
    let denom = a.abs().max(b.abs());
    if denom.is_zero() {
        return delta.is_zero();
    }
    delta / denom <= tol.relative
}

/// Compare a benchmark file against one batch's calculation results.
///
/// Every input row lands in exactly one bucket; the summary accounts for
/// all of them, including rows dropped by the period filter.
pub fn compare(
    results: &[CalculationResultRecord],
    file_rows: &[FileRow],
    config: &CompareConfig,
) -> ComparisonResult {
    let depth_achieved = if config.component_columns.is_empty() {
        ComparisonDepth::TotalOnly
    } else {
        ComparisonDepth::Component
    };

    let mut summary = Summary::default();
    let mut matches = Vec::new();
    let mut findings = Vec::new();

    let mut by_external: BTreeMap<&str, &CalculationResultRecord> = results
        .iter()
        .map(|r| (r.external_id.as_str(), r))
        .collect();

    for row in file_rows {
        if !config.target_periods.is_empty() {
            match &row.period_key {
                Some(key) if config.target_periods.contains(key) => {}
                _ => {
                    summary.filtered_out += 1;
                    continue;
                }
            }
        }

        let Some(result) = by_external.remove(row.external_id.as_str()) else {
            summary.file_only += 1;
            findings.push(Finding {
                finding_type: FindingType::FileOnly,
                external_id: row.external_id.clone(),
                line: Some(row.line),
                file_total: row.total,
                vl_total: None,
                delta: None,
                component_deltas: Vec::new(),
            });
            continue;
        };

        let file_total = row.total.unwrap_or(Decimal::ZERO);
        let vl_total = result.total_payout;
        let delta = file_total - vl_total;
        let total_ok = within_tolerance(file_total, vl_total, &config.tolerances);
        let component_deltas = component_deltas(row, result, config);
        let any_component_off = component_deltas.iter().any(|d| !d.within_tolerance);

        if total_ok && !any_component_off {
            let kind = if delta.is_zero() {
                summary.exact += 1;
                MatchKind::Exact
            } else {
                summary.tolerance += 1;
                MatchKind::Tolerance
            };
            matches.push(Matched {
                external_id: row.external_id.clone(),
                kind,
                file_total,
                vl_total,
            });
        } else {
            let finding_type = if total_ok {
                summary.false_green += 1;
                FindingType::FalseGreen
            } else {
                summary.mismatch += 1;
                FindingType::Mismatch
            };
            findings.push(Finding {
                finding_type,
                external_id: row.external_id.clone(),
                line: Some(row.line),
                file_total: Some(file_total),
                vl_total: Some(vl_total),
                delta: Some(delta),
                component_deltas,
            });
        }
    }

    for (_, result) in by_external {
        summary.vl_only += 1;
        findings.push(Finding {
            finding_type: FindingType::VlOnly,
            external_id: result.external_id.clone(),
            line: None,
            file_total: None,
            vl_total: Some(result.total_payout),
            delta: None,
            component_deltas: Vec::new(),
        });
    }

    findings.sort_by(|a, b| {
        rank(a.finding_type)
            .cmp(&rank(b.finding_type))
            .then_with(|| delta_magnitude(b).cmp(&delta_magnitude(a)))
            .then_with(|| a.external_id.cmp(&b.external_id))
    });

    ComparisonResult {
        depth_achieved,
        matches,
        findings,
        summary,
    }
}

fn rank(t: FindingType) -> u8 {
    match t {
        FindingType::FalseGreen => 0,
        FindingType::Mismatch => 1,
        FindingType::FileOnly => 2,
        FindingType::VlOnly => 3,
    }
}

fn delta_magnitude(finding: &Finding) -> Decimal {
    finding.delta.map(|d| d.abs()).unwrap_or(Decimal::ZERO)
}

fn component_deltas(
    row: &FileRow,
    result: &CalculationResultRecord,
    config: &CompareConfig,
) -> Vec<ComponentDelta> {
    let mut deltas = Vec::new();
    for component_id in config.component_columns.values() {
        let Some(file_value) = row.components.get(component_id).copied() else {
            continue;
        };
        let vl_value = result
            .components
            .iter()
            .find(|c| &c.component_id == component_id)
            .map(|c| c.payout)
            .unwrap_or(Decimal::ZERO);
        let delta = file_value - vl_value;
        deltas.push(ComponentDelta {
            component_id: component_id.clone(),
            file_value,
            vl_value,
            delta,
            within_tolerance: within_tolerance(file_value, vl_value, &config.tolerances),
        });
    }
    deltas
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    use vl_storage::ComponentResultRecord;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn result(external_id: &str, total: &str, components: &[(&str, &str)]) -> CalculationResultRecord {
        CalculationResultRecord {
            tenant_id: "t1".into(),
            entity_id: format!("e_{external_id}"),
            external_id: external_id.into(),
            period_id: "p1".into(),
            rule_set_id: "rs1".into(),
            batch_id: "b1".into(),
            total_payout: dec(total),
            components: components
                .iter()
                .map(|(id, payout)| ComponentResultRecord {
                    component_id: id.to_string(),
                    name: id.to_string(),
                    payout: dec(payout),
                    metrics_used: Default::default(),
                    trace: Vec::new(),
                })
                .collect(),
            metrics: serde_json::Value::Null,
            metadata: serde_json::Value::Null,
        }
    }

    fn file_row(external_id: &str, total: &str, components: &[(&str, &str)]) -> FileRow {
        FileRow {
            line: 1,
            external_id: external_id.into(),
            total: Some(dec(total)),
            components: components
                .iter()
                .map(|(id, v)| (id.to_string(), dec(v)))
                .collect(),
            period_key: None,
        }
    }

    fn total_config() -> CompareConfig {
        CompareConfig {
            entity_id_field: "employee_id".into(),
            total_amount_field: "total".into(),
            component_columns: Default::default(),
            period_column: None,
            target_periods: Vec::new(),
            tolerances: Tolerances::default(),
        }
    }

    fn component_config() -> CompareConfig {
        let mut config = total_config();
        config
            .component_columns
            .insert("commission".into(), "comm".into());
        config
            .component_columns
            .insert("bonus".into(), "bonus".into());
        config
    }

    #[test]
    fn exact_and_tolerance_matches() {
        let results = vec![result("A", "100.00", &[]), result("B", "100.00", &[])];
        let rows = vec![file_row("A", "100.00", &[]), file_row("B", "100.25", &[])];
        let out = compare(&results, &rows, &total_config());
        assert_eq!(out.summary.exact, 1);
        assert_eq!(out.summary.tolerance, 1);
        assert!(out.findings.is_empty());
        assert_eq!(out.depth_achieved, ComparisonDepth::TotalOnly);
    }

    #[test]
    fn mismatch_beyond_both_tolerances() {
        let results = vec![result("A", "100.00", &[])];
        let mut row = file_row("A", "110.00", &[]);
        row.line = 7;
        let out = compare(&results, &[row], &total_config());
        assert_eq!(out.summary.mismatch, 1);
        assert_eq!(out.findings[0].finding_type, FindingType::Mismatch);
        assert_eq!(out.findings[0].delta, Some(dec("10.00")));
        // Finding points back at the offending file line.
        assert_eq!(out.findings[0].line, Some(7));
    }

    #[test]
    fn false_green_when_components_cancel() {
        // Total agrees but the commission/bonus split is wrong.
        let results = vec![result(
            "A",
            "1000.00",
            &[("comm", "800.00"), ("bonus", "200.00")],
        )];
        let rows = vec![file_row(
            "A",
            "1000.00",
            &[("comm", "900.00"), ("bonus", "100.00")],
        )];
        let out = compare(&results, &rows, &component_config());
        assert_eq!(out.summary.false_green, 1);
        assert_eq!(out.findings[0].finding_type, FindingType::FalseGreen);
        assert_eq!(out.depth_achieved, ComparisonDepth::Component);
        let off: Vec<&str> = out.findings[0]
            .component_deltas
            .iter()
            .filter(|d| !d.within_tolerance)
            .map(|d| d.component_id.as_str())
            .collect();
        assert_eq!(off, vec!["bonus", "comm"]);
    }

    #[test]
    fn only_buckets_and_ordering() {
        let results = vec![
            result("A", "1000.00", &[("comm", "800.00"), ("bonus", "200.00")]),
            result("B", "500.00", &[]),
            result("C", "300.00", &[]),
            result("Z", "42.00", &[]),
        ];
        let rows = vec![
            file_row("A", "1000.00", &[("comm", "900.00"), ("bonus", "100.00")]),
            file_row("B", "600.00", &[]),
            file_row("C", "340.00", &[]),
            file_row("X", "10.00", &[]),
        ];
        let out = compare(&results, &rows, &component_config());
        let order: Vec<(FindingType, &str)> = out
            .findings
            .iter()
            .map(|f| (f.finding_type, f.external_id.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                (FindingType::FalseGreen, "A"),
                (FindingType::Mismatch, "B"),
                (FindingType::Mismatch, "C"),
                (FindingType::FileOnly, "X"),
                (FindingType::VlOnly, "Z"),
            ]
        );
        assert_eq!(out.summary.vl_only, 1);
        assert_eq!(out.summary.file_only, 1);
        // Findings with no file side carry no line.
        assert_eq!(out.findings[4].line, None);
    }

    #[test]
    fn period_filter_drops_other_months() {
        let results = vec![result("A", "100.00", &[])];
        let mut keep = file_row("A", "100.00", &[]);
        keep.period_key = Some("2024-01".into());
        let mut drop = file_row("A", "999.00", &[]);
        drop.period_key = Some("2024-02".into());
        let mut unparsed = file_row("B", "5.00", &[]);
        unparsed.period_key = None;

        let mut config = total_config();
        config.target_periods = vec!["2024-01".into()];
        let out = compare(&results, &[keep, drop, unparsed], &config);
        assert_eq!(out.summary.exact, 1);
        assert_eq!(out.summary.filtered_out, 2);
        assert!(out.findings.is_empty());
    }

    #[test]
    fn zero_totals_match_exactly() {
        let results = vec![result("A", "0.00", &[])];
        let rows = vec![file_row("A", "0", &[])];
        let out = compare(&results, &rows, &total_config());
        assert_eq!(out.summary.exact, 1);
    }
}
