use std::collections::BTreeMap;
use std::io::Write;
use std::str::FromStr;

use rust_decimal::Decimal;
use tempfile::NamedTempFile;

use vl_recon::{
    compare, load_benchmark_csv, CompareConfig, ComparisonDepth, FindingType, LoadError,
    Tolerances,
};
use vl_storage::{CalculationResultRecord, ComponentResultRecord};

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn config() -> CompareConfig {
    let mut component_columns = BTreeMap::new();
    component_columns.insert("Commission".to_string(), "comm".to_string());
    component_columns.insert("Bonus".to_string(), "bonus".to_string());
    CompareConfig {
        entity_id_field: "Employee ID".into(),
        total_amount_field: "Total Payout".into(),
        component_columns,
        period_column: Some("Period".into()),
        target_periods: vec!["2024-01".into()],
        tolerances: Tolerances::default(),
    }
}

fn result(external_id: &str, total: &str, comm: &str, bonus: &str) -> CalculationResultRecord {
    CalculationResultRecord {
        tenant_id: "t1".into(),
        entity_id: format!("e_{external_id}"),
        external_id: external_id.into(),
        period_id: "p1".into(),
        rule_set_id: "rs1".into(),
        batch_id: "b1".into(),
        total_payout: dec(total),
        components: vec![
            ComponentResultRecord {
                component_id: "comm".into(),
                name: "Commission".into(),
                payout: dec(comm),
                metrics_used: Default::default(),
                trace: Vec::new(),
            },
            ComponentResultRecord {
                component_id: "bonus".into(),
                name: "Bonus".into(),
                payout: dec(bonus),
                metrics_used: Default::default(),
                trace: Vec::new(),
            },
        ],
        metrics: serde_json::Value::Null,
        metadata: serde_json::Value::Null,
    }
}

fn write_csv(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn csv_to_comparison_end_to_end() {
    // Messy export: currency symbols, thousands separators, an Excel
    // serial date, and a blank spacer row.
    let file = write_csv(
        "Employee ID,Period,Total Payout,Commission,Bonus\n\
         EMP-001,2024-01,\"$5,500.00\",\"$3,000.00\",\"$2,500.00\"\n\
         EMP-002,45308,500.00,500.00,0.00\n\
         ,,,,\n\
         EMP-003,2024-02,999.00,999.00,0.00\n\
         EMP-004,2024-01,100.00,100.00,0.00\n",
    );
    let rows = load_benchmark_csv(file.path(), &config()).unwrap();
    // Blank row skipped; EMP-002's serial date lands in January 2024.
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[1].period_key.as_deref(), Some("2024-01"));
    assert_eq!(rows[0].total, Some(dec("5500.00")));

    let results = vec![
        result("EMP-001", "5500.00", "3000.00", "2500.00"),
        result("EMP-002", "500.00", "500.00", "0.00"),
        result("EMP-005", "42.00", "42.00", "0.00"),
    ];
    let out = compare(&results, &rows, &config());

    assert_eq!(out.depth_achieved, ComparisonDepth::Component);
    assert_eq!(out.summary.exact, 2);
    // EMP-003 is February, outside the target period.
    assert_eq!(out.summary.filtered_out, 1);
    // EMP-004 exists only in the file, EMP-005 only in the output.
    let kinds: Vec<FindingType> = out.findings.iter().map(|f| f.finding_type).collect();
    assert_eq!(kinds, vec![FindingType::FileOnly, FindingType::VlOnly]);
    // The file-only finding points at EMP-004's line in the export,
    // counting the header and the blank spacer row.
    assert_eq!(out.findings[0].line, Some(6));
    assert_eq!(out.findings[1].line, None);
}

#[test]
fn false_green_surfaces_ahead_of_larger_mismatch() {
    let file = write_csv(
        "Employee ID,Period,Total Payout,Commission,Bonus\n\
         EMP-001,2024-01,5500.00,3500.00,2000.00\n\
         EMP-002,2024-01,9999.00,9999.00,0.00\n",
    );
    let rows = load_benchmark_csv(file.path(), &config()).unwrap();
    let results = vec![
        result("EMP-001", "5500.00", "3000.00", "2500.00"),
        result("EMP-002", "500.00", "500.00", "0.00"),
    ];
    let out = compare(&results, &rows, &config());

    assert_eq!(out.findings[0].finding_type, FindingType::FalseGreen);
    assert_eq!(out.findings[0].external_id, "EMP-001");
    assert_eq!(out.findings[1].finding_type, FindingType::Mismatch);
    assert_eq!(out.summary.false_green, 1);
    assert_eq!(out.summary.mismatch, 1);
}

#[test]
fn missing_required_column_is_an_error() {
    let file = write_csv("Name,Amount\nAlice,100\n");
    let err = load_benchmark_csv(file.path(), &config()).unwrap_err();
    match err {
        LoadError::MissingColumn { column } => assert_eq!(column, "Employee ID"),
        other => panic!("expected MissingColumn, got {other}"),
    }
}
