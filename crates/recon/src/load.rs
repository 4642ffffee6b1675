//! CSV benchmark loader.
//!
//! The benchmark file is whatever the tenant's previous system exported;
//! the loader normalizes it into `FileRow`s using the column mapping in
//! `CompareConfig`. Money cells tolerate currency symbols and thousands
//! separators; period cells go through the same parsing the period
//! detector uses, so Excel serials and bare years behave identically on
//! both sides of the comparison.

use std::collections::BTreeMap;
use std::path::Path;

use rust_decimal::Decimal;
use thiserror::Error;

use vl_analyze::parse_period_value;
use vl_core::{canonical_key, decimal_from_json};

use crate::model::{CompareConfig, FileRow};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("csv read failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("benchmark file has no '{column}' column")]
    MissingColumn { column: String },
}

pub fn load_benchmark_csv(path: &Path, config: &CompareConfig) -> Result<Vec<FileRow>, LoadError> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)?;
    parse_benchmark(reader, config)
}

/// Parse benchmark CSV already in memory (HTTP request bodies).
pub fn parse_benchmark_str(data: &str, config: &CompareConfig) -> Result<Vec<FileRow>, LoadError> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(data.as_bytes());
    parse_benchmark(reader, config)
}

fn parse_benchmark<R: std::io::Read>(
    mut reader: csv::Reader<R>,
    config: &CompareConfig,
) -> Result<Vec<FileRow>, LoadError> {
    let headers = reader.headers()?.clone();
    let entity_idx = column_index(&headers, &config.entity_id_field)?;
    let total_idx = column_index(&headers, &config.total_amount_field)?;
    let period_idx = match &config.period_column {
        Some(column) => Some(column_index(&headers, column)?),
        None => None,
    };
    let component_idx: Vec<(usize, String)> = config
        .component_columns
        .iter()
        .filter_map(|(column, component_id)| {
            find_column(&headers, column).map(|idx| (idx, component_id.clone()))
        })
        .collect();

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let external_id = record.get(entity_idx).unwrap_or("").trim();
        if external_id.is_empty() {
            continue;
        }

        let total = record.get(total_idx).and_then(parse_decimal_cell);

        let mut components = BTreeMap::new();
        for (idx, component_id) in &component_idx {
            if let Some(value) = record.get(*idx).and_then(parse_decimal_cell) {
                components.insert(component_id.clone(), value);
            }
        }

        let period_key = period_idx
            .and_then(|idx| record.get(idx))
            .and_then(|cell| parse_period_value(&serde_json::Value::String(cell.to_string())))
            .map(|(year, month)| canonical_key(year, month));

        rows.push(FileRow {
            // Header occupies line 1.
            line: line + 2,
            external_id: external_id.to_string(),
            total,
            components,
            period_key,
        });
    }

    Ok(rows)
}

fn parse_decimal_cell(cell: &str) -> Option<Decimal> {
    if cell.trim().is_empty() {
        return None;
    }
    decimal_from_json(&serde_json::Value::String(cell.to_string()))
}

fn find_column(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name.trim()))
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Result<usize, LoadError> {
    find_column(headers, name).ok_or_else(|| LoadError::MissingColumn {
        column: name.to_string(),
    })
}
