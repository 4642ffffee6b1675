//! Period detection from row-level field mappings.
//!
//! Sheets declare which of their columns map to the abstract targets
//! `year`, `month`, or `date`; detection walks the raw rows and extracts a
//! deduplicated, sorted set of calendar periods. Column names themselves
//! are never interpreted -- only the mapping is.
//!
//! Numeric date values are disambiguated by range: values inside
//! `(25000, 100000)` are Excel serial dates (days since 1899-12-30),
//! values inside `[2000, 2100]` are bare years. Anything unparseable is
//! dropped, not defaulted.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::{Date, Duration, Month};

use vl_core::canonical_key;

/// Abstract target a source column is mapped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetField {
    Year,
    Month,
    Date,
    Ignore,
}

/// One uploaded sheet/tab: its rows plus the column -> target mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetData {
    pub name: String,
    /// Classification label, if the sheet has one ("roster", "transactions", ...).
    #[serde(default)]
    pub data_type: Option<String>,
    pub field_mapping: BTreeMap<String, TargetField>,
    pub rows: Vec<serde_json::Map<String, serde_json::Value>>,
}

/// Inferred cadence of the detected period set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Monthly,
    Quarterly,
    Annual,
    Unknown,
}

/// One detected calendar period. Dates are ISO `YYYY-MM-DD` strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedPeriod {
    pub year: i32,
    pub month: u8,
    pub label: String,
    pub canonical_key: String,
    pub start_date: String,
    pub end_date: String,
    pub record_count: usize,
    pub sheets_present: Vec<String>,
}

/// Result of period detection over a set of sheets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodDetection {
    pub periods: Vec<DetectedPeriod>,
    pub frequency: Frequency,
    /// Percentage (0-100) of scanned rows that contributed a period.
    pub confidence: f64,
}

/// Detect periods across all sheets.
///
/// Sheets classified roster/unrelated are skipped -- their date columns are
/// entity attributes (hire dates, birthdays), not period boundaries. Sheets
/// with no period-mapped column are skipped too; neither case is an error.
pub fn detect_periods(sheets: &[SheetData]) -> PeriodDetection {
    let mut found: BTreeMap<String, DetectedPeriod> = BTreeMap::new();
    let mut rows_scanned = 0usize;
    let mut rows_contributing = 0usize;

    for sheet in sheets {
        if is_skipped_classification(sheet.data_type.as_deref()) {
            continue;
        }

        let year_col = mapped_column(sheet, TargetField::Year);
        let month_col = mapped_column(sheet, TargetField::Month);
        let date_col = mapped_column(sheet, TargetField::Date);

        if (year_col.is_none() || month_col.is_none()) && date_col.is_none() {
            continue;
        }

        for row in &sheet.rows {
            rows_scanned += 1;
            let pair = match (&year_col, &month_col) {
                (Some(yc), Some(mc)) => {
                    let year = row.get(yc.as_str()).and_then(integer_value);
                    let month = row.get(mc.as_str()).and_then(integer_value);
                    match (year, month) {
                        (Some(y), Some(m))
                            if (1..=12).contains(&m) && (2000..=2100).contains(&y) =>
                        {
                            Some((y as i32, m as u8))
                        }
                        _ => None,
                    }
                }
                _ => date_col
                    .as_ref()
                    .and_then(|dc| row.get(dc.as_str()))
                    .and_then(parse_period_value),
            };

            let Some((year, month)) = pair else {
                continue;
            };
            rows_contributing += 1;

            let key = canonical_key(year, month);
            let entry = found
                .entry(key.clone())
                .or_insert_with(|| make_period(year, month, &key));
            entry.record_count += 1;
            if !entry.sheets_present.contains(&sheet.name) {
                entry.sheets_present.push(sheet.name.clone());
            }
        }
    }

    let periods: Vec<DetectedPeriod> = found.into_values().collect();
    let frequency = infer_frequency(&periods);
    let confidence = if rows_scanned == 0 {
        0.0
    } else {
        rows_contributing as f64 / rows_scanned as f64 * 100.0
    };

    PeriodDetection {
        periods,
        frequency,
        confidence,
    }
}

/// Parse a single period value into (year, month).
///
/// Shared with the reconciliation engine so period filtering there matches
/// detection exactly. Returns `None` for anything unparseable.
pub fn parse_period_value(value: &serde_json::Value) -> Option<(i32, u8)> {
    match value {
        serde_json::Value::Number(n) => n.as_f64().and_then(parse_numeric_period),
        serde_json::Value::String(s) => {
            let trimmed = s.trim();
            if let Ok(n) = trimmed.parse::<f64>() {
                return parse_numeric_period(n);
            }
            parse_date_string(trimmed)
        }
        _ => None,
    }
}

fn parse_numeric_period(n: f64) -> Option<(i32, u8)> {
    if n > 25000.0 && n < 100000.0 {
        let base = Date::from_calendar_date(1899, Month::December, 30).ok()?;
        let date = base.checked_add(Duration::days(n.trunc() as i64))?;
        return Some((date.year(), date.month() as u8));
    }
    if (2000.0..=2100.0).contains(&n) && n.fract() == 0.0 {
        return Some((n as i32, 1));
    }
    None
}

static YMD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})[-/](\d{1,2})(?:[-/](\d{1,2}))?$").unwrap());
static MDY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4})$").unwrap());

fn parse_date_string(s: &str) -> Option<(i32, u8)> {
    if let Some(caps) = YMD.captures(s) {
        let year: i32 = caps[1].parse().ok()?;
        let month: u8 = caps[2].parse().ok()?;
        if (1..=12).contains(&month) {
            return Some((year, month));
        }
        return None;
    }
    if let Some(caps) = MDY.captures(s) {
        let month: u8 = caps[1].parse().ok()?;
        let year: i32 = caps[3].parse().ok()?;
        if (1..=12).contains(&month) {
            return Some((year, month));
        }
    }
    None
}

fn make_period(year: i32, month: u8, key: &str) -> DetectedPeriod {
    let fmt = format_description!("[year]-[month]-[day]");
    let month_enum = Month::try_from(month).unwrap_or(Month::January);
    let start = Date::from_calendar_date(year, month_enum, 1).ok();
    let end = Date::from_calendar_date(
        year,
        month_enum,
        time::util::days_in_year_month(year, month_enum),
    )
    .ok();

    DetectedPeriod {
        year,
        month,
        label: format!("{} {}", month_enum, year),
        canonical_key: key.to_string(),
        start_date: start
            .and_then(|d| d.format(&fmt).ok())
            .unwrap_or_default(),
        end_date: end.and_then(|d| d.format(&fmt).ok()).unwrap_or_default(),
        record_count: 0,
        sheets_present: Vec::new(),
    }
}

/// Mean month-gap between consecutive periods: <=1.5 monthly, <=4 quarterly,
/// <=13 annual. Fewer than two periods is Unknown.
fn infer_frequency(periods: &[DetectedPeriod]) -> Frequency {
    if periods.len() < 2 {
        return Frequency::Unknown;
    }
    let ordinals: Vec<i64> = periods
        .iter()
        .map(|p| p.year as i64 * 12 + p.month as i64)
        .collect();
    let gap_sum: i64 = ordinals.windows(2).map(|w| w[1] - w[0]).sum();
    let mean_gap = gap_sum as f64 / (ordinals.len() - 1) as f64;

    if mean_gap <= 1.5 {
        Frequency::Monthly
    } else if mean_gap <= 4.0 {
        Frequency::Quarterly
    } else if mean_gap <= 13.0 {
        Frequency::Annual
    } else {
        Frequency::Unknown
    }
}

fn is_skipped_classification(data_type: Option<&str>) -> bool {
    match data_type {
        Some(t) => {
            let t = t.to_ascii_lowercase();
            t.contains("roster") || t.contains("unrelated")
        }
        None => false,
    }
}

fn mapped_column(sheet: &SheetData, target: TargetField) -> Option<String> {
    sheet
        .field_mapping
        .iter()
        .find(|(_, t)| **t == target)
        .map(|(col, _)| col.clone())
}

fn integer_value(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i)
            } else {
                n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)
            }
        }
        serde_json::Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
