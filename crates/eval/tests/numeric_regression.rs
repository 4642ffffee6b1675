//! Numeric precision regression suite.
//!
//! Exercises decimal arithmetic through whole components, not unit
//! helpers: rate math, banker's rounding at payout boundaries, band
//! boundary selection, and ratio division. Organized by category:
//!   A. Rate arithmetic and rounding
//!   B. Band boundaries
//!   C. Ratio division
//!   D. Accumulation

use std::collections::BTreeMap;
use std::str::FromStr;

use rust_decimal::Decimal;

use vl_core::{Band, Component, MatrixRow};
use vl_eval::evaluate_component;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn metrics(pairs: &[(&str, &str)]) -> BTreeMap<String, Decimal> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), dec(v)))
        .collect()
}

fn percentage(rate: &str) -> Component {
    Component::Percentage {
        id: "p".into(),
        name: "P".into(),
        applied_to: "net_revenue".into(),
        rate: dec(rate),
    }
}

fn percentage_payout(base: &str, rate: &str) -> Decimal {
    evaluate_component(&percentage(rate), &metrics(&[("net_revenue", base)]), &[]).payout
}

// ──────────────────────────────────────────────
// A. Rate arithmetic and rounding
// ──────────────────────────────────────────────

#[test]
fn half_even_rounds_to_nearest_even_cent() {
    // .125 -> .12 (down to even), .135 -> .14 (up to even)
    assert_eq!(percentage_payout("1025", "0.005"), dec("5.12"));
    assert_eq!(percentage_payout("1027", "0.005"), dec("5.14"));
}

#[test]
fn exact_products_keep_two_places() {
    assert_eq!(percentage_payout("40000", "0.05"), dec("2000.00"));
    assert_eq!(percentage_payout("0", "0.05"), dec("0.00"));
}

#[test]
fn tiny_rates_do_not_collapse_to_zero_prematurely() {
    // 123456.78 * 0.0001 = 12.345678 -> 12.35
    assert_eq!(percentage_payout("123456.78", "0.0001"), dec("12.35"));
}

#[test]
fn repeating_products_round_once_at_the_boundary() {
    // 33333.33 * 0.0333 = 1109.999889 -> 1110.00
    assert_eq!(percentage_payout("33333.33", "0.0333"), dec("1110.00"));
}

#[test]
fn negative_bases_round_symmetrically() {
    // Clawback rows produce negative bases.
    assert_eq!(percentage_payout("-1025", "0.005"), dec("-5.12"));
}

#[test]
fn no_float_drift_on_classic_inputs() {
    // 0.1 + 0.2 class of inputs: 30000.03 * 0.1 = 3000.003 -> 3000.00
    assert_eq!(percentage_payout("30000.03", "0.1"), dec("3000.00"));
}

// ──────────────────────────────────────────────
// B. Band boundaries
// ──────────────────────────────────────────────

fn tier_component() -> Component {
    Component::TierLookup {
        id: "t".into(),
        name: "T".into(),
        metric: "net_revenue".into(),
        tiers: vec![
            Band {
                lower: dec("0"),
                upper: Some(dec("50000")),
                payout: dec("500"),
            },
            Band {
                lower: dec("50000"),
                upper: Some(dec("100000")),
                payout: dec("1500"),
            },
            Band {
                lower: dec("100000"),
                upper: None,
                payout: dec("4000"),
            },
        ],
    }
}

fn tier_payout(value: &str) -> Decimal {
    evaluate_component(&tier_component(), &metrics(&[("net_revenue", value)]), &[]).payout
}

#[test]
fn lower_bound_is_inclusive() {
    assert_eq!(tier_payout("50000"), dec("1500.00"));
    assert_eq!(tier_payout("100000"), dec("4000.00"));
}

#[test]
fn upper_bound_is_exclusive() {
    assert_eq!(tier_payout("49999.99"), dec("500.00"));
    assert_eq!(tier_payout("99999.99"), dec("1500.00"));
}

#[test]
fn open_upper_band_has_no_ceiling() {
    assert_eq!(tier_payout("99999999.99"), dec("4000.00"));
}

#[test]
fn fractional_cents_near_a_boundary_stay_in_the_lower_band() {
    assert_eq!(tier_payout("49999.999"), dec("500.00"));
}

#[test]
fn matrix_boundaries_apply_on_both_axes() {
    let component = Component::TieredMatrix {
        id: "m".into(),
        name: "M".into(),
        row_metric: "quota_attainment".into(),
        column_metric: "net_revenue".into(),
        rows: vec![
            MatrixRow {
                lower: dec("0"),
                upper: Some(dec("1")),
                cells: vec![Band {
                    lower: dec("0"),
                    upper: None,
                    payout: dec("100"),
                }],
            },
            MatrixRow {
                lower: dec("1"),
                upper: None,
                cells: vec![
                    Band {
                        lower: dec("0"),
                        upper: Some(dec("50000")),
                        payout: dec("500"),
                    },
                    Band {
                        lower: dec("50000"),
                        upper: None,
                        payout: dec("1200"),
                    },
                ],
            },
        ],
    };
    // Exactly 100% attainment and exactly 50000 revenue: both land in
    // the upper band of their axis.
    let result = evaluate_component(
        &component,
        &metrics(&[("quota_attainment", "1"), ("net_revenue", "50000")]),
        &[],
    );
    assert_eq!(result.payout, dec("1200.00"));
}

// ──────────────────────────────────────────────
// C. Ratio division
// ──────────────────────────────────────────────

fn ratio_component(rate: &str) -> Component {
    Component::Ratio {
        id: "r".into(),
        name: "R".into(),
        numerator: "net_revenue".into(),
        denominator: "deal_count".into(),
        rate: dec(rate),
    }
}

#[test]
fn non_terminating_division_rounds_at_the_payout() {
    // 100 / 3 = 33.333... ; x 1 -> 33.33
    let result = evaluate_component(
        &ratio_component("1"),
        &metrics(&[("net_revenue", "100"), ("deal_count", "3")]),
        &[],
    );
    assert_eq!(result.payout, dec("33.33"));
}

#[test]
fn zero_denominator_is_zero_not_an_error() {
    let result = evaluate_component(
        &ratio_component("1"),
        &metrics(&[("net_revenue", "100"), ("deal_count", "0")]),
        &[],
    );
    assert_eq!(result.payout, dec("0"));
}

#[test]
fn ratio_of_small_numbers_keeps_precision() {
    // 0.07 / 0.02 = 3.5 ; x 10 -> 35.00
    let result = evaluate_component(
        &ratio_component("10"),
        &metrics(&[("net_revenue", "0.07"), ("deal_count", "0.02")]),
        &[],
    );
    assert_eq!(result.payout, dec("35.00"));
}

// ──────────────────────────────────────────────
// D. Accumulation
// ──────────────────────────────────────────────

#[test]
fn many_small_payouts_sum_without_drift() {
    // 1000 x 0.01 must be exactly 10, never 9.999... .
    let mut total = Decimal::ZERO;
    for _ in 0..1000 {
        total += percentage_payout("2", "0.005");
    }
    assert_eq!(total, dec("10.00"));
}
