//! Decimal helpers for the payout path.
//!
//! All arithmetic uses `rust_decimal::Decimal` with
//! `RoundingStrategy::MidpointNearestEven`. No `f64` anywhere in the
//! evaluation path.

use rust_decimal::{Decimal, RoundingStrategy};

/// Money scale for payouts.
pub const MONEY_SCALE: u32 = 2;

/// Round a payout to money scale with banker's rounding.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointNearestEven)
}

/// Divide, treating a zero denominator as zero rather than an error.
pub fn safe_ratio(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator.is_zero() {
        Decimal::ZERO
    } else {
        numerator / denominator
    }
}

/// Select a band by linear scan in ascending order.
///
/// Boundaries are inclusive-lower / exclusive-upper: the first band whose
/// upper bound exceeds the value wins, provided the value reaches the
/// band's lower bound. `None` upper means unbounded. Returns `None` when
/// the value sits below every band.
pub fn select_band(
    value: Decimal,
    bands: impl Iterator<Item = (Decimal, Option<Decimal>)>,
) -> Option<usize> {
    for (index, (lower, upper)) in bands.enumerate() {
        let above_lower = value >= lower;
        let below_upper = upper.map(|u| value < u).unwrap_or(true);
        if above_lower && below_upper {
            return Some(index);
        }
    }
    None
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn bands() -> Vec<(Decimal, Option<Decimal>)> {
        vec![
            (dec("0"), Some(dec("60000"))),
            (dec("60000"), Some(dec("100000"))),
            (dec("100000"), None),
        ]
    }

    #[test]
    fn boundary_value_falls_in_upper_band() {
        // 60000 is exclusive for [0, 60000) and inclusive for [60000, 100000).
        assert_eq!(select_band(dec("60000"), bands().into_iter()), Some(1));
    }

    #[test]
    fn interior_and_open_ended_bands() {
        assert_eq!(select_band(dec("59999.99"), bands().into_iter()), Some(0));
        assert_eq!(select_band(dec("100000"), bands().into_iter()), Some(2));
        assert_eq!(select_band(dec("2500000"), bands().into_iter()), Some(2));
    }

    #[test]
    fn below_all_bands_is_none() {
        assert_eq!(select_band(dec("-5"), bands().into_iter()), None);
    }

    #[test]
    fn zero_denominator_yields_zero() {
        assert_eq!(safe_ratio(dec("42"), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(safe_ratio(dec("10"), dec("4")), dec("2.5"));
    }

    #[test]
    fn money_rounding_is_bankers() {
        assert_eq!(round_money(dec("2.125")), dec("2.12"));
        assert_eq!(round_money(dec("2.135")), dec("2.14"));
    }
}
