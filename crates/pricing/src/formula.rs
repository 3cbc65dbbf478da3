//! Surge pricing formula.

use rust_decimal::{Decimal, RoundingStrategy};

/// +2% per unit of demand in the window.
const DEMAND_STEP: Decimal = Decimal::from_parts(2, 0, 0, false, 2);
/// Demand surge never exceeds +30%.
const DEMAND_CAP: Decimal = Decimal::from_parts(30, 0, 0, false, 2);
const LOW_STOCK_THRESHOLD: i64 = 5;
const LOW_STOCK_PREMIUM: Decimal = Decimal::from_parts(20, 0, 0, false, 2);
/// Stacks on top of the low-stock premium.
const OUT_OF_STOCK_PREMIUM: Decimal = Decimal::from_parts(50, 0, 0, false, 2);

/// Price for `base_price` given the stock level and the demand count.
///
/// Pure and total. The result is rounded to cents, midpoints away from zero.
/// Negative base prices are passed through untouched (the catalog validates
/// prices, not us).
pub fn compute_price(base_price: Decimal, stock_level: i64, demand_count: usize) -> Decimal {
    let mut multiplier = Decimal::ONE;
    multiplier += (Decimal::from(demand_count as u64) * DEMAND_STEP).min(DEMAND_CAP);
    if stock_level <= LOW_STOCK_THRESHOLD {
        multiplier += LOW_STOCK_PREMIUM;
    }
    if stock_level <= 0 {
        multiplier += OUT_OF_STOCK_PREMIUM;
    }

    base_price
        .saturating_mul(multiplier)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn formula_table() {
        let cases = [
            ("no_modifiers", "100", 10, 0, "100.00"),
            ("low_stock", "100", 5, 0, "120.00"),
            ("out_of_stock", "100", 0, 0, "170.00"),
            ("demand_cap", "100", 10, 100, "130.00"),
            ("combined", "100", 3, 10, "140.00"),
        ];

        for (name, base, stock, demand, want) in cases {
            assert_eq!(compute_price(d(base), stock, demand), d(want), "case {name}");
        }
    }

    #[test]
    fn negative_stock_is_out_of_stock() {
        assert_eq!(compute_price(d("100"), -3, 0), d("170.00"));
    }

    #[test]
    fn single_unit_of_demand_adds_two_percent() {
        assert_eq!(compute_price(d("100"), 10, 1), d("102.00"));
    }

    #[test]
    fn cap_engages_at_fifteen_units() {
        assert_eq!(compute_price(d("100"), 10, 15), d("130.00"));
        assert_eq!(compute_price(d("100"), 10, 16), d("130.00"));
        assert_eq!(compute_price(d("100"), 10, 14), d("128.00"));
    }

    #[test]
    fn rounds_half_away_from_zero() {
        // 0.125 * 1.00 -> 0.13
        assert_eq!(compute_price(d("0.125"), 10, 0), d("0.13"));
        // 10.05 * 1.02 = 10.251 -> 10.25
        assert_eq!(compute_price(d("10.05"), 10, 1), d("10.25"));
        assert_eq!(compute_price(d("-0.125"), 10, 0), d("-0.13"));
    }

    #[test]
    fn result_has_two_decimal_places_at_most() {
        let p = compute_price(d("19.99"), 2, 7);
        // 19.99 * 1.34 = 26.7866 -> 26.79
        assert_eq!(p, d("26.79"));
        assert!(p.scale() <= 2);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: never below base, never above base * 2.0 (all premiums stacked).
            #[test]
            fn bounded_by_premiums(cents in 0i64..10_000_000, stock in -10i64..100, demand in 0usize..1000) {
                let base = Decimal::new(cents, 2);
                let p = compute_price(base, stock, demand);
                prop_assert!(p >= base);
                prop_assert!(p <= (base * Decimal::from(2)).round_dp(2));
            }

            /// Property: more demand never lowers the price.
            #[test]
            fn monotone_in_demand(cents in 0i64..10_000_000, stock in -10i64..100, demand in 0usize..100) {
                let base = Decimal::new(cents, 2);
                prop_assert!(compute_price(base, stock, demand + 1) >= compute_price(base, stock, demand));
            }
        }
    }
}
