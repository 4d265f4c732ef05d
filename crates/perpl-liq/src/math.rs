//! Closed-form liquidation price.
//!
//! Solves `equity(L) = m * |position_value(L)|` for the mark price `L`:
//!
//! ```text
//! C + sign * S * (L - E) = m * S * L
//! L_long  = (E*S - C) / (S * (1 - m))
//! L_short = (E*S + C) / (S * (1 + m))
//! ```
//!
//! Ignores funding accrual and the taker fee on close; fast and always
//! available. The fork verifier refines against the contract's own rule.

use serde::{Deserialize, Serialize};

/// Position side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

/// Closed-form liquidation price in display units.
///
/// `entry` is the entry price, `size` the absolute position size,
/// `collateral` the deposited margin, `maintenance` the maintenance margin
/// fraction. Degenerate inputs (zero size, maintenance >= 1 for longs)
/// return zero rather than a non-finite value.
pub fn closed_form_liquidation_price(
    entry: f64,
    size: f64,
    collateral: f64,
    maintenance: f64,
    side: Side,
) -> f64 {
    if size <= 0.0 {
        return 0.0;
    }
    let price = match side {
        Side::Long => {
            let denom = size * (1.0 - maintenance);
            if denom <= 0.0 {
                return 0.0;
            }
            (entry * size - collateral) / denom
        }
        Side::Short => {
            let denom = size * (1.0 + maintenance);
            if denom <= 0.0 {
                return 0.0;
            }
            (entry * size + collateral) / denom
        }
    };
    price.max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_reference_case() {
        // Entry 100000, size 1, collateral 10000, maintenance 0.05:
        // L = (100000 - 10000) / 0.95 = 94736.84...
        let price = closed_form_liquidation_price(100_000.0, 1.0, 10_000.0, 0.05, Side::Long);
        assert!((price - 94_736.842105).abs() < 1e-4, "got {price}");
    }

    #[test]
    fn test_short_symmetric_case() {
        // L = (100000 + 10000) / 1.05 = 104761.90...
        let price = closed_form_liquidation_price(100_000.0, 1.0, 10_000.0, 0.05, Side::Short);
        assert!((price - 104_761.904762).abs() < 1e-4, "got {price}");
    }

    #[test]
    fn test_long_liquidation_below_entry() {
        let price = closed_form_liquidation_price(50_000.0, 2.0, 20_000.0, 0.05, Side::Long);
        assert!(price < 50_000.0);
        assert!(price > 0.0);
    }

    #[test]
    fn test_short_liquidation_above_entry() {
        let price = closed_form_liquidation_price(50_000.0, 2.0, 20_000.0, 0.05, Side::Short);
        assert!(price > 50_000.0);
    }

    #[test]
    fn test_degenerate_inputs_return_zero() {
        assert_eq!(
            closed_form_liquidation_price(100.0, 0.0, 10.0, 0.05, Side::Long),
            0.0
        );
        assert_eq!(
            closed_form_liquidation_price(100.0, 1.0, 10.0, 1.0, Side::Long),
            0.0
        );
    }

    #[test]
    fn test_overcollateralized_long_clamps_to_zero() {
        // Collateral above notional: nothing can liquidate a long.
        let price = closed_form_liquidation_price(100.0, 1.0, 500.0, 0.05, Side::Long);
        assert_eq!(price, 0.0);
    }
}
