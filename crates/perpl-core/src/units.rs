//! Scaled-integer units of the exchange protocol.
//!
//! The protocol carries every quantity as an integer; the meaning is fixed
//! per perpetual by its declared decimal counts:
//!
//! - `Pns` - price scaled by 10^priceDecimals
//! - `Lns` - lot (position size) scaled by 10^lotDecimals
//! - `Cns` - collateral amount scaled by 10^6 (the collateral token decimals)
//! - `Ons` - price offset from a perpetual's base price (`pns = base + ons`)
//! - `LeverageHdths` - leverage multiplied by 100
//!
//! The platform chooses its decimals so that `PNS * LNS = CNS` holds as an
//! exact integer product; [`position_value_cns`] relies on this.

use crate::error::{CodecError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Neg, Sub};

/// Decimals of the collateral token. CNS is always scaled by 10^6.
pub const CNS_DECIMALS: u32 = 6;

/// Price in price-native scaling (10^priceDecimals).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Pns(pub i64);

/// Lot in lot-native scaling (10^lotDecimals).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Lns(pub i64);

/// Collateral amount in collateral-native scaling (10^6).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Cns(pub i128);

/// Price offset from a perpetual's base price, in PNS units.
///
/// Used by the order-book walk primitives; may be negative.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Ons(pub i64);

/// Leverage expressed in hundredths (leverage * 100).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct LeverageHdths(pub u32);

impl Pns {
    pub const ZERO: Self = Self(0);

    /// Convert a display price into PNS.
    ///
    /// Prices are non-negative; a negative input is rejected.
    pub fn from_price(price: f64, price_decimals: u32) -> Result<Self> {
        if price < 0.0 {
            return Err(CodecError::NegativePrice(price));
        }
        let scaled = price * 10f64.powi(price_decimals as i32);
        if !scaled.is_finite() || scaled > i64::MAX as f64 {
            return Err(CodecError::OutOfRange {
                unit: "PNS",
                value: price,
            });
        }
        Ok(Self(scaled.round() as i64))
    }

    /// Convert PNS back into a display price.
    pub fn to_price(self, price_decimals: u32) -> f64 {
        self.0 as f64 / 10f64.powi(price_decimals as i32)
    }

    /// Offset of this price from a base price.
    pub fn ons_from(self, base: Pns) -> Ons {
        Ons(self.0 - base.0)
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl Lns {
    pub const ZERO: Self = Self(0);

    /// Convert a display lot into LNS.
    pub fn from_lot(lot: f64, lot_decimals: u32) -> Result<Self> {
        let scaled = lot * 10f64.powi(lot_decimals as i32);
        if !scaled.is_finite() || scaled.abs() > i64::MAX as f64 {
            return Err(CodecError::OutOfRange {
                unit: "LNS",
                value: lot,
            });
        }
        Ok(Self(scaled.round() as i64))
    }

    /// Convert LNS back into a display lot.
    pub fn to_lot(self, lot_decimals: u32) -> f64 {
        self.0 as f64 / 10f64.powi(lot_decimals as i32)
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn abs(self) -> Self {
        Self(self.0.abs())
    }
}

impl Cns {
    pub const ZERO: Self = Self(0);

    /// Convert a display collateral amount into CNS.
    pub fn from_amount(amount: f64) -> Result<Self> {
        let scaled = amount * 10f64.powi(CNS_DECIMALS as i32);
        if !scaled.is_finite() {
            return Err(CodecError::OutOfRange {
                unit: "CNS",
                value: amount,
            });
        }
        Ok(Self(scaled.round() as i128))
    }

    /// Convert CNS back into a display amount.
    pub fn to_amount(self) -> f64 {
        self.0 as f64 / 10f64.powi(CNS_DECIMALS as i32)
    }

    pub fn abs(self) -> Self {
        Self(self.0.abs())
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }
}

impl Ons {
    pub const ZERO: Self = Self(0);

    /// Resolve this offset against a base price.
    pub fn to_pns(self, base: Pns) -> Pns {
        Pns(base.0 + self.0)
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl LeverageHdths {
    /// Sentinel leverage carried by close orders; ignored by the matching
    /// engine.
    pub const SENTINEL: Self = Self(100);

    /// Convert display leverage into hundredths.
    pub fn from_leverage(x: f64) -> Self {
        Self((x * 100.0).round() as u32)
    }

    /// Convert hundredths back into display leverage.
    pub fn to_leverage(self) -> f64 {
        self.0 as f64 / 100.0
    }
}

/// Position value: `PNS * LNS = CNS`.
///
/// Exact by the platform's decimal choices (priceDecimals + lotDecimals equal
/// the collateral decimals).
pub fn position_value_cns(price: Pns, lot: Lns) -> Cns {
    Cns(price.0 as i128 * lot.0 as i128)
}

/// Funding rate percentage from the signed per-100k integer representation.
pub fn funding_rate_pct(per_100k: i64) -> f64 {
    per_100k as f64 / 1000.0
}

/// PnL percentage with a zero-margin guard: division by zero returns zero,
/// not infinity.
pub fn pnl_pct(pnl: Cns, margin: Cns) -> f64 {
    if margin.0 == 0 {
        return 0.0;
    }
    pnl.0 as f64 / margin.0 as f64 * 100.0
}

impl Add for Cns {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Cns {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Add for Lns {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Lns {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Sub for Pns {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Neg for Cns {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl fmt::Display for Pns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Lns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Cns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Ons {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_round_trip_btc() {
        // priceDecimals = 1 for a BTC-style perpetual.
        let pns = Pns::from_price(95000.0, 1).unwrap();
        assert_eq!(pns, Pns(950000));
        assert_eq!(pns.to_price(1), 95000.0);

        let pns = Pns::from_price(94900.0, 1).unwrap();
        assert_eq!(pns, Pns(949000));
        assert_eq!(pns.ons_from(Pns(900000)), Ons(49000));
    }

    #[test]
    fn test_price_round_trip_within_ulp() {
        for decimals in 0..6 {
            let price = 12345.678;
            let pns = Pns::from_price(price, decimals).unwrap();
            let back = pns.to_price(decimals);
            let ulp = 10f64.powi(-(decimals as i32));
            assert!(
                (back - price).abs() <= ulp,
                "decimals={decimals} back={back}"
            );
        }
    }

    #[test]
    fn test_negative_price_rejected() {
        assert!(Pns::from_price(-1.0, 2).is_err());
    }

    #[test]
    fn test_lot_round_trip() {
        let lns = Lns::from_lot(0.125, 5).unwrap();
        assert_eq!(lns, Lns(12500));
        assert_eq!(lns.to_lot(5), 0.125);
    }

    #[test]
    fn test_amount_round_trip() {
        let cns = Cns::from_amount(1234.56789).unwrap();
        assert_eq!(cns, Cns(1_234_567_890));
        assert!((cns.to_amount() - 1234.56789).abs() < 1e-6);
    }

    #[test]
    fn test_leverage_hundredths() {
        assert_eq!(LeverageHdths::from_leverage(10.0), LeverageHdths(1000));
        assert_eq!(LeverageHdths::from_leverage(1.25), LeverageHdths(125));
        assert_eq!(LeverageHdths(1000).to_leverage(), 10.0);
    }

    #[test]
    fn test_position_value_exact() {
        // priceDecimals=1, lotDecimals=5 -> CNS decimals 6.
        let price = Pns::from_price(95000.0, 1).unwrap();
        let lot = Lns::from_lot(1.0, 5).unwrap();
        let value = position_value_cns(price, lot);
        assert_eq!(value, Cns(95_000_000_000));
        assert_eq!(value.to_amount(), 95000.0);
    }

    #[test]
    fn test_funding_rate_per_100k() {
        assert_eq!(funding_rate_pct(1000), 1.0);
        assert_eq!(funding_rate_pct(-250), -0.25);
    }

    #[test]
    fn test_pnl_pct_zero_margin() {
        assert_eq!(pnl_pct(Cns(500), Cns::ZERO), 0.0);
        assert_eq!(pnl_pct(Cns(500), Cns(1000)), 50.0);
    }

    #[test]
    fn test_ons_resolution() {
        let base = Pns(900000);
        let ons = Ons(49000);
        assert_eq!(ons.to_pns(base), Pns(949000));
        assert_eq!(Pns(949000).ons_from(base), ons);
    }
}
