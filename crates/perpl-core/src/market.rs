//! Perpetual market records and identifiers.

use crate::units::{Lns, Ons, Pns};
use serde::{Deserialize, Serialize};

/// ID of a perpetual market.
pub type PerpetualId = u64;

/// ID of an exchange account.
pub type AccountId = u64;

/// Contract-assigned order ID.
///
/// Not interchangeable with the REST API's own order identifiers; only the
/// contract's ids are authoritative.
pub type OrderId = u64;

/// A perpetual-futures market as reported by the exchange contract.
///
/// Read-only from the client's perspective; mutated only on chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Perpetual {
    pub id: PerpetualId,
    pub name: String,
    pub symbol: String,
    /// Decimals of the PNS scaling for this market.
    pub price_decimals: u32,
    /// Decimals of the LNS scaling for this market.
    pub lot_decimals: u32,
    /// Base price that ONS offsets are relative to.
    pub base_price_pns: Pns,
    pub mark_pns: Pns,
    pub oracle_pns: Pns,
    /// Unix seconds of the last mark price update.
    pub mark_timestamp: u64,
    /// Unix seconds of the last oracle price update.
    pub oracle_timestamp: u64,
    /// Signed funding rate, per-100k representation (pct = value / 1000).
    pub funding_per_100k: i64,
    pub open_interest_long: Lns,
    pub open_interest_short: Lns,
    /// Book summary: best bid offset. Zero together with `max_ask_ons`
    /// signals an empty book.
    pub max_bid_ons: Ons,
    pub min_bid_ons: Ons,
    pub max_ask_ons: Ons,
    pub min_ask_ons: Ons,
    pub total_orders: u64,
    pub paused: bool,
}

impl Perpetual {
    /// Whether the order book is empty (both summary offsets zero).
    pub fn book_is_empty(&self) -> bool {
        self.max_bid_ons.is_zero() && self.max_ask_ons.is_zero()
    }

    /// Funding rate as a percentage.
    pub fn funding_rate_pct(&self) -> f64 {
        crate::units::funding_rate_pct(self.funding_per_100k)
    }

    /// Mark price in display units.
    pub fn mark_price(&self) -> f64 {
        self.mark_pns.to_price(self.price_decimals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perp(max_bid: i64, max_ask: i64) -> Perpetual {
        Perpetual {
            id: 16,
            name: "Bitcoin".to_string(),
            symbol: "BTC".to_string(),
            price_decimals: 1,
            lot_decimals: 5,
            base_price_pns: Pns(900000),
            mark_pns: Pns(950000),
            oracle_pns: Pns(949900),
            mark_timestamp: 1_700_000_000,
            oracle_timestamp: 1_700_000_000,
            funding_per_100k: 125,
            open_interest_long: Lns(5_000_000),
            open_interest_short: Lns(4_800_000),
            max_bid_ons: Ons(max_bid),
            min_bid_ons: Ons(0),
            max_ask_ons: Ons(max_ask),
            min_ask_ons: Ons(0),
            total_orders: 42,
            paused: false,
        }
    }

    #[test]
    fn test_empty_book_detection() {
        assert!(perp(0, 0).book_is_empty());
        assert!(!perp(49000, 51000).book_is_empty());
        assert!(!perp(0, 51000).book_is_empty());
    }

    #[test]
    fn test_funding_pct() {
        assert_eq!(perp(0, 0).funding_rate_pct(), 0.125);
    }
}
