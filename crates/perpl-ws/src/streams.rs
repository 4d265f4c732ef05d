//! Stream name construction.
//!
//! Subscriptions are keyed by these names; the server confirms each with a
//! subscription id.

use perpl_core::PerpetualId;

pub fn order_book(perp: PerpetualId) -> String {
    format!("order-book@{perp}")
}

pub fn trades(perp: PerpetualId) -> String {
    format!("trades@{perp}")
}

pub fn market_state(chain_id: u64) -> String {
    format!("market-state@{chain_id}")
}

pub fn heartbeat(chain_id: u64) -> String {
    format!("heartbeat@{chain_id}")
}

pub fn candles(perp: PerpetualId, resolution_secs: u64) -> String {
    format!("candles@{perp}*{resolution_secs}")
}

pub fn funding(chain_id: u64) -> String {
    format!("funding@{chain_id}")
}
