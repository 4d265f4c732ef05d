//! In-memory snapshot of account, positions, and orders.
//!
//! The tracker consumes the trading socket's event stream (one-directional:
//! the tracker subscribes to the client, the client knows nothing about the
//! tracker) and keeps the latest view keyed by perpetual id and order id.
//! Derived values are computed on demand, never cached.

pub mod tracker;

pub use tracker::{StateTracker, TradeRecord, TrackerSnapshot};
