//! On-chain client for the Perpl exchange.
//!
//! Chain reads are the source of truth for accounts, positions, perpetual
//! state, and open orders; writes go through `execOrder`/`execOrders`,
//! tunneled through the owner/operator proxy when an operator key is
//! configured. The order-book walk reconstructs L2 levels from the contract's
//! walk primitives without indexer support.

pub mod abi;
pub mod book;
pub mod client;
pub mod error;
pub mod keys;

pub use book::{walk_book, BookLevelView, BookSource, BookView};
pub use client::{ChainClient, PositionView};
pub use error::{ChainError, ChainResult};
pub use keys::{KeyManager, KeySource};
