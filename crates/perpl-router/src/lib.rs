//! Hybrid read/write router.
//!
//! Resolves every public operation to the fastest correct path. Reads with
//! two paths try the preferred one, log a warning on failure, and fall back;
//! authoritative identifiers (contract order ids) are never taken from a
//! non-authoritative source. Order writes prefer the trading socket when it
//! is attached and authenticated, and route through the contract otherwise,
//! including transparently when trading authentication failed.

pub mod error;
pub mod policy;
pub mod router;

pub use error::{RouterError, RouterResult};
pub use policy::{route, Operation, Path};
pub use router::{HybridRouter, WriteReceipt};
