//! Core domain types for the Perpl trading toolkit.
//!
//! This crate provides the fundamental types used throughout the system:
//! - Scaled-integer units (`Pns`, `Lns`, `Cns`, `Ons`) and their conversions
//! - Order types, flags, and the on-chain order descriptor
//! - Perpetual, account, position, and fill records
//!
//! The exchange protocol is integer-only; all semantics are carried by
//! fixed-point decimal counts declared per perpetual. Floating point appears
//! only at display boundaries.

pub mod account;
pub mod error;
pub mod market;
pub mod order;
pub mod units;

pub use account::{Account, Fill, LiquiditySide, Position, PositionKind};
pub use error::{CodecError, Result};
pub use market::{AccountId, OrderId, Perpetual, PerpetualId};
pub use order::{Order, OrderDescriptor, OrderFlags, OrderKind, OrderStatus};
pub use units::{Cns, LeverageHdths, Lns, Ons, Pns, CNS_DECIMALS};
