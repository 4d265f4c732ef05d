//! Order types, flags, statuses, and the on-chain order descriptor.

use crate::error::{CodecError, Result};
use crate::market::{AccountId, OrderId, PerpetualId};
use crate::units::{Cns, LeverageHdths, Lns, Pns};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order type.
///
/// Carries two integer encodings: the contract's (`contract_code`) and the
/// trading WebSocket's (`ws_code`). They differ and must never be mixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    OpenLong,
    OpenShort,
    CloseLong,
    CloseShort,
    Cancel,
    Change,
    IncreaseCollateral,
}

impl OrderKind {
    /// Type code used by `execOrder` / `execOrders`.
    pub fn contract_code(self) -> u8 {
        match self {
            Self::OpenLong => 0,
            Self::OpenShort => 1,
            Self::CloseLong => 2,
            Self::CloseShort => 3,
            Self::Cancel => 4,
            Self::Change => 5,
            Self::IncreaseCollateral => 6,
        }
    }

    /// Type code used by the trading WebSocket (`mt: 22` requests).
    ///
    /// Change and collateral operations are not submitted over the socket.
    pub fn ws_code(self) -> Option<u8> {
        match self {
            Self::OpenLong => Some(1),
            Self::OpenShort => Some(2),
            Self::CloseLong => Some(3),
            Self::CloseShort => Some(4),
            Self::Cancel => Some(5),
            Self::Change | Self::IncreaseCollateral => None,
        }
    }

    pub fn from_ws_code(code: u8) -> Result<Self> {
        match code {
            1 => Ok(Self::OpenLong),
            2 => Ok(Self::OpenShort),
            3 => Ok(Self::CloseLong),
            4 => Ok(Self::CloseShort),
            5 => Ok(Self::Cancel),
            other => Err(CodecError::UnknownOrderType(other)),
        }
    }

    pub fn from_contract_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Self::OpenLong),
            1 => Ok(Self::OpenShort),
            2 => Ok(Self::CloseLong),
            3 => Ok(Self::CloseShort),
            4 => Ok(Self::Cancel),
            5 => Ok(Self::Change),
            6 => Ok(Self::IncreaseCollateral),
            other => Err(CodecError::UnknownOrderType(other)),
        }
    }

    pub fn is_open(self) -> bool {
        matches!(self, Self::OpenLong | Self::OpenShort)
    }

    pub fn is_close(self) -> bool {
        matches!(self, Self::CloseLong | Self::CloseShort)
    }
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::OpenLong => "open_long",
            Self::OpenShort => "open_short",
            Self::CloseLong => "close_long",
            Self::CloseShort => "close_short",
            Self::Cancel => "cancel",
            Self::Change => "change",
            Self::IncreaseCollateral => "increase_collateral",
        };
        write!(f, "{s}")
    }
}

/// Execution flags, ORed into a single integer on the wire.
///
/// GTC is the absence of all flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderFlags {
    pub post_only: bool,
    pub fill_or_kill: bool,
    pub immediate_or_cancel: bool,
}

impl OrderFlags {
    pub const GTC: Self = Self {
        post_only: false,
        fill_or_kill: false,
        immediate_or_cancel: false,
    };

    pub const POST_ONLY_BIT: u32 = 1;
    pub const FILL_OR_KILL_BIT: u32 = 2;
    pub const IOC_BIT: u32 = 4;

    pub fn post_only() -> Self {
        Self {
            post_only: true,
            ..Self::GTC
        }
    }

    pub fn immediate_or_cancel() -> Self {
        Self {
            immediate_or_cancel: true,
            ..Self::GTC
        }
    }

    pub fn fill_or_kill() -> Self {
        Self {
            fill_or_kill: true,
            ..Self::GTC
        }
    }

    /// ORed wire representation.
    pub fn bits(self) -> u32 {
        let mut bits = 0;
        if self.post_only {
            bits |= Self::POST_ONLY_BIT;
        }
        if self.fill_or_kill {
            bits |= Self::FILL_OR_KILL_BIT;
        }
        if self.immediate_or_cancel {
            bits |= Self::IOC_BIT;
        }
        bits
    }

    pub fn from_bits(bits: u32) -> Self {
        Self {
            post_only: bits & Self::POST_ONLY_BIT != 0,
            fill_or_kill: bits & Self::FILL_OR_KILL_BIT != 0,
            immediate_or_cancel: bits & Self::IOC_BIT != 0,
        }
    }
}

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Open,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
    Expired,
}

impl OrderStatus {
    /// Terminal statuses leave the open-orders set.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Open | Self::PartiallyFilled)
    }

    pub fn from_ws_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Self::Pending),
            1 => Ok(Self::Open),
            2 => Ok(Self::PartiallyFilled),
            3 => Ok(Self::Filled),
            4 => Ok(Self::Cancelled),
            5 => Ok(Self::Rejected),
            6 => Ok(Self::Expired),
            other => Err(CodecError::UnknownOrderStatus(other)),
        }
    }
}

/// An order as tracked locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub perpetual: PerpetualId,
    pub account: AccountId,
    pub kind: OrderKind,
    pub price_pns: Pns,
    pub lot_lns: Lns,
    pub leverage_hdths: LeverageHdths,
    pub flags: OrderFlags,
    pub expiry_block: u64,
    pub status: OrderStatus,
}

/// The tuple expected by the on-chain `execOrder` / `execOrders` entry points.
///
/// Every field mirrors a slot of the ABI tuple; the chain client converts this
/// 1:1 into its generated ABI struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDescriptor {
    /// Caller-chosen descriptor id, echoed in events.
    pub descriptor_id: u64,
    pub perpetual: PerpetualId,
    pub kind: OrderKind,
    /// Target order id for cancel/change; zero for opens and closes.
    pub order_id: OrderId,
    pub price_pns: Pns,
    pub lot_lns: Lns,
    pub expiry_block: u64,
    pub flags: OrderFlags,
    /// Maximum matches the engine may perform for this order.
    pub max_matches: u32,
    pub leverage_hdths: LeverageHdths,
    /// Submission is rejected past this block.
    pub last_execution_block: u64,
    /// Collateral amount for IncreaseCollateral; zero otherwise.
    pub amount_cns: Cns,
}

impl OrderDescriptor {
    pub const DEFAULT_MAX_MATCHES: u32 = 16;

    /// Open a position.
    pub fn open(
        descriptor_id: u64,
        perpetual: PerpetualId,
        long: bool,
        price_pns: Pns,
        lot_lns: Lns,
        leverage_hdths: LeverageHdths,
        flags: OrderFlags,
        last_execution_block: u64,
    ) -> Self {
        Self {
            descriptor_id,
            perpetual,
            kind: if long {
                OrderKind::OpenLong
            } else {
                OrderKind::OpenShort
            },
            order_id: 0,
            price_pns,
            lot_lns,
            expiry_block: 0,
            flags,
            max_matches: Self::DEFAULT_MAX_MATCHES,
            leverage_hdths,
            last_execution_block,
            amount_cns: Cns::ZERO,
        }
    }

    /// Close a position. Leverage carries the sentinel value, which the
    /// matching engine ignores.
    pub fn close(
        descriptor_id: u64,
        perpetual: PerpetualId,
        long: bool,
        price_pns: Pns,
        lot_lns: Lns,
        flags: OrderFlags,
        last_execution_block: u64,
    ) -> Self {
        Self {
            descriptor_id,
            perpetual,
            kind: if long {
                OrderKind::CloseLong
            } else {
                OrderKind::CloseShort
            },
            order_id: 0,
            price_pns,
            lot_lns,
            expiry_block: 0,
            flags,
            max_matches: Self::DEFAULT_MAX_MATCHES,
            leverage_hdths: LeverageHdths::SENTINEL,
            last_execution_block,
            amount_cns: Cns::ZERO,
        }
    }

    /// Cancel an existing order.
    pub fn cancel(
        descriptor_id: u64,
        perpetual: PerpetualId,
        order_id: OrderId,
        last_execution_block: u64,
    ) -> Self {
        Self {
            descriptor_id,
            perpetual,
            kind: OrderKind::Cancel,
            order_id,
            price_pns: Pns::ZERO,
            lot_lns: Lns::ZERO,
            expiry_block: 0,
            flags: OrderFlags::GTC,
            max_matches: 0,
            leverage_hdths: LeverageHdths::SENTINEL,
            last_execution_block,
            amount_cns: Cns::ZERO,
        }
    }

    /// Top up position collateral.
    pub fn increase_collateral(
        descriptor_id: u64,
        perpetual: PerpetualId,
        amount_cns: Cns,
        last_execution_block: u64,
    ) -> Self {
        Self {
            descriptor_id,
            perpetual,
            kind: OrderKind::IncreaseCollateral,
            order_id: 0,
            price_pns: Pns::ZERO,
            lot_lns: Lns::ZERO,
            expiry_block: 0,
            flags: OrderFlags::GTC,
            max_matches: 0,
            leverage_hdths: LeverageHdths::SENTINEL,
            last_execution_block,
            amount_cns,
        }
    }

    /// Check the descriptor's protocol constraints.
    ///
    /// Lot must be strictly positive for opens and closes; opens require
    /// leverage of at least 1x (100 hundredths).
    pub fn validate(&self) -> Result<()> {
        if (self.kind.is_open() || self.kind.is_close()) && self.lot_lns.0 <= 0 {
            return Err(CodecError::NonPositiveLot {
                kind: match self.kind {
                    OrderKind::OpenLong => "open_long",
                    OrderKind::OpenShort => "open_short",
                    OrderKind::CloseLong => "close_long",
                    OrderKind::CloseShort => "close_short",
                    _ => unreachable!(),
                },
                lot: self.lot_lns.0,
            });
        }
        if self.kind.is_open() && self.leverage_hdths.0 < 100 {
            return Err(CodecError::LeverageTooLow {
                hdths: self.leverage_hdths.0,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_codes() {
        assert_eq!(OrderKind::OpenLong.contract_code(), 0);
        assert_eq!(OrderKind::OpenShort.contract_code(), 1);
        assert_eq!(OrderKind::CloseLong.contract_code(), 2);
        assert_eq!(OrderKind::CloseShort.contract_code(), 3);
        assert_eq!(OrderKind::Cancel.contract_code(), 4);
        assert_eq!(OrderKind::Change.contract_code(), 5);
        assert_eq!(OrderKind::IncreaseCollateral.contract_code(), 6);
    }

    #[test]
    fn test_ws_codes_differ_from_contract() {
        assert_eq!(OrderKind::OpenLong.ws_code(), Some(1));
        assert_eq!(OrderKind::OpenShort.ws_code(), Some(2));
        assert_eq!(OrderKind::CloseLong.ws_code(), Some(3));
        assert_eq!(OrderKind::CloseShort.ws_code(), Some(4));
        assert_eq!(OrderKind::Cancel.ws_code(), Some(5));
        assert_eq!(OrderKind::Change.ws_code(), None);
    }

    #[test]
    fn test_contract_code_round_trip() {
        for code in 0..=6 {
            let kind = OrderKind::from_contract_code(code).unwrap();
            assert_eq!(kind.contract_code(), code);
        }
        assert!(OrderKind::from_contract_code(7).is_err());
    }

    #[test]
    fn test_flag_bits() {
        assert_eq!(OrderFlags::GTC.bits(), 0);
        assert_eq!(OrderFlags::post_only().bits(), 1);
        assert_eq!(OrderFlags::fill_or_kill().bits(), 2);
        assert_eq!(OrderFlags::immediate_or_cancel().bits(), 4);

        let all = OrderFlags {
            post_only: true,
            fill_or_kill: true,
            immediate_or_cancel: true,
        };
        assert_eq!(all.bits(), 7);
        assert_eq!(OrderFlags::from_bits(7), all);
        assert_eq!(OrderFlags::from_bits(0), OrderFlags::GTC);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!OrderStatus::Open.is_terminal());
        assert!(!OrderStatus::PartiallyFilled.is_terminal());
        assert!(OrderStatus::Pending.is_terminal());
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Rejected.is_terminal());
        assert!(OrderStatus::Expired.is_terminal());
    }

    #[test]
    fn test_open_requires_leverage() {
        let mut desc = OrderDescriptor::open(
            1,
            16,
            true,
            Pns(950000),
            Lns(100000),
            LeverageHdths(1000),
            OrderFlags::GTC,
            50000,
        );
        assert!(desc.validate().is_ok());

        desc.leverage_hdths = LeverageHdths(99);
        assert!(desc.validate().is_err());
    }

    #[test]
    fn test_open_requires_positive_lot() {
        let desc = OrderDescriptor::open(
            1,
            16,
            true,
            Pns(950000),
            Lns(0),
            LeverageHdths(100),
            OrderFlags::GTC,
            50000,
        );
        assert!(desc.validate().is_err());
    }

    #[test]
    fn test_close_uses_sentinel_leverage() {
        let desc = OrderDescriptor::close(
            2,
            16,
            true,
            Pns(950000),
            Lns(100000),
            OrderFlags::immediate_or_cancel(),
            50000,
        );
        assert_eq!(desc.leverage_hdths, LeverageHdths::SENTINEL);
        assert!(desc.validate().is_ok());
    }

    #[test]
    fn test_descriptor_serde_round_trip() {
        let desc = OrderDescriptor::open(
            7,
            32,
            false,
            Pns(31415),
            Lns(2000),
            LeverageHdths(250),
            OrderFlags::post_only(),
            123456,
        );
        let json = serde_json::to_string(&desc).unwrap();
        let back: OrderDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, desc);
    }
}
