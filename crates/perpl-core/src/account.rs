//! Account, position, and fill records.

use crate::market::{AccountId, OrderId, PerpetualId};
use crate::units::{position_value_cns, Cns, Lns, Pns};
use serde::{Deserialize, Serialize};

/// An exchange account owned by an on-chain address (the owner or the
/// owner's proxy).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    /// Hex address of the owning contract or EOA.
    pub owner: String,
    pub balance_cns: Cns,
    pub locked_balance_cns: Cns,
}

impl Account {
    /// Available = balance - locked. Locked never exceeds balance.
    pub fn available_cns(&self) -> Cns {
        self.balance_cns - self.locked_balance_cns
    }
}

/// Side of a position.
///
/// A position's sign is determined only by this, never inferred from size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionKind {
    None,
    Long,
    Short,
}

impl PositionKind {
    /// +1 for long, -1 for short, 0 for none.
    pub fn sign(self) -> i64 {
        match self {
            Self::None => 0,
            Self::Long => 1,
            Self::Short => -1,
        }
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            1 => Self::Long,
            2 => Self::Short,
            _ => Self::None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Long => 1,
            Self::Short => 2,
        }
    }
}

/// A position keyed by (perpetual, account).
///
/// Created when an opening order fills; destroyed when the lot returns to
/// zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub perpetual: PerpetualId,
    pub account: AccountId,
    pub kind: PositionKind,
    pub entry_price_pns: Pns,
    pub lot_lns: Lns,
    pub deposit_cns: Cns,
    pub realized_pnl_cns: Cns,
    pub unrealized_pnl_cns: Cns,
}

impl Position {
    /// Position equity under the contract's solvency rule:
    /// deposit plus unrealized PnL.
    pub fn equity_cns(&self) -> Cns {
        self.deposit_cns + self.unrealized_pnl_cns
    }

    /// Notional position value at a mark price.
    pub fn value_cns(&self, mark_pns: Pns) -> Cns {
        position_value_cns(mark_pns, self.lot_lns).abs()
    }

    /// Whether equity falls below the maintenance requirement at `mark_pns`.
    pub fn is_liquidatable(&self, mark_pns: Pns, maintenance_margin: f64) -> bool {
        if self.kind == PositionKind::None || self.lot_lns.is_zero() {
            return false;
        }
        let requirement = (self.value_cns(mark_pns).0 as f64 * maintenance_margin) as i128;
        self.equity_cns().0 < requirement
    }
}

/// Liquidity side of a fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiquiditySide {
    Maker,
    Taker,
}

/// An immutable fill event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fill {
    pub order_id: OrderId,
    pub perpetual: PerpetualId,
    pub account: AccountId,
    pub side: LiquiditySide,
    pub price_pns: Pns,
    pub lot_lns: Lns,
    pub fee_cns: Cns,
    pub block: u64,
    pub log_index: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_position() -> Position {
        Position {
            perpetual: 16,
            account: 100,
            kind: PositionKind::Long,
            entry_price_pns: Pns(1_000_000),
            lot_lns: Lns(100_000),
            deposit_cns: Cns(10_000_000_000),
            realized_pnl_cns: Cns::ZERO,
            unrealized_pnl_cns: Cns(-2_000_000_000),
        }
    }

    #[test]
    fn test_available_balance() {
        let account = Account {
            id: 100,
            owner: "0x0000000000000000000000000000000000000001".to_string(),
            balance_cns: Cns(5_000_000),
            locked_balance_cns: Cns(1_500_000),
        };
        assert_eq!(account.available_cns(), Cns(3_500_000));
    }

    #[test]
    fn test_position_equity() {
        let pos = long_position();
        assert_eq!(pos.equity_cns(), Cns(8_000_000_000));
    }

    #[test]
    fn test_position_sign_from_kind_only() {
        let mut pos = long_position();
        assert_eq!(pos.kind.sign(), 1);
        pos.kind = PositionKind::Short;
        // Sign flips with the kind even though lot is unchanged.
        assert_eq!(pos.kind.sign(), -1);
    }

    #[test]
    fn test_liquidatable_threshold() {
        let pos = long_position();
        // value at mark 100000.0 (PNS 1_000_000, lot 1.0) = 100_000_000_000 CNS.
        // maintenance 5% -> 5_000_000_000; equity 8_000_000_000 -> safe.
        assert!(!pos.is_liquidatable(Pns(1_000_000), 0.05));
        // maintenance 10% -> 10_000_000_000 -> liquidatable.
        assert!(pos.is_liquidatable(Pns(1_000_000), 0.10));
    }

    #[test]
    fn test_position_kind_codes() {
        assert_eq!(PositionKind::from_code(0), PositionKind::None);
        assert_eq!(PositionKind::from_code(1), PositionKind::Long);
        assert_eq!(PositionKind::from_code(2), PositionKind::Short);
        for kind in [PositionKind::None, PositionKind::Long, PositionKind::Short] {
            assert_eq!(PositionKind::from_code(kind.code()), kind);
        }
    }
}
