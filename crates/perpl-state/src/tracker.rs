//! State tracker consuming trading-socket events.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use perpl_core::{
    Account, Cns, LeverageHdths, Lns, Order, OrderFlags, OrderId, OrderKind, OrderStatus,
    Perpetual, PerpetualId, Pns, Position, PositionKind,
};
use perpl_ws::{OrderUpdate, PositionUpdate, WalletAccount, WsEvent};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Position-record status code for an open position on the wire.
const POSITION_STATUS_OPEN: u8 = 1;

/// Retained trades per perpetual.
const TRADE_BUFFER_CAP: usize = 200;

/// A recent trade kept for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradeRecord {
    pub price_pns: Pns,
    pub lot_lns: Lns,
    /// True when the taker bought.
    pub taker_buy: bool,
    /// Unix milliseconds.
    pub at: u64,
}

/// Immutable snapshot of the tracked state.
#[derive(Debug, Clone)]
pub struct TrackerSnapshot {
    pub account: Option<Account>,
    pub wallet_accounts: Vec<Account>,
    pub positions: Vec<Position>,
    pub orders: Vec<Order>,
    pub head_block: u64,
}

struct Inner {
    account: RwLock<Option<Account>>,
    wallet_accounts: RwLock<Vec<Account>>,
    /// Position id -> position. Entries with status != Open are deleted.
    positions: RwLock<HashMap<u64, Position>>,
    /// Contract order id -> order. Terminal or removed entries are deleted.
    orders: RwLock<HashMap<OrderId, Order>>,
    /// Latest mark price per perpetual, from market-state updates.
    marks: RwLock<HashMap<PerpetualId, Pns>>,
    /// Bounded recent trades per perpetual, newest last.
    trades: RwLock<HashMap<PerpetualId, Vec<TradeRecord>>>,
    head_block: RwLock<u64>,
    /// Last update instant per stream name.
    updated_at: RwLock<HashMap<&'static str, DateTime<Utc>>>,
    auth_expired: RwLock<bool>,
}

/// Tracker over a trading-socket event stream.
#[derive(Clone)]
pub struct StateTracker {
    inner: Arc<Inner>,
}

impl StateTracker {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                account: RwLock::new(None),
                wallet_accounts: RwLock::new(Vec::new()),
                positions: RwLock::new(HashMap::new()),
                orders: RwLock::new(HashMap::new()),
                marks: RwLock::new(HashMap::new()),
                trades: RwLock::new(HashMap::new()),
                head_block: RwLock::new(0),
                updated_at: RwLock::new(HashMap::new()),
                auth_expired: RwLock::new(false),
            }),
        }
    }

    /// Consume an event channel on a background task.
    ///
    /// Call with the receiver handed to the WebSocket client at construction,
    /// before spawning its run loop, so no message can be missed.
    pub fn attach(&self, mut rx: mpsc::Receiver<WsEvent>) -> JoinHandle<()> {
        let tracker = self.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                tracker.apply(event);
            }
            debug!("Tracker event stream ended");
        })
    }

    /// Apply one event.
    pub fn apply(&self, event: WsEvent) {
        let stream = event.stream();
        match event {
            WsEvent::Wallet(snapshot) => {
                let accounts: Vec<Account> =
                    snapshot.accts.iter().map(wallet_account_to_core).collect();
                *self.inner.account.write() = accounts.first().cloned();
                *self.inner.wallet_accounts.write() = accounts;
            }
            WsEvent::Orders { snapshot, orders } => {
                self.apply_orders(snapshot, orders);
            }
            WsEvent::Positions {
                snapshot,
                positions,
            } => {
                self.apply_positions(snapshot, positions);
            }
            WsEvent::MarketState(update) => {
                let mut marks = self.inner.marks.write();
                for perp in update.d {
                    marks.insert(perp.pid, Pns(perp.mark));
                }
            }
            WsEvent::Heartbeat(head) => {
                *self.inner.head_block.write() = head.blk;
            }
            WsEvent::Trades {
                snapshot,
                trades: update,
            } => {
                let mut trades = self.inner.trades.write();
                let buffer = trades.entry(update.pid).or_default();
                if snapshot {
                    buffer.clear();
                }
                for entry in &update.d {
                    buffer.push(TradeRecord {
                        price_pns: Pns(entry.p),
                        lot_lns: Lns(entry.l),
                        taker_buy: entry.bt,
                        at: entry.at,
                    });
                }
                let len = buffer.len();
                if len > TRADE_BUFFER_CAP {
                    buffer.drain(..len - TRADE_BUFFER_CAP);
                }
            }
            WsEvent::Fills(_) | WsEvent::OrderBook { .. } => {
                // Consumed for freshness only; fills mutate positions via
                // their own positions update.
            }
            WsEvent::AuthExpired => {
                warn!("Trading session expired");
                *self.inner.auth_expired.write() = true;
            }
            WsEvent::Fatal => {
                warn!("Trading socket reported fatal");
            }
        }
        self.inner.updated_at.write().insert(stream, Utc::now());
    }

    fn apply_orders(&self, snapshot: bool, updates: Vec<OrderUpdate>) {
        let mut orders = self.inner.orders.write();
        if snapshot {
            orders.clear();
        }
        for update in updates {
            let remove = update.r || order_status(&update).is_terminal();
            if remove {
                orders.remove(&update.oid);
                continue;
            }
            match order_update_to_core(&update) {
                Some(order) => {
                    orders.insert(update.oid, order);
                }
                None => warn!(oid = update.oid, t = update.t, "Unknown order type code"),
            }
        }
    }

    fn apply_positions(&self, snapshot: bool, updates: Vec<PositionUpdate>) {
        let mut positions = self.inner.positions.write();
        if snapshot {
            positions.clear();
        }
        for update in updates {
            if update.st != POSITION_STATUS_OPEN {
                positions.remove(&update.id);
                continue;
            }
            positions.insert(update.id, position_update_to_core(&update));
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            account: self.inner.account.read().clone(),
            wallet_accounts: self.inner.wallet_accounts.read().clone(),
            positions: self.inner.positions.read().values().cloned().collect(),
            orders: self.inner.orders.read().values().cloned().collect(),
            head_block: *self.inner.head_block.read(),
        }
    }

    pub fn account(&self) -> Option<Account> {
        self.inner.account.read().clone()
    }

    pub fn open_orders(&self) -> Vec<Order> {
        self.inner.orders.read().values().cloned().collect()
    }

    pub fn order(&self, id: OrderId) -> Option<Order> {
        self.inner.orders.read().get(&id).cloned()
    }

    pub fn positions(&self) -> Vec<Position> {
        self.inner.positions.read().values().cloned().collect()
    }

    /// The open position on a perpetual with its wire position id, needed to
    /// link close requests on the trading socket.
    pub fn position_with_id(&self, perp: PerpetualId) -> Option<(u64, Position)> {
        self.inner
            .positions
            .read()
            .iter()
            .find(|(_, p)| p.perpetual == perp)
            .map(|(id, p)| (*id, p.clone()))
    }

    pub fn mark(&self, perp: PerpetualId) -> Option<Pns> {
        self.inner.marks.read().get(&perp).copied()
    }

    /// Most recent trades for a perpetual, newest last.
    pub fn recent_trades(&self, perp: PerpetualId, limit: usize) -> Vec<TradeRecord> {
        let trades = self.inner.trades.read();
        let Some(buffer) = trades.get(&perp) else {
            return Vec::new();
        };
        let start = buffer.len().saturating_sub(limit);
        buffer[start..].to_vec()
    }

    pub fn head_block(&self) -> u64 {
        *self.inner.head_block.read()
    }

    pub fn auth_expired(&self) -> bool {
        *self.inner.auth_expired.read()
    }

    /// Balance in CNS.
    pub fn balance_cns(&self) -> Cns {
        self.inner
            .account
            .read()
            .as_ref()
            .map(|a| a.balance_cns)
            .unwrap_or(Cns::ZERO)
    }

    pub fn locked_cns(&self) -> Cns {
        self.inner
            .account
            .read()
            .as_ref()
            .map(|a| a.locked_balance_cns)
            .unwrap_or(Cns::ZERO)
    }

    pub fn available_cns(&self) -> Cns {
        self.balance_cns() - self.locked_cns()
    }

    /// Balance in display units.
    pub fn balance(&self) -> f64 {
        self.balance_cns().to_amount()
    }

    /// Sum of every open position's unrealized PnL.
    pub fn total_unrealized_pnl_cns(&self) -> Cns {
        let positions = self.inner.positions.read();
        Cns(positions.values().map(|p| p.unrealized_pnl_cns.0).sum())
    }

    /// Total equity = balance + total unrealized PnL.
    pub fn total_equity_cns(&self) -> Cns {
        self.balance_cns() + self.total_unrealized_pnl_cns()
    }

    /// Whether any position's margin buffer over the maintenance requirement
    /// has fallen below `buffer_threshold` (as a fraction of position value).
    pub fn at_risk(&self, maintenance_margin: f64, buffer_threshold: f64) -> bool {
        let positions = self.inner.positions.read();
        let marks = self.inner.marks.read();
        positions.values().any(|position| {
            let Some(mark) = marks.get(&position.perpetual) else {
                return false;
            };
            let value = position.value_cns(*mark).0 as f64;
            if value == 0.0 {
                return false;
            }
            let buffer = position.equity_cns().0 as f64 / value - maintenance_margin;
            buffer < buffer_threshold
        })
    }

    /// When the given stream last updated.
    pub fn last_update(&self, stream: &str) -> Option<DateTime<Utc>> {
        self.inner.updated_at.read().get(stream).copied()
    }

    /// Whether the view is stale: no stream has updated within `max_age_ms`.
    /// A stale view should force a contract refresh.
    pub fn is_stale(&self, max_age_ms: i64) -> bool {
        let updated = self.inner.updated_at.read();
        let Some(latest) = updated.values().max() else {
            return true;
        };
        (Utc::now() - *latest).num_milliseconds() > max_age_ms
    }
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn wallet_account_to_core(acct: &WalletAccount) -> Account {
    Account {
        id: acct.id,
        owner: acct.owner.clone(),
        balance_cns: Cns(acct.b),
        locked_balance_cns: Cns(acct.lk),
    }
}

fn order_status(update: &OrderUpdate) -> OrderStatus {
    OrderStatus::from_ws_code(update.st).unwrap_or(OrderStatus::Rejected)
}

fn order_update_to_core(update: &OrderUpdate) -> Option<Order> {
    let kind = OrderKind::from_ws_code(update.t).ok()?;
    Some(Order {
        order_id: update.oid,
        perpetual: update.pid,
        account: update.aid,
        kind,
        price_pns: Pns(update.p),
        lot_lns: Lns(update.l),
        leverage_hdths: LeverageHdths(update.lv),
        flags: OrderFlags::from_bits(update.fl),
        expiry_block: 0,
        status: order_status(update),
    })
}

fn position_update_to_core(update: &PositionUpdate) -> Position {
    Position {
        perpetual: update.pid,
        account: update.aid,
        kind: PositionKind::from_code(update.pt),
        entry_price_pns: Pns(update.ep),
        lot_lns: Lns(update.l),
        deposit_cns: Cns(update.dep),
        realized_pnl_cns: Cns::ZERO,
        unrealized_pnl_cns: Cns(update.pnl),
    }
}

/// Expose per-perpetual display conversion without caching.
pub fn position_display_size(position: &Position, perp: &Perpetual) -> f64 {
    position.lot_lns.to_lot(perp.lot_decimals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use perpl_ws::{MarketStateUpdate, PerpMarketState, WalletSnapshot};

    fn order_update(oid: u64, st: u8, r: bool) -> OrderUpdate {
        OrderUpdate {
            oid,
            pid: 16,
            aid: 100,
            t: 1,
            p: 950000,
            l: 1000,
            lv: 1000,
            fl: 0,
            st,
            r,
        }
    }

    fn position_update(id: u64, st: u8, pnl: i128) -> PositionUpdate {
        PositionUpdate {
            id,
            pid: 16,
            aid: 100,
            pt: 1,
            ep: 950000,
            l: 100000,
            dep: 10_000_000_000,
            pnl,
            st,
        }
    }

    fn wallet_event(balance: i128, locked: i128) -> WsEvent {
        WsEvent::Wallet(WalletSnapshot {
            accts: vec![WalletAccount {
                id: 100,
                owner: "0x01".to_string(),
                b: balance,
                lk: locked,
            }],
        })
    }

    #[test]
    fn test_orders_snapshot_then_update() {
        let tracker = StateTracker::new();
        tracker.apply(WsEvent::Orders {
            snapshot: true,
            orders: vec![order_update(1, 1, false), order_update(2, 1, false)],
        });
        assert_eq!(tracker.open_orders().len(), 2);

        // Terminal status removes the order.
        tracker.apply(WsEvent::Orders {
            snapshot: false,
            orders: vec![order_update(1, 3, false)],
        });
        assert_eq!(tracker.open_orders().len(), 1);
        assert!(tracker.order(1).is_none());

        // Remove flag removes regardless of status.
        tracker.apply(WsEvent::Orders {
            snapshot: false,
            orders: vec![order_update(2, 1, true)],
        });
        assert!(tracker.open_orders().is_empty());
    }

    #[test]
    fn test_partially_filled_stays_open() {
        let tracker = StateTracker::new();
        tracker.apply(WsEvent::Orders {
            snapshot: true,
            orders: vec![order_update(1, 2, false)],
        });
        assert_eq!(tracker.order(1).unwrap().status, OrderStatus::PartiallyFilled);
    }

    #[test]
    fn test_position_closed_is_removed() {
        let tracker = StateTracker::new();
        tracker.apply(WsEvent::Positions {
            snapshot: true,
            positions: vec![position_update(5, 1, 0)],
        });
        assert_eq!(tracker.positions().len(), 1);

        tracker.apply(WsEvent::Positions {
            snapshot: false,
            positions: vec![position_update(5, 3, 0)],
        });
        assert!(tracker.positions().is_empty());
    }

    #[test]
    fn test_derived_balances_and_equity() {
        let tracker = StateTracker::new();
        tracker.apply(wallet_event(50_000_000_000, 10_000_000_000));
        tracker.apply(WsEvent::Positions {
            snapshot: true,
            positions: vec![
                position_update(1, 1, -2_000_000_000),
                position_update(2, 1, 500_000_000),
            ],
        });

        assert_eq!(tracker.balance_cns(), Cns(50_000_000_000));
        assert_eq!(tracker.locked_cns(), Cns(10_000_000_000));
        assert_eq!(tracker.available_cns(), Cns(40_000_000_000));
        assert_eq!(tracker.total_unrealized_pnl_cns(), Cns(-1_500_000_000));
        assert_eq!(tracker.total_equity_cns(), Cns(48_500_000_000));
    }

    #[test]
    fn test_at_risk_threshold() {
        let tracker = StateTracker::new();
        // Position: entry 95000.0, lot 1.0, deposit 10k, pnl -2k
        // -> equity 8k CNS-display.
        tracker.apply(WsEvent::Positions {
            snapshot: true,
            positions: vec![position_update(1, 1, -2_000_000_000)],
        });
        tracker.apply(WsEvent::MarketState(MarketStateUpdate {
            d: vec![PerpMarketState {
                pid: 16,
                mark: 950000,
                oracle: 950000,
                fr: 0,
                oil: 0,
                ois: 0,
                ts: 0,
            }],
        }));

        // value = 95_000 display; equity/value ~ 0.0842; buffer over 5% m
        // is ~3.4%.
        assert!(tracker.at_risk(0.05, 0.05));
        assert!(!tracker.at_risk(0.05, 0.02));
    }

    #[test]
    fn test_freshness() {
        let tracker = StateTracker::new();
        assert!(tracker.is_stale(1_000));
        tracker.apply(WsEvent::Heartbeat(perpl_ws::HeadBlock { blk: 7 }));
        assert!(!tracker.is_stale(60_000));
        assert_eq!(tracker.head_block(), 7);
        assert!(tracker.last_update("heartbeat").is_some());
    }

    #[test]
    fn test_wallet_snapshot_sets_account() {
        let tracker = StateTracker::new();
        tracker.apply(wallet_event(5, 0));
        let account = tracker.account().unwrap();
        assert_eq!(account.id, 100);
        assert_eq!(account.balance_cns, Cns(5));
    }

    #[test]
    fn test_recent_trades_bounded_and_ordered() {
        use perpl_ws::{TradeEntry, TradesUpdate};
        let tracker = StateTracker::new();
        tracker.apply(WsEvent::Trades {
            snapshot: true,
            trades: TradesUpdate {
                pid: 16,
                d: (0..5i64)
                    .map(|i| TradeEntry {
                        p: 950000 + i,
                        l: 10,
                        bt: true,
                        at: i as u64,
                    })
                    .collect(),
            },
        });

        let recent = tracker.recent_trades(16, 3);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[2].price_pns, Pns(950004));
        assert!(tracker.recent_trades(32, 3).is_empty());
    }

    #[test]
    fn test_auth_expired_flag() {
        let tracker = StateTracker::new();
        assert!(!tracker.auth_expired());
        tracker.apply(WsEvent::AuthExpired);
        assert!(tracker.auth_expired());
    }
}
