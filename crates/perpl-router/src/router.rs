//! The hybrid router proper.

use crate::error::RouterResult;
use crate::policy::{route, Operation, Path};
use alloy::primitives::B256;
use perpl_chain::{ChainClient, PositionView};
use perpl_core::{
    AccountId, Cns, LeverageHdths, Lns, Order, OrderDescriptor, OrderFlags, OrderId, Perpetual,
    PerpetualId, Pns, Position, PositionKind,
};
use perpl_rest::{FillRecord, OrderRecord, PositionEvent, RestClient, RestError};
use perpl_ws::{OrderSubmission, WsClient};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// How a write was delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteReceipt {
    /// Submitted over the trading socket; `rq` correlates the ack.
    Ws { rq: u64 },
    /// Executed on chain.
    Chain { tx: B256 },
}

/// Router over the REST, WebSocket, and contract clients.
pub struct HybridRouter {
    rest: Arc<RestClient>,
    chain: Arc<ChainClient>,
    /// Trading socket, when one is attached. Writes fall back to the
    /// contract whenever it is missing or unauthenticated.
    trading_ws: Option<Arc<WsClient>>,
    use_api: bool,
    next_descriptor_id: AtomicU64,
}

impl HybridRouter {
    pub fn new(
        rest: Arc<RestClient>,
        chain: Arc<ChainClient>,
        trading_ws: Option<Arc<WsClient>>,
        use_api: bool,
    ) -> Self {
        Self {
            rest,
            chain,
            trading_ws,
            use_api,
            next_descriptor_id: AtomicU64::new(1),
        }
    }

    fn descriptor_id(&self) -> u64 {
        self.next_descriptor_id.fetch_add(1, Ordering::AcqRel)
    }

    /// Trading socket usable for writes right now.
    ///
    /// Every write delivery (open, close, cancel) resolves through this,
    /// matching the policy table: socket first, contract otherwise.
    fn ws_for_writes(&self) -> Option<&Arc<WsClient>> {
        debug_assert_eq!(route(Operation::SubmitOrder), Path::WsThenContract);
        self.trading_ws.as_ref().filter(|ws| ws.is_authenticated())
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Open a position. Prefers the trading socket; falls back to the
    /// contract transparently when trading authentication is unavailable.
    #[allow(clippy::too_many_arguments)]
    pub async fn open_position(
        &self,
        perp: PerpetualId,
        account: AccountId,
        long: bool,
        price_pns: Option<Pns>,
        lot_lns: Lns,
        leverage: LeverageHdths,
        last_execution_block: u64,
    ) -> RouterResult<WriteReceipt> {
        if let Some(ws) = self.ws_for_writes() {
            let mut submission = OrderSubmission::open_long(
                perp,
                account,
                lot_lns.0,
                price_pns.map(|p| p.0),
                leverage.0,
                last_execution_block,
            );
            if !long {
                submission.kind = perpl_core::OrderKind::OpenShort;
            }
            match ws.submit_order(submission) {
                Ok(rq) => return Ok(WriteReceipt::Ws { rq }),
                Err(e) => warn!(?e, "Trading socket submit failed, using contract path"),
            }
        }

        let desc = OrderDescriptor::open(
            self.descriptor_id(),
            perp,
            long,
            price_pns.unwrap_or(Pns::ZERO),
            lot_lns,
            leverage,
            if price_pns.is_some() {
                OrderFlags::GTC
            } else {
                OrderFlags::immediate_or_cancel()
            },
            last_execution_block,
        );
        let tx = self.chain.exec_order(&desc).await?;
        Ok(WriteReceipt::Chain { tx })
    }

    /// Close (part of) a position.
    ///
    /// The socket path needs the linked position id; without one the write
    /// goes straight to the contract, which resolves the position by
    /// (perpetual, account) itself.
    #[allow(clippy::too_many_arguments)]
    pub async fn close_position(
        &self,
        perp: PerpetualId,
        account: AccountId,
        long: bool,
        price_pns: Option<Pns>,
        lot_lns: Lns,
        linked_position: Option<u64>,
        last_execution_block: u64,
    ) -> RouterResult<WriteReceipt> {
        if let (Some(ws), Some(linked)) = (self.ws_for_writes(), linked_position) {
            let submission = OrderSubmission::close(
                perp,
                account,
                long,
                lot_lns.0,
                price_pns.map(|p| p.0),
                linked,
                last_execution_block,
            );
            match ws.submit_order(submission) {
                Ok(rq) => return Ok(WriteReceipt::Ws { rq }),
                Err(e) => warn!(?e, "Trading socket close failed, using contract path"),
            }
        }

        let desc = OrderDescriptor::close(
            self.descriptor_id(),
            perp,
            long,
            price_pns.unwrap_or(Pns::ZERO),
            lot_lns,
            if price_pns.is_some() {
                OrderFlags::GTC
            } else {
                OrderFlags::immediate_or_cancel()
            },
            last_execution_block,
        );
        let tx = self.chain.exec_order(&desc).await?;
        Ok(WriteReceipt::Chain { tx })
    }

    /// Cancel an order by its contract order id.
    pub async fn cancel_order(
        &self,
        perp: PerpetualId,
        account: AccountId,
        order_id: OrderId,
        last_execution_block: u64,
    ) -> RouterResult<WriteReceipt> {
        if let Some(ws) = self.ws_for_writes() {
            let submission =
                OrderSubmission::cancel(perp, account, order_id, last_execution_block);
            match ws.submit_order(submission) {
                Ok(rq) => return Ok(WriteReceipt::Ws { rq }),
                Err(e) => warn!(?e, "Trading socket cancel failed, using contract path"),
            }
        }

        let desc =
            OrderDescriptor::cancel(self.descriptor_id(), perp, order_id, last_execution_block);
        let tx = self.chain.exec_order(&desc).await?;
        Ok(WriteReceipt::Chain { tx })
    }

    /// Top up position collateral (contract-only operation).
    pub async fn increase_position_collateral(
        &self,
        perp: PerpetualId,
        amount: Cns,
    ) -> RouterResult<B256> {
        Ok(self.chain.increase_position_collateral(perp, amount).await?)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Open orders, contract only: ids must be authoritative, so the API is
    /// never consulted here regardless of `use_api`.
    pub async fn get_open_orders(
        &self,
        perp: PerpetualId,
        account: AccountId,
    ) -> RouterResult<Vec<Order>> {
        debug_assert_eq!(route(Operation::OpenOrders), Path::ContractOnly);
        Ok(self.chain.get_open_orders(perp, account).await?)
    }

    /// Positions across perpetuals. API (one batched call) when an
    /// authenticated session exists and API reads are enabled; contract
    /// otherwise, and as fallback on API failure. Contract order ids are
    /// never sourced from the API view.
    pub async fn get_positions(
        &self,
        account: AccountId,
        perps: &[PerpetualId],
    ) -> RouterResult<Vec<Position>> {
        if self.use_api && self.rest.is_authenticated() {
            match self.positions_via_api(account, perps).await {
                Ok(positions) => return Ok(positions),
                Err(e) => warn!(?e, "API positions read failed, falling back to contract"),
            }
        }
        self.positions_via_contract(account, perps).await
    }

    async fn positions_via_api(
        &self,
        account: AccountId,
        perps: &[PerpetualId],
    ) -> Result<Vec<Position>, RestError> {
        let page = self
            .rest
            .get_position_history((perps.len() as u32).max(16) * 4, None)
            .await?;
        Ok(positions_from_events(account, perps, &page.d))
    }

    async fn positions_via_contract(
        &self,
        account: AccountId,
        perps: &[PerpetualId],
    ) -> RouterResult<Vec<Position>> {
        let mut positions = Vec::new();
        for &perp in perps {
            let view: PositionView = self.chain.get_position(perp, account).await?;
            if view.position.kind != PositionKind::None && !view.position.lot_lns.is_zero() {
                positions.push(view.position);
            }
        }
        Ok(positions)
    }

    /// History reads are API-only; the contract offers no history query.
    pub async fn get_fill_history(&self, max_pages: Option<u32>) -> RouterResult<Vec<FillRecord>> {
        Ok(self.rest.get_fills_all(max_pages).await?)
    }

    pub async fn get_order_history(
        &self,
        max_pages: Option<u32>,
    ) -> RouterResult<Vec<OrderRecord>> {
        Ok(self.rest.get_order_history_all(max_pages).await?)
    }

    /// Perpetual info is canonical on chain.
    pub async fn get_perpetual_info(&self, perp: PerpetualId) -> RouterResult<Perpetual> {
        Ok(self.chain.get_perpetual_info(perp).await?)
    }

    /// Mark and oracle for liquidation math, contract only.
    pub async fn get_mark_oracle(&self, perp: PerpetualId) -> RouterResult<(Pns, Pns)> {
        let info = self.chain.get_perpetual_info(perp).await?;
        Ok((info.mark_pns, info.oracle_pns))
    }

    pub async fn get_fees(&self) -> RouterResult<(u32, u32)> {
        let taker = self.chain.get_taker_fee().await?;
        let maker = self.chain.get_maker_fee().await?;
        Ok((taker, maker))
    }

    pub fn chain(&self) -> &Arc<ChainClient> {
        &self.chain
    }

    pub fn rest(&self) -> &Arc<RestClient> {
        &self.rest
    }
}

/// Reduce position-history events to the latest live position per requested
/// perpetual. Sign and scaling are carried through exactly; no order ids are
/// involved in this view.
pub fn positions_from_events(
    account: AccountId,
    perps: &[PerpetualId],
    events: &[PositionEvent],
) -> Vec<Position> {
    let mut latest: HashMap<PerpetualId, &PositionEvent> = HashMap::new();
    for event in events {
        if event.account_id != account || !perps.contains(&event.market_id) {
            continue;
        }
        let entry = latest.entry(event.market_id).or_insert(event);
        if event.at >= entry.at {
            *entry = event;
        }
    }

    let mut positions: Vec<Position> = latest
        .into_values()
        .filter(|e| e.position_type != 0 && e.lot_lns != 0)
        .map(|e| Position {
            perpetual: e.market_id,
            account: e.account_id,
            kind: PositionKind::from_code(e.position_type),
            entry_price_pns: Pns(e.entry_price_pns),
            lot_lns: Lns(e.lot_lns),
            deposit_cns: Cns(e.deposit_cns as i128),
            realized_pnl_cns: Cns::ZERO,
            unrealized_pnl_cns: Cns(e.pnl_cns as i128),
        })
        .collect();
    positions.sort_by_key(|p| p.perpetual);
    positions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(market: u64, account: u64, pt: u8, lot: i64, at: u64) -> PositionEvent {
        PositionEvent {
            market_id: market,
            account_id: account,
            position_type: pt,
            entry_price_pns: 950_000,
            lot_lns: lot,
            deposit_cns: 1_000_000,
            pnl_cns: -50_000,
            at,
        }
    }

    #[test]
    fn test_latest_event_wins_per_perpetual() {
        let events = vec![
            event(16, 100, 1, 1000, 10),
            event(16, 100, 1, 500, 20),
            event(32, 100, 2, 700, 5),
        ];
        let positions = positions_from_events(100, &[16, 32], &events);
        assert_eq!(positions.len(), 2);
        assert_eq!(positions[0].perpetual, 16);
        assert_eq!(positions[0].lot_lns, Lns(500));
        assert_eq!(positions[1].kind, PositionKind::Short);
    }

    #[test]
    fn test_closed_positions_excluded() {
        let events = vec![event(16, 100, 1, 1000, 10), event(16, 100, 0, 0, 20)];
        let positions = positions_from_events(100, &[16], &events);
        assert!(positions.is_empty());
    }

    #[test]
    fn test_other_accounts_and_markets_filtered() {
        let events = vec![
            event(16, 999, 1, 1000, 10),
            event(48, 100, 1, 1000, 10),
        ];
        let positions = positions_from_events(100, &[16, 32], &events);
        assert!(positions.is_empty());
    }

    #[test]
    fn test_sign_and_scaling_preserved() {
        let events = vec![event(16, 100, 2, 12345, 1)];
        let positions = positions_from_events(100, &[16], &events);
        assert_eq!(positions[0].kind, PositionKind::Short);
        assert_eq!(positions[0].lot_lns, Lns(12345));
        assert_eq!(positions[0].entry_price_pns, Pns(950_000));
        assert_eq!(positions[0].unrealized_pnl_cns, Cns(-50_000));
    }
}
