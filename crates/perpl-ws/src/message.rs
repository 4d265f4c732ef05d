//! WebSocket frame types and the `mt` dispatch table.
//!
//! Every frame is a JSON object carrying an integer `mt` discriminator.
//! Inbound frames are decoded by [`decode_frame`], a single routing function
//! over the closed set of known message types; an unknown `mt` is silently
//! dropped for forward compatibility.

use crate::error::{WsError, WsResult};
use perpl_core::{AccountId, OrderFlags, OrderKind, PerpetualId};
use serde::{Deserialize, Serialize};

// ============================================================================
// Message type codes
// ============================================================================

pub mod mt {
    pub const PING: u32 = 1;
    pub const PONG: u32 = 2;
    pub const AUTH: u32 = 4;
    pub const SUBSCRIBE: u32 = 5;
    pub const SUBSCRIPTION_ACK: u32 = 6;
    pub const MARKET_STATE: u32 = 9;
    pub const BOOK_SNAPSHOT: u32 = 15;
    pub const BOOK_UPDATE: u32 = 16;
    pub const TRADES_SNAPSHOT: u32 = 17;
    pub const TRADES_UPDATE: u32 = 18;
    pub const WALLET_SNAPSHOT: u32 = 19;
    pub const ORDER_REQUEST: u32 = 22;
    pub const ORDERS_SNAPSHOT: u32 = 23;
    pub const ORDERS_UPDATE: u32 = 24;
    pub const FILLS_UPDATE: u32 = 25;
    pub const POSITIONS_SNAPSHOT: u32 = 26;
    pub const POSITIONS_UPDATE: u32 = 27;
    pub const HEARTBEAT: u32 = 100;
}

// ============================================================================
// Outbound requests
// ============================================================================

/// Liveness ping: `{mt: 1, t: now_ms}`.
#[derive(Debug, Clone, Serialize)]
pub struct PingRequest {
    pub mt: u32,
    pub t: u64,
}

impl PingRequest {
    pub fn now() -> Self {
        Self {
            mt: mt::PING,
            t: chrono::Utc::now().timestamp_millis() as u64,
        }
    }
}

/// Authentication message for the trading socket:
/// `{mt: 4, chain_id, nonce, ses}`.
#[derive(Debug, Clone, Serialize)]
pub struct AuthRequest {
    pub mt: u32,
    pub chain_id: u64,
    /// Session nonce from the REST sign-in.
    pub nonce: String,
    /// Client-chosen session uuid.
    pub ses: String,
}

impl AuthRequest {
    pub fn new(chain_id: u64, nonce: String) -> Self {
        Self {
            mt: mt::AUTH,
            chain_id,
            nonce,
            ses: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// Subscription request: `{mt: 5, subs: [{stream, subscribe}]}`.
///
/// Idempotent; a resubscription after reconnect is one batched request.
#[derive(Debug, Clone, Serialize)]
pub struct SubscribeRequest {
    pub mt: u32,
    pub subs: Vec<SubscribeEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscribeEntry {
    pub stream: String,
    pub subscribe: bool,
}

impl SubscribeRequest {
    pub fn subscribe(streams: impl IntoIterator<Item = String>) -> Self {
        Self {
            mt: mt::SUBSCRIBE,
            subs: streams
                .into_iter()
                .map(|stream| SubscribeEntry {
                    stream,
                    subscribe: true,
                })
                .collect(),
        }
    }
}

/// Order submission frame: `{mt: 22, ...}`.
///
/// Type codes are the WebSocket's own (OpenLong=1 ... Cancel=5), not the
/// contract's. `rq` is a strictly increasing per-client request id chosen by
/// the caller for ack correlation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub mt: u32,
    pub rq: u64,
    pub pid: PerpetualId,
    pub aid: AccountId,
    /// WebSocket order-type code.
    pub t: u8,
    /// Price in PNS; omitted for market orders.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p: Option<i64>,
    /// Lot in LNS.
    pub l: i64,
    /// Leverage hundredths.
    pub lv: u32,
    /// ORed execution flags.
    pub fl: u32,
    /// Linked position id; required for closes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lp: Option<u64>,
    /// Last-execution-block bound; required on every request.
    pub lb: u64,
    /// Target order id for cancels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oid: Option<u64>,
}

/// Order intent before a request id is assigned.
#[derive(Debug, Clone)]
pub struct OrderSubmission {
    pub perpetual: PerpetualId,
    pub account: AccountId,
    pub kind: OrderKind,
    /// None submits a market order (IOC at any price).
    pub price_pns: Option<i64>,
    pub lot_lns: i64,
    pub leverage_hdths: u32,
    pub flags: OrderFlags,
    /// Linked position id; required for closes.
    pub linked_position: Option<u64>,
    pub last_execution_block: u64,
    /// Target order id for cancels.
    pub order_id: Option<u64>,
}

impl OrderSubmission {
    pub fn open_long(
        perpetual: PerpetualId,
        account: AccountId,
        lot_lns: i64,
        price_pns: Option<i64>,
        leverage_hdths: u32,
        last_execution_block: u64,
    ) -> Self {
        Self {
            perpetual,
            account,
            kind: OrderKind::OpenLong,
            price_pns,
            lot_lns,
            leverage_hdths,
            flags: OrderFlags::GTC,
            linked_position: None,
            last_execution_block,
            order_id: None,
        }
    }

    pub fn open_short(
        perpetual: PerpetualId,
        account: AccountId,
        lot_lns: i64,
        price_pns: Option<i64>,
        leverage_hdths: u32,
        last_execution_block: u64,
    ) -> Self {
        Self {
            kind: OrderKind::OpenShort,
            ..Self::open_long(
                perpetual,
                account,
                lot_lns,
                price_pns,
                leverage_hdths,
                last_execution_block,
            )
        }
    }

    pub fn close(
        perpetual: PerpetualId,
        account: AccountId,
        long: bool,
        lot_lns: i64,
        price_pns: Option<i64>,
        linked_position: u64,
        last_execution_block: u64,
    ) -> Self {
        Self {
            perpetual,
            account,
            kind: if long {
                OrderKind::CloseLong
            } else {
                OrderKind::CloseShort
            },
            price_pns,
            lot_lns,
            leverage_hdths: 100,
            flags: OrderFlags::GTC,
            linked_position: Some(linked_position),
            last_execution_block,
            order_id: None,
        }
    }

    pub fn cancel(
        perpetual: PerpetualId,
        account: AccountId,
        order_id: u64,
        last_execution_block: u64,
    ) -> Self {
        Self {
            perpetual,
            account,
            kind: OrderKind::Cancel,
            price_pns: None,
            lot_lns: 0,
            leverage_hdths: 100,
            flags: OrderFlags::GTC,
            linked_position: None,
            last_execution_block,
            order_id: Some(order_id),
        }
    }

    /// Build the wire frame for this submission with an assigned `rq`.
    ///
    /// A missing price makes the request a market order: the price field is
    /// omitted and the immediate-or-cancel flag is set. Explicit flags are
    /// kept otherwise.
    pub fn into_request(self, rq: u64) -> WsResult<OrderRequest> {
        let code = self
            .kind
            .ws_code()
            .ok_or(WsError::TradingUnavailable("order type not supported"))?;

        if self.kind.is_close() && self.linked_position.is_none() {
            return Err(WsError::TradingUnavailable(
                "close requires a linked position id",
            ));
        }

        let flags = if self.price_pns.is_none() && !matches!(self.kind, OrderKind::Cancel) {
            OrderFlags::immediate_or_cancel()
        } else {
            self.flags
        };

        Ok(OrderRequest {
            mt: mt::ORDER_REQUEST,
            rq,
            pid: self.perpetual,
            aid: self.account,
            t: code,
            p: self.price_pns,
            l: self.lot_lns,
            lv: self.leverage_hdths,
            fl: flags.bits(),
            lp: self.linked_position,
            lb: self.last_execution_block,
            oid: self.order_id,
        })
    }
}

// ============================================================================
// Inbound payloads
// ============================================================================

/// Subscription confirmation entry: stream name with its server-assigned id.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubAck {
    pub stream: String,
    pub sid: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct SubAckFrame {
    subs: Vec<SubAck>,
}

/// Per-perpetual market state (mark, oracle, funding, open interest).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PerpMarketState {
    pub pid: PerpetualId,
    /// Mark price, PNS.
    pub mark: i64,
    /// Oracle price, PNS.
    pub oracle: i64,
    /// Funding rate, per-100k.
    pub fr: i64,
    /// Open interest long, LNS.
    pub oil: i64,
    /// Open interest short, LNS.
    pub ois: i64,
    /// Unix seconds of the update.
    pub ts: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MarketStateUpdate {
    pub d: Vec<PerpMarketState>,
}

/// One L2 book level: offset (ONS) and resting volume (LNS).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct BookLevel(pub i64, pub i64);

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BookUpdate {
    pub pid: PerpetualId,
    /// Bid levels, best first.
    #[serde(default)]
    pub b: Vec<BookLevel>,
    /// Ask levels, best first.
    #[serde(default)]
    pub a: Vec<BookLevel>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TradeEntry {
    /// Price, PNS.
    pub p: i64,
    /// Lot, LNS.
    pub l: i64,
    /// True when the taker bought.
    pub bt: bool,
    /// Unix milliseconds.
    pub at: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TradesUpdate {
    pub pid: PerpetualId,
    pub d: Vec<TradeEntry>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WalletAccount {
    pub id: AccountId,
    pub owner: String,
    /// Balance, CNS.
    pub b: i128,
    /// Locked balance, CNS.
    pub lk: i128,
}

/// Wallet snapshot (`mt: 19`); receipt confirms trading authentication.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WalletSnapshot {
    pub accts: Vec<WalletAccount>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OrderUpdate {
    /// Contract order id.
    pub oid: u64,
    pub pid: PerpetualId,
    pub aid: AccountId,
    /// WebSocket order-type code.
    pub t: u8,
    pub p: i64,
    pub l: i64,
    pub lv: u32,
    pub fl: u32,
    /// Status code (1 = open, 2 = partially filled, ...).
    pub st: u8,
    /// Remove flag: the order leaves the open set regardless of status.
    #[serde(default)]
    pub r: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct OrdersFrame {
    d: Vec<OrderUpdate>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FillUpdate {
    pub oid: u64,
    pub pid: PerpetualId,
    pub aid: AccountId,
    /// True when this side provided liquidity.
    pub mk: bool,
    pub p: i64,
    pub l: i64,
    /// Fee, CNS.
    pub fee: i64,
    pub blk: u64,
    pub lg: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct FillsFrame {
    d: Vec<FillUpdate>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PositionUpdate {
    /// Position id.
    pub id: u64,
    pub pid: PerpetualId,
    pub aid: AccountId,
    /// Position type code (0 none, 1 long, 2 short).
    pub pt: u8,
    /// Entry price, PNS.
    pub ep: i64,
    pub l: i64,
    /// Deposit, CNS.
    pub dep: i128,
    /// Unrealized PnL, CNS.
    pub pnl: i128,
    /// Status code (1 = open).
    pub st: u8,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct PositionsFrame {
    d: Vec<PositionUpdate>,
}

/// Head-block heartbeat (`mt: 100`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct HeadBlock {
    pub blk: u64,
}

// ============================================================================
// Dispatch
// ============================================================================

/// Decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Pong,
    SubscriptionAck(Vec<SubAck>),
    MarketState(MarketStateUpdate),
    BookSnapshot(BookUpdate),
    BookUpdate(BookUpdate),
    TradesSnapshot(TradesUpdate),
    TradesUpdate(TradesUpdate),
    WalletSnapshot(WalletSnapshot),
    OrdersSnapshot(Vec<OrderUpdate>),
    OrdersUpdate(Vec<OrderUpdate>),
    FillsUpdate(Vec<FillUpdate>),
    PositionsSnapshot(Vec<PositionUpdate>),
    PositionsUpdate(Vec<PositionUpdate>),
    Heartbeat(HeadBlock),
}

/// Decode one frame.
///
/// Returns `Ok(None)` for an unknown `mt` (dropped for forward
/// compatibility). A frame without an `mt`, or with a payload that does not
/// match the documented shape, is malformed.
pub fn decode_frame(text: &str) -> WsResult<Option<Inbound>> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| WsError::Malformed(e.to_string()))?;

    let mt = value
        .get("mt")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| WsError::Malformed("missing mt".to_string()))? as u32;

    fn payload<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> WsResult<T> {
        serde_json::from_value(value).map_err(|e| WsError::Malformed(e.to_string()))
    }

    let inbound = match mt {
        mt::PONG => Inbound::Pong,
        mt::SUBSCRIPTION_ACK => {
            let frame: SubAckFrame = payload(value)?;
            Inbound::SubscriptionAck(frame.subs)
        }
        mt::MARKET_STATE => Inbound::MarketState(payload(value)?),
        mt::BOOK_SNAPSHOT => Inbound::BookSnapshot(payload(value)?),
        mt::BOOK_UPDATE => Inbound::BookUpdate(payload(value)?),
        mt::TRADES_SNAPSHOT => Inbound::TradesSnapshot(payload(value)?),
        mt::TRADES_UPDATE => Inbound::TradesUpdate(payload(value)?),
        mt::WALLET_SNAPSHOT => Inbound::WalletSnapshot(payload(value)?),
        mt::ORDERS_SNAPSHOT => {
            let frame: OrdersFrame = payload(value)?;
            Inbound::OrdersSnapshot(frame.d)
        }
        mt::ORDERS_UPDATE => {
            let frame: OrdersFrame = payload(value)?;
            Inbound::OrdersUpdate(frame.d)
        }
        mt::FILLS_UPDATE => {
            let frame: FillsFrame = payload(value)?;
            Inbound::FillsUpdate(frame.d)
        }
        mt::POSITIONS_SNAPSHOT => {
            let frame: PositionsFrame = payload(value)?;
            Inbound::PositionsSnapshot(frame.d)
        }
        mt::POSITIONS_UPDATE => {
            let frame: PositionsFrame = payload(value)?;
            Inbound::PositionsUpdate(frame.d)
        }
        mt::HEARTBEAT => Inbound::Heartbeat(payload(value)?),
        _ => return Ok(None),
    };

    Ok(Some(inbound))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_order_sets_ioc() {
        // openLong(marketId=16, accountId=100, size=1000, price=None,
        // leverage=1000, lastBlock=50000)
        let req = OrderSubmission::open_long(16, 100, 1000, None, 1000, 50000)
            .into_request(1)
            .unwrap();
        assert_eq!(req.mt, 22);
        assert_eq!(req.t, 1);
        assert_eq!(req.fl, 4);
        assert_eq!(req.p, None);
        assert_eq!(req.lb, 50000);

        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("p").is_none(), "market order must omit p");
    }

    #[test]
    fn test_limit_order_keeps_gtc() {
        let req = OrderSubmission::open_long(16, 100, 1000, Some(50000), 1000, 50000)
            .into_request(2)
            .unwrap();
        assert_eq!(req.t, 1);
        assert_eq!(req.fl, 0);
        assert_eq!(req.p, Some(50000));
    }

    #[test]
    fn test_close_requires_linked_position() {
        let mut sub = OrderSubmission::close(16, 100, true, 1000, None, 7, 50000);
        assert_eq!(sub.clone().into_request(3).unwrap().lp, Some(7));
        assert_eq!(sub.clone().into_request(3).unwrap().t, 3);

        sub.linked_position = None;
        assert!(sub.into_request(3).is_err());
    }

    #[test]
    fn test_cancel_ws_code() {
        let req = OrderSubmission::cancel(16, 100, 42, 50000)
            .into_request(4)
            .unwrap();
        assert_eq!(req.t, 5);
        assert_eq!(req.oid, Some(42));
    }

    #[test]
    fn test_decode_unknown_mt_dropped() {
        assert_eq!(decode_frame(r#"{"mt": 999}"#).unwrap(), None);
    }

    #[test]
    fn test_decode_missing_mt_is_malformed() {
        assert!(matches!(
            decode_frame(r#"{"subs": []}"#),
            Err(WsError::Malformed(_))
        ));
        assert!(matches!(
            decode_frame("not json"),
            Err(WsError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_each_known_mt_emits_one_message() {
        let frames: Vec<(u32, String)> = vec![
            (mt::PONG, r#"{"mt":2}"#.to_string()),
            (
                mt::SUBSCRIPTION_ACK,
                r#"{"mt":6,"subs":[{"stream":"order-book@16","sid":9}]}"#.to_string(),
            ),
            (
                mt::MARKET_STATE,
                r#"{"mt":9,"d":[{"pid":16,"mark":950000,"oracle":949900,"fr":125,"oil":100,"ois":90,"ts":1700000000}]}"#
                    .to_string(),
            ),
            (
                mt::BOOK_SNAPSHOT,
                r#"{"mt":15,"pid":16,"b":[[49000,10000]],"a":[[51000,10000]]}"#.to_string(),
            ),
            (
                mt::BOOK_UPDATE,
                r#"{"mt":16,"pid":16,"b":[[48000,5000]]}"#.to_string(),
            ),
            (
                mt::TRADES_SNAPSHOT,
                r#"{"mt":17,"pid":16,"d":[{"p":950000,"l":100,"bt":true,"at":1700000000000}]}"#
                    .to_string(),
            ),
            (
                mt::TRADES_UPDATE,
                r#"{"mt":18,"pid":16,"d":[{"p":950100,"l":50,"bt":false,"at":1700000001000}]}"#
                    .to_string(),
            ),
            (
                mt::WALLET_SNAPSHOT,
                r#"{"mt":19,"accts":[{"id":100,"owner":"0x01","b":1000000,"lk":0}]}"#.to_string(),
            ),
            (
                mt::ORDERS_SNAPSHOT,
                r#"{"mt":23,"d":[{"oid":1,"pid":16,"aid":100,"t":1,"p":950000,"l":100,"lv":1000,"fl":0,"st":1}]}"#
                    .to_string(),
            ),
            (
                mt::ORDERS_UPDATE,
                r#"{"mt":24,"d":[{"oid":1,"pid":16,"aid":100,"t":1,"p":950000,"l":100,"lv":1000,"fl":0,"st":3,"r":true}]}"#
                    .to_string(),
            ),
            (
                mt::FILLS_UPDATE,
                r#"{"mt":25,"d":[{"oid":1,"pid":16,"aid":100,"mk":false,"p":950000,"l":100,"fee":475,"blk":50001,"lg":3}]}"#
                    .to_string(),
            ),
            (
                mt::POSITIONS_SNAPSHOT,
                r#"{"mt":26,"d":[{"id":5,"pid":16,"aid":100,"pt":1,"ep":950000,"l":100,"dep":1000000,"pnl":0,"st":1}]}"#
                    .to_string(),
            ),
            (
                mt::POSITIONS_UPDATE,
                r#"{"mt":27,"d":[{"id":5,"pid":16,"aid":100,"pt":1,"ep":950000,"l":0,"dep":0,"pnl":0,"st":3}]}"#
                    .to_string(),
            ),
            (mt::HEARTBEAT, r#"{"mt":100,"blk":50002}"#.to_string()),
        ];

        for (code, frame) in frames {
            let decoded = decode_frame(&frame)
                .unwrap_or_else(|e| panic!("mt {code} failed: {e}"))
                .unwrap_or_else(|| panic!("mt {code} was dropped"));
            // Spot-check the payload routing for a few discriminants.
            match (code, &decoded) {
                (2, Inbound::Pong) => {}
                (6, Inbound::SubscriptionAck(subs)) => assert_eq!(subs[0].sid, 9),
                (15, Inbound::BookSnapshot(b)) => assert_eq!(b.b[0], BookLevel(49000, 10000)),
                (19, Inbound::WalletSnapshot(w)) => assert_eq!(w.accts[0].id, 100),
                (24, Inbound::OrdersUpdate(o)) => assert!(o[0].r),
                (100, Inbound::Heartbeat(h)) => assert_eq!(h.blk, 50002),
                _ => {}
            }
        }
    }

    #[test]
    fn test_subscribe_request_shape() {
        let req = SubscribeRequest::subscribe(vec![
            "order-book@16".to_string(),
            "trades@16".to_string(),
        ]);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["mt"], 5);
        assert_eq!(json["subs"][0]["stream"], "order-book@16");
        assert_eq!(json["subs"][0]["subscribe"], true);
    }

    #[test]
    fn test_order_request_serde_round_trip() {
        let req = OrderSubmission::open_short(32, 7, 500, Some(31415), 250, 99999)
            .into_request(11)
            .unwrap();
        let json = serde_json::to_string(&req).unwrap();
        let back: OrderRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, req);
    }
}
