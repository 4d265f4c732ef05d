//! Events emitted to consumers.
//!
//! Consumers (the state tracker, front-ends) receive these over an mpsc
//! channel registered at client construction, so no message can be missed for
//! lack of a handler. Events for one socket are delivered in the order the
//! frames arrived; snapshots always precede their update stream.

use crate::message::{
    BookUpdate, FillUpdate, HeadBlock, Inbound, MarketStateUpdate, OrderUpdate, PositionUpdate,
    TradesUpdate, WalletSnapshot,
};

/// A consumer-visible event, one per dispatched frame.
#[derive(Debug, Clone, PartialEq)]
pub enum WsEvent {
    MarketState(MarketStateUpdate),
    OrderBook {
        snapshot: bool,
        book: BookUpdate,
    },
    Trades {
        snapshot: bool,
        trades: TradesUpdate,
    },
    Wallet(WalletSnapshot),
    Orders {
        snapshot: bool,
        orders: Vec<OrderUpdate>,
    },
    Fills(Vec<FillUpdate>),
    Positions {
        snapshot: bool,
        positions: Vec<PositionUpdate>,
    },
    Heartbeat(HeadBlock),
    /// Server closed with code 3401; the REST session must be renewed.
    AuthExpired,
    /// Reconnect attempts exhausted; the client will not recover.
    Fatal,
}

impl WsEvent {
    /// Stream name this event belongs to.
    pub fn stream(&self) -> &'static str {
        match self {
            Self::MarketState(_) => "market-state",
            Self::OrderBook { .. } => "order-book",
            Self::Trades { .. } => "trades",
            Self::Wallet(_) => "wallet",
            Self::Orders { .. } => "orders",
            Self::Fills(_) => "fills",
            Self::Positions { .. } => "positions",
            Self::Heartbeat(_) => "heartbeat",
            Self::AuthExpired => "auth-expired",
            Self::Fatal => "fatal",
        }
    }
}

/// Map a decoded frame into its consumer event, if it has one.
///
/// Pongs and subscription acks are connection-internal and produce no event.
pub fn event_for(inbound: Inbound) -> Option<WsEvent> {
    match inbound {
        Inbound::Pong | Inbound::SubscriptionAck(_) => None,
        Inbound::MarketState(update) => Some(WsEvent::MarketState(update)),
        Inbound::BookSnapshot(book) => Some(WsEvent::OrderBook {
            snapshot: true,
            book,
        }),
        Inbound::BookUpdate(book) => Some(WsEvent::OrderBook {
            snapshot: false,
            book,
        }),
        Inbound::TradesSnapshot(trades) => Some(WsEvent::Trades {
            snapshot: true,
            trades,
        }),
        Inbound::TradesUpdate(trades) => Some(WsEvent::Trades {
            snapshot: false,
            trades,
        }),
        Inbound::WalletSnapshot(wallet) => Some(WsEvent::Wallet(wallet)),
        Inbound::OrdersSnapshot(orders) => Some(WsEvent::Orders {
            snapshot: true,
            orders,
        }),
        Inbound::OrdersUpdate(orders) => Some(WsEvent::Orders {
            snapshot: false,
            orders,
        }),
        Inbound::FillsUpdate(fills) => Some(WsEvent::Fills(fills)),
        Inbound::PositionsSnapshot(positions) => Some(WsEvent::Positions {
            snapshot: true,
            positions,
        }),
        Inbound::PositionsUpdate(positions) => Some(WsEvent::Positions {
            snapshot: false,
            positions,
        }),
        Inbound::Heartbeat(head) => Some(WsEvent::Heartbeat(head)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::decode_frame;

    #[test]
    fn test_internal_frames_emit_no_event() {
        let pong = decode_frame(r#"{"mt":2}"#).unwrap().unwrap();
        assert_eq!(event_for(pong), None);

        let ack = decode_frame(r#"{"mt":6,"subs":[{"stream":"trades@16","sid":1}]}"#)
            .unwrap()
            .unwrap();
        assert_eq!(event_for(ack), None);
    }

    #[test]
    fn test_snapshot_flag_preserved() {
        let snap = decode_frame(r#"{"mt":15,"pid":16,"b":[],"a":[]}"#)
            .unwrap()
            .unwrap();
        match event_for(snap).unwrap() {
            WsEvent::OrderBook { snapshot, .. } => assert!(snapshot),
            other => panic!("unexpected event {other:?}"),
        }

        let update = decode_frame(r#"{"mt":16,"pid":16,"b":[],"a":[]}"#)
            .unwrap()
            .unwrap();
        match event_for(update).unwrap() {
            WsEvent::OrderBook { snapshot, .. } => assert!(!snapshot),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_stream_names() {
        let heartbeat = decode_frame(r#"{"mt":100,"blk":1}"#).unwrap().unwrap();
        assert_eq!(event_for(heartbeat).unwrap().stream(), "heartbeat");
    }
}
