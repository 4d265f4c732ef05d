//! WebSocket clients for the Perpl exchange.
//!
//! Two endpoints share one connection core:
//! - the market-data socket (no authentication), carrying order books,
//!   trades, market state, candles, and heartbeats;
//! - the trading socket, authenticated with the REST session's nonce and
//!   cookie, carrying wallet, orders, fills, and positions streams plus
//!   order submission.
//!
//! The connection reconnects automatically with a fixed backoff ladder and
//! re-issues all named subscriptions in a single batched request.

pub mod connection;
pub mod error;
pub mod events;
pub mod heartbeat;
pub mod message;
pub mod streams;
pub mod subscription;

pub use connection::{ConnectionState, TradingAuth, WsClient, WsConfig};
pub use error::{WsError, WsResult};
pub use events::WsEvent;
pub use message::{
    BookLevel, BookUpdate, FillUpdate, HeadBlock, Inbound, MarketStateUpdate, OrderRequest,
    OrderSubmission, OrderUpdate, PerpMarketState, PositionUpdate, TradeEntry, TradesUpdate,
    WalletAccount, WalletSnapshot,
};
pub use subscription::SubscriptionManager;
