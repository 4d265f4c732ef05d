//! REST client for the Perpl exchange API.
//!
//! Handles session authentication (sign-in-with-wallet challenge/response),
//! public reference data, and paginated trading history. The captured session
//! nonce and cookie are exposed so the trading WebSocket can reuse them for
//! its own handshake.

pub mod client;
pub mod error;
pub mod session;
pub mod types;

pub use client::RestClient;
pub use error::{RestError, RestResult};
pub use session::Session;
pub use types::{
    AccountEvent, AuthPayload, Candle, CandleWindow, Context, ContextMarket, FillRecord,
    OrderRecord, Page, PositionEvent,
};
