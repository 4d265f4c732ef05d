//! WebSocket error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WsError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection closed: code={code}, reason={reason}")]
    ConnectionClosed { code: u16, reason: String },

    /// Server closed with the auth-expired code (3401); no reconnect.
    #[error("Session expired (close code 3401)")]
    AuthExpired,

    /// No wallet snapshot arrived within the handshake timeout.
    #[error("Authentication handshake timed out")]
    AuthTimeout,

    /// The reconnect ladder was exhausted.
    #[error("Max reconnection attempts exceeded")]
    MaxReconnectExceeded,

    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Frame without an `mt` field or unparseable JSON.
    #[error("Malformed frame: {0}")]
    Malformed(String),

    #[error("Not connected")]
    NotConnected,

    /// Order submission requires the trading endpoint.
    #[error("Trading not available: {0}")]
    TradingUnavailable(&'static str),

    /// No matching orders/fills update arrived within the ack timeout.
    #[error("Order acknowledgement timed out")]
    AckTimeout,

    #[error("Tungstenite error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type WsResult<T> = Result<T, WsError>;
