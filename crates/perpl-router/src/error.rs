//! Router error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("REST error: {0}")]
    Rest(#[from] perpl_rest::RestError),

    #[error("Chain error: {0}")]
    Chain(#[from] perpl_chain::ChainError),

    #[error("WebSocket error: {0}")]
    Ws(#[from] perpl_ws::WsError),

    /// The operation is API-only and the client is not authenticated.
    #[error("Operation requires an authenticated API session")]
    ApiSessionRequired,
}

pub type RouterResult<T> = Result<T, RouterError>;
