//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("REST error: {0}")]
    Rest(#[from] perpl_rest::RestError),

    #[error("Chain error: {0}")]
    Chain(#[from] perpl_chain::ChainError),

    #[error("WebSocket error: {0}")]
    Ws(#[from] perpl_ws::WsError),

    #[error("Router error: {0}")]
    Router(#[from] perpl_router::RouterError),
}

pub type AppResult<T> = Result<T, AppError>;
