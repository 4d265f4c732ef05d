//! Chain error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("Transport error: {0}")]
    Transport(String),

    /// Call or transaction reverted, with the decoded reason when available.
    #[error("Reverted: {0}")]
    Reverted(String),

    #[error("Simulation failed: {0}")]
    SimulationFailed(String),

    /// The contract reports its mark price as invalid.
    #[error("Stale mark price for perpetual {0}")]
    StaleMark(u64),

    /// Writes require a signer-backed provider.
    #[error("No signer configured")]
    NoSigner,

    #[error("Value out of range: {0}")]
    OutOfRange(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

impl From<alloy::transports::TransportError> for ChainError {
    fn from(e: alloy::transports::TransportError) -> Self {
        Self::Transport(e.to_string())
    }
}

impl From<alloy::contract::Error> for ChainError {
    fn from(e: alloy::contract::Error) -> Self {
        let text = e.to_string();
        if text.contains("revert") {
            Self::Reverted(text)
        } else {
            Self::Transport(text)
        }
    }
}

pub type ChainResult<T> = Result<T, ChainError>;
