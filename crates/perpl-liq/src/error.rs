//! Simulator error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LiqError {
    #[error("Anvil unavailable: {0}")]
    AnvilUnavailable(String),

    #[error("Storage slot discovery failed: {0}")]
    SlotDiscoveryFailed(String),

    /// A written probe or price did not read back as expected.
    #[error("Price manipulation verification failed: {0}")]
    PriceVerificationFailed(String),

    /// All sweep points were safe, or all were liquidatable.
    #[error("Sweep found no liquidation boundary")]
    SweepNoBoundary,

    #[error("Account {account} has no open position on perpetual {perpetual}")]
    NoPosition { perpetual: u64, account: u64 },

    #[error("Chain error: {0}")]
    Chain(#[from] perpl_chain::ChainError),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Process error: {0}")]
    Process(#[from] std::io::Error),
}

pub type LiqResult<T> = Result<T, LiqError>;
