//! Core error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Negative price: {0}")]
    NegativePrice(f64),

    #[error("Non-positive lot for {kind}: {lot}")]
    NonPositiveLot { kind: &'static str, lot: i64 },

    #[error("Leverage below 1x: {hdths} hundredths")]
    LeverageTooLow { hdths: u32 },

    #[error("Value out of range for {unit}: {value}")]
    OutOfRange { unit: &'static str, value: f64 },

    #[error("Unknown order type code: {0}")]
    UnknownOrderType(u8),

    #[error("Unknown order status code: {0}")]
    UnknownOrderStatus(u8),
}

pub type Result<T> = std::result::Result<T, CodecError>;
