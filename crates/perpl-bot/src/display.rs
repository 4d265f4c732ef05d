//! Display-boundary conversions.
//!
//! Protocol math stays on scaled integers; rendering for humans goes through
//! exact decimal arithmetic so a balance like 1234.56789 never picks up
//! binary floating-point noise on its way to a log line or a chat reply.

use perpl_core::{Cns, Lns, Pns, CNS_DECIMALS};
use rust_decimal::Decimal;

/// Collateral amount as an exact decimal.
pub fn amount_to_decimal(amount: Cns) -> Decimal {
    Decimal::from_i128_with_scale(amount.0, CNS_DECIMALS)
}

/// Price as an exact decimal under the perpetual's declared decimals.
pub fn price_to_decimal(price: Pns, price_decimals: u32) -> Decimal {
    Decimal::new(price.0, price_decimals)
}

/// Lot as an exact decimal under the perpetual's declared decimals.
pub fn lot_to_decimal(lot: Lns, lot_decimals: u32) -> Decimal {
    Decimal::new(lot.0, lot_decimals)
}

/// Render a collateral amount with trailing zeros trimmed.
pub fn format_amount(amount: Cns) -> String {
    amount_to_decimal(amount).normalize().to_string()
}

/// Render a price with trailing zeros trimmed.
pub fn format_price(price: Pns, price_decimals: u32) -> String {
    price_to_decimal(price, price_decimals)
        .normalize()
        .to_string()
}
