//! Wire types of the REST API.
//!
//! Field names follow the exchange's compact JSON conventions (`d` for data,
//! `np` for next-page cursor, single-letter OHLCV keys).

use serde::{Deserialize, Serialize};

// ============================================================================
// Authentication
// ============================================================================

/// Challenge returned by `POST /v1/auth/payload`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthPayload {
    /// Human-readable message the wallet signs.
    pub message: String,
    pub nonce: String,
    pub issued_at: String,
    /// Server-side MAC binding the challenge fields together.
    pub mac: String,
}

/// Body of `POST /v1/auth/payload`.
#[derive(Debug, Serialize)]
pub struct PayloadRequest<'a> {
    pub chain_id: u64,
    pub address: &'a str,
}

/// Body of `POST /v1/auth/connect`.
#[derive(Debug, Serialize)]
pub struct ConnectRequest<'a> {
    pub chain_id: u64,
    pub address: &'a str,
    pub message: &'a str,
    pub nonce: &'a str,
    pub issued_at: &'a str,
    pub mac: &'a str,
    pub signature: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_code: Option<&'a str>,
}

/// Response of `POST /v1/auth/connect`.
#[derive(Debug, Deserialize)]
pub struct ConnectResponse {
    /// Session nonce for `X-Auth-Nonce` on subsequent requests.
    pub nonce: String,
}

// ============================================================================
// Public reference data
// ============================================================================

/// Protocol metadata from `GET /v1/pub/context`.
#[derive(Debug, Clone, Deserialize)]
pub struct Context {
    pub chain_id: u64,
    pub markets: Vec<ContextMarket>,
    #[serde(default)]
    pub tokens: Vec<ContextToken>,
    /// Feature flags and deployment instances; shape varies per deployment.
    #[serde(default)]
    pub instances: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContextMarket {
    pub id: u64,
    pub symbol: String,
    pub config: MarketConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketConfig {
    pub price_decimals: u32,
    pub lot_decimals: u32,
    /// Maintenance margin fraction.
    pub maintenance_margin: f64,
    /// Fee schedule in hundredths of a basis point.
    pub maker_fee: i64,
    pub taker_fee: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContextToken {
    pub symbol: String,
    pub address: String,
    pub decimals: u32,
}

/// One OHLCV candle: `{t,o,c,h,l,v,n}`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Candle {
    /// Open time, Unix milliseconds.
    pub t: u64,
    pub o: f64,
    pub c: f64,
    pub h: f64,
    pub l: f64,
    pub v: f64,
    /// Trade count.
    pub n: u64,
}

/// Candle window response: `{mt, at, r, d[]}`.
#[derive(Debug, Clone, Deserialize)]
pub struct CandleWindow {
    /// Market id.
    pub mt: u64,
    /// Server time, Unix milliseconds.
    pub at: u64,
    /// Resolution in seconds.
    pub r: u64,
    pub d: Vec<Candle>,
}

/// Announcements from `GET /v1/profile/announcements`.
#[derive(Debug, Clone, Deserialize)]
pub struct Announcements {
    pub ver: u64,
    #[serde(default)]
    pub active: Vec<serde_json::Value>,
}

// ============================================================================
// History (paginated)
// ============================================================================

/// One page of a history endpoint: `{d[], np}`.
///
/// `np` is the opaque next-page cursor; empty or missing means no more pages.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub d: Vec<T>,
    #[serde(default)]
    pub np: Option<String>,
}

impl<T> Page<T> {
    /// Whether a further page exists.
    pub fn has_next(&self) -> bool {
        self.np.as_deref().is_some_and(|np| !np.is_empty())
    }
}

/// Historical fill. The API's own order id is NOT the contract order id and
/// must never be mixed with it.
#[derive(Debug, Clone, Deserialize)]
pub struct FillRecord {
    /// API-side order identifier (non-authoritative).
    pub order_id: u64,
    pub market_id: u64,
    pub account_id: u64,
    /// "maker" or "taker".
    pub liquidity: String,
    pub price_pns: i64,
    pub lot_lns: i64,
    pub fee_cns: i64,
    pub block: u64,
    pub log_index: u64,
    pub at: u64,
}

/// Historical order event.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderRecord {
    /// API-side order identifier (non-authoritative).
    pub order_id: u64,
    pub market_id: u64,
    pub account_id: u64,
    pub order_type: u8,
    pub price_pns: i64,
    pub lot_lns: i64,
    pub leverage_hdths: u32,
    pub status: String,
    pub at: u64,
}

/// Historical position event.
#[derive(Debug, Clone, Deserialize)]
pub struct PositionEvent {
    pub market_id: u64,
    pub account_id: u64,
    pub position_type: u8,
    pub entry_price_pns: i64,
    pub lot_lns: i64,
    pub deposit_cns: i64,
    pub pnl_cns: i64,
    pub at: u64,
}

/// Historical account balance event.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountEvent {
    pub account_id: u64,
    pub balance_cns: i64,
    pub locked_balance_cns: i64,
    /// Event kind, e.g. "deposit", "withdraw", "settle".
    pub kind: String,
    pub at: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_has_next() {
        let page: Page<Candle> = serde_json::from_str(r#"{"d": [], "np": "abc"}"#).unwrap();
        assert!(page.has_next());

        let page: Page<Candle> = serde_json::from_str(r#"{"d": [], "np": ""}"#).unwrap();
        assert!(!page.has_next());

        let page: Page<Candle> = serde_json::from_str(r#"{"d": []}"#).unwrap();
        assert!(!page.has_next());
    }

    #[test]
    fn test_candle_window_parse() {
        let json = r#"{"mt":16,"at":1700000000000,"r":60,
            "d":[{"t":1699999940000,"o":95000.0,"c":95010.0,"h":95020.0,"l":94990.0,"v":12.5,"n":42}]}"#;
        let window: CandleWindow = serde_json::from_str(json).unwrap();
        assert_eq!(window.mt, 16);
        assert_eq!(window.r, 60);
        assert_eq!(window.d.len(), 1);
        assert_eq!(window.d[0].n, 42);
    }

    #[test]
    fn test_connect_request_omits_missing_ref_code() {
        let req = ConnectRequest {
            chain_id: 10143,
            address: "0xabc",
            message: "m",
            nonce: "n",
            issued_at: "2026-01-01T00:00:00Z",
            mac: "mac",
            signature: "0xsig",
            ref_code: None,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("ref_code"));
    }
}
