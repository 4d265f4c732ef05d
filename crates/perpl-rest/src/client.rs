//! HTTPS request layer with session authentication and auto-pagination.

use crate::error::{RestError, RestResult};
use crate::session::Session;
use crate::types::{
    AccountEvent, Announcements, AuthPayload, CandleWindow, ConnectRequest, ConnectResponse,
    Context, FillRecord, OrderRecord, Page, PayloadRequest, PositionEvent,
};
use parking_lot::RwLock;
use reqwest::header::SET_COOKIE;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default page size for history endpoints.
const DEFAULT_PAGE_COUNT: u32 = 100;

/// Client for the exchange REST API.
///
/// Session state is per-instance; the client is cheap to share behind an
/// `Arc`.
pub struct RestClient {
    http: Client,
    base_url: String,
    chain_id: u64,
    session: RwLock<Option<Session>>,
}

impl RestClient {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `base_url` - API base, e.g. "https://api.perpl.example"
    /// * `chain_id` - chain id used in the auth payload
    pub fn new(base_url: impl Into<String>, chain_id: u64) -> RestResult<Self> {
        let http = Client::builder().timeout(DEFAULT_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            chain_id,
            session: RwLock::new(None),
        })
    }

    /// Whether a session is currently held.
    pub fn is_authenticated(&self) -> bool {
        self.session.read().is_some()
    }

    /// Snapshot of the current session (nonce + cookie), for the trading
    /// WebSocket handshake.
    pub fn session(&self) -> Option<Session> {
        self.session.read().clone()
    }

    /// Reset local session state.
    pub fn clear_auth(&self) {
        *self.session.write() = None;
        debug!("REST session cleared");
    }

    // ========================================================================
    // Authentication
    // ========================================================================

    /// Sign-in-with-wallet handshake.
    ///
    /// Two steps: fetch a challenge payload, have the caller-supplied
    /// `sign_fn` sign its message, then post the signed challenge. On success
    /// the returned session nonce and the `Set-Cookie` bundle are captured;
    /// both must be present or the handshake fails.
    pub async fn authenticate<F, Fut>(&self, address: &str, sign_fn: F) -> RestResult<()>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<String, String>>,
    {
        info!(address = %address, "Starting sign-in handshake");

        let payload_req = PayloadRequest {
            chain_id: self.chain_id,
            address,
        };
        let response = self
            .http
            .post(format!("{}/v1/auth/payload", self.base_url))
            .json(&payload_req)
            .send()
            .await?;
        let payload: AuthPayload = self.decode(response, false).await?;

        let signature = sign_fn(payload.message.clone())
            .await
            .map_err(RestError::Signing)?;

        let connect_req = ConnectRequest {
            chain_id: self.chain_id,
            address,
            message: &payload.message,
            nonce: &payload.nonce,
            issued_at: &payload.issued_at,
            mac: &payload.mac,
            signature: &signature,
            ref_code: None,
        };
        let response = self
            .http
            .post(format!("{}/v1/auth/connect", self.base_url))
            .json(&connect_req)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.map_error(status, body, false));
        }

        let cookie = extract_cookie(response.headers());
        let connect: ConnectResponse = response.json().await?;

        let cookie = cookie.ok_or(RestError::AuthIncomplete("missing Set-Cookie"))?;
        if connect.nonce.is_empty() {
            return Err(RestError::AuthIncomplete("missing session nonce"));
        }

        *self.session.write() = Some(Session::new(connect.nonce, cookie));
        info!(address = %address, "Sign-in complete");
        Ok(())
    }

    // ========================================================================
    // Public endpoints
    // ========================================================================

    /// Protocol metadata: chain, markets with decimals and fee schedules,
    /// collateral token, feature flags.
    pub async fn get_context(&self) -> RestResult<Context> {
        let response = self
            .http
            .get(format!("{}/v1/pub/context", self.base_url))
            .send()
            .await?;
        self.decode(response, false).await
    }

    /// OHLCV window for a market.
    pub async fn get_candles(
        &self,
        market_id: u64,
        resolution_secs: u64,
        from_ms: u64,
        to_ms: u64,
    ) -> RestResult<CandleWindow> {
        let url = format!(
            "{}/v1/market-data/{market_id}/candles/{resolution_secs}/{from_ms}-{to_ms}",
            self.base_url
        );
        let response = self.http.get(url).send().await?;
        self.decode(response, false).await
    }

    /// Active platform announcements.
    pub async fn get_announcements(&self) -> RestResult<Announcements> {
        let response = self
            .http
            .get(format!("{}/v1/profile/announcements", self.base_url))
            .send()
            .await?;
        self.decode(response, false).await
    }

    // ========================================================================
    // Authenticated history
    // ========================================================================

    /// One page of historical fills.
    pub async fn get_fills(&self, count: u32, page: Option<&str>) -> RestResult<Page<FillRecord>> {
        self.get_history("fills", count, page).await
    }

    /// One page of order history.
    pub async fn get_order_history(
        &self,
        count: u32,
        page: Option<&str>,
    ) -> RestResult<Page<OrderRecord>> {
        self.get_history("order-history", count, page).await
    }

    /// One page of position history.
    pub async fn get_position_history(
        &self,
        count: u32,
        page: Option<&str>,
    ) -> RestResult<Page<PositionEvent>> {
        self.get_history("position-history", count, page).await
    }

    /// One page of account balance history.
    pub async fn get_account_history(
        &self,
        count: u32,
        page: Option<&str>,
    ) -> RestResult<Page<AccountEvent>> {
        self.get_history("account-history", count, page).await
    }

    /// All fills, walking `np` cursors up to `max_pages`.
    pub async fn get_fills_all(&self, max_pages: Option<u32>) -> RestResult<Vec<FillRecord>> {
        paginate(max_pages, |page| async move {
            self.get_fills(DEFAULT_PAGE_COUNT, page.as_deref()).await
        })
        .await
    }

    /// All order history, walking `np` cursors up to `max_pages`.
    pub async fn get_order_history_all(
        &self,
        max_pages: Option<u32>,
    ) -> RestResult<Vec<OrderRecord>> {
        paginate(max_pages, |page| async move {
            self.get_order_history(DEFAULT_PAGE_COUNT, page.as_deref())
                .await
        })
        .await
    }

    /// All position history, walking `np` cursors up to `max_pages`.
    pub async fn get_position_history_all(
        &self,
        max_pages: Option<u32>,
    ) -> RestResult<Vec<PositionEvent>> {
        paginate(max_pages, |page| async move {
            self.get_position_history(DEFAULT_PAGE_COUNT, page.as_deref())
                .await
        })
        .await
    }

    /// All account history, walking `np` cursors up to `max_pages`.
    pub async fn get_account_history_all(
        &self,
        max_pages: Option<u32>,
    ) -> RestResult<Vec<AccountEvent>> {
        paginate(max_pages, |page| async move {
            self.get_account_history(DEFAULT_PAGE_COUNT, page.as_deref())
                .await
        })
        .await
    }

    async fn get_history<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        count: u32,
        page: Option<&str>,
    ) -> RestResult<Page<T>> {
        let session = self
            .session
            .read()
            .clone()
            .ok_or(RestError::NotAuthenticated)?;

        let mut request = self
            .http
            .get(format!("{}/v1/trading/{endpoint}", self.base_url))
            .query(&[("count", count.to_string())])
            .header("X-Auth-Nonce", &session.nonce)
            .header("Cookie", &session.cookie);
        if let Some(page) = page {
            request = request.query(&[("page", page)]);
        }

        let response = request.send().await?;
        let status = response.status();

        // History treats 404 as "no data", not an error.
        if status == StatusCode::NOT_FOUND {
            debug!(endpoint, "History endpoint returned 404, treating as empty");
            return Ok(Page {
                d: Vec::new(),
                np: None,
            });
        }

        self.decode(response, true).await
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn decode<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
        authed: bool,
    ) -> RestResult<T> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        let body = response.text().await.unwrap_or_default();
        Err(self.map_error(status, body, authed))
    }

    fn map_error(&self, status: StatusCode, body: String, authed: bool) -> RestError {
        match status.as_u16() {
            401 => {
                if authed {
                    warn!("Server rejected session, clearing auth");
                    self.clear_auth();
                }
                RestError::SessionExpired
            }
            418 | 423 => RestError::AccessRequired {
                status: status.as_u16(),
            },
            404 => RestError::NotFound(body),
            429 => RestError::RateLimited,
            _ => RestError::Api {
                status: status.as_u16(),
                body,
            },
        }
    }
}

/// Walk a paginated endpoint forward until the next-page cursor is empty or
/// `max_pages` is reached, concatenating `d` across pages.
///
/// Extracted from the client so pagination semantics are testable without a
/// server.
pub async fn paginate<T, F, Fut>(max_pages: Option<u32>, mut fetch: F) -> RestResult<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = RestResult<Page<T>>>,
{
    let mut out = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0u32;

    loop {
        if let Some(max) = max_pages {
            if pages >= max {
                break;
            }
        }

        let page = fetch(cursor.take()).await?;
        pages += 1;
        out.extend(page.d);

        match page.np {
            Some(np) if !np.is_empty() => cursor = Some(np),
            _ => break,
        }
    }

    Ok(out)
}

/// Collect the cookie bundle from `Set-Cookie` headers.
///
/// Only the name=value pairs are kept (attributes like Path and HttpOnly are
/// not replayed).
fn extract_cookie(headers: &reqwest::header::HeaderMap) -> Option<String> {
    let cookies: Vec<String> = headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if cookies.is_empty() {
        None
    } else {
        Some(cookies.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue};

    fn page<T>(d: Vec<T>, np: Option<&str>) -> Page<T> {
        Page {
            d,
            np: np.map(|s| s.to_string()),
        }
    }

    #[tokio::test]
    async fn test_paginate_concatenates_until_empty_cursor() {
        let pages = vec![
            page(vec![1, 2], Some("p2")),
            page(vec![3], Some("p3")),
            page(vec![4, 5], None),
        ];
        let mut cursors_seen = Vec::new();
        let idx = std::cell::Cell::new(0usize);

        let result = paginate(None, |cursor| {
            cursors_seen.push(cursor.clone());
            let i = idx.get();
            idx.set(i + 1);
            let p = Page {
                d: pages[i].d.clone(),
                np: pages[i].np.clone(),
            };
            async move { Ok(p) }
        })
        .await
        .unwrap();

        assert_eq!(result, vec![1, 2, 3, 4, 5]);
        assert_eq!(
            cursors_seen,
            vec![None, Some("p2".to_string()), Some("p3".to_string())]
        );
    }

    #[tokio::test]
    async fn test_paginate_stops_on_empty_string_cursor() {
        let idx = std::cell::Cell::new(0usize);
        let result = paginate(None, |_| {
            let i = idx.get();
            idx.set(i + 1);
            async move {
                Ok(page(
                    vec![i as i32],
                    if i == 0 { Some("") } else { Some("more") },
                ))
            }
        })
        .await
        .unwrap();

        // Empty np terminates after the first page.
        assert_eq!(result, vec![0]);
    }

    #[tokio::test]
    async fn test_paginate_respects_max_pages() {
        let result = paginate(Some(3), |_| async move { Ok(page(vec![7], Some("next"))) })
            .await
            .unwrap();
        // Exactly three pages' worth even though cursors never run out.
        assert_eq!(result, vec![7, 7, 7]);
    }

    #[test]
    fn test_extract_cookie_strips_attributes() {
        let mut headers = HeaderMap::new();
        headers.append(
            SET_COOKIE,
            HeaderValue::from_static("sid=abc123; Path=/; HttpOnly"),
        );
        headers.append(SET_COOKIE, HeaderValue::from_static("csrf=xyz; Secure"));
        assert_eq!(
            extract_cookie(&headers),
            Some("sid=abc123; csrf=xyz".to_string())
        );
    }

    #[test]
    fn test_extract_cookie_absent() {
        assert_eq!(extract_cookie(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn test_history_requires_auth() {
        let client = RestClient::new("https://api.invalid", 10143).unwrap();
        let err = client.get_fills(10, None).await.unwrap_err();
        assert!(matches!(err, RestError::NotAuthenticated));
    }

    #[test]
    fn test_clear_auth() {
        let client = RestClient::new("https://api.invalid", 10143).unwrap();
        *client.session.write() = Some(Session::new("n".into(), "c=1".into()));
        assert!(client.is_authenticated());
        client.clear_auth();
        assert!(!client.is_authenticated());
    }
}
