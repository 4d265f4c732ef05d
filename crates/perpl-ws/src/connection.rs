//! WebSocket connection lifecycle.
//!
//! Handles connect, the authentication handshake for the trading endpoint,
//! automatic reconnection over a fixed backoff ladder, batched resubscription
//! after reconnect, liveness pings, and order submission.

use crate::error::{WsError, WsResult};
use crate::events::{event_for, WsEvent};
use crate::heartbeat::{PingTracker, PING_INTERVAL};
use crate::message::{
    decode_frame, AuthRequest, Inbound, OrderSubmission, OrderUpdate, PingRequest,
};
use crate::subscription::SubscriptionManager;
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex as TokioMutex};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{connect_async_tls_with_config, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Close code the server uses for an expired trading session.
const CLOSE_AUTH_EXPIRED: u16 = 3401;

/// Fixed reconnect ladder, in seconds. Attempts past the end reuse the last
/// entry.
const RECONNECT_SCHEDULE_SECS: [u64; 7] = [1, 2, 4, 8, 16, 32, 60];

/// Default cap on reconnect attempts per outage.
const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 10;

/// Hard timeout on the trading authentication handshake.
const AUTH_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout when awaiting an order acknowledgement.
const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(10);

/// Credentials for the trading endpoint, taken from the REST session.
#[derive(Debug, Clone)]
pub struct TradingAuth {
    /// Session nonce from the sign-in handshake.
    pub nonce: String,
    /// Cookie bundle, sent as a header on the upgrade request.
    pub cookie: String,
}

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Endpoint URL (`/ws/v1/market-data` or `/ws/v1/trading`).
    pub url: String,
    pub chain_id: u64,
    /// Present for the trading endpoint; the auth message is sent on every
    /// (re)connect before resubscription.
    pub auth: Option<TradingAuth>,
    /// Reconnect attempts per outage before giving up.
    pub max_reconnect_attempts: u32,
}

impl WsConfig {
    pub fn market_data(url: impl Into<String>, chain_id: u64) -> Self {
        Self {
            url: url.into(),
            chain_id,
            auth: None,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
        }
    }

    pub fn trading(url: impl Into<String>, chain_id: u64, auth: TradingAuth) -> Self {
        Self {
            url: url.into(),
            chain_id,
            auth: Some(auth),
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
        }
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Waiter for an orders update on a given perpetual.
struct AckWaiter {
    id: u64,
    perpetual: u64,
    tx: oneshot::Sender<OrderUpdate>,
}

/// WebSocket client for one endpoint.
///
/// Created by the caller together with the event receiver; the caller spawns
/// [`WsClient::run`] and consumes events on the channel. Event handlers are
/// therefore registered before any frame can arrive.
pub struct WsClient {
    config: WsConfig,
    state: Arc<RwLock<ConnectionState>>,
    authenticated: Arc<AtomicBool>,
    subscriptions: Arc<SubscriptionManager>,
    ping: Arc<PingTracker>,
    event_tx: mpsc::Sender<WsEvent>,
    outbound_tx: mpsc::Sender<String>,
    outbound_rx: Arc<TokioMutex<mpsc::Receiver<String>>>,
    next_rq: AtomicU64,
    next_waiter_id: AtomicU64,
    ack_waiters: Arc<Mutex<Vec<AckWaiter>>>,
    shutdown: CancellationToken,
}

impl WsClient {
    /// Create a client emitting events on `event_tx`.
    pub fn new(config: WsConfig, event_tx: mpsc::Sender<WsEvent>) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(256);
        Self {
            config,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            authenticated: Arc::new(AtomicBool::new(false)),
            subscriptions: Arc::new(SubscriptionManager::new()),
            ping: Arc::new(PingTracker::new()),
            event_tx,
            outbound_tx,
            outbound_rx: Arc::new(TokioMutex::new(outbound_rx)),
            next_rq: AtomicU64::new(0),
            next_waiter_id: AtomicU64::new(0),
            ack_waiters: Arc::new(Mutex::new(Vec::new())),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Whether the trading handshake has been confirmed on the current
    /// connection.
    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::Acquire)
    }

    pub fn subscriptions(&self) -> &SubscriptionManager {
        &self.subscriptions
    }

    /// Signal graceful shutdown; the run loop exits promptly.
    pub fn shutdown(&self) {
        info!(url = %self.config.url, "WebSocket shutdown requested");
        self.shutdown.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    /// Subscribe to named streams. Idempotent; safe before or after connect
    /// (the resubscription batch after a reconnect covers every name ever
    /// registered).
    pub async fn subscribe(&self, names: Vec<String>) -> WsResult<()> {
        let request = self.subscriptions.subscribe(names);
        let payload = serde_json::to_string(&request)?;
        self.outbound_tx
            .send(payload)
            .await
            .map_err(|e| WsError::SendFailed(e.to_string()))
    }

    // ========================================================================
    // Order submission (trading endpoint)
    // ========================================================================

    /// Fire-and-forget order submission. Returns the assigned `rq` so the
    /// caller can correlate a later ack.
    pub fn submit_order(&self, submission: OrderSubmission) -> WsResult<u64> {
        if self.config.auth.is_none() {
            return Err(WsError::TradingUnavailable("not a trading socket"));
        }
        if !self.is_authenticated() {
            return Err(WsError::TradingUnavailable("not authenticated"));
        }

        let rq = self.next_rq.fetch_add(1, Ordering::AcqRel) + 1;
        let request = submission.into_request(rq)?;
        let payload = serde_json::to_string(&request)?;
        self.outbound_tx
            .try_send(payload)
            .map_err(|e| WsError::SendFailed(e.to_string()))?;
        debug!(rq, "Order request queued");
        Ok(rq)
    }

    /// Submit and await the next orders update touching the same perpetual.
    pub async fn submit_order_wait(
        &self,
        submission: OrderSubmission,
        timeout: Option<Duration>,
    ) -> WsResult<OrderUpdate> {
        let perpetual = submission.perpetual;
        let (tx, rx) = oneshot::channel();
        let waiter_id = self.next_waiter_id.fetch_add(1, Ordering::AcqRel);
        self.ack_waiters.lock().push(AckWaiter {
            id: waiter_id,
            perpetual,
            tx,
        });

        if let Err(e) = self.submit_order(submission) {
            self.remove_waiter(waiter_id);
            return Err(e);
        }

        let timeout = timeout.unwrap_or(DEFAULT_ACK_TIMEOUT);
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(update)) => Ok(update),
            Ok(Err(_)) => {
                self.remove_waiter(waiter_id);
                Err(WsError::NotConnected)
            }
            Err(_) => {
                self.remove_waiter(waiter_id);
                Err(WsError::AckTimeout)
            }
        }
    }

    fn remove_waiter(&self, waiter_id: u64) {
        self.ack_waiters.lock().retain(|w| w.id != waiter_id);
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Connect and run until shutdown, a fatal error, or session expiry.
    ///
    /// Reconnects automatically on other close codes, over the fixed ladder,
    /// up to the configured attempt cap.
    pub async fn run(&self) -> WsResult<()> {
        let mut attempt = 0u32;

        loop {
            if self.is_shutdown() {
                *self.state.write() = ConnectionState::Disconnected;
                return Ok(());
            }

            *self.state.write() = ConnectionState::Connecting;
            let was_connected = Arc::new(AtomicBool::new(false));

            match self.try_connect(&was_connected).await {
                Ok(()) => {
                    info!(url = %self.config.url, "WebSocket connection closed");
                }
                Err(WsError::AuthExpired) => {
                    warn!("Trading session expired, not reconnecting");
                    self.emit(WsEvent::AuthExpired).await;
                    *self.state.write() = ConnectionState::Disconnected;
                    return Err(WsError::AuthExpired);
                }
                Err(WsError::AuthTimeout) => {
                    *self.state.write() = ConnectionState::Disconnected;
                    return Err(WsError::AuthTimeout);
                }
                Err(e) => {
                    error!(?e, "WebSocket connection error");
                }
            }

            self.authenticated.store(false, Ordering::Release);

            if self.is_shutdown() {
                *self.state.write() = ConnectionState::Disconnected;
                return Ok(());
            }

            // A successful connection resets the outage counter.
            if was_connected.load(Ordering::Acquire) {
                attempt = 0;
            }

            attempt += 1;
            if attempt > self.config.max_reconnect_attempts {
                error!(attempt, "Reconnect attempts exhausted");
                self.emit(WsEvent::Fatal).await;
                *self.state.write() = ConnectionState::Disconnected;
                return Err(WsError::MaxReconnectExceeded);
            }

            *self.state.write() = ConnectionState::Reconnecting;
            let delay = backoff_delay(attempt);
            warn!(attempt, delay_s = delay.as_secs(), "Reconnecting");

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.shutdown.cancelled() => {
                    *self.state.write() = ConnectionState::Disconnected;
                    return Ok(());
                }
            }

            // Server-assigned sids are stale on the new connection.
            self.subscriptions.reset_confirmations();
        }
    }

    async fn try_connect(&self, was_connected: &Arc<AtomicBool>) -> WsResult<()> {
        info!(url = %self.config.url, "Connecting to WebSocket");

        let mut request = self
            .config
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| WsError::ConnectionFailed(e.to_string()))?;
        if let Some(auth) = &self.config.auth {
            request.headers_mut().insert(
                "Cookie",
                auth.cookie
                    .parse()
                    .map_err(|_| WsError::ConnectionFailed("invalid cookie header".into()))?,
            );
        }

        let (ws_stream, _response) = connect_async_tls_with_config(request, None, true, None)
            .await
            .map_err(WsError::from)?;
        let (mut write, mut read) = ws_stream.split();

        *self.state.write() = ConnectionState::Connected;
        was_connected.store(true, Ordering::Release);
        self.ping.reset();
        info!(url = %self.config.url, "WebSocket connected");

        // Trading endpoint: authenticate before anything else, on every
        // connect including reconnects.
        if let Some(auth) = &self.config.auth {
            let auth_req = AuthRequest::new(self.config.chain_id, auth.nonce.clone());
            let payload = serde_json::to_string(&auth_req)?;
            write.send(Message::Text(payload)).await?;
            self.await_authentication(&mut write, &mut read).await?;
            info!("Trading authentication confirmed");
        }

        // One batched resubscription for every previously named stream.
        if let Some(resub) = self.subscriptions.resubscribe_all() {
            let payload = serde_json::to_string(&resub)?;
            debug!(count = resub.subs.len(), "Re-issuing subscriptions");
            write.send(Message::Text(payload)).await?;
        }

        let mut ping_interval = tokio::time::interval(PING_INTERVAL);
        ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it.
        ping_interval.tick().await;

        loop {
            let outbound_recv = async { self.outbound_rx.lock().await.recv().await };

            tokio::select! {
                () = self.shutdown.cancelled() => {
                    if let Err(e) = write.send(Message::Close(None)).await {
                        warn!(?e, "Failed to send Close frame during shutdown");
                    }
                    *self.state.write() = ConnectionState::Disconnected;
                    return Ok(());
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_text(&text).await?;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            self.ping.record_pong();
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (u16::from(f.code), f.reason.to_string()))
                                .unwrap_or((1000, "Normal close".to_string()));
                            warn!(code, %reason, "WebSocket closed by server");
                            if code == CLOSE_AUTH_EXPIRED {
                                return Err(WsError::AuthExpired);
                            }
                            return Err(WsError::ConnectionClosed { code, reason });
                        }
                        Some(Err(e)) => {
                            error!(?e, "WebSocket read error");
                            return Err(e.into());
                        }
                        None => {
                            warn!("WebSocket stream ended");
                            return Ok(());
                        }
                        _ => {}
                    }
                }

                outbound = outbound_recv => {
                    if let Some(payload) = outbound {
                        write.send(Message::Text(payload)).await?;
                    }
                }

                _ = ping_interval.tick() => {
                    let ping = PingRequest::now();
                    write.send(Message::Text(serde_json::to_string(&ping)?)).await?;
                    self.ping.record_ping();
                }
            }
        }
    }

    /// Wait for the wallet snapshot that confirms trading authentication.
    ///
    /// Frames received while waiting are dispatched normally. The handshake
    /// has a hard timeout.
    async fn await_authentication(
        &self,
        write: &mut (impl futures_util::Sink<Message, Error = tokio_tungstenite::tungstenite::Error>
                  + Unpin),
        read: &mut (impl futures_util::Stream<
            Item = Result<Message, tokio_tungstenite::tungstenite::Error>,
        > + Unpin),
    ) -> WsResult<()> {
        let deadline = tokio::time::Instant::now() + AUTH_TIMEOUT;

        while !self.is_authenticated() {
            let msg = tokio::select! {
                msg = read.next() => msg,
                () = tokio::time::sleep_until(deadline) => {
                    error!("No wallet snapshot within handshake timeout");
                    return Err(WsError::AuthTimeout);
                }
            };

            match msg {
                Some(Ok(Message::Text(text))) => self.handle_text(&text).await?,
                Some(Ok(Message::Ping(data))) => {
                    write
                        .send(Message::Pong(data))
                        .await
                        .map_err(WsError::from)?;
                }
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = frame
                        .map(|f| (u16::from(f.code), f.reason.to_string()))
                        .unwrap_or((1006, "Closed during handshake".to_string()));
                    if code == CLOSE_AUTH_EXPIRED {
                        return Err(WsError::AuthExpired);
                    }
                    return Err(WsError::ConnectionClosed { code, reason });
                }
                Some(Err(e)) => return Err(e.into()),
                None => {
                    return Err(WsError::ConnectionClosed {
                        code: 1006,
                        reason: "Stream ended during handshake".to_string(),
                    })
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Decode one text frame and route it.
    async fn handle_text(&self, text: &str) -> WsResult<()> {
        let inbound = match decode_frame(text) {
            Ok(Some(inbound)) => inbound,
            // Unknown mt: dropped for forward compatibility.
            Ok(None) => return Ok(()),
            Err(e) => {
                warn!(?e, "Dropping malformed frame");
                return Ok(());
            }
        };

        match &inbound {
            Inbound::Pong => {
                self.ping.record_pong();
                return Ok(());
            }
            Inbound::SubscriptionAck(acks) => {
                self.subscriptions.confirm(acks);
                return Ok(());
            }
            Inbound::WalletSnapshot(_) => {
                // Receipt of the wallet snapshot confirms trading auth.
                self.authenticated.store(true, Ordering::Release);
            }
            Inbound::OrdersSnapshot(orders) | Inbound::OrdersUpdate(orders) => {
                self.fulfil_ack_waiters(orders);
            }
            _ => {}
        }

        if let Some(event) = event_for(inbound) {
            self.emit(event).await;
        }
        Ok(())
    }

    fn fulfil_ack_waiters(&self, orders: &[OrderUpdate]) {
        let mut waiters = self.ack_waiters.lock();
        for update in orders {
            if let Some(idx) = waiters.iter().position(|w| w.perpetual == update.pid) {
                let waiter = waiters.swap_remove(idx);
                let _ = waiter.tx.send(update.clone());
            }
        }
    }

    async fn emit(&self, event: WsEvent) {
        if self.event_tx.send(event).await.is_err() {
            warn!("Event receiver dropped");
        }
    }
}

/// Delay before reconnect attempt `attempt` (1-based), over the fixed ladder.
pub fn backoff_delay(attempt: u32) -> Duration {
    let idx = (attempt.saturating_sub(1) as usize).min(RECONNECT_SCHEDULE_SECS.len() - 1);
    Duration::from_secs(RECONNECT_SCHEDULE_SECS[idx])
}
