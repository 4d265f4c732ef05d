//! Application assembly.

use crate::config::BotConfig;
use crate::error::{AppError, AppResult};
use alloy::primitives::Address;
use alloy::signers::Signer;
use perpl_agent::{AnthropicClient, ToolContext};
use perpl_chain::{ChainClient, KeyManager, KeySource};
use perpl_liq::LiquidationSimulator;
use perpl_rest::RestClient;
use perpl_router::HybridRouter;
use perpl_state::StateTracker;
use perpl_ws::{streams, TradingAuth, WsClient, WsConfig};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Event channel depth per socket.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Assembled clients, router, and tracker.
pub struct Application {
    config: BotConfig,
    rest: Arc<RestClient>,
    chain: Arc<ChainClient>,
    market_ws: Arc<WsClient>,
    trading_ws: Option<Arc<WsClient>>,
    router: Arc<HybridRouter>,
    tracker: Arc<StateTracker>,
}

impl Application {
    /// Build every component. The tracker is attached to the event channels
    /// before any socket run loop is spawned, so no message can be missed.
    pub async fn build(config: BotConfig) -> AppResult<Self> {
        let exchange: Address = config
            .exchange_address
            .parse()
            .map_err(|_| AppError::Config(format!("bad exchange address: {}", config.exchange_address)))?;
        let proxy: Option<Address> = match &config.delegated_account_address {
            Some(address) => Some(address.parse().map_err(|_| {
                AppError::Config(format!("bad delegated account address: {address}"))
            })?),
            None => None,
        };

        let keys = KeyManager::load(
            config.owner_private_key.clone().map(|hex| KeySource::Literal { hex }),
            config
                .operator_private_key
                .clone()
                .map(|hex| KeySource::Literal { hex }),
            None,
        )?;

        let rest = Arc::new(RestClient::new(config.api_base_url.clone(), config.chain_id)?);

        let chain = Arc::new(match keys.operator() {
            Some(operator) => {
                ChainClient::connect_with_signer(
                    &config.rpc_url,
                    exchange,
                    operator.clone(),
                    proxy,
                )
                .await?
            }
            None => ChainClient::connect(&config.rpc_url, exchange).await?,
        });

        // Sign in with the operator key. A failure here is not fatal: reads
        // fall back to the contract and writes route on-chain.
        if let Some(operator) = keys.operator() {
            let signer = operator.clone();
            let address = format!("{:#x}", signer.address());
            let outcome = rest
                .authenticate(&address, move |message: String| {
                    let signer = signer.clone();
                    async move {
                        let signature = signer
                            .sign_message(message.as_bytes())
                            .await
                            .map_err(|e| e.to_string())?;
                        Ok(format!("0x{}", hex::encode(signature.as_bytes())))
                    }
                })
                .await;
            if let Err(e) = outcome {
                warn!(?e, "API sign-in failed; continuing with contract-only access");
            }
        }

        let tracker = Arc::new(StateTracker::new());

        let (market_tx, market_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let market_ws = Arc::new(WsClient::new(
            WsConfig::market_data(config.market_data_ws_url(), config.chain_id),
            market_tx,
        ));
        let _ = tracker.attach(market_rx);

        let trading_ws = match rest.session() {
            Some(session) => {
                let (trading_tx, trading_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
                let client = Arc::new(WsClient::new(
                    WsConfig::trading(
                        config.trading_ws_url(),
                        config.chain_id,
                        TradingAuth {
                            nonce: session.nonce,
                            cookie: session.cookie,
                        },
                    ),
                    trading_tx,
                ));
                let _ = tracker.attach(trading_rx);
                Some(client)
            }
            None => None,
        };

        let router = Arc::new(HybridRouter::new(
            rest.clone(),
            chain.clone(),
            trading_ws.clone(),
            config.use_api,
        ));

        Ok(Self {
            config,
            rest,
            chain,
            market_ws,
            trading_ws,
            router,
            tracker,
        })
    }

    /// Spawn the socket run loops, subscribe the market streams, and run
    /// until interrupted.
    pub async fn run(&self) -> AppResult<()> {
        let market_ws = self.market_ws.clone();
        tokio::spawn(async move {
            if let Err(e) = market_ws.run().await {
                warn!(?e, "Market-data socket terminated");
            }
        });

        if let Some(trading_ws) = &self.trading_ws {
            let trading_ws = trading_ws.clone();
            tokio::spawn(async move {
                if let Err(e) = trading_ws.run().await {
                    warn!(?e, "Trading socket terminated");
                }
            });
        }

        let mut names = vec![
            streams::market_state(self.config.chain_id),
            streams::heartbeat(self.config.chain_id),
            streams::funding(self.config.chain_id),
        ];
        for &market in &self.config.markets {
            names.push(streams::order_book(market));
            names.push(streams::trades(market));
        }
        self.market_ws.subscribe(names).await?;

        info!(
            markets = self.config.markets.len(),
            trading = self.trading_ws.is_some(),
            "PerplBot running"
        );
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| AppError::Config(format!("signal handler: {e}")))?;
        info!(
            balance = %crate::display::format_amount(self.tracker.balance_cns()),
            equity = %crate::display::format_amount(self.tracker.total_equity_cns()),
            "Interrupt received, shutting down"
        );

        self.market_ws.shutdown();
        if let Some(trading_ws) = &self.trading_ws {
            trading_ws.shutdown();
        }
        Ok(())
    }

    /// Agent pieces, when a model key is configured.
    pub async fn agent(&self) -> AppResult<Option<(AnthropicClient, ToolContext)>> {
        let Some(api_key) = &self.config.anthropic_api_key else {
            return Ok(None);
        };

        let account = match self.tracker.account() {
            Some(account) => account.id,
            None => {
                // Fall back to the operator's account on chain.
                let owner = self
                    .chain
                    .get_account_by_address(
                        self.config
                            .delegated_account_address
                            .as_deref()
                            .unwrap_or_default()
                            .parse()
                            .map_err(|_| {
                                AppError::Config("no account available for the agent".to_string())
                            })?,
                    )
                    .await?;
                owner.id
            }
        };

        let client = AnthropicClient::new(api_key.clone(), self.config.chatbot_model.clone());
        let simulator = Arc::new(LiquidationSimulator::new(
            self.config.liq.clone(),
            self.config.rpc_url.clone(),
            self.chain.exchange_address(),
        ));
        let ctx = ToolContext {
            router: self.router.clone(),
            tracker: self.tracker.clone(),
            simulator: Some(simulator),
            account,
            markets: self.config.markets.clone(),
            maintenance_margin: self.config.liq.maintenance_margin,
        };
        Ok(Some((client, ctx)))
    }

    pub fn router(&self) -> &Arc<HybridRouter> {
        &self.router
    }

    pub fn tracker(&self) -> &Arc<StateTracker> {
        &self.tracker
    }

    pub fn rest(&self) -> &Arc<RestClient> {
        &self.rest
    }
}
