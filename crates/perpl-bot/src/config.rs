//! Application configuration.
//!
//! Loaded from a TOML file with environment overrides for the secrets (the
//! private keys and the model API key are better kept out of files).

use crate::error::{AppError, AppResult};
use perpl_liq::LiqConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration recognized by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// HTTPS endpoint for the chain JSON-RPC.
    pub rpc_url: String,
    /// Numeric chain id; used in the auth payload and stream names.
    pub chain_id: u64,
    /// Exchange contract address.
    pub exchange_address: String,
    /// Collateral ERC-20 address.
    pub collateral_token: String,
    /// Cold key for owner operations. Never used for trading after proxy
    /// setup. Override: PERPL_OWNER_KEY.
    #[serde(default)]
    pub owner_private_key: Option<String>,
    /// Hot key for trading through the proxy. Override: PERPL_OPERATOR_KEY.
    #[serde(default)]
    pub operator_private_key: Option<String>,
    /// Proxy through which operator writes flow.
    #[serde(default)]
    pub delegated_account_address: Option<String>,
    /// REST base URL.
    pub api_base_url: String,
    /// WebSocket base URL.
    pub ws_url: String,
    /// Prefer API reads when authenticated.
    #[serde(default = "default_use_api")]
    pub use_api: bool,
    /// Model credentials (agent only). Override: ANTHROPIC_API_KEY.
    #[serde(default)]
    pub anthropic_api_key: Option<String>,
    /// Model identifier.
    #[serde(default = "default_chatbot_model")]
    pub chatbot_model: String,
    /// Markets the bot works with.
    #[serde(default)]
    pub markets: Vec<u64>,
    /// Liquidation simulator settings, including the anvil path.
    #[serde(default)]
    pub liq: LiqConfig,
}

fn default_use_api() -> bool {
    true
}

fn default_chatbot_model() -> String {
    "claude-sonnet-4-5".to_string()
}

impl BotConfig {
    /// Load from the path in PERPL_CONFIG, or the default location.
    pub fn load() -> AppResult<Self> {
        let config_path =
            std::env::var("PERPL_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());
        if !Path::new(&config_path).exists() {
            return Err(AppError::Config(format!("config file not found: {config_path}")));
        }
        Self::from_file(&config_path)
    }

    /// Load from a specific file, then apply environment overrides.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("failed to read config: {e}")))?;
        let mut config: Self = toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("failed to parse config: {e}")))?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("PERPL_OWNER_KEY") {
            self.owner_private_key = Some(key);
        }
        if let Ok(key) = std::env::var("PERPL_OPERATOR_KEY") {
            self.operator_private_key = Some(key);
        }
        if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
            self.anthropic_api_key = Some(key);
        }
    }

    /// Trading endpoint URL.
    pub fn trading_ws_url(&self) -> String {
        format!("{}/ws/v1/trading", self.ws_url.trim_end_matches('/'))
    }

    /// Market-data endpoint URL.
    pub fn market_data_ws_url(&self) -> String {
        format!("{}/ws/v1/market-data", self.ws_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        rpc_url = "https://rpc.example"
        chain_id = 10143
        exchange_address = "0x9C216D1Ab3e0407b3d6F1d5e9EfFe6d01C326ab7"
        collateral_token = "0xdF5B718d8FcC173335185a2a1513eE8151e3c027"
        api_base_url = "https://api.example"
        ws_url = "wss://api.example"
        markets = [16, 32]
    "#;

    #[test]
    fn test_minimal_config_parses_with_defaults() {
        let config: BotConfig = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.chain_id, 10143);
        assert!(config.use_api);
        assert!(config.owner_private_key.is_none());
        assert_eq!(config.liq.price_steps, 20);
        assert_eq!(config.markets, vec![16, 32]);
    }

    #[test]
    fn test_ws_endpoint_urls() {
        let config: BotConfig = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.trading_ws_url(), "wss://api.example/ws/v1/trading");
        assert_eq!(
            config.market_data_ws_url(),
            "wss://api.example/ws/v1/market-data"
        );
    }

    #[test]
    fn test_liq_section_override() {
        let toml_str = format!("{MINIMAL}\n[liq]\nprice_steps = 40\n");
        let config: BotConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.liq.price_steps, 40);
        assert_eq!(config.liq.price_range_pct, 30.0);
    }
}
