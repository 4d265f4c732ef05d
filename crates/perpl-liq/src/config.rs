//! Simulator configuration.

use serde::{Deserialize, Serialize};

/// Configuration recognized by the liquidation simulator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiqConfig {
    /// Half-width of the sweep range as a percent of the current mark.
    #[serde(default = "default_price_range_pct")]
    pub price_range_pct: f64,
    /// Number of sweep points.
    #[serde(default = "default_price_steps")]
    pub price_steps: usize,
    /// Binary-search refinement iterations.
    #[serde(default = "default_binary_search_iterations")]
    pub binary_search_iterations: u32,
    /// Anvil startup timeout in milliseconds.
    #[serde(default = "default_anvil_timeout_ms")]
    pub anvil_timeout_ms: u64,
    /// Maintenance margin fraction.
    #[serde(default = "default_maintenance_margin")]
    pub maintenance_margin: f64,
    /// Path to the anvil binary.
    #[serde(default = "default_anvil_path")]
    pub anvil_path: String,
}

fn default_price_range_pct() -> f64 {
    30.0
}

fn default_price_steps() -> usize {
    20
}

fn default_binary_search_iterations() -> u32 {
    10
}

fn default_anvil_timeout_ms() -> u64 {
    30_000
}

fn default_maintenance_margin() -> f64 {
    0.05
}

fn default_anvil_path() -> String {
    "anvil".to_string()
}

impl Default for LiqConfig {
    fn default() -> Self {
        Self {
            price_range_pct: default_price_range_pct(),
            price_steps: default_price_steps(),
            binary_search_iterations: default_binary_search_iterations(),
            anvil_timeout_ms: default_anvil_timeout_ms(),
            maintenance_margin: default_maintenance_margin(),
            anvil_path: default_anvil_path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LiqConfig::default();
        assert_eq!(config.price_range_pct, 30.0);
        assert_eq!(config.price_steps, 20);
        assert_eq!(config.binary_search_iterations, 10);
        assert_eq!(config.anvil_timeout_ms, 30_000);
        assert_eq!(config.maintenance_margin, 0.05);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: LiqConfig = serde_json::from_str(r#"{"price_steps": 40}"#).unwrap();
        assert_eq!(config.price_steps, 40);
        assert_eq!(config.price_range_pct, 30.0);
    }
}
