//! Anvil fork lifecycle and the RPC primitives the simulator uses.
//!
//! The simulator owns the anvil child process for the duration of one
//! simulation; the process is killed on every exit path (`kill_on_drop`
//! plus an explicit shutdown). EVM snapshot ids are taken and reverted in
//! strict stack discipline by the callers.

use crate::error::{LiqError, LiqResult};
use alloy::network::Ethereum;
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use serde_json::json;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// A local fork of the target chain, backed by an anvil child process.
pub struct AnvilFork {
    child: Child,
    provider: DynProvider<Ethereum>,
    endpoint: String,
}

impl AnvilFork {
    /// Spawn anvil forking `fork_url` and wait for the RPC to come up.
    ///
    /// `timeout` bounds the whole startup; on failure the child is killed
    /// before returning.
    pub async fn spawn(anvil_path: &str, fork_url: &str, timeout: Duration) -> LiqResult<Self> {
        let port = free_port()?;
        let endpoint = format!("http://127.0.0.1:{port}");
        info!(%endpoint, "Spawning anvil fork");

        let mut child = Command::new(anvil_path)
            .args([
                "--fork-url",
                fork_url,
                "--port",
                &port.to_string(),
                "--silent",
            ])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| LiqError::AnvilUnavailable(format!("spawn {anvil_path}: {e}")))?;

        let deadline = tokio::time::Instant::now() + timeout;
        let provider = loop {
            if tokio::time::Instant::now() >= deadline {
                let _ = child.start_kill();
                return Err(LiqError::AnvilUnavailable(format!(
                    "no RPC at {endpoint} within {timeout:?}"
                )));
            }
            match ProviderBuilder::new().connect(&endpoint).await {
                Ok(provider) => match provider.get_block_number().await {
                    Ok(block) => {
                        debug!(block, "Anvil fork ready");
                        break provider.erased();
                    }
                    Err(_) => tokio::time::sleep(Duration::from_millis(250)).await,
                },
                Err(_) => tokio::time::sleep(Duration::from_millis(250)).await,
            }
        };

        Ok(Self {
            child,
            provider,
            endpoint,
        })
    }

    pub fn provider(&self) -> &DynProvider<Ethereum> {
        &self.provider
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Terminate the child process.
    pub async fn shutdown(mut self) {
        if let Err(e) = self.child.kill().await {
            warn!(?e, "Failed to kill anvil");
        }
    }

    // ========================================================================
    // EVM state manipulation
    // ========================================================================

    /// Take a snapshot; pair every call with exactly one [`Self::revert`].
    pub async fn snapshot(&self) -> LiqResult<U256> {
        self.provider
            .raw_request::<_, U256>("evm_snapshot".into(), ())
            .await
            .map_err(|e| LiqError::Rpc(e.to_string()))
    }

    /// Revert to a snapshot id.
    pub async fn revert(&self, id: U256) -> LiqResult<()> {
        let ok: bool = self
            .provider
            .raw_request("evm_revert".into(), (id,))
            .await
            .map_err(|e| LiqError::Rpc(e.to_string()))?;
        if !ok {
            return Err(LiqError::Rpc(format!("evm_revert({id}) returned false")));
        }
        Ok(())
    }

    pub async fn get_storage(&self, address: Address, slot: U256) -> LiqResult<U256> {
        self.provider
            .get_storage_at(address, slot)
            .await
            .map_err(|e| LiqError::Rpc(e.to_string()))
    }

    pub async fn set_storage(&self, address: Address, slot: B256, value: B256) -> LiqResult<()> {
        self.provider
            .raw_request::<_, bool>("anvil_setStorageAt".into(), (address, slot, value))
            .await
            .map_err(|e| LiqError::Rpc(e.to_string()))?;
        Ok(())
    }

    /// Trace a view call and collect the distinct storage slots it SLOADs.
    pub async fn trace_sload_slots(
        &self,
        to: Address,
        calldata: Bytes,
    ) -> LiqResult<Vec<U256>> {
        let tx = json!({
            "to": to,
            "data": format!("0x{}", hex_encode(&calldata)),
        });
        let options = json!({
            "disableStorage": false,
            "disableStack": false,
            "disableMemory": true,
        });
        let trace: serde_json::Value = self
            .provider
            .raw_request("debug_traceCall".into(), (tx, "latest", options))
            .await
            .map_err(|e| LiqError::Rpc(e.to_string()))?;

        let mut slots = Vec::new();
        let logs = trace
            .get("structLogs")
            .and_then(|v| v.as_array())
            .ok_or_else(|| LiqError::Rpc("trace missing structLogs".to_string()))?;

        for log in logs {
            if log.get("op").and_then(|v| v.as_str()) != Some("SLOAD") {
                continue;
            }
            // The slot is the top of the stack at the SLOAD.
            let Some(top) = log
                .get("stack")
                .and_then(|v| v.as_array())
                .and_then(|s| s.last())
                .and_then(|v| v.as_str())
            else {
                continue;
            };
            if let Ok(slot) = U256::from_str_radix(top.trim_start_matches("0x"), 16) {
                if !slots.contains(&slot) {
                    slots.push(slot);
                }
            }
        }

        debug!(count = slots.len(), "Collected SLOAD slots from trace");
        Ok(slots)
    }

    /// Run `op` under a snapshot, reverting on both the success and the
    /// error path.
    pub async fn with_snapshot<T, F, Fut>(&self, op: F) -> LiqResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = LiqResult<T>>,
    {
        let snap = self.snapshot().await?;
        let result = op().await;
        self.revert(snap).await?;
        result
    }
}

fn free_port() -> LiqResult<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_port_is_nonzero() {
        assert!(free_port().unwrap() > 0);
    }

    #[test]
    fn test_hex_encode() {
        assert_eq!(hex_encode(&[0x12, 0xab, 0x00]), "12ab00");
    }
}
