//! Owner/operator key loading.
//!
//! Two-key access pattern: the cold owner key deploys the proxy and can
//! withdraw; the hot operator key can only place allowlisted trading calls
//! through the proxy. Keys are parsed through zeroizing buffers and never
//! logged.

use crate::error::{ChainError, ChainResult};
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use std::path::PathBuf;
use zeroize::Zeroizing;

/// Source of a private key.
#[derive(Debug, Clone)]
pub enum KeySource {
    /// Environment variable holding the hex key.
    EnvVar { var_name: String },
    /// File holding the hex key (recommend 0600 permissions).
    File { path: PathBuf },
    /// Hex string already in hand (config-supplied).
    Literal { hex: String },
}

impl KeySource {
    fn read(&self) -> ChainResult<Zeroizing<Vec<u8>>> {
        let hex_str: Zeroizing<String> = match self {
            Self::EnvVar { var_name } => Zeroizing::new(std::env::var(var_name).map_err(|_| {
                ChainError::InvalidAddress(format!("env var {var_name} not set"))
            })?),
            Self::File { path } => Zeroizing::new(
                std::fs::read_to_string(path)
                    .map_err(|e| ChainError::InvalidAddress(format!("key file: {e}")))?,
            ),
            Self::Literal { hex } => Zeroizing::new(hex.clone()),
        };

        let trimmed = hex_str.trim().trim_start_matches("0x");
        Ok(Zeroizing::new(hex::decode(trimmed).map_err(|e| {
            ChainError::InvalidAddress(format!("key hex: {e}"))
        })?))
    }
}

/// Holds the owner and operator signers.
pub struct KeyManager {
    owner: Option<PrivateKeySigner>,
    operator: Option<PrivateKeySigner>,
}

impl std::fmt::Debug for KeyManager {
    // Redacted: never print key material, only derived addresses.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyManager")
            .field("owner", &self.owner_address())
            .field("operator", &self.operator_address())
            .finish()
    }
}

impl KeyManager {
    /// Load keys, verifying derived addresses against expectations when
    /// given.
    pub fn load(
        owner_source: Option<KeySource>,
        operator_source: Option<KeySource>,
        expected_operator_address: Option<Address>,
    ) -> ChainResult<Self> {
        let owner = owner_source.map(|s| parse_signer(&s)).transpose()?;
        let operator = operator_source.map(|s| parse_signer(&s)).transpose()?;

        if let (Some(expected), Some(signer)) = (expected_operator_address, operator.as_ref()) {
            if signer.address() != expected {
                return Err(ChainError::InvalidAddress(format!(
                    "operator key derives {}, expected {}",
                    signer.address(),
                    expected
                )));
            }
        }

        Ok(Self { owner, operator })
    }

    pub fn owner(&self) -> Option<&PrivateKeySigner> {
        self.owner.as_ref()
    }

    pub fn operator(&self) -> Option<&PrivateKeySigner> {
        self.operator.as_ref()
    }

    pub fn owner_address(&self) -> Option<Address> {
        self.owner.as_ref().map(|s| s.address())
    }

    pub fn operator_address(&self) -> Option<Address> {
        self.operator.as_ref().map(|s| s.address())
    }
}

fn parse_signer(source: &KeySource) -> ChainResult<PrivateKeySigner> {
    let bytes = source.read()?;
    PrivateKeySigner::from_slice(&bytes)
        .map_err(|e| ChainError::InvalidAddress(format!("invalid private key: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known anvil test key 0.
    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const TEST_ADDR: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    #[test]
    fn test_literal_key_parses_and_derives_address() {
        let manager = KeyManager::load(
            None,
            Some(KeySource::Literal {
                hex: TEST_KEY.to_string(),
            }),
            Some(TEST_ADDR.parse().unwrap()),
        )
        .unwrap();
        assert!(manager.owner().is_none());
        assert_eq!(
            manager.operator_address().unwrap(),
            TEST_ADDR.parse::<Address>().unwrap()
        );
    }

    #[test]
    fn test_address_mismatch_rejected() {
        let err = KeyManager::load(
            None,
            Some(KeySource::Literal {
                hex: TEST_KEY.to_string(),
            }),
            Some(Address::ZERO),
        )
        .unwrap_err();
        assert!(matches!(err, ChainError::InvalidAddress(_)));
    }

    #[test]
    fn test_bad_hex_rejected() {
        let err = KeyManager::load(
            Some(KeySource::Literal {
                hex: "zz".to_string(),
            }),
            None,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ChainError::InvalidAddress(_)));
    }
}
