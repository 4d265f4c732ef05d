//! Chain-side reads and writes.
//!
//! Reads go directly against the exchange contract. Writes are tunneled
//! through the owner/operator proxy when one is configured: the wallet calls
//! the proxy, which forwards the allowlisted selector to the exchange.

use crate::abi::{AccountProxy, Exchange};
use crate::book::BookSource;
use crate::error::{ChainError, ChainResult};
use alloy::network::Ethereum;
use alloy::primitives::{Address, Bytes, FixedBytes, B256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::SolCall;
use perpl_core::{
    Account, AccountId, Cns, Lns, Ons, Order, OrderDescriptor, Perpetual, PerpetualId, Pns,
    Position,
};
use tracing::{debug, info, warn};

/// Position read together with the contract's mark price and its validity.
#[derive(Debug, Clone)]
pub struct PositionView {
    pub position: Position,
    pub mark_pns: Pns,
    pub mark_valid: bool,
}

impl PositionView {
    /// Mark price, or an error when the contract reports it invalid.
    pub fn valid_mark(&self) -> ChainResult<Pns> {
        if self.mark_valid {
            Ok(self.mark_pns)
        } else {
            Err(ChainError::StaleMark(self.position.perpetual))
        }
    }
}

/// Client for the exchange contract.
pub struct ChainClient {
    provider: DynProvider<Ethereum>,
    exchange: Address,
    /// Owner/operator proxy; writes are forwarded through it when set.
    proxy: Option<Address>,
}

impl ChainClient {
    /// Read-only client.
    pub async fn connect(rpc_url: &str, exchange: Address) -> ChainResult<Self> {
        let provider = ProviderBuilder::new()
            .connect(rpc_url)
            .await
            .map_err(|e| ChainError::Transport(e.to_string()))?
            .erased();
        Ok(Self {
            provider,
            exchange,
            proxy: None,
        })
    }

    /// Signer-backed client. With `proxy` set, writes flow through the
    /// delegated account; the signer is then expected to be the operator key.
    pub async fn connect_with_signer(
        rpc_url: &str,
        exchange: Address,
        signer: PrivateKeySigner,
        proxy: Option<Address>,
    ) -> ChainResult<Self> {
        let signer_address = signer.address();
        let provider = ProviderBuilder::new()
            .wallet(signer)
            .connect(rpc_url)
            .await
            .map_err(|e| ChainError::Transport(e.to_string()))?
            .erased();
        info!(signer = %signer_address, proxy = ?proxy, "Chain client connected with signer");
        Ok(Self {
            provider,
            exchange,
            proxy,
        })
    }

    /// Wrap an existing provider (used by the fork simulator).
    pub fn from_provider(provider: DynProvider<Ethereum>, exchange: Address) -> Self {
        Self {
            provider,
            exchange,
            proxy: None,
        }
    }

    pub fn provider(&self) -> &DynProvider<Ethereum> {
        &self.provider
    }

    pub fn exchange_address(&self) -> Address {
        self.exchange
    }

    fn contract(&self) -> Exchange::ExchangeInstance<DynProvider<Ethereum>> {
        Exchange::new(self.exchange, self.provider.clone())
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub async fn get_account_by_id(&self, account_id: AccountId) -> ChainResult<Account> {
        let info = self.contract().getAccountById(account_id).call().await?;
        Ok(info.into())
    }

    pub async fn get_account_by_address(&self, owner: Address) -> ChainResult<Account> {
        let info = self.contract().getAccountByAddress(owner).call().await?;
        Ok(info.into())
    }

    pub async fn get_perpetual_info(&self, perp: PerpetualId) -> ChainResult<Perpetual> {
        let info = self.contract().getPerpetualInfo(perp).call().await?;
        Ok(info.into())
    }

    /// Position together with the contract's own mark price and validity
    /// flag.
    pub async fn get_position(
        &self,
        perp: PerpetualId,
        account: AccountId,
    ) -> ChainResult<PositionView> {
        let ret = self.contract().getPosition(perp, account).call().await?;
        Ok(PositionView {
            position: ret._0.into(),
            mark_pns: Pns(ret.markPricePNS),
            mark_valid: ret.markPriceValid,
        })
    }

    /// Open orders with contract-assigned (authoritative) order ids.
    pub async fn get_open_orders(
        &self,
        perp: PerpetualId,
        account: AccountId,
    ) -> ChainResult<Vec<Order>> {
        let raw = self.contract().getOpenOrders(perp, account).call().await?;
        raw.into_iter()
            .map(|o| o.into_order(perp, account))
            .collect()
    }

    pub async fn get_taker_fee(&self) -> ChainResult<u32> {
        Ok(self.contract().getTakerFee().call().await?)
    }

    pub async fn get_maker_fee(&self) -> ChainResult<u32> {
        Ok(self.contract().getMakerFee().call().await?)
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Execute one order descriptor. Returns the transaction hash.
    pub async fn exec_order(&self, desc: &OrderDescriptor) -> ChainResult<B256> {
        desc.validate()
            .map_err(|e| ChainError::OutOfRange(e.to_string()))?;
        let abi_desc = Exchange::OrderDesc::try_from(desc)?;
        let calldata = Exchange::execOrderCall { desc: abi_desc }.abi_encode();
        self.send_exchange_call(calldata.into()).await
    }

    /// Execute a batch. A revert on the batch entry point means the batch
    /// path is unavailable for this caller; the client degrades to
    /// sequential singles.
    pub async fn exec_orders(
        &self,
        descs: &[OrderDescriptor],
        revert_on_fail: bool,
    ) -> ChainResult<Vec<B256>> {
        for desc in descs {
            desc.validate()
                .map_err(|e| ChainError::OutOfRange(e.to_string()))?;
        }

        let abi_descs: Vec<Exchange::OrderDesc> = descs
            .iter()
            .map(Exchange::OrderDesc::try_from)
            .collect::<ChainResult<_>>()?;
        let calldata = Exchange::execOrdersCall {
            descs: abi_descs,
            revertOnFail: revert_on_fail,
        }
        .abi_encode();

        match self.send_exchange_call(calldata.into()).await {
            Ok(hash) => Ok(vec![hash]),
            Err(ChainError::Reverted(reason)) => {
                warn!(%reason, "Batch order path unavailable, degrading to sequential singles");
                let mut hashes = Vec::with_capacity(descs.len());
                for desc in descs {
                    hashes.push(self.exec_order(desc).await?);
                }
                Ok(hashes)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn deposit_collateral(
        &self,
        account: AccountId,
        amount: Cns,
    ) -> ChainResult<B256> {
        let calldata = Exchange::depositCollateralCall {
            accountId: account,
            amountCNS: cns_to_u128(amount)?,
        }
        .abi_encode();
        self.send_exchange_call(calldata.into()).await
    }

    pub async fn increase_position_collateral(
        &self,
        perp: PerpetualId,
        amount: Cns,
    ) -> ChainResult<B256> {
        let calldata = Exchange::increasePositionCollateralCall {
            perpId: perp,
            amountCNS: cns_to_u128(amount)?,
        }
        .abi_encode();
        self.send_exchange_call(calldata.into()).await
    }

    pub async fn request_decrease_position_collateral(
        &self,
        perp: PerpetualId,
        amount: Cns,
    ) -> ChainResult<B256> {
        let calldata = Exchange::requestDecreasePositionCollateralCall {
            perpId: perp,
            amountCNS: cns_to_u128(amount)?,
        }
        .abi_encode();
        self.send_exchange_call(calldata.into()).await
    }

    pub async fn decrease_position_collateral(
        &self,
        perp: PerpetualId,
        amount: Cns,
        clamp_to_maximum: bool,
    ) -> ChainResult<B256> {
        let calldata = Exchange::decreasePositionCollateralCall {
            perpId: perp,
            amountCNS: cns_to_u128(amount)?,
            clampToMaximum: clamp_to_maximum,
        }
        .abi_encode();
        self.send_exchange_call(calldata.into()).await
    }

    /// Authorize (or revoke) an operator for a selector set on the proxy.
    /// Owner-keyed operation; run once at setup.
    pub async fn set_operator_allowlist(
        &self,
        proxy: Address,
        operator: Address,
        selectors: Vec<FixedBytes<4>>,
        allowed: bool,
    ) -> ChainResult<B256> {
        let contract = AccountProxy::new(proxy, self.provider.clone());
        let pending = contract
            .setOperatorAllowlist(operator, selectors, allowed)
            .send()
            .await?;
        let receipt = pending
            .get_receipt()
            .await
            .map_err(|e| ChainError::Transport(e.to_string()))?;
        Ok(receipt.transaction_hash)
    }

    /// Send exchange calldata, through the proxy when one is configured.
    async fn send_exchange_call(&self, calldata: Bytes) -> ChainResult<B256> {
        let pending = match self.proxy {
            Some(proxy) => {
                debug!(proxy = %proxy, "Forwarding call through operator proxy");
                AccountProxy::new(proxy, self.provider.clone())
                    .forwardCall(self.exchange, calldata)
                    .send()
                    .await?
            }
            None => {
                use alloy::rpc::types::TransactionRequest;
                use alloy::network::TransactionBuilder;
                let tx = TransactionRequest::default()
                    .with_to(self.exchange)
                    .with_input(calldata);
                self.provider
                    .send_transaction(tx)
                    .await
                    .map_err(|e| map_send_error(e.to_string()))?
            }
        };
        let receipt = pending
            .get_receipt()
            .await
            .map_err(|e| ChainError::Transport(e.to_string()))?;
        Ok(receipt.transaction_hash)
    }
}

impl BookSource for ChainClient {
    async fn volume_at(&self, perp: PerpetualId, ons: Ons) -> ChainResult<Lns> {
        let volume = self
            .contract()
            .getVolumeAtBookPrice(perp, ons.0)
            .call()
            .await?;
        Ok(Lns(volume))
    }

    async fn next_below(&self, perp: PerpetualId, ons: Ons) -> ChainResult<Ons> {
        let next = self
            .contract()
            .getNextPriceBelowWithOrders(perp, ons.0)
            .call()
            .await?;
        Ok(Ons(next))
    }
}

fn cns_to_u128(amount: Cns) -> ChainResult<u128> {
    u128::try_from(amount.0).map_err(|_| ChainError::OutOfRange(format!("amountCNS {amount}")))
}

fn map_send_error(text: String) -> ChainError {
    if text.contains("revert") {
        ChainError::Reverted(text)
    } else {
        ChainError::Transport(text)
    }
}
