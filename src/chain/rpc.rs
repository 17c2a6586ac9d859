use alloy::network::{Ethereum, EthereumWallet};
use alloy::primitives::{Address, U256};
use alloy::providers::{DynProvider, PendingTransactionBuilder, Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use tracing::debug;

use super::{EscrowChain, TxReceipt};
use crate::config::EscrowConfig;
use crate::contracts::{IEscrow, IERC20};
use crate::error::{EscrowError, Result};
use crate::models::Operation;
use crate::utils::retry;

const RETRY_BASE_DELAY_MS: u64 = 250;

/// JSON-RPC backed escrow access.
///
/// Without a local signer, writes go out as `eth_sendTransaction` and the node
/// signs for the `from` account, the same way an injected wallet would.
#[derive(Clone)]
pub struct RpcChain {
    provider: DynProvider<Ethereum>,
    escrow: Address,
    read_retries: u32,
}

impl RpcChain {
    pub fn connect(rpc_url: &str, escrow: Address, read_retries: u32) -> Result<Self> {
        let url = parse_url(rpc_url)?;
        let provider = ProviderBuilder::new().connect_http(url).erased();
        Ok(Self::with_provider(provider, escrow, read_retries))
    }

    /// Read-only connection described by `config`; no signer is attached.
    pub fn from_config(config: &EscrowConfig) -> Result<Self> {
        Self::connect(&config.rpc_url, config.escrow_address, config.read_retries)
    }

    pub fn connect_with_signer(
        rpc_url: &str,
        escrow: Address,
        signer: PrivateKeySigner,
        read_retries: u32,
    ) -> Result<Self> {
        let url = parse_url(rpc_url)?;
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(url)
            .erased();
        Ok(Self::with_provider(provider, escrow, read_retries))
    }

    pub fn with_provider(provider: DynProvider<Ethereum>, escrow: Address, read_retries: u32) -> Self {
        Self {
            provider,
            escrow,
            read_retries,
        }
    }

    pub fn provider(&self) -> &DynProvider<Ethereum> {
        &self.provider
    }

    fn escrow(&self) -> IEscrow::IEscrowInstance<DynProvider<Ethereum>> {
        IEscrow::new(self.escrow, self.provider.clone())
    }

    fn token(&self, token: Address) -> IERC20::IERC20Instance<DynProvider<Ethereum>> {
        IERC20::new(token, self.provider.clone())
    }

    async fn confirm(&self, pending: PendingTransactionBuilder<Ethereum>) -> Result<TxReceipt> {
        let tx_hash = *pending.tx_hash();
        debug!(tx_hash = %tx_hash, "transaction sent, waiting for receipt");
        let receipt = pending.get_receipt().await.map_err(tx_err)?;
        if !receipt.status() {
            return Err(EscrowError::Reverted(tx_hash));
        }
        debug!(tx_hash = %tx_hash, block = ?receipt.block_number, "transaction confirmed");
        Ok(TxReceipt {
            tx_hash,
            block_number: receipt.block_number,
        })
    }
}

fn parse_url(rpc_url: &str) -> Result<reqwest::Url> {
    rpc_url
        .parse()
        .map_err(|e| EscrowError::Rpc(format!("Invalid RPC URL: {}", e)))
}

fn rpc_err<E: std::fmt::Display>(e: E) -> EscrowError {
    EscrowError::Rpc(e.to_string())
}

fn tx_err<E: std::fmt::Display>(e: E) -> EscrowError {
    EscrowError::Transaction(e.to_string())
}

#[async_trait]
impl EscrowChain for RpcChain {
    fn escrow_address(&self) -> Address {
        self.escrow
    }

    async fn chain_id(&self) -> Result<u64> {
        self.provider.get_chain_id().await.map_err(rpc_err)
    }

    async fn get_operation(&self, id: U256) -> Result<Operation> {
        let escrow = self.escrow();
        retry(self.read_retries, RETRY_BASE_DELAY_MS, || async {
            let op = escrow.getOperation(id).call().await.map_err(rpc_err)?;
            Ok(Operation::from(op))
        })
        .await
    }

    async fn get_all_operations(&self) -> Result<Vec<Operation>> {
        let escrow = self.escrow();
        retry(self.read_retries, RETRY_BASE_DELAY_MS, || async {
            let ops = escrow.getAllOperations().call().await.map_err(rpc_err)?;
            Ok(ops.into_iter().map(Operation::from).collect())
        })
        .await
    }

    async fn get_allowed_tokens(&self) -> Result<Vec<Address>> {
        let escrow = self.escrow();
        retry(self.read_retries, RETRY_BASE_DELAY_MS, || async {
            escrow.getAllowedTokens().call().await.map_err(rpc_err)
        })
        .await
    }

    async fn token_symbol(&self, token: Address) -> Result<String> {
        let erc20 = self.token(token);
        retry(self.read_retries, RETRY_BASE_DELAY_MS, || async {
            erc20.symbol().call().await.map_err(rpc_err)
        })
        .await
    }

    async fn token_name(&self, token: Address) -> Result<String> {
        let erc20 = self.token(token);
        retry(self.read_retries, RETRY_BASE_DELAY_MS, || async {
            erc20.name().call().await.map_err(rpc_err)
        })
        .await
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256> {
        let erc20 = self.token(token);
        retry(self.read_retries, RETRY_BASE_DELAY_MS, || async {
            erc20.balanceOf(owner).call().await.map_err(rpc_err)
        })
        .await
    }

    async fn native_balance(&self, owner: Address) -> Result<U256> {
        retry(self.read_retries, RETRY_BASE_DELAY_MS, || async {
            self.provider.get_balance(owner).await.map_err(rpc_err)
        })
        .await
    }

    async fn approve(&self, from: Address, token: Address, amount: U256) -> Result<TxReceipt> {
        let pending = self
            .token(token)
            .approve(self.escrow, amount)
            .from(from)
            .send()
            .await
            .map_err(tx_err)?;
        self.confirm(pending).await
    }

    async fn create_operation(
        &self,
        from: Address,
        token_a: Address,
        token_b: Address,
        amount_a: U256,
        amount_b: U256,
    ) -> Result<TxReceipt> {
        let pending = self
            .escrow()
            .createOperation(token_a, token_b, amount_a, amount_b)
            .from(from)
            .send()
            .await
            .map_err(tx_err)?;
        self.confirm(pending).await
    }

    async fn complete_operation(&self, from: Address, id: U256) -> Result<TxReceipt> {
        let pending = self
            .escrow()
            .completeOperation(id)
            .from(from)
            .send()
            .await
            .map_err(tx_err)?;
        self.confirm(pending).await
    }

    async fn cancel_operation(&self, from: Address, id: U256) -> Result<TxReceipt> {
        let pending = self
            .escrow()
            .cancelOperation(id)
            .from(from)
            .send()
            .await
            .map_err(tx_err)?;
        self.confirm(pending).await
    }

    async fn add_token(&self, from: Address, token: Address) -> Result<TxReceipt> {
        let pending = self
            .escrow()
            .addToken(token)
            .from(from)
            .send()
            .await
            .map_err(tx_err)?;
        self.confirm(pending).await
    }
}
