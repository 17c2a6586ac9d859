use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::models::Operation;

#[cfg(test)]
pub mod memory;
pub mod rpc;

pub use rpc::RpcChain;

/// A confirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxReceipt {
    pub tx_hash: B256,
    pub block_number: Option<u64>,
}

/// Every contract and node call the client makes.
///
/// Reads never mutate. Writes resolve only once the transaction is confirmed
/// and fail with `Transaction`/`Reverted` when the chain refuses them.
#[async_trait]
pub trait EscrowChain: Send + Sync {
    fn escrow_address(&self) -> Address;

    async fn chain_id(&self) -> Result<u64>;

    async fn get_operation(&self, id: U256) -> Result<Operation>;

    async fn get_all_operations(&self) -> Result<Vec<Operation>>;

    async fn get_allowed_tokens(&self) -> Result<Vec<Address>>;

    async fn token_symbol(&self, token: Address) -> Result<String>;

    async fn token_name(&self, token: Address) -> Result<String>;

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256>;

    async fn native_balance(&self, owner: Address) -> Result<U256>;

    /// Let the escrow contract move `amount` of `token` on behalf of `from`.
    async fn approve(&self, from: Address, token: Address, amount: U256) -> Result<TxReceipt>;

    async fn create_operation(
        &self,
        from: Address,
        token_a: Address,
        token_b: Address,
        amount_a: U256,
        amount_b: U256,
    ) -> Result<TxReceipt>;

    async fn complete_operation(&self, from: Address, id: U256) -> Result<TxReceipt>;

    async fn cancel_operation(&self, from: Address, id: U256) -> Result<TxReceipt>;

    async fn add_token(&self, from: Address, token: Address) -> Result<TxReceipt>;
}
