use alloy::primitives::{B256, U256};
use thiserror::Error;

/// Reasons the client refuses to submit a write before it reaches the chain.
///
/// These mirror the contract's own checks. The contract remains the final
/// authority: passing a pre-check does not mean the transaction will succeed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("operation {0} is not active")]
    NotActive(U256),

    #[error("the creator cannot complete their own operation {0}")]
    CreatorCannotComplete(U256),

    #[error("only the creator can cancel operation {0}")]
    NotCreator(U256),

    #[error("token A and token B must differ")]
    SameToken,

    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("token {0} is not allow-listed")]
    TokenNotAllowed(String),
}

#[derive(Error, Debug)]
pub enum EscrowError {
    #[error("No wallet available, please install a wallet")]
    WalletUnavailable,

    #[error("Wallet not connected")]
    NotConnected,

    #[error("Rejected before submission: {0}")]
    Rejected(#[from] Rejection),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),

    #[error("Transaction {0} reverted")]
    Reverted(B256),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Another transaction is still pending")]
    Busy,

    #[error("Chain changed, state must be reloaded")]
    ChainChanged,

    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EscrowError {
    /// The message shown next to the control that triggered a failed write.
    pub fn user_message(&self) -> String {
        match self {
            EscrowError::Transaction(msg) if !msg.is_empty() => msg.clone(),
            EscrowError::Transaction(_) => "Transaction failed".to_string(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EscrowError>;
