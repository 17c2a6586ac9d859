use alloy::primitives::Address;
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

use crate::chain::{EscrowChain, TxReceipt};
use crate::error::Result;
use crate::models::TokenInfo;
use crate::utils::short_address;

/// Allow-listed tokens with resolved display metadata.
///
/// Holds the last resolved list; every refresh replaces it wholesale.
pub struct TokenRegistry {
    chain: Arc<dyn EscrowChain>,
    tokens: RwLock<Vec<TokenInfo>>,
}

impl TokenRegistry {
    pub fn new(chain: Arc<dyn EscrowChain>) -> Self {
        Self {
            chain,
            tokens: RwLock::new(Vec::new()),
        }
    }

    /// Read the allow-list and resolve every entry.
    ///
    /// A failing allow-list read yields an empty list. A token whose symbol or
    /// name cannot be read is kept with placeholder metadata.
    pub async fn list_allowed_tokens(&self) -> Vec<TokenInfo> {
        let addresses = match self.chain.get_allowed_tokens().await {
            Ok(a) => normalize(a),
            Err(e) => {
                warn!(error = %e, "No tokens yet or error fetching allowed tokens");
                Vec::new()
            }
        };
        debug!(count = addresses.len(), "Resolving allowed tokens");

        let resolved = join_all(addresses.into_iter().map(|addr| self.resolve(addr))).await;

        *self.tokens.write().unwrap_or_else(|e| e.into_inner()) = resolved.clone();
        resolved
    }

    async fn resolve(&self, address: Address) -> TokenInfo {
        let (symbol, name) = futures::join!(
            self.chain.token_symbol(address),
            self.chain.token_name(address)
        );
        match (symbol, name) {
            (Ok(symbol), Ok(name)) => TokenInfo { address, symbol, name },
            (Err(e), _) | (_, Err(e)) => {
                warn!(token = %address, error = %e, "Error loading token metadata");
                TokenInfo::placeholder(address)
            }
        }
    }

    /// Pre-fill the cache, e.g. from a snapshot saved by a previous run.
    /// The next `list_allowed_tokens` replaces it.
    pub fn seed(&self, tokens: Vec<TokenInfo>) {
        *self.tokens.write().unwrap_or_else(|e| e.into_inner()) = tokens;
    }

    /// Last resolved list, without touching the chain.
    pub fn cached(&self) -> Vec<TokenInfo> {
        self.tokens.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn is_allowed(&self, address: &Address) -> bool {
        self.cached().iter().any(|t| &t.address == address)
    }

    /// Display symbol for any token, allow-listed or not.
    ///
    /// Uses the cached entry when there is one, otherwise asks the token
    /// contract, otherwise falls back to the shortened address.
    pub async fn symbol_of(&self, address: Address) -> String {
        if let Some(t) = self
            .cached()
            .into_iter()
            .find(|t| t.address == address && !t.is_placeholder())
        {
            return t.symbol;
        }
        match self.chain.token_symbol(address).await {
            Ok(symbol) => symbol,
            Err(e) => {
                debug!(token = %address, error = %e, "Error loading symbol");
                short_address(&address)
            }
        }
    }

    /// Allow-list a token. The contract decides who may do this.
    pub async fn add_token(&self, from: Address, token: Address) -> Result<TxReceipt> {
        info!(token = %token, "Adding token");
        let receipt = self.chain.add_token(from, token).await?;
        info!(tx_hash = %receipt.tx_hash, "Token added");
        self.list_allowed_tokens().await;
        Ok(receipt)
    }
}

/// Drop duplicates while keeping the contract's order.
pub(crate) fn normalize(addresses: Vec<Address>) -> Vec<Address> {
    let mut seen = HashSet::new();
    addresses.into_iter().filter(|a| seen.insert(*a)).collect()
}
