use alloy::primitives::{Address, U256};
use serde::Serialize;

/// One token balance for one account. `None` means the read failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenBalance {
    pub token: Address,
    pub symbol: String,
    pub balance: Option<U256>,
}

/// A row of the balance inspector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountBalances {
    pub label: String,
    pub account: Address,
    pub native: Option<U256>,
    pub tokens: Vec<TokenBalance>,
}

impl AccountBalances {
    pub fn token(&self, token: &Address) -> Option<&TokenBalance> {
        self.tokens.iter().find(|t| &t.token == token)
    }
}
