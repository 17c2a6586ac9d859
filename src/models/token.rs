use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

pub const UNKNOWN_SYMBOL: &str = "???";
pub const UNKNOWN_NAME: &str = "Unknown Token";

/// An allow-listed token with its display metadata.
///
/// Resolved client-side from the token contract; not authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub address: Address,
    pub symbol: String,
    pub name: String,
}

impl TokenInfo {
    pub fn new(address: Address, symbol: &str, name: &str) -> Self {
        Self {
            address,
            symbol: symbol.to_string(),
            name: name.to_string(),
        }
    }

    /// Entry shown when the token contract could not be queried.
    pub fn placeholder(address: Address) -> Self {
        Self::new(address, UNKNOWN_SYMBOL, UNKNOWN_NAME)
    }

    pub fn is_placeholder(&self) -> bool {
        self.symbol == UNKNOWN_SYMBOL && self.name == UNKNOWN_NAME
    }

    /// `SYM - 0x5FbD...0aa3`, the label used in token pickers.
    pub fn label(&self) -> String {
        format!(
            "{} - {}",
            self.symbol,
            crate::utils::short_address(&self.address)
        )
    }
}
