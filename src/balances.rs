//! Operator view of native and token balances.
//!
//! Rows: the escrow contract first, then a fixed list of known accounts
//! (the default local dev accounts). Every row lists every allow-listed
//! token, whether or not its reads succeed.

use alloy::primitives::{address, Address};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::chain::EscrowChain;
use crate::models::{AccountBalances, TokenBalance, UNKNOWN_SYMBOL};
use crate::registry::normalize;
use crate::utils::{format_amount_fixed, short_address};

pub const ESCROW_LABEL: &str = "Escrow Contract";

pub const KNOWN_ACCOUNTS: [(Address, &str); 3] = [
    (address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266"), "Account #0"),
    (address!("70997970C51812dc3A010C7d01b50e0d17dc79C8"), "Account #1"),
    (address!("3C44CdDdB6a900fa2b585dd299e03d12FA4293BC"), "Account #2"),
];

pub struct BalanceInspector {
    chain: Arc<dyn EscrowChain>,
    accounts: Vec<(Address, String)>,
}

impl BalanceInspector {
    pub fn new(chain: Arc<dyn EscrowChain>) -> Self {
        let accounts = KNOWN_ACCOUNTS
            .iter()
            .map(|(a, label)| (*a, label.to_string()))
            .collect();
        Self::with_accounts(chain, accounts)
    }

    pub fn with_accounts(chain: Arc<dyn EscrowChain>, accounts: Vec<(Address, String)>) -> Self {
        Self { chain, accounts }
    }

    pub async fn load(&self) -> Vec<AccountBalances> {
        let tokens = match self.chain.get_allowed_tokens().await {
            Ok(t) => normalize(t),
            Err(e) => {
                warn!(error = %e, "Error fetching allowed tokens for balances");
                Vec::new()
            }
        };

        // Symbols once per token rather than once per row.
        let symbols: Vec<String> = join_all(tokens.iter().map(|t| async move {
            match self.chain.token_symbol(*t).await {
                Ok(s) => s,
                Err(e) => {
                    warn!(token = %t, error = %e, "Error loading token symbol");
                    UNKNOWN_SYMBOL.to_string()
                }
            }
        }))
        .await;

        let escrow = self.chain.escrow_address();
        let rows = std::iter::once((escrow, ESCROW_LABEL.to_string()))
            .chain(self.accounts.iter().cloned());

        let balances = join_all(rows.map(|(account, label)| {
            let tokens = &tokens;
            let symbols = &symbols;
            async move { self.load_row(account, label, tokens, symbols).await }
        }))
        .await;

        debug!(rows = balances.len(), tokens = tokens.len(), "Balances loaded");
        balances
    }

    async fn load_row(
        &self,
        account: Address,
        label: String,
        tokens: &[Address],
        symbols: &[String],
    ) -> AccountBalances {
        let native = self.chain.native_balance(account);
        let token_reads = join_all(tokens.iter().zip(symbols).map(|(token, symbol)| async move {
            let balance = match self.chain.token_balance(*token, account).await {
                Ok(b) => Some(b),
                Err(e) => {
                    warn!(token = %token, account = %account, error = %e, "Error loading token balance");
                    None
                }
            };
            TokenBalance {
                token: *token,
                symbol: symbol.clone(),
                balance,
            }
        }));

        let (native, tokens) = futures::join!(native, token_reads);
        let native = match native {
            Ok(n) => Some(n),
            Err(e) => {
                warn!(account = %account, error = %e, "Error loading native balance");
                None
            }
        };

        AccountBalances {
            label,
            account,
            native,
            tokens,
        }
    }
}

/// Plain-text table of the inspector output.
pub fn render(rows: &[AccountBalances]) -> String {
    let mut out = String::new();
    for row in rows {
        out.push_str(&format!("{}\n  {}\n", row.label, row.account));
        let eth = row
            .native
            .map(|n| format_amount_fixed(n, 4))
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!("  {:<8} {:>24}\n", "ETH", eth));
        for t in &row.tokens {
            let balance = t
                .balance
                .map(|b| format_amount_fixed(b, 2))
                .unwrap_or_else(|| "-".to_string());
            out.push_str(&format!(
                "  {:<8} {:>24}  {}\n",
                t.symbol,
                balance,
                short_address(&t.token)
            ));
        }
        if row.tokens.is_empty() {
            out.push_str("  No tokens loaded\n");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::memory::MemoryChain;
    use alloy::primitives::U256;

    const ESCROW: Address = address!("9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0");
    const TKA: Address = address!("5FbDB2315678afecb367f032d93F642f64180aa3");
    const TKB: Address = address!("e7f1725E7734CE288F8367e1Bb143E90bb3F0512");

    fn chain() -> MemoryChain {
        let chain = MemoryChain::new(ESCROW, KNOWN_ACCOUNTS[0].0)
            .with_token(TKA, "TKA", "Token A")
            .with_token(TKB, "TKB", "Token B");
        chain.mint(TKA, KNOWN_ACCOUNTS[1].0, U256::from(5u64));
        chain.set_native(KNOWN_ACCOUNTS[0].0, U256::from(10_000u64));
        chain
    }

    #[tokio::test]
    async fn test_one_row_per_account_one_entry_per_token() {
        let chain = chain();
        chain.fail_balances(TKB);
        let rows = BalanceInspector::new(Arc::new(chain)).load().await;

        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].label, ESCROW_LABEL);
        assert_eq!(rows[0].account, ESCROW);
        assert_eq!(rows[1].label, "Account #0");
        assert_eq!(rows[1].native, Some(U256::from(10_000u64)));

        for row in &rows {
            assert_eq!(row.tokens.len(), 2);
            assert_eq!(row.tokens[0].token, TKA);
            assert_eq!(row.token(&TKB).map(|t| t.balance), Some(None));
        }
        assert_eq!(rows[2].token(&TKA).and_then(|t| t.balance), Some(U256::from(5u64)));
    }

    #[tokio::test]
    async fn test_duplicate_allow_list_entry_listed_once() {
        let chain = chain().with_token(TKA, "TKA", "Token A");
        let rows = BalanceInspector::new(Arc::new(chain)).load().await;
        for row in &rows {
            assert_eq!(row.tokens.len(), 2);
            assert_eq!(row.tokens.iter().filter(|t| t.token == TKA).count(), 1);
        }
    }

    #[tokio::test]
    async fn test_symbol_failure_keeps_entry() {
        let chain = chain();
        chain.fail_metadata(TKA);
        let rows = BalanceInspector::new(Arc::new(chain)).load().await;
        assert!(rows.iter().all(|r| r.tokens.len() == 2));
        assert_eq!(rows[0].tokens[0].symbol, UNKNOWN_SYMBOL);
    }

    #[tokio::test]
    async fn test_no_tokens_still_lists_accounts() {
        let chain = chain();
        chain.fail_allowed_tokens();
        let rows = BalanceInspector::new(Arc::new(chain)).load().await;
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|r| r.tokens.is_empty()));
        assert!(render(&rows).contains("No tokens loaded"));
    }
}
