use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use crate::actions::EscrowActions;
use crate::balances::BalanceInspector;
use crate::chain::{EscrowChain, RpcChain};
use crate::config::EscrowConfig;
use crate::error::Result;
use crate::operations::OperationBook;
use crate::registry::TokenRegistry;
use crate::session::{Session, SessionSignal};
use crate::wallet::{KeyWallet, RpcWallet, Wallet, WalletWatcher};

/// Everything bound to one chain connection.
///
/// Built once per session. When the wallet switches chains the whole value is
/// dropped and built again.
pub struct EscrowApp {
    pub chain: Arc<dyn EscrowChain>,
    pub wallet: Option<Arc<dyn Wallet>>,
    pub session: Arc<Session>,
    pub registry: Arc<TokenRegistry>,
    pub book: Arc<OperationBook>,
    pub actions: EscrowActions,
    pub balances: BalanceInspector,
    shutdown: Arc<AtomicBool>,
}

impl EscrowApp {
    pub fn from_config(config: &EscrowConfig) -> Result<Self> {
        let (chain, wallet): (RpcChain, Arc<dyn Wallet>) = match &config.private_key {
            Some(key) => {
                let signer = KeyWallet::parse_signer(key)?;
                let chain = RpcChain::connect_with_signer(
                    &config.rpc_url,
                    config.escrow_address,
                    signer.clone(),
                    config.read_retries,
                )?;
                let wallet = KeyWallet::new(&signer, chain.provider().clone());
                (chain, Arc::new(wallet))
            }
            None => {
                let chain = RpcChain::connect(&config.rpc_url, config.escrow_address, config.read_retries)?;
                let wallet = RpcWallet::new(chain.provider().clone());
                (chain, Arc::new(wallet))
            }
        };
        Ok(Self::with_parts(Arc::new(chain), Some(wallet)))
    }

    pub fn with_parts(chain: Arc<dyn EscrowChain>, wallet: Option<Arc<dyn Wallet>>) -> Self {
        let session = Arc::new(Session::new(wallet.clone()));
        let registry = Arc::new(TokenRegistry::new(chain.clone()));
        let book = Arc::new(OperationBook::new(chain.clone()));
        let actions = EscrowActions::new(chain.clone(), session.clone(), book.clone(), registry.clone());
        let balances = BalanceInspector::new(chain.clone());
        Self {
            chain,
            wallet,
            session,
            registry,
            book,
            actions,
            balances,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Silent wallet restore plus the first read of tokens and operations.
    pub async fn init(&self) {
        let state = self.session.init().await;
        let (tokens, operations) = futures::join!(
            self.registry.list_allowed_tokens(),
            self.book.refresh()
        );
        info!(
            connected = state.is_connected(),
            tokens = tokens.len(),
            operations = operations.len(),
            "Escrow client initialized"
        );
    }

    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Start watching the wallet. Returns once the chain changes (`Reload`) or
    /// the app is disposed (`Continue`).
    pub async fn watch_wallet(&self, period: std::time::Duration) -> SessionSignal {
        let Some(wallet) = self.wallet.clone() else {
            return SessionSignal::Continue;
        };
        let (tx, rx) = mpsc::channel(16);
        let watcher = WalletWatcher::new(wallet, period, self.shutdown.clone())
            .starting_from(self.session.state());
        let handle = tokio::spawn(watcher.run(tx));
        let signal = self.session.run(rx).await;
        handle.abort();
        signal
    }

    /// Stop pollers and clear the session.
    pub fn dispose(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        self.session.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::memory::MemoryChain;
    use crate::wallet::tests::StaticWallet;
    use alloy::primitives::{address, Address};
    use std::time::Duration;

    const ESCROW: Address = address!("9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0");
    const ALICE: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
    const TKA: Address = address!("5FbDB2315678afecb367f032d93F642f64180aa3");

    #[tokio::test]
    async fn test_init_loads_session_and_tokens() {
        let chain = Arc::new(MemoryChain::new(ESCROW, ALICE).with_token(TKA, "TKA", "Token A"));
        let wallet: Arc<dyn Wallet> = Arc::new(StaticWallet::new(vec![ALICE], vec![]));
        let app = EscrowApp::with_parts(chain, Some(wallet));
        app.init().await;

        assert_eq!(app.session.account(), Some(ALICE));
        assert_eq!(app.registry.cached().len(), 1);
        assert!(app.book.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_chain_switch_ends_watch_with_reload() {
        let chain = Arc::new(MemoryChain::new(ESCROW, ALICE));
        let wallet = Arc::new(StaticWallet::new(vec![ALICE], vec![]));
        let dyn_wallet: Arc<dyn Wallet> = wallet.clone();
        let app = EscrowApp::with_parts(chain, Some(dyn_wallet));
        app.init().await;

        let switch = {
            let wallet = wallet.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                *wallet.chain.lock().unwrap() = 1;
            }
        };
        let (signal, _) = tokio::join!(app.watch_wallet(Duration::from_millis(5)), switch);
        assert_eq!(signal, SessionSignal::Reload);
        assert!(!app.session.state().is_connected());
        app.dispose();
        assert!(app.shutdown_flag().load(Ordering::Relaxed));
    }

    #[test]
    fn test_from_config_rejects_bad_key() {
        let config = EscrowConfig {
            rpc_url: "http://localhost:8545".to_string(),
            escrow_address: ESCROW,
            private_key: Some("0x1234".to_string()),
            poll_interval_ms: 5_000,
            wallet_poll_ms: 1_000,
            read_retries: 0,
            api: crate::config::ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors_enabled: false,
            },
        };
        assert!(EscrowApp::from_config(&config).is_err());
    }
}
