use alloy::network::Ethereum;
use alloy::primitives::Address;
use alloy::providers::{DynProvider, Provider};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::{EscrowError, Result};
use crate::session::ConnectionState;

/// Notifications a wallet fires on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    AccountsChanged(Vec<Address>),
    ChainChanged(u64),
}

/// Account authority for a session.
#[async_trait]
pub trait Wallet: Send + Sync {
    /// Accounts already authorized for this client. Never prompts.
    async fn authorized_accounts(&self) -> Result<Vec<Address>>;

    /// Ask the wallet for authorization. May prompt the user.
    async fn request_accounts(&self) -> Result<Vec<Address>>;

    async fn chain_id(&self) -> Result<u64>;
}

/// Node-managed accounts (`eth_accounts`); the node signs for them.
pub struct RpcWallet {
    provider: DynProvider<Ethereum>,
}

impl RpcWallet {
    pub fn new(provider: DynProvider<Ethereum>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Wallet for RpcWallet {
    async fn authorized_accounts(&self) -> Result<Vec<Address>> {
        self.provider
            .get_accounts()
            .await
            .map_err(|e| EscrowError::Rpc(e.to_string()))
    }

    async fn request_accounts(&self) -> Result<Vec<Address>> {
        let requested: std::result::Result<Vec<Address>, _> = self
            .provider
            .raw_request("eth_requestAccounts".into(), Vec::<String>::new())
            .await;
        match requested {
            Ok(accounts) => Ok(accounts),
            Err(e) => {
                // Plain nodes do not implement the prompting call.
                debug!(error = %e, "eth_requestAccounts unsupported, falling back to eth_accounts");
                self.authorized_accounts().await
            }
        }
    }

    async fn chain_id(&self) -> Result<u64> {
        self.provider
            .get_chain_id()
            .await
            .map_err(|e| EscrowError::Rpc(e.to_string()))
    }
}

/// A single local private key. Its only account is its own address.
pub struct KeyWallet {
    address: Address,
    provider: DynProvider<Ethereum>,
}

impl KeyWallet {
    pub fn new(signer: &PrivateKeySigner, provider: DynProvider<Ethereum>) -> Self {
        Self {
            address: signer.address(),
            provider,
        }
    }

    pub fn parse_signer(private_key: &str) -> Result<PrivateKeySigner> {
        let bytes = hex::decode(private_key.trim().trim_start_matches("0x"))
            .map_err(|e| EscrowError::InvalidInput(format!("private key is not hex: {}", e)))?;
        PrivateKeySigner::from_slice(&bytes)
            .map_err(|e| EscrowError::InvalidInput(format!("invalid private key: {}", e)))
    }
}

#[async_trait]
impl Wallet for KeyWallet {
    async fn authorized_accounts(&self) -> Result<Vec<Address>> {
        Ok(vec![self.address])
    }

    async fn request_accounts(&self) -> Result<Vec<Address>> {
        Ok(vec![self.address])
    }

    async fn chain_id(&self) -> Result<u64> {
        self.provider
            .get_chain_id()
            .await
            .map_err(|e| EscrowError::Rpc(e.to_string()))
    }
}

/// Polls a wallet and turns changes in its account list or chain id into
/// `WalletEvent`s.
pub struct WalletWatcher {
    wallet: Arc<dyn Wallet>,
    period: Duration,
    shutdown: Arc<AtomicBool>,
    last_accounts: Option<Vec<Address>>,
    last_chain: Option<u64>,
}

impl WalletWatcher {
    pub fn new(wallet: Arc<dyn Wallet>, period: Duration, shutdown: Arc<AtomicBool>) -> Self {
        Self {
            wallet,
            period,
            shutdown,
            last_accounts: None,
            last_chain: None,
        }
    }

    /// Compare the first poll against what the session already knows, so a
    /// switch made before the watcher started is still reported.
    pub fn starting_from(mut self, state: ConnectionState) -> Self {
        if let ConnectionState::Connected { account, chain_id } = state {
            self.last_accounts = Some(vec![account]);
            self.last_chain = Some(chain_id);
        }
        self
    }

    /// Run until shutdown or until the receiver is dropped.
    pub async fn run(mut self, events: mpsc::Sender<WalletEvent>) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut last_accounts = self.last_accounts.take();
        let mut last_chain = self.last_chain.take();

        info!(period_ms = self.period.as_millis() as u64, "Watching wallet for account and chain changes");

        loop {
            ticker.tick().await;
            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }

            let (accounts, chain) = self.observe().await;

            if let Some(chain) = chain {
                if last_chain.is_some_and(|prev| prev != chain) {
                    if events.send(WalletEvent::ChainChanged(chain)).await.is_err() {
                        break;
                    }
                }
                last_chain = Some(chain);
            }

            if let Some(accounts) = accounts {
                if last_accounts.as_ref().is_some_and(|prev| prev != &accounts) {
                    let event = WalletEvent::AccountsChanged(accounts.clone());
                    if events.send(event).await.is_err() {
                        break;
                    }
                }
                last_accounts = Some(accounts);
            }
        }
        debug!("Wallet watcher stopped");
    }

    async fn observe(&self) -> (Option<Vec<Address>>, Option<u64>) {
        let accounts = match self.wallet.authorized_accounts().await {
            Ok(a) => Some(a),
            Err(e) => {
                warn!(error = %e, "Failed to read wallet accounts");
                None
            }
        };
        let chain = match self.wallet.chain_id().await {
            Ok(c) => Some(c),
            Err(e) => {
                warn!(error = %e, "Failed to read chain id");
                None
            }
        };
        (accounts, chain)
    }
}
