//! Wallet connection state for one client session.
//!
//! A `Session` owns the current account and chain id and publishes every
//! change on a `watch` channel. Components hold an `Arc<Session>` instead of
//! reaching for global state. A chain change is terminal: the session
//! disposes itself and asks the owner to rebuild everything bound to the old
//! chain.

use alloy::primitives::Address;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::error::{EscrowError, Result};
use crate::wallet::{Wallet, WalletEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected { account: Address, chain_id: u64 },
}

impl ConnectionState {
    pub fn account(&self) -> Option<Address> {
        match self {
            ConnectionState::Connected { account, .. } => Some(*account),
            ConnectionState::Disconnected => None,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected { .. })
    }
}

/// What the owner of a session must do after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSignal {
    /// State updated in place.
    Continue,
    /// The chain changed. Everything built on this session must be dropped
    /// and recreated.
    Reload,
}

pub struct Session {
    wallet: Option<Arc<dyn Wallet>>,
    state: watch::Sender<ConnectionState>,
}

impl Session {
    /// `None` means no wallet is available in this environment.
    pub fn new(wallet: Option<Arc<dyn Wallet>>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self { wallet, state }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn account(&self) -> Option<Address> {
        self.state().account()
    }

    /// Account that will sign writes, or `NotConnected`.
    pub fn require_account(&self) -> Result<Address> {
        self.account().ok_or(EscrowError::NotConnected)
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    fn wallet(&self) -> Result<&Arc<dyn Wallet>> {
        self.wallet.as_ref().ok_or(EscrowError::WalletUnavailable)
    }

    /// Restore a previous authorization without prompting.
    ///
    /// Leaves the session disconnected when nothing is authorized or the
    /// wallet cannot be reached.
    pub async fn init(&self) -> ConnectionState {
        let Some(wallet) = self.wallet.as_ref() else {
            return self.state();
        };
        let restored = async {
            let accounts = wallet.authorized_accounts().await?;
            let Some(first) = accounts.first().copied() else {
                return Ok(None);
            };
            let chain_id = wallet.chain_id().await?;
            Ok::<_, EscrowError>(Some((first, chain_id)))
        }
        .await;

        match restored {
            Ok(Some((account, chain_id))) => {
                info!(account = %account, chain_id, "Restored wallet session");
                self.set(ConnectionState::Connected { account, chain_id });
            }
            Ok(None) => debug!("No authorized accounts, staying disconnected"),
            Err(e) => error!(error = %e, "Error checking wallet connection"),
        }
        self.state()
    }

    /// Explicitly request authorization from the wallet.
    pub async fn connect(&self) -> Result<Address> {
        let wallet = self.wallet()?;
        let accounts = wallet.request_accounts().await?;
        let account = accounts.first().copied().ok_or(EscrowError::NotConnected)?;
        let chain_id = wallet.chain_id().await?;
        info!(account = %account, chain_id, "Wallet connected");
        self.set(ConnectionState::Connected { account, chain_id });
        Ok(account)
    }

    pub fn disconnect(&self) {
        if self.state().is_connected() {
            info!("Wallet disconnected");
        }
        self.set(ConnectionState::Disconnected);
    }

    /// Clear all state. Subscribers observe `Disconnected` as the final value.
    pub fn dispose(&self) {
        self.set(ConnectionState::Disconnected);
    }

    pub fn handle_event(&self, event: WalletEvent) -> SessionSignal {
        match event {
            WalletEvent::AccountsChanged(accounts) => {
                match (accounts.first().copied(), self.state()) {
                    (None, _) => self.disconnect(),
                    (Some(account), ConnectionState::Connected { chain_id, .. }) => {
                        info!(account = %account, "Wallet account changed");
                        self.set(ConnectionState::Connected { account, chain_id });
                    }
                    (Some(account), ConnectionState::Disconnected) => {
                        // An account list change does not authorize a disconnected session.
                        debug!(account = %account, "Account change ignored while disconnected");
                    }
                }
                SessionSignal::Continue
            }
            WalletEvent::ChainChanged(chain_id) => {
                warn!(chain_id, "Chain changed, session must be reloaded");
                self.dispose();
                SessionSignal::Reload
            }
        }
    }

    /// Apply wallet events until the chain changes or the sender goes away.
    pub async fn run(&self, mut events: mpsc::Receiver<WalletEvent>) -> SessionSignal {
        while let Some(event) = events.recv().await {
            if self.handle_event(event) == SessionSignal::Reload {
                return SessionSignal::Reload;
            }
        }
        SessionSignal::Continue
    }

    fn set(&self, next: ConnectionState) {
        self.state.send_replace(next);
    }
}
