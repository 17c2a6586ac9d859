//! # escrow-dapp-rs
//!
//! Client for a single ERC20 escrow contract on an EVM chain. Users post
//! "give X of token A, want Y of token B" offers; any other account can fill
//! an active offer, and its creator can cancel it.
//!
//! ## Components
//!
//! | Component | Role |
//! |-----------|------|
//! | `Session` | Wallet connection state, silent restore, account/chain events |
//! | `TokenRegistry` | Allow-listed tokens with symbol/name, admin token listing |
//! | `OperationBook` | Polled operation snapshot, per-account action gating |
//! | `EscrowActions` | Create, complete and cancel, with approve-then-act sagas |
//! | `BalanceInspector` | Native and token balances for the escrow and dev accounts |
//! | `ApiServer` | `GET /api/operation/{id}` read endpoint |
//!
//! All chain access goes through the [`EscrowChain`] trait; [`RpcChain`] is
//! the JSON-RPC implementation.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use escrow_dapp_rs::{EscrowApp, EscrowConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EscrowConfig::from_env()?;
//!     let app = EscrowApp::from_config(&config)?;
//!     app.init().await;
//!
//!     for op in app.book.snapshot() {
//!         println!("#{} {:?}", op.id, op.status());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! # List operations, refreshing every POLL_INTERVAL_MS
//! cargo run --release -- operations --watch
//!
//! # Offer 1.5 of token A for 2 of token B
//! cargo run --release -- create <token_a> 1.5 <token_b> 2
//!
//! # Serve the read API on API_HOST:API_PORT
//! cargo run --release -- serve
//! ```

pub mod actions;
pub mod app;
pub mod balances;
pub mod cache;
pub mod chain;
pub mod config;
pub mod contracts;
pub mod error;
pub mod form;
pub mod models;
pub mod operations;
pub mod registry;
pub mod saga;
pub mod server;
pub mod session;
pub mod utils;
pub mod wallet;

pub use actions::EscrowActions;
pub use app::EscrowApp;
pub use balances::BalanceInspector;
pub use cache::{load_from_file, save_to_file};
pub use chain::{EscrowChain, RpcChain, TxReceipt};
pub use config::{ApiConfig, EscrowConfig};
pub use error::{EscrowError, Rejection, Result};
pub use form::{CreateOperationForm, CreateRequest};
pub use models::{AccountBalances, Operation, OperationStatus, OperationView, TokenInfo};
pub use operations::{OperationBook, OperationCard};
pub use registry::TokenRegistry;
pub use saga::{ApprovalSaga, SagaStep};
pub use server::ApiServer;
pub use session::{ConnectionState, Session, SessionSignal};
pub use wallet::{KeyWallet, RpcWallet, Wallet, WalletWatcher};
