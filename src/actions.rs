use alloy::primitives::{Address, U256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::chain::{EscrowChain, TxReceipt};
use crate::error::{EscrowError, Result};
use crate::form::CreateOperationForm;
use crate::operations::{check_cancel, check_complete, OperationBook};
use crate::registry::TokenRegistry;
use crate::saga::ApprovalSaga;
use crate::session::{ConnectionState, Session};

/// Write path for one session.
///
/// Resolves the signing account from the session, runs the client-side
/// checks, submits, and re-reads the affected lists afterwards. Only one
/// write may be in flight at a time.
pub struct EscrowActions {
    chain: Arc<dyn EscrowChain>,
    session: Arc<Session>,
    book: Arc<OperationBook>,
    registry: Arc<TokenRegistry>,
    pending: AtomicBool,
}

struct PendingGuard<'a>(&'a AtomicBool);

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl EscrowActions {
    pub fn new(
        chain: Arc<dyn EscrowChain>,
        session: Arc<Session>,
        book: Arc<OperationBook>,
        registry: Arc<TokenRegistry>,
    ) -> Self {
        Self {
            chain,
            session,
            book,
            registry,
            pending: AtomicBool::new(false),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    fn begin(&self) -> Result<PendingGuard<'_>> {
        self.pending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| EscrowError::Busy)?;
        Ok(PendingGuard(&self.pending))
    }

    /// Connected account, provided the wallet is still on the node's chain.
    async fn signer(&self) -> Result<Address> {
        let ConnectionState::Connected { account, chain_id } = self.session.state() else {
            return Err(EscrowError::NotConnected);
        };
        let node_chain = self.chain.chain_id().await?;
        if node_chain != chain_id {
            warn!(wallet = chain_id, node = node_chain, "Wallet and node are on different chains");
            return Err(EscrowError::ChainChanged);
        }
        Ok(account)
    }

    /// Validate the form and build the approve-then-create saga.
    pub async fn prepare_create(&self, form: &CreateOperationForm) -> Result<ApprovalSaga> {
        let from = self.signer().await?;
        let request = form.parse(&self.registry.cached())?;
        Ok(ApprovalSaga::create(from, &request))
    }

    /// Re-read the operation and build the approve-then-complete saga.
    pub async fn prepare_complete(&self, id: U256) -> Result<ApprovalSaga> {
        let from = self.signer().await?;
        let op = self.book.fetch(id).await?;
        check_complete(&op, from)?;
        Ok(ApprovalSaga::complete(from, &op))
    }

    /// Run (or resume) a saga. On failure the saga keeps its progress and can
    /// be passed here again.
    pub async fn execute(&self, saga: &mut ApprovalSaga) -> Result<TxReceipt> {
        let account = self.signer().await?;
        if account != saga.from() {
            return Err(EscrowError::InvalidInput(format!(
                "pending transaction belongs to {}, connected account is {}",
                saga.from(),
                account
            )));
        }
        let _guard = self.begin()?;
        let result = saga.run(self.chain.as_ref()).await;
        self.book.refresh().await;
        result
    }

    pub async fn create(&self, form: &CreateOperationForm) -> Result<TxReceipt> {
        let mut saga = self.prepare_create(form).await?;
        self.execute(&mut saga).await
    }

    pub async fn complete(&self, id: U256) -> Result<TxReceipt> {
        let mut saga = self.prepare_complete(id).await?;
        self.execute(&mut saga).await
    }

    pub async fn cancel(&self, id: U256) -> Result<TxReceipt> {
        let from = self.signer().await?;
        let op = self.book.fetch(id).await?;
        check_cancel(&op, from)?;

        let _guard = self.begin()?;
        info!(operation = %id, "Cancelling operation");
        let result = self.chain.cancel_operation(from, id).await;
        if let Err(e) = &result {
            warn!(operation = %id, error = %e, "Cancel failed");
        }
        self.book.refresh().await;
        result
    }

    pub async fn add_token(&self, token: Address) -> Result<TxReceipt> {
        let from = self.signer().await?;
        let _guard = self.begin()?;
        self.registry.add_token(from, token).await
    }
}
