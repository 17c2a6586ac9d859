//! Approve-then-act writes.
//!
//! Creating and completing an operation both need an ERC20 allowance first,
//! which is a separate transaction. The two are not atomic, so the saga keeps
//! track of how far it got: when the second transaction fails, the allowance
//! is already on chain and `run` picks up at the second step.

use alloy::primitives::{Address, U256};
use serde::Serialize;
use tracing::{info, warn};

use crate::chain::{EscrowChain, TxReceipt};
use crate::error::Result;
use crate::form::CreateRequest;
use crate::models::Operation;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SagaAction {
    Create {
        token_a: Address,
        token_b: Address,
        amount_a: U256,
        amount_b: U256,
    },
    Complete {
        id: U256,
        token_b: Address,
        amount_b: U256,
    },
}

impl SagaAction {
    /// Token and amount the escrow must be allowed to pull.
    pub fn allowance(&self) -> (Address, U256) {
        match self {
            SagaAction::Create { token_a, amount_a, .. } => (*token_a, *amount_a),
            SagaAction::Complete { token_b, amount_b, .. } => (*token_b, *amount_b),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            SagaAction::Create { .. } => "createOperation",
            SagaAction::Complete { .. } => "completeOperation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SagaStep {
    Pending,
    /// Allowance confirmed, action not yet confirmed.
    AllowanceGranted { approval: TxReceipt },
    Done { approval: TxReceipt, receipt: TxReceipt },
}

#[derive(Debug, Clone, Serialize)]
pub struct ApprovalSaga {
    from: Address,
    action: SagaAction,
    step: SagaStep,
}

impl ApprovalSaga {
    pub fn new(from: Address, action: SagaAction) -> Self {
        Self {
            from,
            action,
            step: SagaStep::Pending,
        }
    }

    pub fn create(from: Address, request: &CreateRequest) -> Self {
        Self::new(
            from,
            SagaAction::Create {
                token_a: request.token_a,
                token_b: request.token_b,
                amount_a: request.amount_a,
                amount_b: request.amount_b,
            },
        )
    }

    pub fn complete(from: Address, op: &Operation) -> Self {
        Self::new(
            from,
            SagaAction::Complete {
                id: op.id,
                token_b: op.token_b,
                amount_b: op.amount_b,
            },
        )
    }

    pub fn from(&self) -> Address {
        self.from
    }

    pub fn action(&self) -> &SagaAction {
        &self.action
    }

    pub fn step(&self) -> &SagaStep {
        &self.step
    }

    pub fn is_done(&self) -> bool {
        matches!(self.step, SagaStep::Done { .. })
    }

    /// Drive the saga to completion from wherever it stopped.
    ///
    /// Each step is submitted only after the previous one is confirmed. On
    /// error the saga stays at the last confirmed step.
    pub async fn run(&mut self, chain: &dyn EscrowChain) -> Result<TxReceipt> {
        let approval = match &self.step {
            SagaStep::Done { receipt, .. } => return Ok(receipt.clone()),
            SagaStep::AllowanceGranted { approval } => {
                info!(action = self.action.name(), "Resuming after confirmed allowance");
                approval.clone()
            }
            SagaStep::Pending => {
                let (token, amount) = self.action.allowance();
                info!(token = %token, amount = %amount, "Approving escrow allowance");
                let approval = chain.approve(self.from, token, amount).await?;
                self.step = SagaStep::AllowanceGranted {
                    approval: approval.clone(),
                };
                approval
            }
        };

        let result = match &self.action {
            SagaAction::Create {
                token_a,
                token_b,
                amount_a,
                amount_b,
            } => {
                chain
                    .create_operation(self.from, *token_a, *token_b, *amount_a, *amount_b)
                    .await
            }
            SagaAction::Complete { id, .. } => chain.complete_operation(self.from, *id).await,
        };

        match result {
            Ok(receipt) => {
                info!(action = self.action.name(), tx_hash = %receipt.tx_hash, "Escrow action confirmed");
                self.step = SagaStep::Done {
                    approval,
                    receipt: receipt.clone(),
                };
                Ok(receipt)
            }
            Err(e) => {
                warn!(action = self.action.name(), error = %e, "Escrow action failed, allowance left in place");
                Err(e)
            }
        }
    }
}
