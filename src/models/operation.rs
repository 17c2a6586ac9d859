use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::contracts::EscrowOperation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationStatus {
    Active,
    /// Completed or cancelled. The snapshot does not tell which.
    Closed,
}

/// How the connected account relates to an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Creator,
    Counterparty,
    /// No account connected.
    Observer,
}

/// Which write controls should be offered for an operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AvailableActions {
    pub complete: bool,
    pub cancel: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub id: U256,
    /// Creator of the operation.
    pub user1: Address,
    pub token_a: Address,
    pub token_b: Address,
    pub amount_a: U256,
    pub amount_b: U256,
    pub is_active: bool,
    /// Unix seconds, zero while active.
    pub closed_at: U256,
}

impl Operation {
    pub fn status(&self) -> OperationStatus {
        if self.is_active {
            OperationStatus::Active
        } else {
            OperationStatus::Closed
        }
    }

    /// Exactly one of `is_active` and a non-zero `closed_at` must hold.
    pub fn is_consistent(&self) -> bool {
        self.is_active != (self.closed_at > U256::ZERO)
    }

    pub fn role_of(&self, account: Option<Address>) -> Role {
        match account {
            None => Role::Observer,
            Some(a) if a == self.user1 => Role::Creator,
            Some(_) => Role::Counterparty,
        }
    }

    pub fn available_actions(&self, account: Option<Address>) -> AvailableActions {
        if !self.is_active {
            return AvailableActions::default();
        }
        match self.role_of(account) {
            Role::Creator => AvailableActions {
                complete: false,
                cancel: true,
            },
            Role::Counterparty => AvailableActions {
                complete: true,
                cancel: false,
            },
            Role::Observer => AvailableActions::default(),
        }
    }
}

impl From<EscrowOperation> for Operation {
    fn from(op: EscrowOperation) -> Self {
        Self {
            id: op.id,
            user1: op.user1,
            token_a: op.tokenA,
            token_b: op.tokenB,
            amount_a: op.amountA,
            amount_b: op.amountB,
            is_active: op.isActive,
            closed_at: op.closedAt,
        }
    }
}

/// JSON projection served by the HTTP endpoint.
///
/// Numbers are decimal strings so values above 2^53 survive JSON clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationView {
    pub id: String,
    pub user1: String,
    pub token_a: String,
    pub token_b: String,
    pub amount_a: String,
    pub amount_b: String,
    pub is_active: bool,
    pub closed_at: String,
}

impl From<&Operation> for OperationView {
    fn from(op: &Operation) -> Self {
        Self {
            id: op.id.to_string(),
            user1: op.user1.to_checksum(None),
            token_a: op.token_a.to_checksum(None),
            token_b: op.token_b.to_checksum(None),
            amount_a: op.amount_a.to_string(),
            amount_b: op.amount_b.to_string(),
            is_active: op.is_active,
            closed_at: op.closed_at.to_string(),
        }
    }
}
