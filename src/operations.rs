use alloy::primitives::{Address, U256};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::chain::EscrowChain;
use crate::error::{Rejection, Result};
use crate::models::{AvailableActions, Operation, OperationStatus, Role};
use crate::registry::TokenRegistry;
use crate::utils::{format_amount, format_closed_at, short_address};

/// Polled snapshot of every operation the escrow holds.
pub struct OperationBook {
    chain: Arc<dyn EscrowChain>,
    operations: RwLock<Vec<Operation>>,
}

impl OperationBook {
    pub fn new(chain: Arc<dyn EscrowChain>) -> Self {
        Self {
            chain,
            operations: RwLock::new(Vec::new()),
        }
    }

    /// Re-read all operations and replace the snapshot.
    ///
    /// A failed read keeps the previous snapshot. Overlapping refreshes are
    /// harmless: the last one to finish wins.
    pub async fn refresh(&self) -> Vec<Operation> {
        match self.chain.get_all_operations().await {
            Ok(ops) => {
                let inconsistent = ops.iter().filter(|op| !op.is_consistent()).count();
                if inconsistent > 0 {
                    warn!(count = inconsistent, "Operations with both or neither of active/closedAt");
                }
                debug!(count = ops.len(), "Operations refreshed");
                *self.operations.write().unwrap_or_else(|e| e.into_inner()) = ops.clone();
                ops
            }
            Err(e) => {
                warn!(error = %e, "No operations yet or error fetching operations");
                self.snapshot()
            }
        }
    }

    pub fn snapshot(&self) -> Vec<Operation> {
        self.operations.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn find(&self, id: U256) -> Option<Operation> {
        self.snapshot().into_iter().find(|op| op.id == id)
    }

    /// Fresh read of a single operation, bypassing the snapshot.
    pub async fn fetch(&self, id: U256) -> Result<Operation> {
        self.chain.get_operation(id).await
    }

    /// Refresh on a fixed period until `shutdown` is set.
    pub async fn poll(&self, period: Duration, shutdown: Arc<AtomicBool>) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval_ms = period.as_millis() as u64, "Starting operation polling");

        loop {
            ticker.tick().await;
            if shutdown.load(Ordering::Relaxed) {
                info!("Operation polling stopped");
                break;
            }
            self.refresh().await;
        }
    }
}

/// Optimistic mirror of the contract's completion rule.
pub fn check_complete(op: &Operation, caller: Address) -> std::result::Result<(), Rejection> {
    if !op.is_active {
        return Err(Rejection::NotActive(op.id));
    }
    if op.user1 == caller {
        return Err(Rejection::CreatorCannotComplete(op.id));
    }
    Ok(())
}

/// Optimistic mirror of the contract's cancellation rule.
pub fn check_cancel(op: &Operation, caller: Address) -> std::result::Result<(), Rejection> {
    if !op.is_active {
        return Err(Rejection::NotActive(op.id));
    }
    if op.user1 != caller {
        return Err(Rejection::NotCreator(op.id));
    }
    Ok(())
}

/// One operation as presented to a given account.
#[derive(Debug, Clone, Serialize)]
pub struct OperationCard {
    pub id: String,
    pub creator: String,
    pub status: OperationStatus,
    pub role: Role,
    pub offering: String,
    pub requesting: String,
    pub actions: AvailableActions,
    pub closed_at: Option<String>,
}

impl OperationCard {
    pub async fn build(op: &Operation, account: Option<Address>, registry: &TokenRegistry) -> Self {
        let (symbol_a, symbol_b) =
            futures::join!(registry.symbol_of(op.token_a), registry.symbol_of(op.token_b));
        Self {
            id: op.id.to_string(),
            creator: short_address(&op.user1),
            status: op.status(),
            role: op.role_of(account),
            offering: format!("{} {}", format_amount(op.amount_a), symbol_a),
            requesting: format!("{} {}", format_amount(op.amount_b), symbol_b),
            actions: op.available_actions(account),
            closed_at: format_closed_at(op.closed_at),
        }
    }

    pub fn render(&self) -> String {
        let status = match self.status {
            OperationStatus::Active => "Active",
            OperationStatus::Closed => "Closed",
        };
        let mut out = format!(
            "Operation #{} [{}]\n  Creator:    {}\n  Offering:   {}\n  Requesting: {}\n",
            self.id, status, self.creator, self.offering, self.requesting
        );
        if self.actions.complete {
            out.push_str("  Action:     complete\n");
        }
        if self.actions.cancel {
            out.push_str("  Action:     cancel\n");
        }
        if let Some(closed_at) = &self.closed_at {
            out.push_str(&format!("  Closed at:  {}\n", closed_at));
        }
        out
    }
}
