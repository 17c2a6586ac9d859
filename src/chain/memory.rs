//! In-process stand-in for the escrow contract, used by the unit tests.
//!
//! Follows the contract's rules closely enough to reject what the real
//! contract rejects (self-completion, closing inactive operations, missing
//! allowance, non-admin token listing), and lets tests inject read and write
//! failures.

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use super::{EscrowChain, TxReceipt};
use crate::error::{EscrowError, Result};
use crate::models::Operation;

pub const CHAIN_ID: u64 = 31337;

#[derive(Default, Clone)]
struct State {
    allowed: Vec<Address>,
    meta: HashMap<Address, (String, String)>,
    balances: HashMap<(Address, Address), U256>,
    native: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address), U256>,
    operations: Vec<Operation>,
    failing_meta: HashSet<Address>,
    failing_balances: HashSet<Address>,
    fail_allowed_tokens: bool,
    fail_approvals: bool,
    fail_next_write: Option<String>,
    writes: Vec<String>,
    tx_count: u64,
    now: u64,
}

pub struct MemoryChain {
    escrow: Address,
    admin: Address,
    state: Mutex<State>,
}

impl MemoryChain {
    pub fn new(escrow: Address, admin: Address) -> Self {
        Self {
            escrow,
            admin,
            state: Mutex::new(State {
                now: 1_700_000_000,
                ..Default::default()
            }),
        }
    }

    /// Register a token contract and allow-list it.
    pub fn with_token(self, token: Address, symbol: &str, name: &str) -> Self {
        {
            let mut s = self.state.lock().unwrap();
            s.meta.insert(token, (symbol.to_string(), name.to_string()));
            s.allowed.push(token);
        }
        self
    }

    /// Register a token contract without allow-listing it.
    pub fn with_unlisted_token(self, token: Address, symbol: &str, name: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .meta
            .insert(token, (symbol.to_string(), name.to_string()));
        self
    }

    pub fn mint(&self, token: Address, owner: Address, amount: U256) {
        let mut s = self.state.lock().unwrap();
        *s.balances.entry((token, owner)).or_default() += amount;
    }

    pub fn set_native(&self, owner: Address, amount: U256) {
        self.state.lock().unwrap().native.insert(owner, amount);
    }

    pub fn fail_metadata(&self, token: Address) {
        self.state.lock().unwrap().failing_meta.insert(token);
    }

    pub fn fail_balances(&self, token: Address) {
        self.state.lock().unwrap().failing_balances.insert(token);
    }

    pub fn fail_allowed_tokens(&self) {
        self.state.lock().unwrap().fail_allowed_tokens = true;
    }

    pub fn fail_approvals(&self, fail: bool) {
        self.state.lock().unwrap().fail_approvals = fail;
    }

    /// Fail the next call of the named write with a transport error.
    pub fn fail_next_write(&self, name: &str) {
        self.state.lock().unwrap().fail_next_write = Some(name.to_string());
    }

    pub fn balance(&self, token: Address, owner: Address) -> U256 {
        self.state
            .lock()
            .unwrap()
            .balances
            .get(&(token, owner))
            .copied()
            .unwrap_or_default()
    }

    pub fn allowance(&self, token: Address, owner: Address) -> U256 {
        self.state
            .lock()
            .unwrap()
            .allowances
            .get(&(token, owner))
            .copied()
            .unwrap_or_default()
    }

    pub fn operation_count(&self) -> usize {
        self.state.lock().unwrap().operations.len()
    }

    /// Names of the successful write calls, in order.
    pub fn writes(&self) -> Vec<String> {
        self.state.lock().unwrap().writes.clone()
    }

    /// Insert an operation as-is, bypassing the contract rules.
    pub fn insert_operation(&self, op: Operation) {
        self.state.lock().unwrap().operations.push(op);
    }

    fn write<F>(&self, name: &str, f: F) -> Result<TxReceipt>
    where
        F: FnOnce(&mut State) -> std::result::Result<(), &'static str>,
    {
        let mut s = self.state.lock().unwrap();
        if s.fail_next_write.as_deref() == Some(name) {
            s.fail_next_write = None;
            return Err(EscrowError::Transaction("network error".to_string()));
        }
        // A revert leaves no trace: the closure works on a copy.
        let mut next = s.clone();
        f(&mut next).map_err(|reason| EscrowError::Transaction(format!("execution reverted: {}", reason)))?;
        *s = next;
        s.tx_count += 1;
        s.now += 12;
        s.writes.push(name.to_string());
        Ok(TxReceipt {
            tx_hash: B256::left_padding_from(&s.tx_count.to_be_bytes()),
            block_number: Some(s.tx_count),
        })
    }
}

fn transfer(s: &mut State, token: Address, from: Address, to: Address, amount: U256) -> std::result::Result<(), &'static str> {
    let balance = s.balances.get(&(token, from)).copied().unwrap_or_default();
    if balance < amount {
        return Err("insufficient balance");
    }
    s.balances.insert((token, from), balance - amount);
    *s.balances.entry((token, to)).or_default() += amount;
    Ok(())
}

/// Move `amount` from `owner` to `to`, spending the escrow's allowance.
fn transfer_from(s: &mut State, token: Address, owner: Address, to: Address, amount: U256) -> std::result::Result<(), &'static str> {
    let allowance = s.allowances.get(&(token, owner)).copied().unwrap_or_default();
    if allowance < amount {
        return Err("insufficient allowance");
    }
    transfer(s, token, owner, to, amount)?;
    s.allowances.insert((token, owner), allowance - amount);
    Ok(())
}

fn find_mut(s: &mut State, id: U256) -> std::result::Result<&mut Operation, &'static str> {
    s.operations
        .iter_mut()
        .find(|op| op.id == id)
        .ok_or("operation does not exist")
}

#[async_trait]
impl EscrowChain for MemoryChain {
    fn escrow_address(&self) -> Address {
        self.escrow
    }

    async fn chain_id(&self) -> Result<u64> {
        Ok(CHAIN_ID)
    }

    async fn get_operation(&self, id: U256) -> Result<Operation> {
        let s = self.state.lock().unwrap();
        s.operations
            .iter()
            .find(|op| op.id == id)
            .cloned()
            .ok_or_else(|| EscrowError::Rpc("execution reverted: operation does not exist".to_string()))
    }

    async fn get_all_operations(&self) -> Result<Vec<Operation>> {
        Ok(self.state.lock().unwrap().operations.clone())
    }

    async fn get_allowed_tokens(&self) -> Result<Vec<Address>> {
        let s = self.state.lock().unwrap();
        if s.fail_allowed_tokens {
            return Err(EscrowError::Rpc("call failed".to_string()));
        }
        Ok(s.allowed.clone())
    }

    async fn token_symbol(&self, token: Address) -> Result<String> {
        let s = self.state.lock().unwrap();
        if s.failing_meta.contains(&token) {
            return Err(EscrowError::Rpc("symbol() reverted".to_string()));
        }
        s.meta
            .get(&token)
            .map(|(symbol, _)| symbol.clone())
            .ok_or_else(|| EscrowError::Rpc("no contract code".to_string()))
    }

    async fn token_name(&self, token: Address) -> Result<String> {
        let s = self.state.lock().unwrap();
        if s.failing_meta.contains(&token) {
            return Err(EscrowError::Rpc("name() reverted".to_string()));
        }
        s.meta
            .get(&token)
            .map(|(_, name)| name.clone())
            .ok_or_else(|| EscrowError::Rpc("no contract code".to_string()))
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256> {
        let s = self.state.lock().unwrap();
        if s.failing_balances.contains(&token) || !s.meta.contains_key(&token) {
            return Err(EscrowError::Rpc("balanceOf() reverted".to_string()));
        }
        Ok(s.balances.get(&(token, owner)).copied().unwrap_or_default())
    }

    async fn native_balance(&self, owner: Address) -> Result<U256> {
        Ok(self.state.lock().unwrap().native.get(&owner).copied().unwrap_or_default())
    }

    async fn approve(&self, from: Address, token: Address, amount: U256) -> Result<TxReceipt> {
        self.write("approve", |s| {
            if s.fail_approvals {
                return Err("approve rejected");
            }
            if !s.meta.contains_key(&token) {
                return Err("no contract code");
            }
            s.allowances.insert((token, from), amount);
            Ok(())
        })
    }

    async fn create_operation(
        &self,
        from: Address,
        token_a: Address,
        token_b: Address,
        amount_a: U256,
        amount_b: U256,
    ) -> Result<TxReceipt> {
        let escrow = self.escrow;
        self.write("createOperation", |s| {
            if !s.allowed.contains(&token_a) || !s.allowed.contains(&token_b) {
                return Err("token not allowed");
            }
            if amount_a.is_zero() || amount_b.is_zero() {
                return Err("amount must be positive");
            }
            transfer_from(s, token_a, from, escrow, amount_a)?;
            let id = U256::from(s.operations.len() + 1);
            s.operations.push(Operation {
                id,
                user1: from,
                token_a,
                token_b,
                amount_a,
                amount_b,
                is_active: true,
                closed_at: U256::ZERO,
            });
            Ok(())
        })
    }

    async fn complete_operation(&self, from: Address, id: U256) -> Result<TxReceipt> {
        let escrow = self.escrow;
        self.write("completeOperation", |s| {
            let op = find_mut(s, id)?.clone();
            if !op.is_active {
                return Err("operation not active");
            }
            if op.user1 == from {
                return Err("creator cannot complete");
            }
            transfer_from(s, op.token_b, from, op.user1, op.amount_b)?;
            transfer(s, op.token_a, escrow, from, op.amount_a)?;
            let now = U256::from(s.now);
            let stored = find_mut(s, id)?;
            stored.is_active = false;
            stored.closed_at = now;
            Ok(())
        })
    }

    async fn cancel_operation(&self, from: Address, id: U256) -> Result<TxReceipt> {
        let escrow = self.escrow;
        self.write("cancelOperation", |s| {
            let op = find_mut(s, id)?.clone();
            if !op.is_active {
                return Err("operation not active");
            }
            if op.user1 != from {
                return Err("only creator can cancel");
            }
            transfer(s, op.token_a, escrow, from, op.amount_a)?;
            let now = U256::from(s.now);
            let stored = find_mut(s, id)?;
            stored.is_active = false;
            stored.closed_at = now;
            Ok(())
        })
    }

    async fn add_token(&self, from: Address, token: Address) -> Result<TxReceipt> {
        let admin = self.admin;
        self.write("addToken", |s| {
            if from != admin {
                return Err("only admin");
            }
            if s.allowed.contains(&token) {
                return Err("token already allowed");
            }
            s.allowed.push(token);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    const ESCROW: Address = address!("9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0");
    const ALICE: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
    const BOB: Address = address!("70997970C51812dc3A010C7d01b50e0d17dc79C8");
    const TKA: Address = address!("5FbDB2315678afecb367f032d93F642f64180aa3");
    const TKB: Address = address!("e7f1725E7734CE288F8367e1Bb143E90bb3F0512");

    #[tokio::test]
    async fn test_reverted_write_changes_nothing() {
        let chain = MemoryChain::new(ESCROW, ALICE)
            .with_token(TKA, "TKA", "Token A")
            .with_token(TKB, "TKB", "Token B");
        chain.mint(TKB, BOB, U256::from(20u64));
        // The escrow never received the token A leg it owes the filler.
        chain.insert_operation(Operation {
            id: U256::from(1),
            user1: ALICE,
            token_a: TKA,
            token_b: TKB,
            amount_a: U256::from(5u64),
            amount_b: U256::from(10u64),
            is_active: true,
            closed_at: U256::ZERO,
        });
        chain.approve(BOB, TKB, U256::from(10u64)).await.unwrap();

        let err = chain.complete_operation(BOB, U256::from(1)).await.unwrap_err();
        assert!(matches!(err, EscrowError::Transaction(msg) if msg.contains("insufficient balance")));

        assert_eq!(chain.balance(TKB, BOB), U256::from(20u64));
        assert_eq!(chain.balance(TKB, ALICE), U256::ZERO);
        assert_eq!(chain.allowance(TKB, BOB), U256::from(10u64));
        let op = chain.get_operation(U256::from(1)).await.unwrap();
        assert!(op.is_active);
        assert_eq!(op.closed_at, U256::ZERO);
        assert_eq!(chain.writes(), vec!["approve"]);
    }
}
