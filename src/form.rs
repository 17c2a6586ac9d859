use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::error::{EscrowError, Rejection, Result};
use crate::models::TokenInfo;
use crate::utils::{parse_address, parse_amount};

/// Raw input of the create-operation form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateOperationForm {
    /// Token the creator offers.
    pub token_a: String,
    /// Token the creator wants.
    pub token_b: String,
    pub amount_a: String,
    pub amount_b: String,
}

/// A validated creation request, amounts in base units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateRequest {
    pub token_a: Address,
    pub token_b: Address,
    pub amount_a: U256,
    pub amount_b: U256,
}

impl CreateOperationForm {
    pub fn new(token_a: &str, amount_a: &str, token_b: &str, amount_b: &str) -> Self {
        Self {
            token_a: token_a.to_string(),
            token_b: token_b.to_string(),
            amount_a: amount_a.to_string(),
            amount_b: amount_b.to_string(),
        }
    }

    /// Validate the form.
    ///
    /// `allowed` is the token list offered in the pickers. When it is empty
    /// (the list could not be loaded) the allow-list check is left to the
    /// contract.
    pub fn parse(&self, allowed: &[TokenInfo]) -> Result<CreateRequest> {
        for (field, value) in [
            ("token A", &self.token_a),
            ("token B", &self.token_b),
            ("amount A", &self.amount_a),
            ("amount B", &self.amount_b),
        ] {
            if value.trim().is_empty() {
                return Err(EscrowError::InvalidInput(format!("{} is required", field)));
            }
        }

        let token_a = parse_address(&self.token_a)?;
        let token_b = parse_address(&self.token_b)?;
        let amount_a = parse_amount(&self.amount_a)?;
        let amount_b = parse_amount(&self.amount_b)?;

        if amount_a.is_zero() || amount_b.is_zero() {
            return Err(Rejection::ZeroAmount.into());
        }
        if token_a == token_b {
            return Err(Rejection::SameToken.into());
        }
        if !allowed.is_empty() {
            for token in [token_a, token_b] {
                if !allowed.iter().any(|t| t.address == token) {
                    return Err(Rejection::TokenNotAllowed(token.to_checksum(None)).into());
                }
            }
        }

        Ok(CreateRequest {
            token_a,
            token_b,
            amount_a,
            amount_b,
        })
    }
}
