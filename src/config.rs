use alloy::primitives::Address;
use std::env;
use std::time::Duration;

use crate::error::{EscrowError, Result};
use crate::utils::{remove_trailing_slash, sanitize_env_value};

pub const DEFAULT_RPC_URL: &str = "http://localhost:8545";

/// Runtime configuration, read from the environment (and `.env` via the binary).
#[derive(Debug, Clone)]
pub struct EscrowConfig {
    pub rpc_url: String,
    pub escrow_address: Address,
    /// Hex private key. When unset, the node signs for its own accounts.
    pub private_key: Option<String>,
    /// Operation list refresh period.
    pub poll_interval_ms: u64,
    /// Wallet account/chain watch period.
    pub wallet_poll_ms: u64,
    pub read_retries: u32,
    pub api: ApiConfig,
}

impl EscrowConfig {
    pub fn from_env() -> Result<Self> {
        let rpc_url = env::var("RPC_URL")
            .map(|v| remove_trailing_slash(&sanitize_env_value(&v)))
            .unwrap_or_else(|_| DEFAULT_RPC_URL.to_string());

        let escrow_address = env::var("ESCROW_ADDRESS")
            .map_err(|_| EscrowError::MissingEnvVar("ESCROW_ADDRESS".to_string()))?;
        let escrow_address = parse_escrow_address(&escrow_address)?;

        let private_key = env::var("PRIVATE_KEY")
            .ok()
            .map(|k| sanitize_env_value(&k))
            .filter(|k| !k.is_empty());

        Ok(Self {
            rpc_url,
            escrow_address,
            private_key,
            poll_interval_ms: env_or("POLL_INTERVAL_MS", 5_000),
            wallet_poll_ms: env_or("WALLET_POLL_MS", 1_000),
            read_retries: env_or("READ_RETRIES", 2),
            api: ApiConfig::from_env(),
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn wallet_poll_interval(&self) -> Duration {
        Duration::from_millis(self.wallet_poll_ms)
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub cors_enabled: bool,
}

impl ApiConfig {
    pub fn from_env() -> Self {
        Self {
            host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_or("API_PORT", 3000),
            cors_enabled: env_or("API_CORS_ENABLED", true),
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

fn parse_escrow_address(raw: &str) -> Result<Address> {
    let value = sanitize_env_value(raw);
    value
        .parse::<Address>()
        .map_err(|e| EscrowError::InvalidInput(format!("ESCROW_ADDRESS '{}' is not an address: {}", value, e)))
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_or_falls_back_on_missing_or_garbage() {
        assert_eq!(env_or("ESCROW_TEST_UNSET_PORT", 3000u16), 3000);
        std::env::set_var("ESCROW_TEST_BAD_PORT", "not-a-port");
        assert_eq!(env_or("ESCROW_TEST_BAD_PORT", 3000u16), 3000);
        std::env::set_var("ESCROW_TEST_GOOD_PORT", " 8080 ");
        assert_eq!(env_or("ESCROW_TEST_GOOD_PORT", 3000u16), 8080);
    }

    #[test]
    fn test_malformed_escrow_address_is_invalid_input() {
        assert!(matches!(parse_escrow_address("0x1234"), Err(EscrowError::InvalidInput(_))));
        assert_eq!(
            parse_escrow_address("\"0x9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0\"").unwrap(),
            alloy::primitives::address!("9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0")
        );
    }

    #[test]
    fn test_api_address() {
        let api = ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 3001,
            cors_enabled: false,
        };
        assert_eq!(api.address(), "127.0.0.1:3001");
    }
}
