use alloy::primitives::utils::{format_ether, parse_ether};
use alloy::primitives::{Address, U256};
use chrono::{DateTime, Local};
use tracing::warn;

use crate::error::{EscrowError, Result};

pub fn remove_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url[..url.len() - 1].to_string()
    } else {
        url.to_string()
    }
}

/// Strip whitespace and one layer of surrounding quotes from an env value.
pub fn sanitize_env_value(value: &str) -> String {
    let trimmed = value.trim();
    let unquoted = if trimmed.len() >= 2
        && ((trimmed.starts_with('"') && trimmed.ends_with('"'))
            || (trimmed.starts_with('\'') && trimmed.ends_with('\'')))
    {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    };
    unquoted.to_string()
}

/// `0xf39F...2266`
pub fn short_address(address: &Address) -> String {
    let full = address.to_checksum(None);
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}

pub fn parse_address(input: &str) -> Result<Address> {
    input
        .trim()
        .parse::<Address>()
        .map_err(|e| EscrowError::InvalidInput(format!("invalid address '{}': {}", input, e)))
}

/// Parse a decimal amount with 18 decimals (`"1.5"` → 1.5e18 base units).
///
/// Negative input is rejected: converting the parsed value to `U256` would
/// silently drop the sign.
pub fn parse_amount(input: &str) -> Result<U256> {
    let trimmed = input.trim();
    if trimmed.starts_with('-') {
        return Err(EscrowError::InvalidInput(format!("amount '{}' is negative", input)));
    }
    parse_ether(trimmed)
        .map_err(|e| EscrowError::InvalidInput(format!("invalid amount '{}': {}", input, e)))
}

/// Base units rendered as a decimal with 18 decimals, trailing zeros trimmed
/// down to one fractional digit (`1500000000000000000` → `1.5`).
pub fn format_amount(amount: U256) -> String {
    let formatted = format_ether(amount);
    match formatted.split_once('.') {
        Some((whole, frac)) => {
            let frac = frac.trim_end_matches('0');
            if frac.is_empty() {
                format!("{}.0", whole)
            } else {
                format!("{}.{}", whole, frac)
            }
        }
        None => format!("{}.0", formatted),
    }
}

/// Same as `format_amount` but fixed to `places` fractional digits, for tables.
pub fn format_amount_fixed(amount: U256, places: usize) -> String {
    let formatted = format_amount(amount);
    let (whole, frac) = formatted.split_once('.').unwrap_or((&formatted, ""));
    if places == 0 {
        return whole.to_string();
    }
    let mut frac: String = frac.chars().take(places).collect();
    while frac.len() < places {
        frac.push('0');
    }
    format!("{}.{}", whole, frac)
}

/// Local time for a `closedAt` timestamp, `None` while the operation is active.
pub fn format_closed_at(closed_at: U256) -> Option<String> {
    if closed_at.is_zero() {
        return None;
    }
    let secs = i64::try_from(closed_at).ok()?;
    DateTime::from_timestamp(secs, 0)
        .map(|utc| utc.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
}

pub async fn retry<T, E, F, Fut>(mut retries: u32, base_delay_ms: u64, mut f: F) -> std::result::Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = std::result::Result<T, E>>,
    E: std::fmt::Debug,
{
    let mut attempt = 0u32;
    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if retries == 0 => return Err(e),
            Err(e) => {
                // Exponential backoff: base_delay * 2^attempt, capped at 30s
                let delay = (base_delay_ms * (1u64 << attempt.min(5))).min(30_000);
                warn!(attempt = attempt + 1, error = ?e, delay_ms = delay, "read failed, retrying");
                tokio::time::sleep(tokio::time::Duration::from_millis(delay)).await;
                retries -= 1;
                attempt += 1;
            }
        }
    }
}
