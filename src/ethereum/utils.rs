use alloy::primitives::{Address, U256};
use anyhow::{anyhow, Result};
use std::str::FromStr;

/// Validates and normalizes an Ethereum address
pub fn validate_address(address: &str) -> Result<Address> {
    let address = address.trim();

    if address.is_empty() {
        return Err(anyhow!("Address cannot be empty"));
    }

    if !address.starts_with("0x") && !address.starts_with("0X") {
        return Err(anyhow!(
            "Invalid address format: '{}'. Ethereum addresses must start with '0x'",
            address
        ));
    }

    if address.len() != 42 {
        return Err(anyhow!(
            "Invalid address length: '{}'. Ethereum addresses must be exactly 42 characters (0x + 40 hex characters)",
            address
        ));
    }

    let hex_part = &address[2..];
    if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(anyhow!(
            "Invalid address format: '{}'. Contains non-hexadecimal characters",
            address
        ));
    }

    Address::from_str(address)
        .map_err(|e| anyhow!("Invalid Ethereum address: '{}'. Error: {}", address, e))
}

/// Validates network name
pub fn validate_network(network: &str, available_networks: &[String]) -> Result<()> {
    if network.is_empty() {
        return Err(anyhow!("Network name cannot be empty"));
    }

    if !available_networks.contains(&network.to_string()) {
        return Err(anyhow!(
            "Unknown network: '{}'. Available networks: {}",
            network,
            available_networks.join(", ")
        ));
    }

    Ok(())
}

/// Validates function name
pub fn validate_function_name(function_name: &str) -> Result<()> {
    let first = function_name
        .chars()
        .next()
        .ok_or_else(|| anyhow!("Function name cannot be empty"))?;

    if !first.is_ascii_alphabetic() && first != '_' && first != '$' {
        return Err(anyhow!(
            "Invalid function name: '{}'. Function names must start with a letter or underscore",
            function_name
        ));
    }

    if !function_name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
    {
        return Err(anyhow!(
            "Invalid function name: '{}'. Function names can only contain letters, numbers, and underscores",
            function_name
        ));
    }

    Ok(())
}

/// Parses a transaction value given as decimal or `0x` prefixed hex
pub fn parse_wei_value(value_str: &str) -> Result<U256> {
    let value_str = value_str.trim();
    if value_str.is_empty() {
        return Err(anyhow!("Value cannot be empty"));
    }

    let value = if let Some(hex_digits) = value_str
        .strip_prefix("0x")
        .or_else(|| value_str.strip_prefix("0X"))
    {
        U256::from_str_radix(hex_digits, 16)
            .map_err(|_| anyhow!("Invalid hexadecimal value: '{}'", value_str))?
    } else {
        U256::from_str_radix(value_str, 10).map_err(|_| {
            anyhow!(
                "Invalid numeric value: '{}'. Use decimal format or '0x' prefixed hex",
                value_str
            )
        })?
    };

    Ok(value)
}

/// Big-endian bytes of `value` with every leading zero byte stripped.
///
/// Zero yields an empty vector, which is how the transaction codec expects
/// scalar fields: an RLP string of length zero, never a single `0x00` byte.
pub fn minimal_be_bytes(value: U256) -> Vec<u8> {
    let bytes = value.to_be_bytes::<32>();
    let first = bytes
        .iter()
        .position(|b| *b != 0)
        .unwrap_or(bytes.len());
    bytes[first..].to_vec()
}

/// `0x` followed by the minimal big-endian bytes; zero renders as bare `0x`.
pub fn to_minimal_hex(value: U256) -> String {
    format!("0x{}", hex::encode(minimal_be_bytes(value)))
}

/// Decodes a `0x` prefixed (or bare) hex string into bytes
pub fn decode_hex(input: &str) -> Result<Vec<u8>> {
    let trimmed = input.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    hex::decode(digits).map_err(|e| anyhow!("Invalid hex string '{}': {}", input, e))
}
