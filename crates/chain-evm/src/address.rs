use sha3::{Digest, Keccak256};

use crate::error::EvmError;

fn strip_0x(address: &str) -> Option<&str> {
    address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
}

/// Decodes a `0x` + 40 hex digit address, in any letter case.
pub fn parse_address(address: &str) -> Result<[u8; 20], EvmError> {
    let digits = strip_0x(address)
        .ok_or_else(|| EvmError::InvalidAddress(format!("missing 0x prefix: {address}")))?;
    if digits.len() != 40 {
        return Err(EvmError::InvalidAddress(format!(
            "{address}: {} hex digits, need 40",
            digits.len()
        )));
    }

    let mut out = [0u8; 20];
    hex::decode_to_slice(digits, &mut out)
        .map_err(|e| EvmError::InvalidAddress(format!("{address}: {e}")))?;
    Ok(out)
}

/// EIP-55 rendering: a letter is upper-cased when the matching nibble of
/// keccak256(lowercase hex) is 8 or more.
pub fn checksum_address(address: &str) -> Result<String, EvmError> {
    let lower = hex::encode(parse_address(address)?);
    let hash = Keccak256::digest(lower.as_bytes());

    let body: String = lower
        .chars()
        .enumerate()
        .map(|(i, c)| {
            let nibble = (hash[i / 2] >> (if i % 2 == 0 { 4 } else { 0 })) & 0x0f;
            if nibble >= 8 {
                c.to_ascii_uppercase()
            } else {
                c
            }
        })
        .collect();
    Ok(format!("0x{body}"))
}

/// True when `address` carries no checksum (single case) or a correct one.
pub fn verify_checksum(address: &str) -> Result<bool, EvmError> {
    parse_address(address)?;
    let digits = &address[2..];

    let has_lower = digits.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = digits.chars().any(|c| c.is_ascii_uppercase());
    if !(has_lower && has_upper) {
        return Ok(true);
    }
    Ok(checksum_address(address)?[2..] == *digits)
}
