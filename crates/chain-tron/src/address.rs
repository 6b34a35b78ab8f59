//! TRON address conversion and validation.
//!
//! The base58 form is `base58check(0x41 || body20)`, using the same
//! double-SHA256 checksum as Bitcoin, which the `bs58` crate provides.

use crate::error::TronError;

/// Network prefix byte of every mainnet TRON address.
pub const ADDRESS_PREFIX: u8 = 0x41;

/// Length of a decoded TRON address (prefix + 20-byte body).
const RAW_LEN: usize = 21;

/// Convert a `41`-prefixed hex address to its base58check form.
pub fn hex_to_base58(hex_address: &str) -> Result<String, TronError> {
    let raw = decode_hex(hex_address)?;
    Ok(bs58::encode(raw).with_check().into_string())
}

/// Convert a base58check address to its `41`-prefixed lowercase hex form.
pub fn base58_to_hex(base58_address: &str) -> Result<String, TronError> {
    let raw = decode_base58(base58_address)?;
    Ok(hex::encode(raw))
}

/// Validate a TRON address in either textual form.
///
/// Unlike the length/prefix check used for connection handling, this
/// verifies the base58 checksum and the network prefix.
pub fn validate_address(address: &str) -> Result<bool, TronError> {
    if address.starts_with('T') {
        decode_base58(address)?;
    } else {
        decode_hex(address)?;
    }
    Ok(true)
}

/// Returns the 20-byte account body shared by both forms.
pub fn account_body(address: &str) -> Result<[u8; 20], TronError> {
    let raw = if address.starts_with('T') {
        decode_base58(address)?
    } else {
        decode_hex(address)?
    };

    let mut body = [0u8; 20];
    body.copy_from_slice(&raw[1..]);
    Ok(body)
}

fn decode_base58(address: &str) -> Result<[u8; RAW_LEN], TronError> {
    let bytes = bs58::decode(address)
        .with_check(None)
        .into_vec()
        .map_err(|e| TronError::InvalidAddress(format!("base58check decode failed: {e}")))?;
    into_raw(bytes)
}

fn decode_hex(address: &str) -> Result<[u8; RAW_LEN], TronError> {
    let bytes = hex::decode(address)
        .map_err(|e| TronError::InvalidAddress(format!("invalid hex: {e}")))?;
    into_raw(bytes)
}

fn into_raw(bytes: Vec<u8>) -> Result<[u8; RAW_LEN], TronError> {
    let raw: [u8; RAW_LEN] = bytes.try_into().map_err(|v: Vec<u8>| {
        TronError::InvalidAddress(format!("expected {RAW_LEN} bytes, got {}", v.len()))
    })?;

    if raw[0] != ADDRESS_PREFIX {
        return Err(TronError::InvalidAddress(format!(
            "expected prefix 0x41, got 0x{:02x}",
            raw[0]
        )));
    }

    Ok(raw)
}
