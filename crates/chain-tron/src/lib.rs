//! TRON chain support for the wallet bridge.
//!
//! TRON accounts have two textual forms: the base58check string users see
//! (`T...`, 34 characters) and the 21-byte hex form (`41...`, 42 characters)
//! that node APIs use. Both encode the same 20-byte account body behind a
//! `0x41` network prefix.

pub mod address;
pub mod error;

pub use address::{base58_to_hex, hex_to_base58, validate_address, ADDRESS_PREFIX};
pub use error::TronError;

/// Decimal count of TRX (1 TRX = 10^6 sun).
pub const NATIVE_DECIMALS: u8 = 6;
