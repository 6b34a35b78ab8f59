//! EVM chain support for the wallet bridge.
//!
//! This crate provides:
//! - Minimal ABI encoding/decoding for static-argument contract calls
//! - ERC-20 calldata (`transfer`, `balanceOf`, `decimals`)
//! - EIP-55 checksum helpers
//! - Exact conversions between decimal amounts, base units and hex quantities
//! - Multi-chain EVM network definitions
//! - `eth_sendTransaction` request payloads

pub mod abi;
pub mod address;
pub mod chains;
pub mod erc20;
pub mod error;
pub mod transaction;
pub mod units;

pub use error::EvmError;
pub use transaction::TransactionRequest;
pub use units::Amount;
