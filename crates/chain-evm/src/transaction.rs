use alloy_primitives::U256;
use serde::Serialize;

use crate::address::parse_address;
use crate::erc20;
use crate::error::EvmError;
use crate::units::to_hex_quantity;

/// An `eth_sendTransaction` / `eth_estimateGas` request object.
///
/// Signing is left to the wallet, so this only carries the fields a wallet
/// needs to build, price and sign the transaction itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionRequest {
    pub from: String,
    pub to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas: Option<String>,
}

impl TransactionRequest {
    /// Builds a native-currency transfer of `value_wei` from `from` to `to`.
    pub fn native_transfer(from: &str, to: &str, value_wei: U256) -> Result<Self, EvmError> {
        validate_to_address(from)?;
        validate_to_address(to)?;

        Ok(Self {
            from: from.to_string(),
            to: to.to_string(),
            value: Some(to_hex_quantity(value_wei)),
            data: None,
            gas: None,
        })
    }

    /// Builds an ERC-20 `transfer(recipient, amount)` call against
    /// `token_contract`. `amount` is already in the token's base units.
    pub fn erc20_transfer(
        from: &str,
        token_contract: &str,
        recipient: &str,
        amount: U256,
    ) -> Result<Self, EvmError> {
        validate_to_address(from)?;
        validate_to_address(token_contract)?;

        let calldata = erc20::encode_transfer(recipient, amount)?;

        Ok(Self {
            from: from.to_string(),
            to: token_contract.to_string(),
            value: None,
            data: Some(format!("0x{}", hex::encode(calldata))),
            gas: None,
        })
    }

    /// Attaches a gas limit.
    pub fn with_gas(mut self, gas_limit: u64) -> Self {
        self.gas = Some(format!("0x{gas_limit:x}"));
        self
    }
}

/// Validates that an address is well-formed.
fn validate_to_address(address: &str) -> Result<(), EvmError> {
    let _ = parse_address(address)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FROM: &str = "0x1111111111111111111111111111111111111111";
    const TO: &str = "0x000000000000000000000000000000000000dEaD";
    const USDT: &str = "0xdAC17F958D2ee523a2206206994597C13D831ec7";

    #[test]
    fn native_transfer_serializes_value_only() {
        let tx = TransactionRequest::native_transfer(
            FROM,
            TO,
            U256::from(1_000_000_000_000_000_000u128),
        )
        .unwrap();

        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["from"], FROM);
        assert_eq!(json["to"], TO);
        assert_eq!(json["value"], "0xde0b6b3a7640000");
        assert!(json.get("data").is_none());
        assert!(json.get("gas").is_none());
    }

    #[test]
    fn erc20_transfer_targets_contract() {
        let tx = TransactionRequest::erc20_transfer(FROM, USDT, TO, U256::from(100u64))
            .unwrap()
            .with_gas(100_000);

        assert_eq!(tx.to, USDT);
        assert!(tx.value.is_none());
        assert_eq!(tx.gas.as_deref(), Some("0x186a0"));

        let data = tx.data.unwrap();
        assert!(data.starts_with("0xa9059cbb"));
        // 0x + 68 bytes of calldata.
        assert_eq!(data.len(), 2 + 68 * 2);
    }

    #[test]
    fn native_transfer_invalid_recipient() {
        assert!(TransactionRequest::native_transfer(FROM, "bad", U256::ZERO).is_err());
    }

    #[test]
    fn erc20_transfer_invalid_contract() {
        assert!(
            TransactionRequest::erc20_transfer(FROM, "not-an-address", TO, U256::ZERO).is_err()
        );
    }

    #[test]
    fn erc20_transfer_invalid_recipient() {
        assert!(TransactionRequest::erc20_transfer(FROM, USDT, "bad", U256::ZERO).is_err());
    }
}
