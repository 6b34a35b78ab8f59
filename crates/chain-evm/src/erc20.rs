use alloy_primitives::U256;

use crate::abi::{decode_words, encode_function_call, word_to_address, AbiParam, WORD_LEN};
use crate::address::parse_address;
use crate::error::EvmError;
use crate::units::parse_quantity;

/// `transfer(address,uint256)`
pub const TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];

/// `balanceOf(address)`
pub const BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];

/// `decimals()`
pub const DECIMALS_SELECTOR: [u8; 4] = [0x31, 0x3c, 0xe5, 0x67];

/// A decoded `transfer(address,uint256)` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTransfer {
    pub to: [u8; 20],
    pub amount: U256,
}

/// Calldata moving `amount` base units of the token to `to`.
pub fn encode_transfer(to: &str, amount: U256) -> Result<Vec<u8>, EvmError> {
    let params = [AbiParam::Address(parse_address(to)?), AbiParam::Uint256(amount)];
    Ok(encode_function_call(TRANSFER_SELECTOR, &params))
}

/// Calldata for the `eth_call` that reads a holder's balance.
pub fn encode_balance_of(owner: &str) -> Result<Vec<u8>, EvmError> {
    let holder = AbiParam::Address(parse_address(owner)?);
    Ok(encode_function_call(BALANCE_OF_SELECTOR, &[holder]))
}

pub fn encode_decimals() -> Vec<u8> {
    encode_function_call(DECIMALS_SELECTOR, &[])
}

/// Decodes `transfer(address,uint256)` calldata back into its arguments.
pub fn decode_transfer(data: &[u8]) -> Result<DecodedTransfer, EvmError> {
    let (selector, words) = decode_words(data)?;
    if selector != TRANSFER_SELECTOR {
        return Err(EvmError::EncodingError(format!(
            "not a transfer call: selector 0x{}",
            hex::encode(selector)
        )));
    }
    if words.len() != 2 {
        return Err(EvmError::EncodingError(format!(
            "transfer takes 2 arguments, got {}",
            words.len()
        )));
    }

    Ok(DecodedTransfer {
        to: word_to_address(&words[0])?,
        amount: U256::from_be_bytes(words[1]),
    })
}

/// First word of a return value as a uint256. Trailing bytes are ignored.
pub fn decode_uint256(data: &[u8]) -> Result<U256, EvmError> {
    if data.len() < WORD_LEN {
        return Err(EvmError::EncodingError(format!(
            "uint256 return value needs 32 bytes, got {}",
            data.len()
        )));
    }

    let mut word = [0u8; WORD_LEN];
    word.copy_from_slice(&data[..WORD_LEN]);
    Ok(U256::from_be_bytes(word))
}

/// Decodes the hex string an `eth_call` returns for a uint256 getter.
///
/// Wallets are inconsistent here: some return the full 32-byte word, some a
/// trimmed quantity, some `0x` for an empty result. All three decode the same.
pub fn decode_uint256_hex(raw: &str) -> Result<U256, EvmError> {
    parse_quantity(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEAD: &str = "0x000000000000000000000000000000000000dEaD";

    #[test]
    fn transfer_of_twelve_and_a_half_usdt() {
        // 12.5 at 6 decimals = 12_500_000 = 0xbebc20.
        let data = encode_transfer(DEAD, U256::from(12_500_000u64)).unwrap();
        assert_eq!(
            hex::encode(&data),
            format!("a9059cbb{:0>64}{:0>64}", "dead", "bebc20")
        );
    }

    #[test]
    fn transfer_round_trips_through_decode() {
        let amount = U256::from(12_500_000_000_000_000_000u128);
        let decoded = decode_transfer(&encode_transfer(DEAD, amount).unwrap()).unwrap();
        assert_eq!(decoded.to, parse_address(DEAD).unwrap());
        assert_eq!(decoded.amount, amount);
    }

    #[test]
    fn decode_transfer_rejects_other_calls() {
        assert!(decode_transfer(&encode_balance_of(DEAD).unwrap()).is_err());
        let mut truncated = encode_transfer(DEAD, U256::ZERO).unwrap();
        truncated.truncate(36);
        assert!(decode_transfer(&truncated).is_err());
    }

    #[test]
    fn bad_recipient_is_an_address_error() {
        assert!(matches!(
            encode_transfer("TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t", U256::ZERO),
            Err(EvmError::InvalidAddress(_))
        ));
    }

    #[test]
    fn balance_of_layout() {
        assert_eq!(
            hex::encode(encode_balance_of(DEAD).unwrap()),
            format!("70a08231{:0>64}", "dead")
        );
    }

    #[test]
    fn decimals_is_bare_selector() {
        assert_eq!(hex::encode(encode_decimals()), "313ce567");
    }

    #[test]
    fn uint256_reads_the_first_word() {
        let mut data = vec![0u8; 64];
        data[31] = 6;
        data[63] = 99;
        assert_eq!(decode_uint256(&data).unwrap(), U256::from(6u64));
        assert!(decode_uint256(&data[..16]).is_err());
    }

    #[test]
    fn uint256_hex_handles_padded_and_empty() {
        let padded = format!("0x{:0>64}", "1bc16d674ec80000");
        assert_eq!(
            decode_uint256_hex(&padded).unwrap(),
            U256::from(2_000_000_000_000_000_000u128)
        );
        assert_eq!(decode_uint256_hex("0x").unwrap(), U256::ZERO);
    }
}
