//! Static-word ABI codec.
//!
//! Calldata here is always a 4-byte selector followed by 32-byte words;
//! dynamic types never appear in the ERC-20 calls this workspace makes.

use alloy_primitives::U256;

use crate::error::EvmError;

pub const WORD_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiParam {
    Address([u8; 20]),
    Uint256(U256),
}

impl AbiParam {
    fn to_word(&self) -> [u8; WORD_LEN] {
        match self {
            AbiParam::Address(addr) => {
                let mut word = [0u8; WORD_LEN];
                word[WORD_LEN - 20..].copy_from_slice(addr);
                word
            }
            AbiParam::Uint256(value) => value.to_be_bytes::<WORD_LEN>(),
        }
    }
}

/// `selector` followed by one word per parameter.
pub fn encode_function_call(selector: [u8; 4], params: &[AbiParam]) -> Vec<u8> {
    params
        .iter()
        .fold(selector.to_vec(), |mut data, param| {
            data.extend_from_slice(&param.to_word());
            data
        })
}

/// Splits calldata into its selector and argument words.
pub fn decode_words(data: &[u8]) -> Result<([u8; 4], Vec<[u8; WORD_LEN]>), EvmError> {
    let Some((head, body)) = data.split_first_chunk::<4>() else {
        return Err(EvmError::EncodingError(format!(
            "{} bytes is too short for a selector",
            data.len()
        )));
    };
    if body.len() % WORD_LEN != 0 {
        return Err(EvmError::EncodingError(format!(
            "{} argument bytes do not divide into words",
            body.len()
        )));
    }

    let words = body
        .chunks_exact(WORD_LEN)
        .filter_map(|chunk| <[u8; WORD_LEN]>::try_from(chunk).ok())
        .collect();
    Ok((*head, words))
}

/// The address held in the low 20 bytes of `word`. The high 12 must be zero.
pub fn word_to_address(word: &[u8; WORD_LEN]) -> Result<[u8; 20], EvmError> {
    let (padding, addr) = word.split_at(WORD_LEN - 20);
    if padding.iter().any(|&b| b != 0) {
        return Err(EvmError::EncodingError(
            "address word has non-zero padding".into(),
        ));
    }
    let mut out = [0u8; 20];
    out.copy_from_slice(addr);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRANSFER: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];

    fn recipient() -> [u8; 20] {
        let mut addr = [0u8; 20];
        addr[18] = 0xde;
        addr[19] = 0xad;
        addr
    }

    #[test]
    fn address_is_left_padded() {
        let word = AbiParam::Address(recipient()).to_word();
        assert!(word[..12].iter().all(|&b| b == 0));
        assert_eq!(word[30..], [0xde, 0xad]);
    }

    #[test]
    fn uint_is_big_endian() {
        let word = AbiParam::Uint256(U256::from(0x0102u64)).to_word();
        assert_eq!(word[30..], [0x01, 0x02]);
        assert!(word[..30].iter().all(|&b| b == 0));
    }

    #[test]
    fn no_params_is_just_the_selector() {
        let decimals = [0x31, 0x3c, 0xe5, 0x67];
        assert_eq!(encode_function_call(decimals, &[]), decimals.to_vec());
    }

    #[test]
    fn transfer_layout() {
        let data = encode_function_call(
            TRANSFER,
            &[
                AbiParam::Address(recipient()),
                AbiParam::Uint256(U256::from(12_500_000u64)),
            ],
        );
        assert_eq!(data.len(), 4 + 2 * WORD_LEN);
        assert_eq!(
            hex::encode(&data),
            format!("a9059cbb{:0>64}{:0>64}", "dead", "bebc20")
        );
    }

    #[test]
    fn decode_inverts_encode() {
        let data = encode_function_call(TRANSFER, &[AbiParam::Address(recipient())]);
        let (selector, words) = decode_words(&data).unwrap();
        assert_eq!(selector, TRANSFER);
        assert_eq!(word_to_address(&words[0]).unwrap(), recipient());
    }

    #[test]
    fn decode_rejects_bad_lengths() {
        assert!(decode_words(&[0xa9, 0x05]).is_err());
        assert!(decode_words(&[0u8; 4 + 31]).is_err());
    }

    #[test]
    fn dirty_padding_is_not_an_address() {
        let mut word = [0u8; WORD_LEN];
        word[0] = 1;
        assert!(word_to_address(&word).is_err());
    }
}
