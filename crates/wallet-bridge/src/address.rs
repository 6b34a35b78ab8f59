//! Address validation and extraction.
//!
//! Wallets hand back accounts in many shapes: plain strings, `{base58, hex}`
//! pairs, boxed `{value}` cells, objects that only render to an address, or
//! objects with an `address`/`account` field. [`extract_address`] walks a
//! fixed lookup list over these shapes and returns the first candidate that
//! passes [`is_valid_address`].
//!
//! Validation only checks length and prefix. EIP-55 checksums are available
//! through [`Address::checksummed`] and enforced only where configured.

use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::chain::ChainFamily;
use crate::error::WalletError;

/// What some wallets render for an object with no meaningful string form.
const OBJECT_SENTINEL: &str = "[object Object]";

/// Rendered strings this short cannot be an address.
const MIN_RENDERED_LEN: usize = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressFamily {
    /// 34 characters, `T` prefix.
    TronBase58,
    /// 42 characters, `41` prefix.
    TronHex,
    /// 42 characters, `0x` prefix.
    EvmHex,
}

impl AddressFamily {
    /// Classifies an already trimmed string by length and prefix.
    pub fn classify(s: &str) -> Option<Self> {
        let len = s.chars().count();
        if len == 34 && s.starts_with('T') {
            Some(AddressFamily::TronBase58)
        } else if len == 42 && s.starts_with("41") {
            Some(AddressFamily::TronHex)
        } else if len == 42 && s.starts_with("0x") {
            Some(AddressFamily::EvmHex)
        } else {
            None
        }
    }

    pub fn chain_family(self) -> ChainFamily {
        match self {
            AddressFamily::TronBase58 | AddressFamily::TronHex => ChainFamily::Tron,
            AddressFamily::EvmHex => ChainFamily::Evm,
        }
    }
}

/// True iff the trimmed input matches one address family.
pub fn is_valid_address(s: &str) -> bool {
    AddressFamily::classify(s.trim()).is_some()
}

/// A validated address tagged with its family.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    value: String,
    family: AddressFamily,
}

impl Address {
    pub fn parse(s: &str) -> Result<Self, WalletError> {
        let trimmed = s.trim();
        let family = AddressFamily::classify(trimmed)
            .ok_or_else(|| WalletError::AddressInvalid(format!("unrecognized address: {trimmed}")))?;
        Ok(Self {
            value: trimmed.to_string(),
            family,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn family(&self) -> AddressFamily {
        self.family
    }

    pub fn chain_family(&self) -> ChainFamily {
        self.family.chain_family()
    }

    /// EIP-55 form of an EVM address; TRON addresses are returned unchanged.
    pub fn checksummed(&self) -> Result<String, WalletError> {
        match self.family {
            AddressFamily::EvmHex => Ok(chain_evm::address::checksum_address(&self.value)?),
            _ => Ok(self.value.clone()),
        }
    }

    /// Base58 form of a TRON address. Fails for EVM addresses.
    pub fn to_tron_base58(&self) -> Result<String, WalletError> {
        match self.family {
            AddressFamily::TronBase58 => Ok(self.value.clone()),
            AddressFamily::TronHex => Ok(chain_tron::hex_to_base58(&self.value)?),
            AddressFamily::EvmHex => Err(WalletError::AddressInvalid(format!(
                "{} is not a TRON address",
                self.value
            ))),
        }
    }

    /// Case-insensitive comparison that also equates the two TRON forms.
    pub fn same_account(&self, other: &Address) -> bool {
        if self.value.eq_ignore_ascii_case(&other.value) {
            return true;
        }
        match (self.to_tron_base58(), other.to_tron_base58()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.value)
    }
}

/// Raw account data as a provider hands it over.
#[derive(Debug, Clone, PartialEq)]
pub enum AddressInput {
    Text(String),
    Object {
        fields: Map<String, Value>,
        /// The object's own string rendering, when it has one.
        rendered: Option<String>,
    },
}

impl AddressInput {
    /// Strings become `Text`, objects become `Object`; anything else is not
    /// account data.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(AddressInput::Text(s.clone())),
            Value::Object(fields) => Some(AddressInput::Object {
                fields: fields.clone(),
                rendered: None,
            }),
            _ => None,
        }
    }

    pub fn with_rendered(self, text: impl Into<String>) -> Self {
        match self {
            AddressInput::Object { fields, .. } => AddressInput::Object {
                fields,
                rendered: Some(text.into()),
            },
            text_input => text_input,
        }
    }

    /// TRON wallets with no active account set both `base58` and `hex` to
    /// `false` on their default-address object.
    pub fn is_inactive_marker(&self) -> bool {
        match self {
            AddressInput::Object { fields, .. } => {
                fields.get("base58") == Some(&Value::Bool(false))
                    && fields.get("hex") == Some(&Value::Bool(false))
            }
            AddressInput::Text(_) => false,
        }
    }

    /// True when the input holds anything at all to look at.
    pub fn has_content(&self) -> bool {
        match self {
            AddressInput::Text(s) => !s.trim().is_empty(),
            AddressInput::Object { fields, rendered } => {
                rendered.is_some()
                    || fields
                        .values()
                        .any(|v| !v.is_null() && v != &Value::Bool(false))
            }
        }
    }
}

impl From<&str> for AddressInput {
    fn from(s: &str) -> Self {
        AddressInput::Text(s.to_string())
    }
}

impl From<String> for AddressInput {
    fn from(s: String) -> Self {
        AddressInput::Text(s)
    }
}

#[derive(Debug, Clone, Copy)]
enum Source {
    Field(&'static str),
    Rendered,
}

/// Full lookup order for arbitrary account objects. `base58` comes before
/// `hex` since it is the display form when both are present.
const EXTRACTION_ORDER: &[Source] = &[
    Source::Field("base58"),
    Source::Field("hex"),
    Source::Field("value"),
    Source::Rendered,
    Source::Field("address"),
    Source::Field("addr"),
    Source::Field("account"),
    Source::Field("publicKey"),
];

/// Lookup order for a provider's own default-address / address slot.
const HANDLE_ORDER: &[Source] = &[Source::Field("base58"), Source::Field("hex"), Source::Rendered];

/// Returns the first valid address found in `input`, or `None`.
pub fn extract_address(input: &AddressInput) -> Option<Address> {
    extract_with(input, EXTRACTION_ORDER)
}

/// Reads a provider's address slot: base58, then hex, then rendering.
pub fn extract_handle_address(input: &AddressInput) -> Option<Address> {
    extract_with(input, HANDLE_ORDER)
}

fn extract_with(input: &AddressInput, order: &[Source]) -> Option<Address> {
    match input {
        AddressInput::Text(s) => Address::parse(s).ok(),
        AddressInput::Object { fields, rendered } => order.iter().find_map(|source| {
            let candidate = match source {
                Source::Field(name) => fields.get(*name).and_then(Value::as_str),
                Source::Rendered => rendered
                    .as_deref()
                    .filter(|r| *r != OBJECT_SENTINEL && r.len() >= MIN_RENDERED_LEN),
            }?;
            Address::parse(candidate).ok()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TRON_B58: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";
    const TRON_HEX: &str = "41a614f803b6fd780986a42c78ec9c7f77e6ded13c";
    const EVM: &str = "0x55d398326f99059ff775485246999027b3197955";

    fn object(value: Value) -> AddressInput {
        AddressInput::from_json(&value).unwrap()
    }

    #[test]
    fn families_by_length_and_prefix() {
        assert_eq!(AddressFamily::classify(TRON_B58), Some(AddressFamily::TronBase58));
        assert_eq!(AddressFamily::classify(TRON_HEX), Some(AddressFamily::TronHex));
        assert_eq!(AddressFamily::classify(EVM), Some(AddressFamily::EvmHex));
        assert_eq!(AddressFamily::classify("T123"), None);
        assert_eq!(AddressFamily::classify(&EVM[2..]), None);
    }

    #[test]
    fn validation_ignores_surrounding_whitespace() {
        for s in [TRON_B58, TRON_HEX, EVM, "garbage", "", "   "] {
            let padded = format!("  {s}\n");
            assert_eq!(is_valid_address(&padded), is_valid_address(s.trim()));
        }
        assert!(is_valid_address(&format!(" {EVM} ")));
    }

    #[test]
    fn checksum_is_not_verified() {
        // Wrong EIP-55 casing still passes the length+prefix rule.
        assert!(is_valid_address("0x55D398326f99059fF775485246999027B3197955"));
    }

    #[test]
    fn extract_plain_string() {
        let addr = extract_address(&AddressInput::from(format!("  {TRON_B58} "))).unwrap();
        assert_eq!(addr.as_str(), TRON_B58);
        assert!(extract_address(&AddressInput::from("nope")).is_none());
    }

    #[test]
    fn base58_wins_over_hex() {
        let input = object(json!({ "hex": TRON_HEX, "base58": TRON_B58 }));
        assert_eq!(extract_address(&input).unwrap().as_str(), TRON_B58);
    }

    #[test]
    fn falls_through_invalid_fields() {
        let input = object(json!({ "base58": "bad", "hex": false, "account": EVM }));
        assert_eq!(extract_address(&input).unwrap().as_str(), EVM);
    }

    #[test]
    fn boxed_value_field() {
        let input = object(json!({ "value": TRON_B58 }));
        assert_eq!(extract_address(&input).unwrap().family(), AddressFamily::TronBase58);
    }

    #[test]
    fn rendered_sentinel_is_rejected() {
        let input = object(json!({ "foo": 1 })).with_rendered(OBJECT_SENTINEL);
        assert!(extract_address(&input).is_none());

        let input = object(json!({ "foo": 1 })).with_rendered(EVM);
        assert_eq!(extract_address(&input).unwrap().as_str(), EVM);
    }

    #[test]
    fn unknown_object_yields_none() {
        let input = object(json!({ "name": "main", "balance": 12 }));
        assert!(extract_address(&input).is_none());
    }

    #[test]
    fn extracted_addresses_always_validate() {
        let inputs = [
            object(json!({ "address": EVM })),
            object(json!({ "addr": TRON_HEX })),
            object(json!({ "publicKey": TRON_B58 })),
            AddressInput::from(EVM),
        ];
        for input in inputs {
            let addr = extract_address(&input).unwrap();
            assert!(is_valid_address(addr.as_str()));
        }
    }

    #[test]
    fn handle_order_skips_generic_fields() {
        let input = object(json!({ "address": EVM }));
        assert!(extract_handle_address(&input).is_none());
    }

    #[test]
    fn inactive_marker() {
        assert!(object(json!({ "base58": false, "hex": false })).is_inactive_marker());
        assert!(!object(json!({ "base58": TRON_B58, "hex": false })).is_inactive_marker());
        assert!(!object(json!({ "base58": false, "hex": false })).has_content());
    }

    #[test]
    fn tron_forms_are_the_same_account() {
        let b58 = Address::parse(TRON_B58).unwrap();
        let hex = Address::parse(TRON_HEX).unwrap();
        assert!(b58.same_account(&hex));
        assert_eq!(hex.to_tron_base58().unwrap(), TRON_B58);
    }

    #[test]
    fn checksummed_evm_address() {
        let addr = Address::parse(EVM).unwrap();
        assert_eq!(
            addr.checksummed().unwrap(),
            "0x55d398326f99059fF775485246999027B3197955"
        );
    }

    #[test]
    fn serializes_as_plain_string() {
        let addr = Address::parse(EVM).unwrap();
        assert_eq!(serde_json::to_value(&addr).unwrap(), json!(EVM));
    }
}
