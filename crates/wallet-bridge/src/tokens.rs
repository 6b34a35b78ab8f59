//! Token contract registry.
//!
//! The built-in table carries USDT on every supported EVM chain. Entries from
//! the `[[tokens]]` configuration section replace built-ins with the same
//! `(symbol, chain_id)` and add new ones otherwise.

use serde::{Deserialize, Serialize};

use crate::chain::ChainId;

/// A token contract on one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub symbol: String,
    pub chain_id: u64,
    pub contract: String,
    pub decimals: u8,
}

impl TokenInfo {
    fn new(symbol: &str, chain_id: u64, contract: &str, decimals: u8) -> Self {
        Self {
            symbol: symbol.to_string(),
            chain_id,
            contract: contract.to_string(),
            decimals,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRegistry {
    tokens: Vec<TokenInfo>,
}

impl TokenRegistry {
    pub fn new(tokens: Vec<TokenInfo>) -> Self {
        Self { tokens }
    }

    /// USDT deployments on the supported EVM chains.
    pub fn builtin() -> Self {
        Self::new(vec![
            TokenInfo::new("USDT", 1, "0xdAC17F958D2ee523a2206206994597C13D831ec7", 6),
            TokenInfo::new("USDT", 5, "0x509Ee0d083DdF8AC028f2a56731412edD63223B9", 6),
            TokenInfo::new("USDT", 10, "0x94b008aA00579c1307B0EF2c499aD98a8ce58e58", 6),
            TokenInfo::new("USDT", 56, "0x55d398326f99059fF775485246999027B3197955", 18),
            TokenInfo::new("USDT", 137, "0xc2132D05D31c914a87C6611C10748AEb04B58e8F", 6),
            TokenInfo::new("USDT", 42161, "0xFd086bC7CD5C481DCC9C85ebE478A1C0b69FCbb9", 6),
        ])
    }

    /// Applies configured entries on top of this registry.
    pub fn with_overrides(mut self, overrides: &[TokenInfo]) -> Self {
        for entry in overrides {
            match self.tokens.iter_mut().find(|t| {
                t.chain_id == entry.chain_id && t.symbol.eq_ignore_ascii_case(&entry.symbol)
            }) {
                Some(existing) => *existing = entry.clone(),
                None => self.tokens.push(entry.clone()),
            }
        }
        self
    }

    pub fn lookup(&self, chain: ChainId, symbol: &str) -> Option<&TokenInfo> {
        self.tokens
            .iter()
            .find(|t| t.chain_id == chain.id() && t.symbol.eq_ignore_ascii_case(symbol))
    }

    pub fn by_contract(&self, chain: ChainId, contract: &str) -> Option<&TokenInfo> {
        self.tokens
            .iter()
            .find(|t| t.chain_id == chain.id() && t.contract.eq_ignore_ascii_case(contract))
    }

    /// Sorted chain ids on which `symbol` is registered.
    pub fn supported_chains(&self, symbol: &str) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .tokens
            .iter()
            .filter(|t| t.symbol.eq_ignore_ascii_case(symbol))
            .map(|t| t.chain_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Sorted chain ids that have at least one token.
    pub fn all_chains(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.tokens.iter().map(|t| t.chain_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

impl Default for TokenRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
