use std::fmt;

use chain_evm::chains::{get_chain, EvmChain};
use serde::{Deserialize, Serialize};

/// TRON mainnet id as reported by its EVM-compatible RPC (`0x2b6653dc`).
///
/// Wallets injected on TRON often still report Ethereum's id, so this value
/// is only trusted when it shows up explicitly; otherwise the address family
/// decides.
pub const TRON_CHAIN_ID: u64 = 728_126_428;

/// Address and signing family a chain belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainFamily {
    Evm,
    Tron,
}

impl fmt::Display for ChainFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainFamily::Evm => f.write_str("evm"),
            ChainFamily::Tron => f.write_str("tron"),
        }
    }
}

/// A network the bridge can connect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainId {
    Ethereum,
    Goerli,
    Optimism,
    Bsc,
    Polygon,
    Arbitrum,
    Tron,
}

impl ChainId {
    pub const ALL: [ChainId; 7] = [
        ChainId::Ethereum,
        ChainId::Goerli,
        ChainId::Optimism,
        ChainId::Bsc,
        ChainId::Polygon,
        ChainId::Arbitrum,
        ChainId::Tron,
    ];

    /// Numeric chain id.
    pub fn id(self) -> u64 {
        match self {
            ChainId::Ethereum => 1,
            ChainId::Goerli => 5,
            ChainId::Optimism => 10,
            ChainId::Bsc => 56,
            ChainId::Polygon => 137,
            ChainId::Arbitrum => 42161,
            ChainId::Tron => TRON_CHAIN_ID,
        }
    }

    pub fn from_id(id: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.id() == id)
    }

    pub fn family(self) -> ChainFamily {
        match self {
            ChainId::Tron => ChainFamily::Tron,
            _ => ChainFamily::Evm,
        }
    }

    /// Decimals of the chain's native currency: 18 on EVM chains, 6 on TRON.
    pub fn native_decimals(self) -> u8 {
        match self.family() {
            ChainFamily::Evm => chain_evm::units::NATIVE_DECIMALS,
            ChainFamily::Tron => chain_tron::NATIVE_DECIMALS,
        }
    }

    pub fn native_symbol(self) -> &'static str {
        match self.evm_chain() {
            Some(chain) => chain.symbol,
            None => "TRX",
        }
    }

    /// EVM metadata (RPC and explorer URLs) for this chain, `None` on TRON.
    pub fn evm_chain(self) -> Option<&'static EvmChain> {
        match self.family() {
            ChainFamily::Evm => get_chain(self.id()),
            ChainFamily::Tron => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self.evm_chain() {
            Some(chain) => chain.name,
            None => "TRON",
        }
    }

    /// Numeric ids of every EVM chain.
    pub fn evm_ids() -> Vec<u64> {
        Self::ALL
            .into_iter()
            .filter(|c| c.family() == ChainFamily::Evm)
            .map(ChainId::id)
            .collect()
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip() {
        for chain in ChainId::ALL {
            assert_eq!(ChainId::from_id(chain.id()), Some(chain));
        }
        assert_eq!(ChainId::from_id(8453), None);
    }

    #[test]
    fn native_decimals_by_family() {
        assert_eq!(ChainId::Bsc.native_decimals(), 18);
        assert_eq!(ChainId::Arbitrum.native_decimals(), 18);
        assert_eq!(ChainId::Tron.native_decimals(), 6);
    }

    #[test]
    fn every_evm_chain_has_metadata() {
        for chain in ChainId::ALL {
            match chain.family() {
                ChainFamily::Evm => assert!(chain.evm_chain().is_some(), "{chain:?}"),
                ChainFamily::Tron => assert!(chain.evm_chain().is_none()),
            }
        }
    }

    #[test]
    fn names_and_symbols() {
        assert_eq!(ChainId::Bsc.to_string(), "BNB Smart Chain");
        assert_eq!(ChainId::Bsc.native_symbol(), "BNB");
        assert_eq!(ChainId::Tron.to_string(), "TRON");
        assert_eq!(ChainId::Tron.native_symbol(), "TRX");
    }

    #[test]
    fn evm_ids_exclude_tron() {
        assert_eq!(ChainId::evm_ids(), vec![1, 5, 10, 56, 137, 42161]);
    }
}
