use serde::Serialize;

/// Static metadata for an EVM network, enough to build a
/// `wallet_addEthereumChain` request.
#[derive(Debug, Clone, Serialize)]
pub struct EvmChain {
    pub chain_id: u64,
    pub name: &'static str,
    pub symbol: &'static str,
    pub decimals: u8,
    pub rpc_url: &'static str,
    pub explorer_url: &'static str,
    pub is_testnet: bool,
}

impl EvmChain {
    const fn mainnet(
        chain_id: u64,
        name: &'static str,
        symbol: &'static str,
        rpc_url: &'static str,
        explorer_url: &'static str,
    ) -> Self {
        Self {
            chain_id,
            name,
            symbol,
            decimals: 18,
            rpc_url,
            explorer_url,
            is_testnet: false,
        }
    }

    const fn testnet(self) -> Self {
        Self {
            is_testnet: true,
            ..self
        }
    }

    /// Chain id in the `0x`-hex form wallets expect (`0x38` for BSC).
    pub fn hex_chain_id(&self) -> String {
        format!("0x{:x}", self.chain_id)
    }
}

pub const ETHEREUM: EvmChain =
    EvmChain::mainnet(1, "Ethereum", "ETH", "https://eth.llamarpc.com", "https://etherscan.io");

pub const GOERLI: EvmChain = EvmChain::mainnet(
    5,
    "Goerli",
    "ETH",
    "https://rpc.ankr.com/eth_goerli",
    "https://goerli.etherscan.io",
)
.testnet();

pub const OPTIMISM: EvmChain = EvmChain::mainnet(
    10,
    "Optimism",
    "ETH",
    "https://mainnet.optimism.io",
    "https://optimistic.etherscan.io",
);

pub const BSC: EvmChain = EvmChain::mainnet(
    56,
    "BNB Smart Chain",
    "BNB",
    "https://bsc-dataseed.binance.org",
    "https://bscscan.com",
);

pub const POLYGON: EvmChain =
    EvmChain::mainnet(137, "Polygon", "MATIC", "https://polygon-rpc.com", "https://polygonscan.com");

pub const ARBITRUM: EvmChain = EvmChain::mainnet(
    42161,
    "Arbitrum One",
    "ETH",
    "https://arb1.arbitrum.io/rpc",
    "https://arbiscan.io",
);

/// Every network a wallet session may settle on, in chain-id order.
const REGISTRY: [&EvmChain; 6] = [&ETHEREUM, &GOERLI, &OPTIMISM, &BSC, &POLYGON, &ARBITRUM];

pub fn get_chain(chain_id: u64) -> Option<&'static EvmChain> {
    REGISTRY.into_iter().find(|c| c.chain_id == chain_id)
}

pub fn supported_chains() -> Vec<&'static EvmChain> {
    REGISTRY.to_vec()
}
