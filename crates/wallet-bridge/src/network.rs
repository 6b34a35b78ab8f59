//! Chain identification from provider signals.
//!
//! Providers report their network through several overlapping fields and
//! do not keep them consistent. [`resolve_network`] applies a fixed
//! priority cascade, most vendor-authoritative signal first.

use crate::address::Address;
use crate::chain::{ChainFamily, ChainId};

/// Hostname fragment of TRON full-node endpoints.
const TRON_HOST_MARKER: &str = "trx";

/// Raw network signals read off a provider handle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkSignals {
    /// The handle carries a mobile-wallet vendor flag.
    pub vendor_mobile: bool,
    /// Decimal "network version" string.
    pub network_version: Option<String>,
    /// Chain id, decimal or `0x`-hex.
    pub chain_id: Option<String>,
    /// Host of the TRON full node the handle talks to, if any.
    pub node_host: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkResolution {
    Known(ChainId),
    /// A signal was present but named a chain we do not support.
    Unrecognized(String),
    Unknown,
}

impl NetworkResolution {
    pub fn chain(&self) -> Option<ChainId> {
        match self {
            NetworkResolution::Known(chain) => Some(*chain),
            _ => None,
        }
    }
}

/// Parses a chain id given in decimal or `0x`-hex.
pub fn parse_chain_signal(raw: &str) -> Option<ChainId> {
    let s = raw.trim();
    let id = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok()?,
        None => s.parse::<u64>().ok()?,
    };
    ChainId::from_id(id)
}

/// Resolves a chain from the signal bundle. Pure.
///
/// Order: vendor network version, vendor chain id, network version,
/// chain id, TRON node host. With the vendor flag set, an unknown value in
/// either vendor field is final.
pub fn resolve_network(signals: &NetworkSignals) -> NetworkResolution {
    let present = |field: &Option<String>| {
        field
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    if signals.vendor_mobile {
        for field in [&signals.network_version, &signals.chain_id] {
            if let Some(value) = present(field) {
                return match parse_chain_signal(&value) {
                    Some(chain) => NetworkResolution::Known(chain),
                    None => NetworkResolution::Unrecognized(value),
                };
            }
        }
        return NetworkResolution::Unknown;
    }

    if let Some(value) = present(&signals.network_version) {
        return match parse_chain_signal(&value) {
            Some(chain) => NetworkResolution::Known(chain),
            None => NetworkResolution::Unrecognized(value),
        };
    }

    if let Some(chain) = present(&signals.chain_id).and_then(|v| parse_chain_signal(&v)) {
        return NetworkResolution::Known(chain);
    }

    if signals
        .node_host
        .as_deref()
        .is_some_and(|host| host.contains(TRON_HOST_MARKER))
    {
        return NetworkResolution::Known(ChainId::Tron);
    }

    NetworkResolution::Unknown
}

/// Picks the session chain once the account is known.
///
/// A TRON-family account always means TRON, since TRON handles commonly
/// echo Ethereum's id. An EVM account keeps a resolved EVM chain and falls
/// back to Ethereum otherwise.
pub fn settle_chain(resolution: &NetworkResolution, account: &Address) -> ChainId {
    match (resolution.chain(), account.chain_family()) {
        (_, ChainFamily::Tron) => ChainId::Tron,
        (Some(chain), ChainFamily::Evm) if chain.family() == ChainFamily::Evm => chain,
        (_, ChainFamily::Evm) => ChainId::Ethereum,
    }
}
