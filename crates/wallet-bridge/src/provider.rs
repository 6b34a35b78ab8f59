//! The provider capability seam.
//!
//! A wallet handle supports some subset of the operations below. Each one
//! has a [`Capability`] flag, and the default method bodies answer
//! [`ProviderError::Unsupported`], so a concrete provider only implements
//! what it actually exposes and callers check the flag before use.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::address::AddressInput;
use crate::chain::ChainFamily;
use crate::network::NetworkSignals;

/// EIP-1193 "user rejected request".
pub const USER_REJECTED_CODE: i64 = 4001;

/// EIP-3085 "unrecognized chain id" answered by `wallet_switchEthereumChain`.
pub const UNKNOWN_CHAIN_CODE: i64 = 4902;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("provider does not support {0}")]
    Unsupported(&'static str),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("provider call timed out after {0}ms")]
    Timeout(u64),

    #[error("malformed provider response: {0}")]
    Malformed(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl ProviderError {
    pub fn is_user_rejection(&self) -> bool {
        matches!(self, ProviderError::Rpc { code, .. } if *code == USER_REJECTED_CODE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Request,
    GetAccounts,
    Enable,
    DefaultAddress,
    Address,
    Events,
}

impl Capability {
    fn bit(self) -> u8 {
        match self {
            Capability::Request => 1 << 0,
            Capability::GetAccounts => 1 << 1,
            Capability::Enable => 1 << 2,
            Capability::DefaultAddress => 1 << 3,
            Capability::Address => 1 << 4,
            Capability::Events => 1 << 5,
        }
    }
}

/// The set of operations a provider handle exposes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities(u8);

impl Capabilities {
    pub fn none() -> Self {
        Self(0)
    }

    pub fn of(caps: &[Capability]) -> Self {
        caps.iter().fold(Self::none(), |acc, cap| acc.with(*cap))
    }

    pub fn with(self, cap: Capability) -> Self {
        Self(self.0 | cap.bit())
    }

    pub fn has(self, cap: Capability) -> bool {
        self.0 & cap.bit() != 0
    }
}

/// Notifications a provider pushes after connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    AccountsChanged(Vec<String>),
    ChainChanged(String),
    Connect { chain_id: Option<String> },
    Disconnect,
}

/// An injected wallet handle.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Short name for logs and diagnostics.
    fn name(&self) -> &str;

    fn capabilities(&self) -> Capabilities;

    /// Chain family the handle speaks natively.
    fn family(&self) -> ChainFamily;

    /// Carries the mobile-wallet vendor flag.
    fn is_vendor_branded(&self) -> bool {
        false
    }

    /// Desktop extensions flip this once their page script is ready.
    fn is_ready(&self) -> bool {
        true
    }

    fn network_signals(&self) -> NetworkSignals {
        NetworkSignals::default()
    }

    async fn request(&self, _method: &str, _params: Value) -> Result<Value, ProviderError> {
        Err(ProviderError::Unsupported("request"))
    }

    async fn get_accounts(&self) -> Result<Vec<Value>, ProviderError> {
        Err(ProviderError::Unsupported("getAccounts"))
    }

    async fn enable(&self) -> Result<(), ProviderError> {
        Err(ProviderError::Unsupported("enable"))
    }

    fn default_address(&self) -> Option<AddressInput> {
        None
    }

    fn address(&self) -> Option<AddressInput> {
        None
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<ProviderEvent>> {
        None
    }
}
