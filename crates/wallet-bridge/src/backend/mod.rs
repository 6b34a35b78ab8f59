//! Wallet backends.
//!
//! The facade talks to exactly one [`WalletBackend`] at a time: injected
//! browser providers, a native app plugin, or the development-only
//! simulated wallet. Operations a backend cannot perform answer
//! [`ProviderError::Unsupported`].

mod browser;
mod native;
mod simulated;

pub use browser::BrowserBackend;
pub use native::NativeBackend;
pub use simulated::SimulatedBackend;

use async_trait::async_trait;
use chain_evm::units::Amount;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::address::AddressInput;
use crate::balance::{NativeBalance, TokenBalance};
use crate::chain::ChainId;
use crate::error::WalletError;
use crate::provider::ProviderError;
use crate::session::SessionSnapshot;
use crate::transaction::{SignedMessage, SubmittedTransaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Browser,
    Native,
    Simulated,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            BackendKind::Browser => "browser",
            BackendKind::Native => "native",
            BackendKind::Simulated => "simulated",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionHistory {
    pub transactions: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[async_trait]
pub trait WalletBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn status(&self) -> SessionSnapshot;

    async fn connect(&self, cancel: &CancellationToken) -> Result<SessionSnapshot, WalletError>;

    async fn disconnect(&self);

    async fn balance(&self, address: Option<&AddressInput>) -> Result<NativeBalance, WalletError>;

    async fn token_balance(
        &self,
        _contract: &str,
        _address: Option<&AddressInput>,
    ) -> Result<TokenBalance, WalletError> {
        Err(ProviderError::Unsupported("token balances").into())
    }

    async fn usdt_balance(&self, _address: Option<&AddressInput>) -> Result<TokenBalance, WalletError> {
        Err(ProviderError::Unsupported("token balances").into())
    }

    async fn send_transaction(
        &self,
        to: &AddressInput,
        amount: &Amount,
    ) -> Result<SubmittedTransaction, WalletError>;

    async fn send_token_transfer(
        &self,
        _symbol: &str,
        _to: &AddressInput,
        _amount: &Amount,
    ) -> Result<SubmittedTransaction, WalletError> {
        Err(ProviderError::Unsupported("token transfers").into())
    }

    async fn sign_message(&self, message: &str) -> Result<SignedMessage, WalletError>;

    async fn switch_network(&self, _target: ChainId) -> Result<SessionSnapshot, WalletError> {
        Err(ProviderError::Unsupported("network switching").into())
    }

    /// Checks the session against the live wallet, resetting it when stale.
    async fn validate(&self) -> bool {
        self.status().is_connected()
    }

    async fn watch_token(&self, _symbol: &str) -> Result<bool, WalletError> {
        Err(ProviderError::Unsupported("watchAsset").into())
    }

    async fn transaction_history(
        &self,
        address: Option<&AddressInput>,
        limit: usize,
    ) -> Result<TransactionHistory, WalletError>;

    /// Applies queued provider events. Backends without events have none.
    async fn pump_events(&self) -> usize {
        0
    }
}
