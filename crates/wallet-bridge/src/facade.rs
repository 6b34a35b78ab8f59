//! The public entry point.
//!
//! [`WalletFacade`] picks a backend from the host at construction and
//! exposes the same operations whatever backend is active. Every operation
//! returns an [`Outcome`]: expected failures become a [`Failure`] with a
//! stable code, and a panic inside a provider becomes a generic
//! `INTERNAL_ERROR` instead of unwinding into the caller.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, RwLock};

use chain_evm::units::Amount;
use futures::FutureExt;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::address::AddressInput;
use crate::backend::{
    BackendKind, BrowserBackend, NativeBackend, SimulatedBackend, TransactionHistory,
    WalletBackend,
};
use crate::balance::{NativeBalance, TokenBalance};
use crate::chain::{ChainFamily, ChainId};
use crate::config::{Environment, WalletConfig};
use crate::error::WalletError;
use crate::host::{HostEnvironment, HostKind};
use crate::registry::ProviderRegistry;
use crate::response::{Failure, Outcome};
use crate::session::{ConnectionSession, SessionSnapshot, SessionStatus};
use crate::snapshot::{now_millis, SessionRecord, SnapshotStore};
use crate::tokens::TokenRegistry;
use crate::transaction::{SignedMessage, SubmittedTransaction};

/// Connection state as callers see it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfo {
    pub is_connected: bool,
    pub account: Option<String>,
    pub chain_id: Option<u64>,
    pub network: Option<String>,
    pub provider: Option<String>,
    pub service_type: BackendKind,
}

impl NetworkInfo {
    fn from_snapshot(snapshot: &SessionSnapshot, service_type: BackendKind) -> Self {
        Self {
            is_connected: snapshot.is_connected(),
            account: snapshot.account.as_ref().map(ToString::to_string),
            chain_id: snapshot.chain.map(ChainId::id),
            network: snapshot.chain.map(|c| c.name().to_string()),
            provider: snapshot.provider.clone(),
            service_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedNetwork {
    pub chain_id: u64,
    pub name: String,
    pub symbol: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    pub service_type: BackendKind,
    pub environment: Environment,
    pub status: SessionStatus,
    pub is_connected: bool,
    pub account: Option<String>,
    pub chain_id: Option<u64>,
    pub supported_networks: Vec<SupportedNetwork>,
}

pub struct WalletFacade {
    config: WalletConfig,
    tokens: Arc<TokenRegistry>,
    backend: RwLock<Arc<dyn WalletBackend>>,
    snapshots: Option<Arc<dyn SnapshotStore>>,
    cancel: CancellationToken,
}

impl WalletFacade {
    /// Builds the facade over `host`: injected providers in a browser,
    /// the native plugin in an app shell.
    pub fn new(host: Arc<dyn HostEnvironment>, config: WalletConfig) -> Self {
        let tokens = Arc::new(config.token_registry());
        let backend: Arc<dyn WalletBackend> = match host.kind() {
            HostKind::Browser => {
                let registry =
                    ProviderRegistry::new(host, config.provider_priority, config.poll_policy());
                let session = Arc::new(ConnectionSession::new(registry, config.session_settings()));
                Arc::new(BrowserBackend::new(
                    session,
                    tokens.clone(),
                    config.transaction_settings(),
                ))
            }
            HostKind::Native => Arc::new(NativeBackend::new(
                host.native_plugin(),
                config.session_settings().request_timeout,
            )),
        };
        info!(backend = %backend.kind(), environment = %config.environment, "wallet facade ready");

        Self {
            config,
            tokens,
            backend: RwLock::new(backend),
            snapshots: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_snapshot_store(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.snapshots = Some(store);
        self
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend().kind()
    }

    /// Cancels every pending provider poll. Later calls fail fast.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    fn backend(&self) -> Arc<dyn WalletBackend> {
        match self.backend.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn replace_backend(&self, next: Arc<dyn WalletBackend>) {
        match self.backend.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    fn network_info(&self) -> NetworkInfo {
        let backend = self.backend();
        NetworkInfo::from_snapshot(&backend.status(), backend.kind())
    }

    pub async fn connect_wallet(&self) -> Outcome<NetworkInfo> {
        guarded("connect_wallet", self.connect_inner()).await
    }

    async fn connect_inner(&self) -> Result<NetworkInfo, WalletError> {
        let backend = self.backend();
        let cancel = self.cancel.child_token();

        match backend.connect(&cancel).await {
            Ok(snapshot) => Ok(NetworkInfo::from_snapshot(&snapshot, backend.kind())),
            Err(e) if backend.kind() == BackendKind::Native => {
                if self.config.environment == Environment::Production {
                    return Err(e);
                }
                warn!(error = %e, "native plugin connect failed, falling back to the simulated wallet");
                let simulated: Arc<dyn WalletBackend> = Arc::new(SimulatedBackend::new(
                    self.config.environment,
                    ChainFamily::Tron,
                    self.tokens.as_ref().clone(),
                )?);
                let snapshot = simulated.connect(&cancel).await?;
                self.replace_backend(simulated);
                Ok(NetworkInfo::from_snapshot(&snapshot, BackendKind::Simulated))
            }
            Err(e) => Err(e),
        }
    }

    pub async fn disconnect_wallet(&self) -> Outcome<NetworkInfo> {
        guarded("disconnect_wallet", async {
            self.backend().disconnect().await;
            if let Some(store) = &self.snapshots {
                store.clear()?;
            }
            Ok::<_, WalletError>(self.network_info())
        })
        .await
    }

    pub async fn get_balance(&self, address: Option<&AddressInput>) -> Outcome<NativeBalance> {
        guarded("get_balance", async { self.backend().balance(address).await }).await
    }

    pub async fn get_token_balance(
        &self,
        token_contract: &str,
        address: Option<&AddressInput>,
    ) -> Outcome<TokenBalance> {
        guarded("get_token_balance", async {
            self.backend().token_balance(token_contract, address).await
        })
        .await
    }

    pub async fn get_usdt_balance(&self, address: Option<&AddressInput>) -> Outcome<TokenBalance> {
        guarded("get_usdt_balance", async {
            self.backend().usdt_balance(address).await
        })
        .await
    }

    /// Native transfer. `amount` is a decimal string in whole units.
    pub async fn send_transaction(
        &self,
        to: &AddressInput,
        amount: &str,
    ) -> Outcome<SubmittedTransaction> {
        guarded("send_transaction", async {
            let amount = Amount::parse(amount)?;
            self.backend().send_transaction(to, &amount).await
        })
        .await
    }

    pub async fn send_token_transfer(
        &self,
        symbol: &str,
        to: &AddressInput,
        amount: &str,
    ) -> Outcome<SubmittedTransaction> {
        guarded("send_token_transfer", async {
            let amount = Amount::parse(amount)?;
            self.backend().send_token_transfer(symbol, to, &amount).await
        })
        .await
    }

    pub async fn sign_message(&self, message: &str) -> Outcome<SignedMessage> {
        guarded("sign_message", async {
            self.backend().sign_message(message).await
        })
        .await
    }

    pub async fn switch_network(&self, chain_id: u64) -> Outcome<NetworkInfo> {
        guarded("switch_network", async {
            let target = ChainId::from_id(chain_id).ok_or_else(|| WalletError::NetworkUnsupported {
                chain_id,
                supported: ChainId::ALL.iter().map(|c| c.id()).collect(),
            })?;
            let backend = self.backend();
            let snapshot = backend.switch_network(target).await?;
            Ok::<_, WalletError>(NetworkInfo::from_snapshot(&snapshot, backend.kind()))
        })
        .await
    }

    /// Current connection, revalidated against the live wallet first.
    pub async fn get_network_info(&self) -> Outcome<NetworkInfo> {
        guarded("get_network_info", async {
            let backend = self.backend();
            if backend.status().is_connected() && !backend.validate().await {
                info!("connection no longer valid, reporting disconnected");
            }
            Ok::<_, WalletError>(NetworkInfo::from_snapshot(&backend.status(), backend.kind()))
        })
        .await
    }

    pub async fn watch_token(&self, symbol: &str) -> Outcome<bool> {
        guarded("watch_token", async { self.backend().watch_token(symbol).await }).await
    }

    /// Keeps a live connection that still validates, otherwise connects
    /// again.
    pub async fn attempt_reconnect(&self) -> Outcome<NetworkInfo> {
        guarded("attempt_reconnect", self.reconnect_inner()).await
    }

    async fn reconnect_inner(&self) -> Result<NetworkInfo, WalletError> {
        let backend = self.backend();
        if backend.status().is_connected() && backend.validate().await {
            debug!("still connected, no reconnect needed");
            return Ok(NetworkInfo::from_snapshot(&backend.status(), backend.kind()));
        }
        self.connect_inner().await
    }

    pub async fn transaction_history(
        &self,
        address: Option<&AddressInput>,
        limit: usize,
    ) -> Outcome<TransactionHistory> {
        guarded("transaction_history", async {
            self.backend().transaction_history(address, limit).await
        })
        .await
    }

    pub fn service_info(&self) -> ServiceInfo {
        let backend = self.backend();
        let snapshot = backend.status();
        ServiceInfo {
            service_type: backend.kind(),
            environment: self.config.environment,
            status: snapshot.status,
            is_connected: snapshot.is_connected(),
            account: snapshot.account.as_ref().map(ToString::to_string),
            chain_id: snapshot.chain.map(ChainId::id),
            supported_networks: ChainId::ALL
                .iter()
                .map(|c| SupportedNetwork {
                    chain_id: c.id(),
                    name: c.name().to_string(),
                    symbol: c.native_symbol().to_string(),
                })
                .collect(),
        }
    }

    /// Persists the current connection as a warm-start hint.
    pub async fn save_snapshot(&self) -> Outcome<SessionRecord> {
        guarded("save_snapshot", async {
            let store = self.store()?;
            let backend = self.backend();
            let record = SessionRecord::capture(&backend.status(), backend.kind(), now_millis());
            store.save(&record)?;
            Ok::<_, WalletError>(record)
        })
        .await
    }

    /// Uses a saved hint to reconnect. The hint itself is never trusted:
    /// a fresh record only triggers a live reconnect.
    pub async fn restore_snapshot(&self) -> Outcome<NetworkInfo> {
        guarded("restore_snapshot", async {
            let store = self.store()?;
            let Some(record) = store.load()? else {
                return Err(WalletError::ConnectionStale("no saved session".into()));
            };

            if !record.is_fresh(now_millis(), self.config.snapshot_ttl()) {
                info!("saved session expired, discarding");
                store.clear()?;
                return Err(WalletError::ConnectionStale("saved session expired".into()));
            }
            if !record.is_connected {
                return Err(WalletError::ConnectionStale(
                    "saved session was not connected".into(),
                ));
            }

            self.reconnect_inner().await
        })
        .await
    }

    /// Applies provider events queued since the last call.
    pub async fn pump_events(&self) -> Outcome<usize> {
        guarded("pump_events", async {
            Ok::<_, WalletError>(self.backend().pump_events().await)
        })
        .await
    }

    fn store(&self) -> Result<&Arc<dyn SnapshotStore>, WalletError> {
        self.snapshots
            .as_ref()
            .ok_or_else(|| WalletError::Storage("no snapshot store configured".into()))
    }
}

/// Runs one facade operation, converting errors and panics to [`Failure`].
async fn guarded<T, F>(op: &'static str, fut: F) -> Outcome<T>
where
    F: Future<Output = Result<T, WalletError>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            warn!(op, code = e.code(), error = %e, "operation failed");
            Err(Failure::from(e))
        }
        Err(_) => {
            error!(op, "operation panicked");
            Err(Failure::internal())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{InjectionSlot, NativePlugin};
    use crate::provider::{Capabilities, Capability, ProviderError, WalletProvider};
    use crate::response::envelope;
    use crate::snapshot::MemorySnapshotStore;
    use crate::testing::{MockHost, MockProvider, EVM_ACCOUNT};
    use async_trait::async_trait;
    use serde_json::{json, Value};

    fn dev_config() -> WalletConfig {
        let mut config = WalletConfig::default();
        config.provider_poll.attempts = 1;
        config.provider_poll.initial_delay_ms = 10;
        config.provider_poll.max_delay_ms = 10;
        config
    }

    fn browser(provider: Arc<MockProvider>) -> WalletFacade {
        let host = Arc::new(MockHost::with(InjectionSlot::GenericTron, provider));
        WalletFacade::new(host, dev_config())
    }

    struct Broken;

    #[async_trait]
    impl NativePlugin for Broken {
        async fn call(&self, _method: &str, _params: Value) -> Result<Value, ProviderError> {
            Err(ProviderError::Transport("bridge unavailable".into()))
        }
    }

    struct Panicky;

    #[async_trait]
    impl WalletProvider for Panicky {
        fn name(&self) -> &str {
            "panicky"
        }
        fn capabilities(&self) -> Capabilities {
            Capabilities::of(&[Capability::Request])
        }
        fn family(&self) -> ChainFamily {
            ChainFamily::Evm
        }
        async fn request(&self, _method: &str, _params: Value) -> Result<Value, ProviderError> {
            panic!("provider blew up");
        }
    }

    #[tokio::test]
    async fn browser_host_uses_browser_backend() {
        let facade = browser(Arc::new(MockProvider::evm("0x38")));
        assert_eq!(facade.backend_kind(), BackendKind::Browser);

        let info = facade.connect_wallet().await.unwrap();
        assert!(info.is_connected);
        assert_eq!(info.chain_id, Some(56));
        assert_eq!(info.account.as_deref(), Some(EVM_ACCOUNT));
    }

    #[tokio::test]
    async fn failures_render_as_envelopes() {
        let facade = browser(Arc::new(MockProvider::evm("0x38")));
        let outcome = facade.get_balance(None).await;

        let json = envelope(&outcome);
        assert_eq!(json["success"], false);
        assert_eq!(json["code"], "NOT_CONNECTED");
        assert!(json["suggestions"].is_string());
    }

    #[tokio::test]
    async fn bad_amount_is_invalid_amount() {
        let facade = browser(Arc::new(MockProvider::evm("0x38")));
        facade.connect_wallet().await.unwrap();
        let err = facade
            .send_transaction(&AddressInput::from(EVM_ACCOUNT), "-3")
            .await
            .unwrap_err();
        assert_eq!(err.code, "INVALID_AMOUNT");
    }

    #[tokio::test]
    async fn unknown_chain_id_is_unsupported() {
        let facade = browser(Arc::new(MockProvider::evm("0x38")));
        facade.connect_wallet().await.unwrap();
        let err = facade.switch_network(250).await.unwrap_err();
        assert_eq!(err.code, "NETWORK_UNSUPPORTED");
    }

    #[tokio::test]
    async fn provider_panic_becomes_internal_error() {
        let host = Arc::new(MockHost::with(InjectionSlot::GenericTron, Arc::new(Panicky)));
        let facade = WalletFacade::new(host, dev_config());

        let err = facade.connect_wallet().await.unwrap_err();
        assert_eq!(err, Failure::internal());

        let info = facade.service_info();
        assert_ne!(info.status, SessionStatus::Connecting);
        assert_eq!(info.status, SessionStatus::Failed);
        assert!(!info.is_connected);
    }

    #[tokio::test]
    async fn native_failure_falls_back_to_simulated_in_development() {
        let host = Arc::new(MockHost::native(Some(Arc::new(Broken))));
        let facade = WalletFacade::new(host, dev_config());
        assert_eq!(facade.backend_kind(), BackendKind::Native);

        let info = facade.connect_wallet().await.unwrap();
        assert_eq!(info.service_type, BackendKind::Simulated);
        assert_eq!(facade.backend_kind(), BackendKind::Simulated);
        assert_eq!(facade.service_info().service_type, BackendKind::Simulated);
    }

    #[tokio::test]
    async fn native_failure_is_reported_in_production() {
        let host = Arc::new(MockHost::native(Some(Arc::new(Broken))));
        let config = WalletConfig {
            environment: Environment::Production,
            ..dev_config()
        };
        let facade = WalletFacade::new(host, config);

        let err = facade.connect_wallet().await.unwrap_err();
        assert_eq!(err.code, "PROVIDER_ERROR");
        assert_eq!(facade.backend_kind(), BackendKind::Native);
    }

    #[tokio::test]
    async fn network_info_revalidates() {
        let provider = Arc::new(MockProvider::evm("0x1"));
        let facade = browser(provider.clone());
        facade.connect_wallet().await.unwrap();
        assert!(facade.get_network_info().await.unwrap().is_connected);

        provider.set_reply("eth_accounts", Ok(json!([])));
        let info = facade.get_network_info().await.unwrap();
        assert!(!info.is_connected);
        assert!(info.account.is_none());
    }

    #[tokio::test]
    async fn reconnect_keeps_valid_session() {
        let provider = Arc::new(MockProvider::evm("0x1"));
        let facade = browser(provider.clone());
        facade.connect_wallet().await.unwrap();

        facade.attempt_reconnect().await.unwrap();
        assert_eq!(provider.calls_to("eth_requestAccounts").len(), 1);
    }

    #[tokio::test]
    async fn snapshot_restore_reconnects_live() {
        let provider = Arc::new(MockProvider::evm("0x38"));
        let store = Arc::new(MemorySnapshotStore::new());
        let facade = browser(provider.clone()).with_snapshot_store(store.clone());

        facade.connect_wallet().await.unwrap();
        let record = facade.save_snapshot().await.unwrap();
        assert_eq!(record.chain_id, Some(56));

        facade.disconnect_wallet().await.unwrap();
        assert!(store.load().unwrap().is_none());

        store.save(&record).unwrap();
        let info = facade.restore_snapshot().await.unwrap();
        assert!(info.is_connected);
        assert_eq!(provider.calls_to("eth_requestAccounts").len(), 2);
    }

    #[tokio::test]
    async fn expired_snapshot_is_discarded() {
        let store = Arc::new(MemorySnapshotStore::new());
        let facade = browser(Arc::new(MockProvider::evm("0x38"))).with_snapshot_store(store.clone());

        store
            .save(&SessionRecord {
                is_connected: true,
                account: Some(EVM_ACCOUNT.into()),
                chain_id: Some(56),
                service_type: BackendKind::Browser,
                timestamp: now_millis() - 301_000,
            })
            .unwrap();

        let err = facade.restore_snapshot().await.unwrap_err();
        assert_eq!(err.code, "CONNECTION_STALE");
        assert!(store.load().unwrap().is_none());
        assert!(!facade.service_info().is_connected);
    }

    #[tokio::test]
    async fn snapshot_without_store_is_storage_error() {
        let facade = browser(Arc::new(MockProvider::evm("0x38")));
        assert_eq!(facade.save_snapshot().await.unwrap_err().code, "STORAGE_ERROR");
    }

    #[tokio::test]
    async fn service_info_lists_networks() {
        let facade = browser(Arc::new(MockProvider::evm("0x38")));
        let info = facade.service_info();
        assert_eq!(info.supported_networks.len(), ChainId::ALL.len());
        assert_eq!(info.status, SessionStatus::Disconnected);
        assert_eq!(info.environment, Environment::Development);
    }
}
