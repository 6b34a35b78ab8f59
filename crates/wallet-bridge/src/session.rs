//! Connection state and its single-writer discipline.
//!
//! [`SessionCell`] holds the state behind two locks: an async gate that
//! admits one mutating operation at a time, and a short-lived `RwLock` that
//! readers take for a consistent snapshot. State can only be written through
//! a [`SessionWriter`], which owns the gate guard, so every mutation is
//! serialized and each commit of account, chain and provider is atomic.

use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::acquisition::acquire_account;
use crate::address::{extract_address, extract_handle_address, Address, AddressInput};
use crate::chain::{ChainFamily, ChainId};
use crate::error::WalletError;
use crate::network::{parse_chain_signal, resolve_network, settle_chain, NetworkResolution};
use crate::poll::{with_deadline, PollPolicy};
use crate::provider::{Capability, ProviderError, ProviderEvent, WalletProvider, UNKNOWN_CHAIN_CODE};
use crate::registry::ProviderRegistry;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Acquisition exhausted. Reads as disconnected to callers.
    Failed,
}

/// Timing knobs for provider calls made on behalf of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub request_timeout: Duration,
    pub activation_timeout: Duration,
    pub activation_poll: PollPolicy,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            activation_timeout: Duration::from_secs(10),
            activation_poll: PollPolicy {
                attempts: 4,
                initial_delay: Duration::from_millis(250),
                max_delay: Duration::from_secs(1),
            },
        }
    }
}

#[derive(Clone, Default)]
struct SessionState {
    status: SessionStatus,
    account: Option<Address>,
    chain: Option<ChainId>,
    provider: Option<Arc<dyn WalletProvider>>,
    provider_name: Option<String>,
    /// Bumped on every commit, so two connections to the same account
    /// are still told apart.
    generation: u64,
}

/// Point-in-time copy of the session, safe to hand out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub account: Option<Address>,
    pub chain: Option<ChainId>,
    pub provider: Option<String>,
}

impl SessionSnapshot {
    pub fn is_connected(&self) -> bool {
        self.status == SessionStatus::Connected
    }
}

/// Everything a read-only service needs from a connected session.
#[derive(Clone)]
pub struct ConnectedContext {
    pub provider: Arc<dyn WalletProvider>,
    pub account: Address,
    pub chain: ChainId,
    pub generation: u64,
}

pub struct SessionCell {
    gate: tokio::sync::Mutex<()>,
    state: RwLock<SessionState>,
}

impl SessionCell {
    pub fn new() -> Self {
        Self {
            gate: tokio::sync::Mutex::new(()),
            state: RwLock::new(SessionState::default()),
        }
    }

    /// Waits for the gate and returns the only handle that can write.
    pub async fn writer(&self) -> SessionWriter<'_> {
        SessionWriter {
            cell: self,
            _gate: self.gate.lock().await,
        }
    }

    fn read(&self) -> SessionState {
        // A poisoned lock still holds a consistent state: writes are single
        // assignments.
        match self.state.read() {
            Ok(state) => state.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.read();
        SessionSnapshot {
            status: state.status,
            account: state.account,
            chain: state.chain,
            provider: state.provider_name,
        }
    }

    pub fn connected(&self) -> Result<ConnectedContext, WalletError> {
        let state = self.read();
        match (state.status, state.provider, state.account, state.chain) {
            (SessionStatus::Connected, Some(provider), Some(account), Some(chain)) => {
                Ok(ConnectedContext {
                    provider,
                    account,
                    chain,
                    generation: state.generation,
                })
            }
            _ => Err(WalletError::NotConnected),
        }
    }
}

impl Default for SessionCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive write access to a [`SessionCell`].
pub struct SessionWriter<'a> {
    cell: &'a SessionCell,
    _gate: tokio::sync::MutexGuard<'a, ()>,
}

impl SessionWriter<'_> {
    fn update(&self, f: impl FnOnce(&mut SessionState)) {
        match self.cell.state.write() {
            Ok(mut state) => f(&mut *state),
            Err(poisoned) => f(&mut *poisoned.into_inner()),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.cell.snapshot()
    }

    pub fn generation(&self) -> u64 {
        self.cell.read().generation
    }

    /// Drops account, chain and provider, keeping only the generation.
    fn clear(&self, status: SessionStatus) {
        self.update(|s| {
            *s = SessionState {
                status,
                generation: s.generation,
                ..SessionState::default()
            }
        });
    }

    /// Enters `Connecting` with no account, chain or provider.
    pub fn begin_connect(&self) {
        self.clear(SessionStatus::Connecting);
    }

    /// Commits a successful connection in one write.
    pub fn commit(
        &self,
        account: Address,
        chain: ChainId,
        provider: Option<Arc<dyn WalletProvider>>,
        provider_name: &str,
    ) {
        self.update(|s| {
            *s = SessionState {
                status: SessionStatus::Connected,
                account: Some(account),
                chain: Some(chain),
                provider,
                provider_name: Some(provider_name.to_string()),
                generation: s.generation.wrapping_add(1),
            }
        });
    }

    pub fn fail(&self) {
        self.clear(SessionStatus::Failed);
    }

    pub fn reset(&self) {
        self.clear(SessionStatus::Disconnected);
    }

    pub fn set_chain(&self, chain: ChainId) {
        self.update(|s| s.chain = Some(chain));
    }

    pub fn set_account(&self, account: Address) {
        self.update(|s| s.account = Some(account));
    }
}

impl Drop for SessionWriter<'_> {
    fn drop(&mut self) {
        // A connect that panicked or was abandoned never reached commit or
        // fail; it must not stay `Connecting`.
        if self.cell.read().status == SessionStatus::Connecting {
            warn!("connect abandoned before completing, marking failed");
            self.fail();
        }
    }
}

/// A browser-provider session: discovery, acquisition, network changes,
/// staleness checks and provider events.
pub struct ConnectionSession {
    cell: SessionCell,
    registry: ProviderRegistry,
    settings: SessionSettings,
    events: Mutex<Option<broadcast::Receiver<ProviderEvent>>>,
}

impl ConnectionSession {
    pub fn new(registry: ProviderRegistry, settings: SessionSettings) -> Self {
        Self {
            cell: SessionCell::new(),
            registry,
            settings,
            events: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.cell.snapshot()
    }

    pub fn connected(&self) -> Result<ConnectedContext, WalletError> {
        self.cell.connected()
    }

    /// Discovers a provider, acquires an account and commits the result.
    ///
    /// A second call made while one is in flight waits for it, then runs
    /// in full.
    pub async fn connect(&self, cancel: &CancellationToken) -> Result<SessionSnapshot, WalletError> {
        let writer = self.cell.writer().await;
        writer.begin_connect();
        self.set_events(None);
        info!("connecting");

        let selected = match self.registry.discover(cancel).await {
            Ok(selected) => selected,
            Err(e) => {
                writer.fail();
                return Err(e);
            }
        };
        let provider = selected.provider;

        let resolution = resolve_network(&provider.network_signals());
        debug!(?resolution, provider = provider.name(), "network resolved");

        let family = match resolution.chain() {
            Some(chain) => chain.family(),
            None => provider.family(),
        };

        let account = match acquire_account(provider.as_ref(), family, &self.settings, cancel).await
        {
            Ok(account) => account,
            Err(e) => {
                writer.fail();
                return Err(e);
            }
        };

        let chain = settle_chain(&resolution, &account);
        if let NetworkResolution::Unrecognized(raw) = &resolution {
            warn!(raw = %raw, %chain, "unrecognized network signal, chain taken from account");
        }

        let events = if provider.capabilities().has(Capability::Events) {
            provider.subscribe()
        } else {
            None
        };
        let name = provider.name().to_string();
        writer.commit(account, chain, Some(provider), &name);
        self.set_events(events);

        let snapshot = writer.snapshot();
        info!(provider = %name, %chain, "connected");
        Ok(snapshot)
    }

    pub async fn disconnect(&self) {
        let writer = self.cell.writer().await;
        writer.reset();
        self.set_events(None);
        info!("disconnected");
    }

    /// Asks the wallet to switch to `target`, registering the chain first
    /// when the wallet does not know it.
    pub async fn switch_network(&self, target: ChainId) -> Result<SessionSnapshot, WalletError> {
        let writer = self.cell.writer().await;
        let ctx = self.cell.connected()?;

        let Some(chain) = target.evm_chain() else {
            return Err(WalletError::NetworkUnsupported {
                chain_id: target.id(),
                supported: ChainId::evm_ids(),
            });
        };
        if ctx.chain.family() != ChainFamily::Evm {
            return Err(WalletError::NetworkUnsupported {
                chain_id: target.id(),
                supported: vec![ctx.chain.id()],
            });
        }
        if ctx.chain == target {
            return Ok(writer.snapshot());
        }

        let timeout = self.settings.request_timeout;
        let switch_params = json!([{ "chainId": chain.hex_chain_id() }]);
        let switched = with_deadline(
            timeout,
            ctx.provider
                .request("wallet_switchEthereumChain", switch_params.clone()),
        )
        .await;

        match switched {
            Ok(_) => {}
            Err(ProviderError::Rpc { code, .. }) if code == UNKNOWN_CHAIN_CODE => {
                info!(%target, "wallet does not know the chain, adding it");
                let add_params = json!([{
                    "chainId": chain.hex_chain_id(),
                    "chainName": chain.name,
                    "nativeCurrency": {
                        "name": chain.symbol,
                        "symbol": chain.symbol,
                        "decimals": chain.decimals,
                    },
                    "rpcUrls": [chain.rpc_url],
                    "blockExplorerUrls": [chain.explorer_url],
                }]);
                with_deadline(
                    timeout,
                    ctx.provider.request("wallet_addEthereumChain", add_params),
                )
                .await?;
                with_deadline(
                    timeout,
                    ctx.provider
                        .request("wallet_switchEthereumChain", switch_params),
                )
                .await?;
            }
            Err(e) => return Err(e.into()),
        }

        writer.set_chain(target);
        info!(from = %ctx.chain, to = %target, "network switched");
        Ok(writer.snapshot())
    }

    /// Checks the live provider still lists the session account. A stale
    /// session is reset to `Disconnected` and `false` is returned.
    pub async fn validate(&self) -> bool {
        let Ok(ctx) = self.cell.connected() else {
            return false;
        };

        match self.live_account_matches(&ctx).await {
            Ok(true) => true,
            Ok(false) => {
                self.reset_if_current(&ctx, "account no longer listed by provider")
                    .await;
                false
            }
            Err(ProviderError::Unsupported(op)) => {
                debug!(op, "provider cannot be revalidated, keeping session");
                true
            }
            Err(e) => {
                self.reset_if_current(&ctx, &e.to_string()).await;
                false
            }
        }
    }

    async fn live_account_matches(&self, ctx: &ConnectedContext) -> Result<bool, ProviderError> {
        let provider = ctx.provider.as_ref();
        match ctx.chain.family() {
            ChainFamily::Evm => {
                let listed = if provider.capabilities().has(Capability::Request) {
                    let reply = with_deadline(
                        self.settings.request_timeout,
                        provider.request("eth_accounts", json!([])),
                    )
                    .await?;
                    match reply {
                        Value::Array(items) => items,
                        other => {
                            return Err(ProviderError::Malformed(format!(
                                "eth_accounts returned {other}"
                            )))
                        }
                    }
                } else if provider.capabilities().has(Capability::GetAccounts) {
                    with_deadline(self.settings.request_timeout, provider.get_accounts()).await?
                } else {
                    return Err(ProviderError::Unsupported("account listing"));
                };

                Ok(listed
                    .iter()
                    .filter_map(AddressInput::from_json)
                    .filter_map(|i| extract_address(&i))
                    .any(|a| a.same_account(&ctx.account)))
            }
            ChainFamily::Tron => {
                let current = provider
                    .default_address()
                    .or_else(|| provider.address())
                    .and_then(|i| extract_handle_address(&i));
                Ok(current.is_some_and(|a| a.same_account(&ctx.account)))
            }
        }
    }

    async fn reset_if_current(&self, seen: &ConnectedContext, reason: &str) {
        let writer = self.cell.writer().await;
        // A reconnect in the meantime, even to the same account, is newer.
        if writer.generation() == seen.generation && writer.snapshot().is_connected() {
            warn!(reason, "session is stale, resetting");
            writer.reset();
            self.set_events(None);
        }
    }

    /// Applies one provider notification to the session.
    pub async fn apply_event(&self, event: ProviderEvent) {
        let writer = self.cell.writer().await;
        let Ok(ctx) = self.cell.connected() else {
            debug!(?event, "event ignored while not connected");
            return;
        };

        match event {
            ProviderEvent::AccountsChanged(accounts) => {
                let next = accounts.first().and_then(|a| Address::parse(a).ok());
                match next {
                    None if accounts.is_empty() => {
                        info!("provider reports no accounts, disconnecting");
                        writer.reset();
                        self.set_events(None);
                    }
                    None => warn!(?accounts, "accountsChanged carried no valid address"),
                    Some(account) if account.chain_family() == ctx.chain.family() => {
                        info!(%account, "account changed");
                        writer.set_account(account);
                    }
                    Some(account) => {
                        warn!(%account, chain = %ctx.chain, "account family does not match chain, ignored");
                    }
                }
            }
            ProviderEvent::ChainChanged(raw) => match parse_chain_signal(&raw) {
                Some(chain) if chain.family() == ctx.account.chain_family() => {
                    info!(%chain, "chain changed");
                    writer.set_chain(chain);
                }
                _ => warn!(raw = %raw, "chainChanged to an unsupported chain, ignored"),
            },
            ProviderEvent::Connect { chain_id } => debug!(?chain_id, "provider connect event"),
            ProviderEvent::Disconnect => {
                info!("provider disconnected");
                writer.reset();
                self.set_events(None);
            }
        }
    }

    /// Drains queued provider events and applies them in order. Returns the
    /// number applied.
    pub async fn pump_events(&self) -> usize {
        let pending = self.drain_events();
        let count = pending.len();
        for event in pending {
            self.apply_event(event).await;
        }
        count
    }

    fn drain_events(&self) -> Vec<ProviderEvent> {
        let mut guard = match self.events.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let Some(rx) = guard.as_mut() else {
            return Vec::new();
        };

        let mut pending = Vec::new();
        let closed = loop {
            match rx.try_recv() {
                Ok(event) => pending.push(event),
                Err(TryRecvError::Empty) => break false,
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "provider events dropped");
                }
                Err(TryRecvError::Closed) => break true,
            }
        };
        if closed {
            debug!("provider event channel closed");
            *guard = None;
        }
        pending
    }

    fn set_events(&self, rx: Option<broadcast::Receiver<ProviderEvent>>) {
        match self.events.lock() {
            Ok(mut guard) => *guard = rx,
            Err(poisoned) => *poisoned.into_inner() = rx,
        }
    }
}
