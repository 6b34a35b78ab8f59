//! Scripted provider and host doubles for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::broadcast;

use crate::address::AddressInput;
use crate::chain::ChainFamily;
use crate::host::{HostEnvironment, HostKind, InjectionSlot, NativePlugin};
use crate::network::NetworkSignals;
use crate::poll::PollPolicy;
use crate::provider::{
    Capabilities, Capability, ProviderError, ProviderEvent, WalletProvider,
};
use crate::registry::{ProviderPriority, ProviderRegistry};
use crate::session::{ConnectionSession, SessionSettings};

pub const EVM_ACCOUNT: &str = "0x1111111111111111111111111111111111111111";
pub const EVM_OTHER: &str = "0x2222222222222222222222222222222222222222";
pub const TRON_ACCOUNT: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";

/// A provider whose replies are scripted per method. The last reply queued
/// for a method repeats.
pub struct MockProvider {
    name: &'static str,
    family: ChainFamily,
    caps: Capabilities,
    signals: NetworkSignals,
    replies: Mutex<HashMap<String, VecDeque<Result<Value, ProviderError>>>>,
    calls: Mutex<Vec<(String, Value)>>,
    default_address: Mutex<Option<AddressInput>>,
    events: broadcast::Sender<ProviderEvent>,
    latency: Option<Duration>,
    in_flight: AtomicU32,
    max_in_flight: AtomicU32,
}

impl MockProvider {
    pub fn evm(chain_id: &str) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            name: "mock-evm",
            family: ChainFamily::Evm,
            caps: Capabilities::of(&[Capability::Request, Capability::Events]),
            signals: NetworkSignals {
                chain_id: Some(chain_id.to_string()),
                ..NetworkSignals::default()
            },
            replies: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            default_address: Mutex::new(None),
            events,
            latency: None,
            in_flight: AtomicU32::new(0),
            max_in_flight: AtomicU32::new(0),
        }
        .reply("eth_requestAccounts", Ok(json!([EVM_ACCOUNT])))
        .reply("eth_accounts", Ok(json!([EVM_ACCOUNT])))
    }

    pub fn tron() -> Self {
        let (events, _) = broadcast::channel(16);
        let provider = Self {
            name: "mock-tron",
            family: ChainFamily::Tron,
            caps: Capabilities::of(&[
                Capability::Request,
                Capability::DefaultAddress,
                Capability::Events,
            ]),
            signals: NetworkSignals {
                node_host: Some("https://api.trx.example".into()),
                ..NetworkSignals::default()
            },
            replies: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            default_address: Mutex::new(None),
            events,
            latency: None,
            in_flight: AtomicU32::new(0),
            max_in_flight: AtomicU32::new(0),
        }
        .reply("tron_requestAccounts", Ok(json!({ "code": 200 })));
        provider.set_default_address(Some(json!({ "base58": TRON_ACCOUNT, "hex": false })));
        provider
    }

    pub fn reply(self, method: &str, reply: Result<Value, ProviderError>) -> Self {
        self.push_reply(method, reply);
        self
    }

    pub fn push_reply(&self, method: &str, reply: Result<Value, ProviderError>) {
        self.replies
            .lock()
            .unwrap()
            .entry(method.to_string())
            .or_default()
            .push_back(reply);
    }

    /// Replaces whatever was queued for `method`.
    pub fn set_reply(&self, method: &str, reply: Result<Value, ProviderError>) {
        self.replies
            .lock()
            .unwrap()
            .insert(method.to_string(), VecDeque::from([reply]));
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn set_default_address(&self, value: Option<Value>) {
        *self.default_address.lock().unwrap() = value.and_then(|v| AddressInput::from_json(&v));
    }

    pub fn calls_to(&self, method: &str) -> Vec<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, p)| p.clone())
            .collect()
    }

    pub fn max_in_flight(&self) -> u32 {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn emit(&self, event: ProviderEvent) {
        let _ = self.events.send(event);
    }

    fn next_reply(&self, method: &str) -> Result<Value, ProviderError> {
        let mut replies = self.replies.lock().unwrap();
        match replies.get_mut(method) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) if queue.len() == 1 => queue[0].clone(),
            _ => Err(ProviderError::Rpc {
                code: -32601,
                message: format!("method {method} not scripted"),
            }),
        }
    }
}

#[async_trait]
impl WalletProvider for MockProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn capabilities(&self) -> Capabilities {
        self.caps
    }

    fn family(&self) -> ChainFamily {
        self.family
    }

    fn network_signals(&self) -> NetworkSignals {
        self.signals.clone()
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        self.calls
            .lock()
            .unwrap()
            .push((method.to_string(), params));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let reply = self.next_reply(method);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        reply
    }

    fn default_address(&self) -> Option<AddressInput> {
        self.default_address.lock().unwrap().clone()
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<ProviderEvent>> {
        Some(self.events.subscribe())
    }
}

/// A browser page with at most one handle per slot.
pub struct MockHost {
    kind: HostKind,
    slots: Mutex<HashMap<InjectionSlot, Arc<dyn WalletProvider>>>,
    plugin: Option<Arc<dyn NativePlugin>>,
}

impl MockHost {
    pub fn browser() -> Self {
        Self {
            kind: HostKind::Browser,
            slots: Mutex::new(HashMap::new()),
            plugin: None,
        }
    }

    pub fn with(slot: InjectionSlot, provider: Arc<dyn WalletProvider>) -> Self {
        let host = Self::browser();
        host.slots.lock().unwrap().insert(slot, provider);
        host
    }

    pub fn native(plugin: Option<Arc<dyn NativePlugin>>) -> Self {
        Self {
            kind: HostKind::Native,
            slots: Mutex::new(HashMap::new()),
            plugin,
        }
    }
}

impl HostEnvironment for MockHost {
    fn kind(&self) -> HostKind {
        self.kind
    }

    fn injected(&self, slot: InjectionSlot) -> Option<Arc<dyn WalletProvider>> {
        self.slots.lock().unwrap().get(&slot).cloned()
    }

    fn native_plugin(&self) -> Option<Arc<dyn NativePlugin>> {
        self.plugin.clone()
    }
}

pub fn fast_settings() -> SessionSettings {
    SessionSettings {
        request_timeout: Duration::from_secs(2),
        activation_timeout: Duration::from_secs(2),
        activation_poll: PollPolicy {
            attempts: 2,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(50),
        },
    }
}

/// A session over a single provider injected into the generic TRON slot.
pub fn session_with(provider: Arc<dyn WalletProvider>) -> ConnectionSession {
    let host = Arc::new(MockHost::with(InjectionSlot::GenericTron, provider));
    let registry = ProviderRegistry::new(
        host,
        ProviderPriority::MobileFirst,
        PollPolicy {
            attempts: 1,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(10),
        },
    );
    ConnectionSession::new(registry, fast_settings())
}
