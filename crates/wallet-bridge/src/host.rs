use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::provider::{ProviderError, WalletProvider};

/// Where the bridge runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostKind {
    /// A web page with injected provider handles.
    Browser,
    /// An app shell exposing a native wallet plugin.
    Native,
}

/// Global slots a browser wallet may inject its handle into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InjectionSlot {
    /// EVM-style handle of a mobile wallet browser.
    MobileEvm,
    /// TRON-style handle of a mobile wallet browser.
    MobileTron,
    /// Desktop TRON extension handle.
    DesktopTron,
    /// Generic TRON web handle.
    GenericTron,
}

/// The embedding environment.
pub trait HostEnvironment: Send + Sync {
    fn kind(&self) -> HostKind;

    /// The handle currently injected into `slot`, if any. Called again on
    /// every poll, so late injection is picked up.
    fn injected(&self, slot: InjectionSlot) -> Option<Arc<dyn WalletProvider>>;

    fn native_plugin(&self) -> Option<Arc<dyn NativePlugin>> {
        None
    }
}

/// Method-call bridge into a platform wallet plugin.
///
/// Responses are JSON objects carrying a `success` flag plus
/// method-specific fields, or an `error` message on failure.
#[async_trait]
pub trait NativePlugin: Send + Sync {
    async fn call(&self, method: &str, params: Value) -> Result<Value, ProviderError>;
}
