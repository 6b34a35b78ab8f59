//! Wallet connection bridge for TRON and EVM chains.
//!
//! The bridge finds a wallet provider in its host (injected browser handles
//! or a native app plugin), acquires an account, resolves the network and
//! then serves balance queries, transfers, message signing and network
//! switching through [`WalletFacade`]. Every facade operation returns an
//! [`Outcome`], which renders to a `{ "success": bool, ... }` envelope via
//! [`envelope`].

mod acquisition;
pub mod address;
pub mod backend;
pub mod balance;
pub mod chain;
pub mod config;
pub mod error;
pub mod facade;
pub mod host;
pub mod logging;
pub mod network;
pub mod poll;
pub mod provider;
pub mod registry;
pub mod response;
pub mod session;
pub mod snapshot;
pub mod tokens;
pub mod transaction;

#[cfg(test)]
mod testing;

pub use address::{extract_address, is_valid_address, Address, AddressFamily, AddressInput};
pub use backend::{BackendKind, WalletBackend};
pub use chain::{ChainFamily, ChainId, TRON_CHAIN_ID};
pub use config::{generate_default_config, load_config, Environment, WalletConfig};
pub use error::{ExtractionFailure, RejectionReason, WalletError};
pub use facade::{NetworkInfo, ServiceInfo, WalletFacade};
pub use host::{HostEnvironment, HostKind, InjectionSlot, NativePlugin};
pub use network::{resolve_network, NetworkResolution, NetworkSignals};
pub use provider::{Capabilities, Capability, ProviderError, ProviderEvent, WalletProvider};
pub use response::{envelope, Failure, Outcome};
pub use session::{SessionSnapshot, SessionStatus};
pub use snapshot::{JsonFileSnapshotStore, MemorySnapshotStore, SessionRecord, SnapshotStore};
pub use tokens::{TokenInfo, TokenRegistry};
