//! Provider discovery.
//!
//! A page may carry several wallet handles at once. The registry walks the
//! injection slots in priority order and takes the first acceptable one;
//! when nothing is injected yet it keeps looking for a bounded time.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::WalletError;
use crate::host::{HostEnvironment, InjectionSlot};
use crate::poll::{poll_until, PollPolicy};
use crate::provider::WalletProvider;

/// Slot order used during discovery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderPriority {
    /// Mobile EVM, mobile TRON, ready desktop TRON, generic TRON.
    #[default]
    MobileFirst,
    /// Desktop TRON, mobile TRON, generic TRON. Mobile EVM handles are
    /// never selected.
    DesktopFirst,
}

impl ProviderPriority {
    pub fn slots(self) -> &'static [InjectionSlot] {
        match self {
            ProviderPriority::MobileFirst => &[
                InjectionSlot::MobileEvm,
                InjectionSlot::MobileTron,
                InjectionSlot::DesktopTron,
                InjectionSlot::GenericTron,
            ],
            ProviderPriority::DesktopFirst => &[
                InjectionSlot::DesktopTron,
                InjectionSlot::MobileTron,
                InjectionSlot::GenericTron,
            ],
        }
    }
}

/// The handle chosen for a session and the slot it came from.
#[derive(Clone)]
pub struct SelectedProvider {
    pub slot: InjectionSlot,
    pub provider: Arc<dyn WalletProvider>,
}

impl std::fmt::Debug for SelectedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectedProvider")
            .field("slot", &self.slot)
            .field("provider", &self.provider.name())
            .finish()
    }
}

pub struct ProviderRegistry {
    host: Arc<dyn HostEnvironment>,
    priority: ProviderPriority,
    poll: PollPolicy,
}

impl ProviderRegistry {
    pub fn new(host: Arc<dyn HostEnvironment>, priority: ProviderPriority, poll: PollPolicy) -> Self {
        Self {
            host,
            priority,
            poll,
        }
    }

    /// One pass over the slots, without waiting.
    pub fn select(&self) -> Option<SelectedProvider> {
        self.priority.slots().iter().find_map(|&slot| {
            let provider = self.host.injected(slot)?;
            if accepts(slot, provider.as_ref()) {
                debug!(?slot, provider = provider.name(), "provider selected");
                Some(SelectedProvider { slot, provider })
            } else {
                debug!(?slot, provider = provider.name(), "provider present but not eligible");
                None
            }
        })
    }

    /// Selects a provider, polling for late injection before giving up.
    pub async fn discover(&self, cancel: &CancellationToken) -> Result<SelectedProvider, WalletError> {
        if let Some(selected) = self.select() {
            return Ok(selected);
        }

        info!(
            attempts = self.poll.attempts,
            "no provider injected yet, waiting"
        );
        match poll_until(&self.poll, cancel, || async { self.select() }).await {
            Some(selected) => Ok(selected),
            None => {
                warn!("no wallet provider appeared");
                Err(WalletError::ProviderNotFound)
            }
        }
    }
}

fn accepts(slot: InjectionSlot, provider: &dyn WalletProvider) -> bool {
    match slot {
        InjectionSlot::MobileEvm | InjectionSlot::MobileTron => provider.is_vendor_branded(),
        InjectionSlot::DesktopTron => provider.is_ready(),
        InjectionSlot::GenericTron => true,
    }
}
