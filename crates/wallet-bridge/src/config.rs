//! Configuration loading and default template generation.
//!
//! Every field has a default, so an empty file is a valid configuration.
//!
//! ```toml
//! environment = "development"
//! provider_priority = "mobile-first"
//!
//! [timeouts]
//! request_ms = 30000
//! activation_ms = 10000
//!
//! [[tokens]]
//! symbol = "USDT"
//! chain_id = 56
//! contract = "0x55d398326f99059fF775485246999027B3197955"
//! decimals = 18
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::WalletError;
use crate::poll::PollPolicy;
use crate::registry::ProviderPriority;
use crate::session::SessionSettings;
use crate::tokens::{TokenInfo, TokenRegistry};
use crate::transaction::{TransactionSettings, DEFAULT_GAS_LIMIT};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Environment::Development => "development",
            Environment::Production => "production",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline for each provider round-trip.
    pub request_ms: u64,
    /// Budget for `enable()` plus the address reread that follows it.
    pub activation_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_ms: 30_000,
            activation_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        let policy = PollPolicy::default();
        Self {
            attempts: policy.attempts,
            initial_delay_ms: policy.initial_delay.as_millis() as u64,
            max_delay_ms: policy.max_delay.as_millis() as u64,
        }
    }
}

impl From<&PollConfig> for PollPolicy {
    fn from(c: &PollConfig) -> Self {
        PollPolicy {
            attempts: c.attempts,
            initial_delay: Duration::from_millis(c.initial_delay_ms),
            max_delay: Duration::from_millis(c.max_delay_ms.max(c.initial_delay_ms)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GasConfig {
    pub default_limit: u64,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_GAS_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressConfig {
    pub strict_checksum: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    pub ttl_secs: u64,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self { ttl_secs: 300 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    pub environment: Environment,
    pub provider_priority: ProviderPriority,
    pub timeouts: TimeoutConfig,
    pub provider_poll: PollConfig,
    pub gas: GasConfig,
    pub address: AddressConfig,
    pub snapshot: SnapshotConfig,
    pub tokens: Vec<TokenInfo>,
}

impl WalletConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, WalletError> {
        let config: WalletConfig =
            toml::from_str(content).map_err(|e| WalletError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), WalletError> {
        if self.timeouts.request_ms == 0 {
            return Err(WalletError::Config("timeouts.request_ms must be positive".into()));
        }
        if self.gas.default_limit == 0 {
            return Err(WalletError::Config("gas.default_limit must be positive".into()));
        }
        for token in &self.tokens {
            if !token.contract.starts_with("0x") || token.contract.len() != 42 {
                return Err(WalletError::Config(format!(
                    "token {} on chain {} has an invalid contract address",
                    token.symbol, token.chain_id
                )));
            }
        }
        Ok(())
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            request_timeout: Duration::from_millis(self.timeouts.request_ms),
            activation_timeout: Duration::from_millis(self.timeouts.activation_ms),
            ..SessionSettings::default()
        }
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy::from(&self.provider_poll)
    }

    pub fn transaction_settings(&self) -> TransactionSettings {
        TransactionSettings {
            default_gas_limit: self.gas.default_limit,
            strict_checksum: self.address.strict_checksum,
        }
    }

    /// Built-in tokens with the configured entries applied on top.
    pub fn token_registry(&self) -> TokenRegistry {
        TokenRegistry::builtin().with_overrides(&self.tokens)
    }

    pub fn snapshot_ttl(&self) -> Duration {
        Duration::from_secs(self.snapshot.ttl_secs)
    }
}

/// Load configuration from a TOML file at the given path.
///
/// # Errors
///
/// Returns [`WalletError::Config`] if the file cannot be read or parsed.
pub fn load_config(path: &Path) -> Result<WalletConfig, WalletError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        WalletError::Config(format!("failed to read config file '{}': {e}", path.display()))
    })?;
    WalletConfig::from_toml_str(&content).map_err(|e| match e {
        WalletError::Config(msg) => {
            WalletError::Config(format!("failed to parse '{}': {msg}", path.display()))
        }
        other => other,
    })
}

/// Generate a default TOML configuration template.
#[must_use]
pub fn generate_default_config() -> String {
    String::from(
        r#"# Wallet bridge configuration

# "development" allows the simulated wallet when the native plugin fails.
# "production" never falls back to it.
environment = "development"

# Slot order when several wallets are injected:
# "mobile-first" or "desktop-first".
provider_priority = "mobile-first"

[timeouts]
request_ms = 30000
activation_ms = 10000

# Bounded wait for a provider injected after page load.
[provider_poll]
attempts = 5
initial_delay_ms = 200
max_delay_ms = 1000

[gas]
# Used when eth_estimateGas fails.
default_limit = 100000

[address]
# Reject mixed-case EVM recipients whose EIP-55 checksum is wrong.
strict_checksum = false

[snapshot]
# Saved sessions older than this are discarded.
ttl_secs = 300

# ── Token overrides ─────────────────────────────────────────────────
# Entries replace the built-in USDT table per (symbol, chain_id).
#
# [[tokens]]
# symbol = "USDT"
# chain_id = 56
# contract = "0x55d398326f99059fF775485246999027B3197955"
# decimals = 18
"#,
    )
}
