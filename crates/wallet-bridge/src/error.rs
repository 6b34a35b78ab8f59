use thiserror::Error;

use crate::chain::ChainFamily;
use crate::provider::ProviderError;

/// Why account acquisition ended without a usable address.
///
/// Each kind needs a different remedy from the user, so the guidance text
/// attached to the error differs per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionFailure {
    /// The provider is present but reports no active account.
    AccountInactive,
    /// Nothing came back: the user declined or the wallet never answered.
    RejectedOrTimedOut,
    /// Data came back but no recognized field held a valid address.
    UnrecognizedShape,
}

/// Subclasses of a transaction the wallet refused to submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    InsufficientFunds,
    GasFailure,
    ContractRevert,
    InvalidAddress,
    /// The user declined in the wallet UI (EIP-1193 code 4001).
    Denied,
}

impl RejectionReason {
    fn code(self) -> &'static str {
        match self {
            RejectionReason::InsufficientFunds => "INSUFFICIENT_FUNDS",
            RejectionReason::GasFailure => "GAS_FAILURE",
            RejectionReason::ContractRevert => "CONTRACT_REVERT",
            RejectionReason::InvalidAddress => "INVALID_ADDRESS",
            RejectionReason::Denied => "USER_REJECTED",
        }
    }
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            RejectionReason::InsufficientFunds => "insufficient funds",
            RejectionReason::GasFailure => "gas failure",
            RejectionReason::ContractRevert => "contract revert",
            RejectionReason::InvalidAddress => "invalid address",
            RejectionReason::Denied => "denied by user",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum WalletError {
    #[error("no wallet provider found")]
    ProviderNotFound,

    #[error("address extraction failed ({family}): {}", extraction_summary(.kind))]
    AddressExtractionFailed {
        family: ChainFamily,
        kind: ExtractionFailure,
    },

    #[error("invalid address: {0}")]
    AddressInvalid(String),

    #[error("network {chain_id} is not supported (supported: {supported:?})")]
    NetworkUnsupported { chain_id: u64, supported: Vec<u64> },

    #[error("balance query failed: {0}")]
    BalanceQueryFailed(String),

    #[error("transaction rejected ({reason}): {message}")]
    TransactionRejected {
        reason: RejectionReason,
        message: String,
    },

    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error("connection is stale: {0}")]
    ConnectionStale(String),

    #[error("wallet is not connected")]
    NotConnected,

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("snapshot storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

fn extraction_summary(kind: &ExtractionFailure) -> &'static str {
    match kind {
        ExtractionFailure::AccountInactive => "provider found but no active account",
        ExtractionFailure::RejectedOrTimedOut => "connection rejected or timed out",
        ExtractionFailure::UnrecognizedShape => "unrecognized account data",
    }
}

impl WalletError {
    /// Stable machine-readable code for the failure envelope.
    pub fn code(&self) -> &'static str {
        match self {
            WalletError::ProviderNotFound => "PROVIDER_NOT_FOUND",
            WalletError::AddressExtractionFailed { .. } => "ADDRESS_EXTRACTION_FAILED",
            WalletError::AddressInvalid(_) => "ADDRESS_INVALID",
            WalletError::NetworkUnsupported { .. } => "NETWORK_UNSUPPORTED",
            WalletError::BalanceQueryFailed(_) => "BALANCE_QUERY_FAILED",
            WalletError::TransactionRejected { reason, .. } => reason.code(),
            WalletError::SigningFailed(_) => "SIGNING_FAILED",
            WalletError::ConnectionStale(_) => "CONNECTION_STALE",
            WalletError::NotConnected => "NOT_CONNECTED",
            WalletError::InvalidAmount(_) => "INVALID_AMOUNT",
            WalletError::Provider(_) => "PROVIDER_ERROR",
            WalletError::Config(_) => "CONFIG_ERROR",
            WalletError::Storage(_) => "STORAGE_ERROR",
            WalletError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Actionable guidance for the user, when there is any.
    pub fn suggestions(&self) -> Option<String> {
        match self {
            WalletError::ProviderNotFound => Some(
                "Open this page inside a wallet browser, or install a wallet extension and reload."
                    .into(),
            ),
            WalletError::AddressExtractionFailed { family, kind } => {
                Some(extraction_guidance(*family, *kind))
            }
            WalletError::NetworkUnsupported { supported, .. } => Some(format!(
                "Switch the wallet to one of the supported networks: {}.",
                supported
                    .iter()
                    .map(u64::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
            WalletError::TransactionRejected { reason, .. } => match reason {
                RejectionReason::InsufficientFunds => {
                    Some("Top up the account or lower the amount, then retry.".into())
                }
                RejectionReason::GasFailure => {
                    Some("Make sure the account holds enough native currency for gas.".into())
                }
                RejectionReason::ContractRevert => {
                    Some("Check the token balance and the recipient, then retry.".into())
                }
                RejectionReason::InvalidAddress => {
                    Some("Double-check the recipient address.".into())
                }
                RejectionReason::Denied => {
                    Some("Approve the request in the wallet popup to continue.".into())
                }
            },
            WalletError::ConnectionStale(_) | WalletError::NotConnected => {
                Some("Reconnect the wallet and try again.".into())
            }
            _ => None,
        }
    }
}

fn extraction_guidance(family: ChainFamily, kind: ExtractionFailure) -> String {
    let network = match family {
        ChainFamily::Evm => "an EVM network such as BSC",
        ChainFamily::Tron => "the TRON mainnet",
    };
    let steps: [String; 5] = match kind {
        ExtractionFailure::AccountInactive => [
            "Create or import an account in the wallet".into(),
            "Unlock the account".into(),
            "Enable DApp connections in the wallet settings".into(),
            "Reload the page and connect again".into(),
            format!("Select an account on {network}"),
        ],
        ExtractionFailure::RejectedOrTimedOut => [
            "Make sure the wallet app is installed and running".into(),
            "Tap \"Allow\" on the connection request".into(),
            "If no popup appeared, reload the page and retry".into(),
            "Check that the wallet is logged in".into(),
            format!("Make sure {network} is selected"),
        ],
        ExtractionFailure::UnrecognizedShape => [
            "Update the wallet to its latest version".into(),
            "Restart the wallet app".into(),
            "Clear the browser cache and retry".into(),
            "Check that the wallet is logged in".into(),
            format!("Re-select your account on {network}"),
        ],
    };

    steps
        .iter()
        .enumerate()
        .map(|(i, step)| format!("{}. {step}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

impl From<chain_evm::EvmError> for WalletError {
    fn from(e: chain_evm::EvmError) -> Self {
        match e {
            chain_evm::EvmError::InvalidAddress(msg) => WalletError::AddressInvalid(msg),
            chain_evm::EvmError::InvalidAmount(msg) => WalletError::InvalidAmount(msg),
            other => WalletError::Internal(format!("EVM: {other}")),
        }
    }
}

impl From<chain_tron::TronError> for WalletError {
    fn from(e: chain_tron::TronError) -> Self {
        match e {
            chain_tron::TronError::InvalidAddress(msg) => WalletError::AddressInvalid(msg),
            other => WalletError::Internal(format!("TRON: {other}")),
        }
    }
}
