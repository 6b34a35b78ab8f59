//! Transaction building and submission through the connected wallet.
//!
//! Signing happens inside the wallet. This module only validates inputs,
//! encodes calldata and maps wallet failures onto [`RejectionReason`].

use std::sync::Arc;

use chain_evm::transaction::TransactionRequest;
use chain_evm::units::{Amount, NATIVE_DECIMALS};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::address::{extract_address, Address, AddressFamily, AddressInput};
use crate::chain::{ChainFamily, ChainId};
use crate::error::{RejectionReason, WalletError};
use crate::poll::with_deadline;
use crate::provider::ProviderError;
use crate::session::{ConnectedContext, ConnectionSession};
use crate::tokens::TokenRegistry;

pub const DEFAULT_GAS_LIMIT: u64 = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionSettings {
    /// Used when `eth_estimateGas` fails or is unsupported.
    pub default_gas_limit: u64,
    /// Reject mixed-case recipients whose EIP-55 checksum is wrong.
    pub strict_checksum: bool,
}

impl Default for TransactionSettings {
    fn default() -> Self {
        Self {
            default_gas_limit: DEFAULT_GAS_LIMIT,
            strict_checksum: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedTransaction {
    pub tx_hash: String,
    pub chain_id: u64,
    pub from: String,
    pub to: String,
    /// Amount as given by the caller, in human units.
    pub amount: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedMessage {
    pub message: String,
    pub signature: String,
    pub address: String,
}

pub struct TransactionBuilder {
    session: Arc<ConnectionSession>,
    tokens: Arc<TokenRegistry>,
    settings: TransactionSettings,
}

impl TransactionBuilder {
    pub fn new(
        session: Arc<ConnectionSession>,
        tokens: Arc<TokenRegistry>,
        settings: TransactionSettings,
    ) -> Self {
        Self {
            session,
            tokens,
            settings,
        }
    }

    /// Native transfer of `amount` (18-decimal units) to `to`.
    pub async fn send_transaction(
        &self,
        to: &AddressInput,
        amount: &Amount,
    ) -> Result<SubmittedTransaction, WalletError> {
        let ctx = self.session.connected()?;
        require_evm(&ctx)?;
        let recipient = self.recipient(to)?;
        let value = amount.to_base_units(NATIVE_DECIMALS)?;

        let tx = TransactionRequest::native_transfer(ctx.account.as_str(), recipient.as_str(), value)?;
        let hash = self.submit(&ctx, &tx).await?;

        info!(chain = %ctx.chain, to = %recipient, %amount, tx = %hash, "native transfer submitted");
        Ok(SubmittedTransaction {
            tx_hash: hash,
            chain_id: ctx.chain.id(),
            from: ctx.account.to_string(),
            to: recipient.to_string(),
            amount: amount.to_string(),
            token: None,
            gas_limit: None,
        })
    }

    /// ERC-20 `transfer` of a registered token on the current chain.
    pub async fn send_token_transfer(
        &self,
        symbol: &str,
        to: &AddressInput,
        amount: &Amount,
    ) -> Result<SubmittedTransaction, WalletError> {
        if !amount.is_positive() {
            return Err(WalletError::InvalidAmount(format!(
                "transfer amount must be positive, got {amount}"
            )));
        }

        let ctx = self.session.connected()?;
        require_evm(&ctx)?;
        let token = self
            .tokens
            .lookup(ctx.chain, symbol)
            .ok_or_else(|| WalletError::NetworkUnsupported {
                chain_id: ctx.chain.id(),
                supported: self.tokens.supported_chains(symbol),
            })?
            .clone();
        let recipient = self.recipient(to)?;
        let units = amount.to_base_units(token.decimals)?;

        let tx = TransactionRequest::erc20_transfer(
            ctx.account.as_str(),
            &token.contract,
            recipient.as_str(),
            units,
        )?;
        let gas_limit = self.estimate_gas(&ctx, &tx).await;
        let hash = self.submit(&ctx, &tx.with_gas(gas_limit)).await?;

        info!(
            chain = %ctx.chain,
            token = %token.symbol,
            to = %recipient,
            %amount,
            gas_limit,
            tx = %hash,
            "token transfer submitted"
        );
        Ok(SubmittedTransaction {
            tx_hash: hash,
            chain_id: ctx.chain.id(),
            from: ctx.account.to_string(),
            to: recipient.to_string(),
            amount: amount.to_string(),
            token: Some(token.symbol),
            gas_limit: Some(gas_limit),
        })
    }

    /// `personal_sign` over the UTF-8 bytes of `message`.
    pub async fn sign_message(&self, message: &str) -> Result<SignedMessage, WalletError> {
        let ctx = self.session.connected()?;
        require_evm(&ctx)?;

        let payload = format!("0x{}", hex::encode(message.as_bytes()));
        let reply = with_deadline(
            self.session.settings().request_timeout,
            ctx.provider
                .request("personal_sign", json!([payload, ctx.account.as_str()])),
        )
        .await
        .map_err(|e| match e {
            e if e.is_user_rejection() => WalletError::TransactionRejected {
                reason: RejectionReason::Denied,
                message: e.to_string(),
            },
            e => WalletError::SigningFailed(e.to_string()),
        })?;

        let signature = reply
            .as_str()
            .filter(|s| s.starts_with("0x"))
            .ok_or_else(|| WalletError::SigningFailed(format!("unexpected signature {reply}")))?;

        debug!(account = %ctx.account, "message signed");
        Ok(SignedMessage {
            message: message.to_string(),
            signature: signature.to_string(),
            address: ctx.account.to_string(),
        })
    }

    fn recipient(&self, to: &AddressInput) -> Result<Address, WalletError> {
        let address = extract_address(to).ok_or_else(|| WalletError::TransactionRejected {
            reason: RejectionReason::InvalidAddress,
            message: format!("no valid recipient in {to:?}"),
        })?;

        if address.family() != AddressFamily::EvmHex {
            return Err(WalletError::TransactionRejected {
                reason: RejectionReason::InvalidAddress,
                message: format!("{address} is not an EVM address"),
            });
        }

        if self.settings.strict_checksum && !checksum_ok(address.as_str()) {
            return Err(WalletError::TransactionRejected {
                reason: RejectionReason::InvalidAddress,
                message: format!("{address} has an invalid EIP-55 checksum"),
            });
        }
        Ok(address)
    }

    async fn estimate_gas(&self, ctx: &ConnectedContext, tx: &TransactionRequest) -> u64 {
        let params = match serde_json::to_value(tx) {
            Ok(value) => json!([value]),
            Err(_) => return self.settings.default_gas_limit,
        };

        let estimate = with_deadline(
            self.session.settings().request_timeout,
            ctx.provider.request("eth_estimateGas", params),
        )
        .await;

        match estimate.map(|v| parse_gas(&v)) {
            Ok(Some(gas)) => gas,
            Ok(None) => {
                warn!("gas estimate was not a quantity, using default");
                self.settings.default_gas_limit
            }
            Err(e) => {
                warn!(error = %e, "gas estimation failed, using default");
                self.settings.default_gas_limit
            }
        }
    }

    async fn submit(
        &self,
        ctx: &ConnectedContext,
        tx: &TransactionRequest,
    ) -> Result<String, WalletError> {
        let params = json!([serde_json::to_value(tx)
            .map_err(|e| WalletError::Internal(format!("serialize transaction: {e}")))?]);

        let reply = with_deadline(
            self.session.settings().request_timeout,
            ctx.provider.request("eth_sendTransaction", params),
        )
        .await
        .map_err(classify_rejection)?;

        match reply {
            Value::String(hash) if !hash.is_empty() => Ok(hash),
            other => Err(WalletError::Provider(ProviderError::Malformed(format!(
                "expected transaction hash, got {other}"
            )))),
        }
    }
}

fn require_evm(ctx: &ConnectedContext) -> Result<(), WalletError> {
    match ctx.chain.family() {
        ChainFamily::Evm => Ok(()),
        ChainFamily::Tron => Err(WalletError::NetworkUnsupported {
            chain_id: ctx.chain.id(),
            supported: ChainId::evm_ids(),
        }),
    }
}

/// All-lowercase and all-uppercase addresses carry no checksum.
fn checksum_ok(address: &str) -> bool {
    let body = &address[2..];
    let lower = body.chars().all(|c| !c.is_ascii_uppercase());
    let upper = body.chars().all(|c| !c.is_ascii_lowercase());
    lower || upper || chain_evm::address::verify_checksum(address).unwrap_or(false)
}

fn parse_gas(value: &Value) -> Option<u64> {
    let quantity = chain_evm::units::parse_quantity(value.as_str()?).ok()?;
    if quantity.is_zero() || quantity > alloy_primitives::U256::from(u64::MAX) {
        return None;
    }
    Some(quantity.as_limbs()[0])
}

/// Maps a wallet's refusal onto a rejection reason by code and message.
pub(crate) fn classify_rejection(err: ProviderError) -> WalletError {
    if err.is_user_rejection() {
        return WalletError::TransactionRejected {
            reason: RejectionReason::Denied,
            message: err.to_string(),
        };
    }

    let message = err.to_string();
    let lower = message.to_ascii_lowercase();
    let reason = if lower.contains("insufficient funds") {
        Some(RejectionReason::InsufficientFunds)
    } else if lower.contains("revert") {
        Some(RejectionReason::ContractRevert)
    } else if lower.contains("gas") {
        Some(RejectionReason::GasFailure)
    } else if lower.contains("invalid address") {
        Some(RejectionReason::InvalidAddress)
    } else {
        None
    };

    match reason {
        Some(reason) => WalletError::TransactionRejected { reason, message },
        None => WalletError::Provider(err),
    }
}
