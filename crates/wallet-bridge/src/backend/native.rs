use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chain_evm::units::{format_units, scale_to_f64, Amount};
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{BackendKind, TransactionHistory, WalletBackend};
use crate::address::{extract_address, Address, AddressInput};
use crate::balance::NativeBalance;
use crate::chain::{ChainFamily, ChainId};
use crate::error::{ExtractionFailure, RejectionReason, WalletError};
use crate::host::NativePlugin;
use crate::network::{parse_chain_signal, settle_chain, NetworkResolution};
use crate::poll::with_deadline;
use crate::provider::ProviderError;
use crate::session::{SessionCell, SessionSnapshot};
use crate::transaction::{classify_rejection, SignedMessage, SubmittedTransaction};

const PROVIDER_NAME: &str = "native-plugin";

/// Backend over an app shell's native wallet plugin.
///
/// Every plugin method answers `{success, ...}`; a `success: false` reply
/// carries an `error` message.
///
/// The plugin has no account or status query, so the session is only as
/// fresh as the last `connectWallet` reply. [`WalletBackend::validate`]
/// reports the local session and never calls the plugin.
pub struct NativeBackend {
    plugin: Option<Arc<dyn NativePlugin>>,
    cell: SessionCell,
    timeout: Duration,
}

impl NativeBackend {
    pub fn new(plugin: Option<Arc<dyn NativePlugin>>, timeout: Duration) -> Self {
        Self {
            plugin,
            cell: SessionCell::new(),
            timeout,
        }
    }

    fn current(&self) -> Result<(Address, ChainId), WalletError> {
        let snapshot = self.cell.snapshot();
        match (snapshot.is_connected(), snapshot.account, snapshot.chain) {
            (true, Some(account), Some(chain)) => Ok((account, chain)),
            _ => Err(WalletError::NotConnected),
        }
    }

    /// Calls `method` and unwraps the `{success, ...}` envelope. Failures
    /// are turned into errors by `on_error`.
    async fn call(
        &self,
        method: &str,
        params: Value,
        on_error: fn(ProviderError) -> WalletError,
    ) -> Result<Map<String, Value>, WalletError> {
        let plugin = self.plugin.as_ref().ok_or(WalletError::ProviderNotFound)?;
        debug!(method, "native plugin call");

        let reply = with_deadline(self.timeout, plugin.call(method, params))
            .await
            .map_err(on_error)?;

        match reply {
            Value::Object(fields) if fields.get("success") == Some(&Value::Bool(true)) => Ok(fields),
            Value::Object(fields) => {
                let message = fields
                    .get("error")
                    .and_then(Value::as_str)
                    .unwrap_or("plugin call failed")
                    .to_string();
                Err(on_error(ProviderError::Rpc { code: -1, message }))
            }
            other => Err(on_error(ProviderError::Malformed(format!(
                "{method} returned {other}"
            )))),
        }
    }

    fn target(
        &self,
        address: Option<&AddressInput>,
        account: &Address,
    ) -> Result<Address, WalletError> {
        match address {
            Some(input) => extract_address(input)
                .ok_or_else(|| WalletError::AddressInvalid(format!("{input:?}"))),
            None => Ok(account.clone()),
        }
    }
}

#[async_trait]
impl WalletBackend for NativeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Native
    }

    fn status(&self) -> SessionSnapshot {
        self.cell.snapshot()
    }

    async fn connect(&self, _cancel: &CancellationToken) -> Result<SessionSnapshot, WalletError> {
        let writer = self.cell.writer().await;
        writer.begin_connect();

        let reply = match self.call("connectWallet", json!({}), WalletError::Provider).await {
            Ok(reply) => reply,
            Err(e) => {
                writer.fail();
                return Err(e);
            }
        };

        let signal = reply.get("chainId").map(signal_text);
        let resolution = match signal.as_deref() {
            Some(raw) => match parse_chain_signal(raw) {
                Some(chain) => NetworkResolution::Known(chain),
                None => NetworkResolution::Unrecognized(raw.to_string()),
            },
            None => NetworkResolution::Unknown,
        };

        let account = reply
            .get("account")
            .and_then(AddressInput::from_json)
            .and_then(|input| extract_address(&input));
        let Some(account) = account else {
            writer.fail();
            return Err(WalletError::AddressExtractionFailed {
                family: resolution.chain().map_or(ChainFamily::Tron, ChainId::family),
                kind: ExtractionFailure::UnrecognizedShape,
            });
        };

        let chain = settle_chain(&resolution, &account);
        writer.commit(account, chain, None, PROVIDER_NAME);
        info!(%chain, "native wallet connected");
        Ok(writer.snapshot())
    }

    /// Local state only; there is nothing on the plugin to revalidate against.
    async fn validate(&self) -> bool {
        self.cell.snapshot().is_connected()
    }

    async fn disconnect(&self) {
        let writer = self.cell.writer().await;
        writer.reset();
        if self.plugin.is_some() {
            if let Err(e) = self
                .call("disconnectWallet", json!({}), WalletError::Provider)
                .await
            {
                warn!(error = %e, "native disconnect failed, local session cleared anyway");
            }
        }
    }

    async fn balance(&self, address: Option<&AddressInput>) -> Result<NativeBalance, WalletError> {
        let (account, chain) = self.current()?;
        let target = self.target(address, &account)?;

        let reply = self
            .call(
                "getBalance",
                json!({ "address": target.as_str() }),
                |e| WalletError::BalanceQueryFailed(e.to_string()),
            )
            .await?;

        let amount = match reply.get("balance") {
            Some(Value::String(s)) => Amount::parse(s),
            Some(Value::Number(n)) => n
                .as_f64()
                .ok_or_else(|| chain_evm::EvmError::InvalidAmount(n.to_string()))
                .and_then(Amount::try_from),
            other => {
                return Err(WalletError::BalanceQueryFailed(format!(
                    "unexpected balance {other:?}"
                )))
            }
        }
        .map_err(|e| WalletError::BalanceQueryFailed(e.to_string()))?;

        let decimals = chain.native_decimals();
        let raw = amount.to_base_units(decimals)?;
        Ok(NativeBalance {
            chain_id: chain.id(),
            address: target.to_string(),
            symbol: chain.native_symbol().to_string(),
            decimals,
            raw: raw.to_string(),
            formatted: format_units(raw, decimals)?,
            balance: scale_to_f64(raw, decimals)?,
        })
    }

    async fn send_transaction(
        &self,
        to: &AddressInput,
        amount: &Amount,
    ) -> Result<SubmittedTransaction, WalletError> {
        let (account, chain) = self.current()?;
        let recipient = extract_address(to)
            .filter(|a| a.chain_family() == chain.family())
            .ok_or_else(|| WalletError::TransactionRejected {
                reason: RejectionReason::InvalidAddress,
                message: format!("no valid {} recipient in {to:?}", chain.family()),
            })?;
        if !amount.is_positive() {
            return Err(WalletError::InvalidAmount(format!(
                "transfer amount must be positive, got {amount}"
            )));
        }

        let reply = self
            .call(
                "sendTransaction",
                json!({
                    "toAddress": recipient.as_str(),
                    "amount": amount.to_string(),
                    "fromAddress": account.as_str(),
                }),
                classify_rejection,
            )
            .await?;

        let tx_hash = reply
            .get("txId")
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::Malformed("sendTransaction reply has no txId".into()))?
            .to_string();

        info!(%chain, to = %recipient, %amount, tx = %tx_hash, "native transfer submitted");
        Ok(SubmittedTransaction {
            tx_hash,
            chain_id: chain.id(),
            from: account.to_string(),
            to: recipient.to_string(),
            amount: amount.to_string(),
            token: None,
            gas_limit: None,
        })
    }

    async fn sign_message(&self, message: &str) -> Result<SignedMessage, WalletError> {
        let (account, _) = self.current()?;
        let reply = self
            .call("signMessage", json!({ "message": message }), |e| {
                WalletError::SigningFailed(e.to_string())
            })
            .await?;

        let signature = reply
            .get("signature")
            .and_then(Value::as_str)
            .ok_or_else(|| WalletError::SigningFailed("reply has no signature".into()))?;
        Ok(SignedMessage {
            message: message.to_string(),
            signature: signature.to_string(),
            address: account.to_string(),
        })
    }

    async fn transaction_history(
        &self,
        address: Option<&AddressInput>,
        limit: usize,
    ) -> Result<TransactionHistory, WalletError> {
        let (account, _) = self.current()?;
        let target = self.target(address, &account)?;

        let reply = self
            .call(
                "getTransactionHistory",
                json!({ "address": target.as_str(), "limit": limit }),
                WalletError::Provider,
            )
            .await?;

        let transactions = match reply.get("transactions") {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        };
        Ok(TransactionHistory {
            transactions,
            note: None,
        })
    }
}

fn signal_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{EVM_ACCOUNT, TRON_ACCOUNT};
    use std::sync::Mutex;

    /// Plugin answering each method with a fixed reply.
    struct Plugin {
        replies: Vec<(&'static str, Result<Value, ProviderError>)>,
        calls: Mutex<Vec<(String, Value)>>,
    }

    impl Plugin {
        fn new(replies: Vec<(&'static str, Result<Value, ProviderError>)>) -> Arc<Self> {
            Arc::new(Self {
                replies,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn params(&self, method: &str) -> Value {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .find(|(m, _)| m == method)
                .map(|(_, p)| p.clone())
                .unwrap()
        }
    }

    #[async_trait]
    impl NativePlugin for Plugin {
        async fn call(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
            self.calls.lock().unwrap().push((method.to_string(), params));
            self.replies
                .iter()
                .find(|(m, _)| *m == method)
                .map(|(_, r)| r.clone())
                .unwrap_or(Err(ProviderError::Unsupported("method")))
        }
    }

    fn backend(plugin: Arc<Plugin>) -> NativeBackend {
        NativeBackend::new(Some(plugin), Duration::from_secs(1))
    }

    fn tron_plugin(extra: Vec<(&'static str, Result<Value, ProviderError>)>) -> Arc<Plugin> {
        let mut replies = vec![(
            "connectWallet",
            Ok(json!({ "success": true, "account": TRON_ACCOUNT, "chainId": 1 })),
        )];
        replies.extend(extra);
        Plugin::new(replies)
    }

    #[tokio::test]
    async fn tron_account_settles_on_tron() {
        let backend = backend(tron_plugin(vec![]));
        let snap = backend.connect(&CancellationToken::new()).await.unwrap();
        assert_eq!(snap.chain, Some(ChainId::Tron));
        assert_eq!(snap.provider.as_deref(), Some(PROVIDER_NAME));
    }

    #[tokio::test]
    async fn validation_reports_local_session_without_plugin_calls() {
        let plugin = tron_plugin(vec![]);
        let backend = backend(plugin.clone());
        assert!(!backend.validate().await);

        backend.connect(&CancellationToken::new()).await.unwrap();
        assert!(backend.validate().await);
        let methods: Vec<String> = plugin
            .calls
            .lock()
            .unwrap()
            .iter()
            .map(|(m, _)| m.clone())
            .collect();
        assert_eq!(methods, vec!["connectWallet"]);
    }

    #[tokio::test]
    async fn evm_account_keeps_reported_chain() {
        let plugin = Plugin::new(vec![(
            "connectWallet",
            Ok(json!({ "success": true, "account": EVM_ACCOUNT, "chainId": "0xa" })),
        )]);
        let backend = backend(plugin);
        let snap = backend.connect(&CancellationToken::new()).await.unwrap();
        assert_eq!(snap.chain, Some(ChainId::Optimism));
    }

    #[tokio::test]
    async fn failed_connect_marks_failed() {
        let plugin = Plugin::new(vec![(
            "connectWallet",
            Ok(json!({ "success": false, "error": "wallet locked" })),
        )]);
        let backend = backend(plugin);

        let err = backend.connect(&CancellationToken::new()).await.unwrap_err();
        assert!(err.to_string().contains("wallet locked"));
        assert!(!backend.status().is_connected());
    }

    #[tokio::test]
    async fn missing_plugin_is_provider_not_found() {
        let backend = NativeBackend::new(None, Duration::from_secs(1));
        assert_eq!(
            backend.connect(&CancellationToken::new()).await.unwrap_err(),
            WalletError::ProviderNotFound
        );
    }

    #[tokio::test]
    async fn balance_is_read_in_human_units() {
        let plugin = tron_plugin(vec![(
            "getBalance",
            Ok(json!({ "success": true, "balance": "12.345678" })),
        )]);
        let backend = backend(plugin.clone());
        backend.connect(&CancellationToken::new()).await.unwrap();

        let balance = backend.balance(None).await.unwrap();
        assert_eq!(balance.raw, "12345678");
        assert_eq!(balance.symbol, "TRX");
        assert_eq!(plugin.params("getBalance"), json!({ "address": TRON_ACCOUNT }));
    }

    #[tokio::test]
    async fn send_transaction_forwards_plugin_fields() {
        let plugin = tron_plugin(vec![(
            "sendTransaction",
            Ok(json!({ "success": true, "txId": "abc" })),
        )]);
        let backend = backend(plugin.clone());
        backend.connect(&CancellationToken::new()).await.unwrap();

        let to = "TLa2f6VPqDgRE67v1736s7bJ8Ray5wYjU7";
        let sent = backend
            .send_transaction(&AddressInput::from(to), &Amount::parse("5").unwrap())
            .await
            .unwrap();
        assert_eq!(sent.tx_hash, "abc");
        assert_eq!(
            plugin.params("sendTransaction"),
            json!({ "toAddress": to, "amount": "5", "fromAddress": TRON_ACCOUNT })
        );
    }

    #[tokio::test]
    async fn insufficient_funds_from_plugin_is_classified() {
        let plugin = tron_plugin(vec![(
            "sendTransaction",
            Ok(json!({ "success": false, "error": "Insufficient funds" })),
        )]);
        let backend = backend(plugin);
        backend.connect(&CancellationToken::new()).await.unwrap();

        let err = backend
            .send_transaction(
                &AddressInput::from("TLa2f6VPqDgRE67v1736s7bJ8Ray5wYjU7"),
                &Amount::parse("1").unwrap(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INSUFFICIENT_FUNDS");
    }

    #[tokio::test]
    async fn history_passes_limit() {
        let plugin = tron_plugin(vec![(
            "getTransactionHistory",
            Ok(json!({ "success": true, "transactions": [{ "txId": "a" }] })),
        )]);
        let backend = backend(plugin.clone());
        backend.connect(&CancellationToken::new()).await.unwrap();

        let history = backend.transaction_history(None, 5).await.unwrap();
        assert_eq!(history.transactions.len(), 1);
        assert_eq!(plugin.params("getTransactionHistory")["limit"], 5);
    }

    #[tokio::test]
    async fn token_operations_are_unsupported() {
        let backend = backend(tron_plugin(vec![]));
        backend.connect(&CancellationToken::new()).await.unwrap();
        assert_eq!(
            backend.usdt_balance(None).await.unwrap_err().code(),
            "PROVIDER_ERROR"
        );
    }
}
