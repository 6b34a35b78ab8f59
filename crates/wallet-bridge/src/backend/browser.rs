use std::sync::Arc;

use async_trait::async_trait;
use chain_evm::units::Amount;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{BackendKind, TransactionHistory, WalletBackend};
use crate::address::AddressInput;
use crate::balance::{BalanceService, NativeBalance, TokenBalance};
use crate::chain::{ChainFamily, ChainId};
use crate::error::WalletError;
use crate::poll::with_deadline;
use crate::session::{ConnectionSession, SessionSnapshot};
use crate::tokens::TokenRegistry;
use crate::transaction::{SignedMessage, SubmittedTransaction, TransactionBuilder, TransactionSettings};

/// Backend over a provider handle injected into a web page.
pub struct BrowserBackend {
    session: Arc<ConnectionSession>,
    tokens: Arc<TokenRegistry>,
    balances: BalanceService,
    transactions: TransactionBuilder,
}

impl BrowserBackend {
    pub fn new(
        session: Arc<ConnectionSession>,
        tokens: Arc<TokenRegistry>,
        tx_settings: TransactionSettings,
    ) -> Self {
        Self {
            balances: BalanceService::new(session.clone(), tokens.clone()),
            transactions: TransactionBuilder::new(session.clone(), tokens.clone(), tx_settings),
            session,
            tokens,
        }
    }

    pub fn session(&self) -> &Arc<ConnectionSession> {
        &self.session
    }
}

#[async_trait]
impl WalletBackend for BrowserBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Browser
    }

    fn status(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    async fn connect(&self, cancel: &CancellationToken) -> Result<SessionSnapshot, WalletError> {
        self.session.connect(cancel).await
    }

    async fn disconnect(&self) {
        self.session.disconnect().await;
    }

    async fn balance(&self, address: Option<&AddressInput>) -> Result<NativeBalance, WalletError> {
        self.balances.get_balance(address).await
    }

    async fn token_balance(
        &self,
        contract: &str,
        address: Option<&AddressInput>,
    ) -> Result<TokenBalance, WalletError> {
        self.balances.get_token_balance(contract, address).await
    }

    async fn usdt_balance(&self, address: Option<&AddressInput>) -> Result<TokenBalance, WalletError> {
        self.balances.get_usdt_balance(address).await
    }

    async fn send_transaction(
        &self,
        to: &AddressInput,
        amount: &Amount,
    ) -> Result<SubmittedTransaction, WalletError> {
        self.transactions.send_transaction(to, amount).await
    }

    async fn send_token_transfer(
        &self,
        symbol: &str,
        to: &AddressInput,
        amount: &Amount,
    ) -> Result<SubmittedTransaction, WalletError> {
        self.transactions.send_token_transfer(symbol, to, amount).await
    }

    async fn sign_message(&self, message: &str) -> Result<SignedMessage, WalletError> {
        self.transactions.sign_message(message).await
    }

    async fn switch_network(&self, target: ChainId) -> Result<SessionSnapshot, WalletError> {
        self.session.switch_network(target).await
    }

    async fn validate(&self) -> bool {
        self.session.validate().await
    }

    /// Asks the wallet to track a registered token (`wallet_watchAsset`).
    async fn watch_token(&self, symbol: &str) -> Result<bool, WalletError> {
        let ctx = self.session.connected()?;
        let token = match ctx.chain.family() {
            ChainFamily::Evm => self.tokens.lookup(ctx.chain, symbol),
            ChainFamily::Tron => None,
        }
        .ok_or_else(|| WalletError::NetworkUnsupported {
            chain_id: ctx.chain.id(),
            supported: self.tokens.supported_chains(symbol),
        })?;

        let params = json!({
            "type": "ERC20",
            "options": {
                "address": token.contract,
                "symbol": token.symbol,
                "decimals": token.decimals,
            }
        });
        let added = with_deadline(
            self.session.settings().request_timeout,
            ctx.provider.request("wallet_watchAsset", params),
        )
        .await?;

        let added = added.as_bool().unwrap_or(false);
        info!(token = %token.symbol, chain = %ctx.chain, added, "watchAsset answered");
        Ok(added)
    }

    async fn transaction_history(
        &self,
        _address: Option<&AddressInput>,
        _limit: usize,
    ) -> Result<TransactionHistory, WalletError> {
        self.session.connected()?;
        Ok(TransactionHistory {
            transactions: Vec::new(),
            note: Some("browser wallets do not expose transaction history; use a block explorer".into()),
        })
    }

    async fn pump_events(&self) -> usize {
        self.session.pump_events().await
    }
}
