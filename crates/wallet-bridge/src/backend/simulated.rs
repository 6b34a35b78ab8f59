//! A fake wallet for development builds.
//!
//! Accounts, balances and transaction ids are made up. Construction fails
//! in production so it can never stand in for a real wallet there.

use alloy_primitives::U256;
use async_trait::async_trait;
use chain_evm::units::{format_units, pow10, scale_to_f64, Amount};
use rand::distributions::Alphanumeric;
use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::{BackendKind, TransactionHistory, WalletBackend};
use crate::address::{extract_address, Address, AddressInput};
use crate::balance::{NativeBalance, TokenBalance};
use crate::chain::{ChainFamily, ChainId};
use crate::config::Environment;
use crate::error::{RejectionReason, WalletError};
use crate::session::{SessionCell, SessionSnapshot};
use crate::tokens::TokenRegistry;
use crate::transaction::{SignedMessage, SubmittedTransaction};

const PROVIDER_NAME: &str = "simulated";

/// Simulated balances carry this many fraction digits.
const BALANCE_DECIMALS: u8 = 6;

pub struct SimulatedBackend {
    family: ChainFamily,
    tokens: TokenRegistry,
    cell: SessionCell,
}

impl SimulatedBackend {
    pub fn new(
        environment: Environment,
        family: ChainFamily,
        tokens: TokenRegistry,
    ) -> Result<Self, WalletError> {
        if environment == Environment::Production {
            return Err(WalletError::Config(
                "the simulated wallet is not available in production".into(),
            ));
        }
        warn!(%family, "using the SIMULATED wallet; balances and transactions are fake");
        Ok(Self {
            family,
            tokens,
            cell: SessionCell::new(),
        })
    }

    fn account(&self) -> String {
        match self.family {
            ChainFamily::Tron => format!("T{}", "1".repeat(33)),
            ChainFamily::Evm => format!("0x{}", "1".repeat(40)),
        }
    }

    fn chain(&self) -> ChainId {
        match self.family {
            ChainFamily::Tron => ChainId::Tron,
            ChainFamily::Evm => ChainId::Optimism,
        }
    }

    fn current(&self) -> Result<(Address, ChainId), WalletError> {
        let snapshot = self.cell.snapshot();
        match (snapshot.is_connected(), snapshot.account, snapshot.chain) {
            (true, Some(account), Some(chain)) => Ok((account, chain)),
            _ => Err(WalletError::NotConnected),
        }
    }

    fn target(address: Option<&AddressInput>, account: &Address) -> Result<Address, WalletError> {
        match address {
            Some(input) => extract_address(input)
                .ok_or_else(|| WalletError::AddressInvalid(format!("{input:?}"))),
            None => Ok(account.clone()),
        }
    }

    fn fake_token_balance(
        &self,
        chain: ChainId,
        contract: &str,
        symbol: Option<String>,
        decimals: u8,
        address: Option<&AddressInput>,
    ) -> Result<TokenBalance, WalletError> {
        let (account, _) = self.current()?;
        let target = Self::target(address, &account)?;
        let raw = random_units(decimals)?;
        Ok(TokenBalance {
            chain_id: chain.id(),
            contract_address: contract.to_string(),
            symbol,
            address: target.to_string(),
            decimals,
            raw_integer: raw.to_string(),
            formatted: format_units(raw, decimals)?,
            scaled_value: scale_to_f64(raw, decimals)?,
        })
    }
}

/// Base units of a random amount below 1000 with six fraction digits.
fn random_units(decimals: u8) -> Result<U256, WalletError> {
    let micros = U256::from(rand::thread_rng().gen_range(0u64..1_000_000_000));
    let units = if decimals >= BALANCE_DECIMALS {
        micros * pow10(decimals - BALANCE_DECIMALS)?
    } else {
        micros / pow10(BALANCE_DECIMALS - decimals)?
    };
    Ok(units)
}

/// `tx_` followed by nine random lowercase alphanumerics.
fn random_tx_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("tx_{suffix}")
}

fn random_signature() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    format!("0x{}{}1b", hex::encode(bytes), hex::encode(bytes))
}

#[async_trait]
impl WalletBackend for SimulatedBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Simulated
    }

    fn status(&self) -> SessionSnapshot {
        self.cell.snapshot()
    }

    async fn connect(&self, _cancel: &CancellationToken) -> Result<SessionSnapshot, WalletError> {
        let writer = self.cell.writer().await;
        let account = Address::parse(&self.account())?;
        writer.commit(account, self.chain(), None, PROVIDER_NAME);
        warn!(chain = %self.chain(), "simulated wallet connected");
        Ok(writer.snapshot())
    }

    async fn disconnect(&self) {
        self.cell.writer().await.reset();
    }

    async fn balance(&self, address: Option<&AddressInput>) -> Result<NativeBalance, WalletError> {
        let (account, chain) = self.current()?;
        let target = Self::target(address, &account)?;
        let decimals = chain.native_decimals();
        let raw = random_units(decimals)?;
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

    async fn token_balance(
        &self,
        contract: &str,
        address: Option<&AddressInput>,
    ) -> Result<TokenBalance, WalletError> {
        let (_, chain) = self.current()?;
        let (symbol, decimals) = match self.tokens.by_contract(chain, contract) {
            Some(token) => (Some(token.symbol.clone()), token.decimals),
            None => (None, BALANCE_DECIMALS),
        };
        self.fake_token_balance(chain, contract, symbol, decimals, address)
    }

    async fn usdt_balance(&self, address: Option<&AddressInput>) -> Result<TokenBalance, WalletError> {
        let (_, chain) = self.current()?;
        let token = self
            .tokens
            .lookup(chain, "USDT")
            .ok_or_else(|| WalletError::NetworkUnsupported {
                chain_id: chain.id(),
                supported: self.tokens.supported_chains("USDT"),
            })?;
        self.fake_token_balance(
            chain,
            &token.contract,
            Some(token.symbol.clone()),
            token.decimals,
            address,
        )
    }

    async fn send_transaction(
        &self,
        to: &AddressInput,
        amount: &Amount,
    ) -> Result<SubmittedTransaction, WalletError> {
        let (account, chain) = self.current()?;
        let recipient = extract_address(to).ok_or_else(|| WalletError::TransactionRejected {
            reason: RejectionReason::InvalidAddress,
            message: format!("no valid recipient in {to:?}"),
        })?;
        Ok(SubmittedTransaction {
            tx_hash: random_tx_id(),
            chain_id: chain.id(),
            from: account.to_string(),
            to: recipient.to_string(),
            amount: amount.to_string(),
            token: None,
            gas_limit: None,
        })
    }

    async fn send_token_transfer(
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
        let mut sent = self.send_transaction(to, amount).await?;
        sent.token = Some(symbol.to_ascii_uppercase());
        Ok(sent)
    }

    async fn sign_message(&self, message: &str) -> Result<SignedMessage, WalletError> {
        let (account, _) = self.current()?;
        Ok(SignedMessage {
            message: message.to_string(),
            signature: random_signature(),
            address: account.to_string(),
        })
    }

    async fn switch_network(&self, target: ChainId) -> Result<SessionSnapshot, WalletError> {
        let writer = self.cell.writer().await;
        let (_, chain) = self.current()?;
        if target.family() != chain.family() {
            return Err(WalletError::NetworkUnsupported {
                chain_id: target.id(),
                supported: ChainId::ALL
                    .iter()
                    .filter(|c| c.family() == chain.family())
                    .map(|c| c.id())
                    .collect(),
            });
        }
        writer.set_chain(target);
        Ok(writer.snapshot())
    }

    async fn watch_token(&self, symbol: &str) -> Result<bool, WalletError> {
        let (_, chain) = self.current()?;
        Ok(self.tokens.lookup(chain, symbol).is_some())
    }

    async fn transaction_history(
        &self,
        _address: Option<&AddressInput>,
        _limit: usize,
    ) -> Result<TransactionHistory, WalletError> {
        self.current()?;
        Ok(TransactionHistory {
            transactions: Vec::new(),
            note: Some("simulated wallet".into()),
        })
    }
}
