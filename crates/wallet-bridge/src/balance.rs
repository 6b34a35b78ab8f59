//! Native and token balance queries.

use std::sync::Arc;

use alloy_primitives::U256;
use chain_evm::erc20;
use chain_evm::units::{format_units, parse_quantity, scale_to_f64};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::address::{extract_address, Address, AddressFamily, AddressInput};
use crate::chain::{ChainFamily, ChainId};
use crate::error::WalletError;
use crate::poll::with_deadline;
use crate::session::{ConnectedContext, ConnectionSession};
use crate::tokens::TokenRegistry;

/// Largest `decimals()` value that still fits `10^decimals` in a uint256.
const MAX_TOKEN_DECIMALS: u8 = 77;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NativeBalance {
    pub chain_id: u64,
    pub address: String,
    pub symbol: String,
    pub decimals: u8,
    /// Base units, decimal string.
    pub raw: String,
    /// Exact human amount.
    pub formatted: String,
    pub balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenBalance {
    pub chain_id: u64,
    pub contract_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    pub address: String,
    pub decimals: u8,
    pub raw_integer: String,
    pub formatted: String,
    pub scaled_value: f64,
}

pub struct BalanceService {
    session: Arc<ConnectionSession>,
    tokens: Arc<TokenRegistry>,
}

impl BalanceService {
    pub fn new(session: Arc<ConnectionSession>, tokens: Arc<TokenRegistry>) -> Self {
        Self { session, tokens }
    }

    /// Native balance of `address`, or of the session account.
    pub async fn get_balance(
        &self,
        address: Option<&AddressInput>,
    ) -> Result<NativeBalance, WalletError> {
        let ctx = self.session.connected()?;
        let target = resolve_target(&ctx, address)?;

        let raw = match ctx.chain.family() {
            ChainFamily::Evm => {
                let reply = self
                    .call(&ctx, "eth_getBalance", json!([target.as_str(), "latest"]))
                    .await?;
                decode_quantity(&reply)?
            }
            ChainFamily::Tron => {
                let owner = target.to_tron_base58()?;
                let reply = self.call(&ctx, "tron_getBalance", json!([owner])).await?;
                decode_sun(&reply)?
            }
        };

        let decimals = ctx.chain.native_decimals();
        let balance = NativeBalance {
            chain_id: ctx.chain.id(),
            address: target.to_string(),
            symbol: ctx.chain.native_symbol().to_string(),
            decimals,
            raw: raw.to_string(),
            formatted: format_units(raw, decimals)?,
            balance: scale_to_f64(raw, decimals)?,
        };
        debug!(chain = %ctx.chain, address = %target, formatted = %balance.formatted, "native balance");
        Ok(balance)
    }

    /// ERC-20 balance for any contract on the current chain. Decimals come
    /// from the registry, or from the contract's `decimals()` when the
    /// contract is not registered.
    pub async fn get_token_balance(
        &self,
        token_contract: &str,
        address: Option<&AddressInput>,
    ) -> Result<TokenBalance, WalletError> {
        let ctx = self.session.connected()?;
        self.require_evm(&ctx)?;

        let contract = Address::parse(token_contract)?;
        if contract.family() != AddressFamily::EvmHex {
            return Err(WalletError::AddressInvalid(format!(
                "{token_contract} is not an EVM contract address"
            )));
        }

        let (decimals, symbol) = match self.tokens.by_contract(ctx.chain, contract.as_str()) {
            Some(token) => (token.decimals, Some(token.symbol.clone())),
            None => (self.discover_decimals(&ctx, contract.as_str()).await?, None),
        };

        self.token_balance(&ctx, contract.as_str(), decimals, symbol, address)
            .await
    }

    /// USDT balance on the current chain.
    pub async fn get_usdt_balance(
        &self,
        address: Option<&AddressInput>,
    ) -> Result<TokenBalance, WalletError> {
        self.get_registered_balance("USDT", address).await
    }

    pub async fn get_registered_balance(
        &self,
        symbol: &str,
        address: Option<&AddressInput>,
    ) -> Result<TokenBalance, WalletError> {
        let ctx = self.session.connected()?;
        let token = self
            .tokens
            .lookup(ctx.chain, symbol)
            .ok_or_else(|| WalletError::NetworkUnsupported {
                chain_id: ctx.chain.id(),
                supported: self.tokens.supported_chains(symbol),
            })?
            .clone();

        self.token_balance(
            &ctx,
            &token.contract,
            token.decimals,
            Some(token.symbol.clone()),
            address,
        )
        .await
    }

    async fn token_balance(
        &self,
        ctx: &ConnectedContext,
        contract: &str,
        decimals: u8,
        symbol: Option<String>,
        address: Option<&AddressInput>,
    ) -> Result<TokenBalance, WalletError> {
        let target = resolve_target(ctx, address)?;
        let calldata = erc20::encode_balance_of(target.as_str())?;

        let reply = self
            .call(
                ctx,
                "eth_call",
                json!([{ "to": contract, "data": format!("0x{}", hex::encode(calldata)) }, "latest"]),
            )
            .await?;
        let raw = decode_quantity(&reply)?;

        let balance = TokenBalance {
            chain_id: ctx.chain.id(),
            contract_address: contract.to_string(),
            symbol,
            address: target.to_string(),
            decimals,
            raw_integer: raw.to_string(),
            formatted: format_units(raw, decimals)?,
            scaled_value: scale_to_f64(raw, decimals)?,
        };
        info!(
            chain = %ctx.chain,
            contract,
            formatted = %balance.formatted,
            "token balance"
        );
        Ok(balance)
    }

    async fn discover_decimals(
        &self,
        ctx: &ConnectedContext,
        contract: &str,
    ) -> Result<u8, WalletError> {
        let data = format!("0x{}", hex::encode(erc20::encode_decimals()));
        let reply = self
            .call(ctx, "eth_call", json!([{ "to": contract, "data": data }, "latest"]))
            .await?;
        let value = decode_quantity(&reply)?;

        if value > U256::from(MAX_TOKEN_DECIMALS) {
            return Err(WalletError::BalanceQueryFailed(format!(
                "token {contract} reports {value} decimals"
            )));
        }
        let decimals = value.as_limbs()[0] as u8;
        debug!(contract, decimals, "token decimals discovered");
        Ok(decimals)
    }

    fn require_evm(&self, ctx: &ConnectedContext) -> Result<(), WalletError> {
        match ctx.chain.family() {
            ChainFamily::Evm => Ok(()),
            ChainFamily::Tron => Err(WalletError::NetworkUnsupported {
                chain_id: ctx.chain.id(),
                supported: self.tokens.all_chains(),
            }),
        }
    }

    async fn call(
        &self,
        ctx: &ConnectedContext,
        method: &str,
        params: Value,
    ) -> Result<Value, WalletError> {
        with_deadline(
            self.session.settings().request_timeout,
            ctx.provider.request(method, params),
        )
        .await
        .map_err(|e| WalletError::BalanceQueryFailed(format!("{method}: {e}")))
    }
}

/// The queried address must belong to the session chain's family.
fn resolve_target(
    ctx: &ConnectedContext,
    address: Option<&AddressInput>,
) -> Result<Address, WalletError> {
    let target = match address {
        Some(input) => extract_address(input)
            .ok_or_else(|| WalletError::AddressInvalid(format!("{input:?}")))?,
        None => ctx.account.clone(),
    };

    if target.chain_family() != ctx.chain.family() {
        return Err(WalletError::AddressInvalid(format!(
            "{target} is not a {} address",
            ctx.chain.family()
        )));
    }
    Ok(target)
}

fn decode_quantity(reply: &Value) -> Result<U256, WalletError> {
    match reply {
        Value::String(s) => erc20::decode_uint256_hex(s)
            .map_err(|e| WalletError::BalanceQueryFailed(e.to_string())),
        Value::Null => Ok(U256::ZERO),
        other => Err(WalletError::BalanceQueryFailed(format!(
            "expected hex quantity, got {other}"
        ))),
    }
}

/// TRON nodes answer with a number of sun, sometimes as a string.
fn decode_sun(reply: &Value) -> Result<U256, WalletError> {
    match reply {
        Value::Number(n) => n
            .as_u64()
            .map(U256::from)
            .ok_or_else(|| WalletError::BalanceQueryFailed(format!("bad sun amount {n}"))),
        Value::String(s) if s.starts_with("0x") => parse_quantity(s)
            .map_err(|e| WalletError::BalanceQueryFailed(e.to_string())),
        Value::String(s) => U256::from_str_radix(s.trim(), 10)
            .map_err(|e| WalletError::BalanceQueryFailed(format!("{s}: {e}"))),
        Value::Null => Ok(U256::ZERO),
        other => Err(WalletError::BalanceQueryFailed(format!(
            "expected sun amount, got {other}"
        ))),
    }
}
