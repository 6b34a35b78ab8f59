//! Account acquisition.
//!
//! Wallets disagree on how an account is obtained, so acquisition is an
//! ordered list of strategies tried one at a time. A strategy that fails or
//! finds nothing is logged and skipped; only exhaustion of the whole list
//! is an error, classified by what the strategies observed on the way.

use serde_json::{json, Map, Value};
use tokio::time::{timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::address::{extract_address, extract_handle_address, Address, AddressInput};
use crate::chain::ChainFamily;
use crate::error::{ExtractionFailure, WalletError};
use crate::poll::{poll_until, with_deadline};
use crate::provider::{Capability, ProviderError, WalletProvider};
use crate::session::SessionSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    RequestAccounts,
    AccountList,
    DefaultAddress,
    AddressProperty,
    EnableThenReread,
}

const STRATEGIES: &[(&str, Strategy)] = &[
    ("request accounts", Strategy::RequestAccounts),
    ("account list", Strategy::AccountList),
    ("default address", Strategy::DefaultAddress),
    ("address property", Strategy::AddressProperty),
    ("enable then reread", Strategy::EnableThenReread),
];

/// What the strategies saw, for classifying exhaustion.
#[derive(Debug, Default)]
struct Trace {
    saw_data: bool,
    inactive: bool,
}

impl Trace {
    fn observe(&mut self, input: &AddressInput) {
        if input.is_inactive_marker() {
            self.inactive = true;
        } else if input.has_content() {
            self.saw_data = true;
        }
    }

    fn classify(&self) -> ExtractionFailure {
        if self.inactive {
            ExtractionFailure::AccountInactive
        } else if self.saw_data {
            ExtractionFailure::UnrecognizedShape
        } else {
            ExtractionFailure::RejectedOrTimedOut
        }
    }
}

/// Runs the strategy list against `provider` until one yields an address.
pub(crate) async fn acquire_account(
    provider: &dyn WalletProvider,
    family: ChainFamily,
    settings: &SessionSettings,
    cancel: &CancellationToken,
) -> Result<Address, WalletError> {
    let mut trace = Trace::default();

    for &(label, strategy) in STRATEGIES {
        if cancel.is_cancelled() {
            debug!("account acquisition cancelled");
            break;
        }

        debug!(strategy = label, provider = provider.name(), "trying");
        match run(strategy, provider, family, settings, cancel, &mut trace).await {
            Ok(Some(address)) => {
                info!(strategy = label, account = %address, "account acquired");
                return Ok(address);
            }
            Ok(None) => debug!(strategy = label, "no address"),
            Err(e) => warn!(strategy = label, error = %e, "strategy failed"),
        }
    }

    let kind = trace.classify();
    warn!(?kind, %family, "account acquisition exhausted");
    Err(WalletError::AddressExtractionFailed { family, kind })
}

async fn run(
    strategy: Strategy,
    provider: &dyn WalletProvider,
    family: ChainFamily,
    settings: &SessionSettings,
    cancel: &CancellationToken,
    trace: &mut Trace,
) -> Result<Option<Address>, ProviderError> {
    let caps = provider.capabilities();

    match strategy {
        Strategy::RequestAccounts => {
            if !caps.has(Capability::Request) {
                return Err(ProviderError::Unsupported("request"));
            }
            let method = match family {
                ChainFamily::Tron => "tron_requestAccounts",
                ChainFamily::Evm => "eth_requestAccounts",
            };
            let result =
                with_deadline(settings.request_timeout, provider.request(method, json!([]))).await?;
            Ok(first_account(&result, trace))
        }
        Strategy::AccountList => {
            if !caps.has(Capability::GetAccounts) {
                return Err(ProviderError::Unsupported("getAccounts"));
            }
            let accounts = with_deadline(settings.request_timeout, provider.get_accounts()).await?;
            Ok(first_account(&Value::Array(accounts), trace))
        }
        Strategy::DefaultAddress => Ok(read_slot(provider.default_address(), trace)),
        Strategy::AddressProperty => Ok(read_slot(provider.address(), trace)),
        Strategy::EnableThenReread => {
            if !caps.has(Capability::Enable) {
                return Err(ProviderError::Unsupported("enable"));
            }
            // One activation budget covers enable and the reread after it.
            let deadline = Instant::now() + settings.activation_timeout;
            with_deadline(settings.activation_timeout, provider.enable()).await?;

            // Some wallets fill in their address only after enable resolves.
            let reread = poll_until(&settings.activation_poll, cancel, || {
                let found = read_slot(provider.default_address(), trace)
                    .or_else(|| read_slot(provider.address(), trace));
                async move { found }
            });
            Ok(timeout_at(deadline, reread).await.unwrap_or(None))
        }
    }
}

/// First entry of an account-list response.
///
/// TRON wallets answer `tron_requestAccounts` with a `{code, message}`
/// status object; that is searched but not counted as account data. Any
/// other object is.
fn first_account(result: &Value, trace: &mut Trace) -> Option<Address> {
    match result {
        Value::Array(items) => {
            let input = items.first().and_then(AddressInput::from_json)?;
            trace.observe(&input);
            extract_address(&input)
        }
        Value::String(_) => {
            let input = AddressInput::from_json(result)?;
            trace.observe(&input);
            extract_address(&input)
        }
        Value::Object(fields) => {
            let input = AddressInput::from_json(result)?;
            if !is_status_reply(fields) {
                trace.observe(&input);
            }
            extract_address(&input)
        }
        _ => None,
    }
}

fn is_status_reply(fields: &Map<String, Value>) -> bool {
    fields.contains_key("code") && fields.keys().all(|k| k == "code" || k == "message")
}

fn read_slot(slot: Option<AddressInput>, trace: &mut Trace) -> Option<Address> {
    let input = slot?;
    trace.observe(&input);
    extract_handle_address(&input)
}
