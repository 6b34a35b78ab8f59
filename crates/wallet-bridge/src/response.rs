//! Result shapes returned across the facade boundary.

use serde::Serialize;
use serde_json::{json, Value};

use crate::error::WalletError;

/// A failure as callers see it: message, stable code, optional guidance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<String>,
}

impl Failure {
    /// Generic failure for anything that escaped as a panic.
    pub fn internal() -> Self {
        Self {
            error: "an unexpected error occurred".into(),
            code: "INTERNAL_ERROR".into(),
            suggestions: None,
        }
    }
}

impl From<&WalletError> for Failure {
    fn from(e: &WalletError) -> Self {
        Self {
            error: e.to_string(),
            code: e.code().to_string(),
            suggestions: e.suggestions(),
        }
    }
}

impl From<WalletError> for Failure {
    fn from(e: WalletError) -> Self {
        Failure::from(&e)
    }
}

/// Result of every facade operation.
pub type Outcome<T> = Result<T, Failure>;

/// Renders an outcome as the `{ "success": bool, ... }` JSON envelope.
///
/// Object payloads are flattened next to `success`; any other payload is
/// placed under `data`.
pub fn envelope<T: Serialize>(outcome: &Outcome<T>) -> Value {
    match outcome {
        Ok(value) => match serde_json::to_value(value) {
            Ok(Value::Object(mut fields)) => {
                fields.insert("success".into(), Value::Bool(true));
                Value::Object(fields)
            }
            Ok(other) => json!({ "success": true, "data": other }),
            Err(e) => envelope::<()>(&Err(WalletError::Internal(e.to_string()).into())),
        },
        Err(failure) => {
            let mut body = json!({
                "success": false,
                "error": failure.error,
                "code": failure.code,
            });
            if let Some(suggestions) = &failure.suggestions {
                body["suggestions"] = Value::String(suggestions.clone());
            }
            body
        }
    }
}
