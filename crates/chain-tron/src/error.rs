use thiserror::Error;

/// Failures converting or validating TRON addresses.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TronError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("encoding error: {0}")]
    EncodingError(String),
}
