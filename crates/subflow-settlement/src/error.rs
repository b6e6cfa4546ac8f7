use subflow_core::types::{Amount, TokenId};
use subflow_directory::DirectoryError;
use subflow_store::StoreError;

/// Settlement-layer errors. All of these are call-level rejections; a
/// sender's inability to pay inside a batch is reported per item through
/// the result vector and the event log instead.
#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    #[error("sender list must be non-empty")]
    EmptySenders,

    #[error("receiver list must be non-empty")]
    EmptyReceivers,

    #[error("{what}: expected {expected} entries, got {got}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("invalid account: {0}")]
    InvalidAccount(String),

    #[error("token is not active: {0}")]
    InactiveToken(TokenId),

    #[error("insufficient balance: available {available}, required {required}")]
    InsufficientBalance { available: Amount, required: Amount },

    #[error("insufficient custody: available {available}, required {required}")]
    InsufficientCustody { available: Amount, required: Amount },

    #[error("amount arithmetic overflow")]
    Overflow,

    #[error("attached native value {attached} does not match required {required}")]
    NativeValueMismatch { attached: Amount, required: Amount },

    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
