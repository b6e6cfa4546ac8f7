use subflow_core::types::{AccountId, BasisPoints, Role, TokenId};
use subflow_store::StoreError;

/// Errors from the directory collaborators (tokens, fees, roles).
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("account {account} lacks role {role}")]
    Unauthorized { account: AccountId, role: Role },

    #[error("token already registered: {0}")]
    TokenExists(TokenId),

    #[error("token not found: {0}")]
    TokenNotFound(TokenId),

    #[error("redirect target {to} is itself redirected (chaining not allowed)")]
    RedirectChained { from: TokenId, to: TokenId },

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("invalid fee rate: {bps} basis points exceeds 10000")]
    InvalidFee { bps: BasisPoints },

    #[error("invalid account: {0}")]
    InvalidAccount(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
