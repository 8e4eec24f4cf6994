//! Ledger adapter errors and their reduction to user-facing kinds

use ethers::contract::ContractError;
use ethers::providers::{Middleware, MiddlewareError, ProviderError};
use ethers::types::H256;
use thiserror::Error;
use types::{ChainId, ErrorKind};

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// The wallet user declined the prompt
    #[error("request rejected by user")]
    Rejected,

    #[error("no wallet registered for {0}")]
    NoWallet(String),

    #[error("wallet returned no accounts")]
    NoAccounts,

    #[error("wallet unavailable: {0}")]
    Unavailable(String),

    #[error("could not switch to {requested}: {reason}")]
    ChainSwitch { requested: ChainId, reason: String },

    #[error("transaction reverted: {reason}")]
    Reverted {
        reason: String,
        tx_hash: Option<H256>,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("timed out waiting for {0}")]
    Timeout(String),

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("abi error: {0}")]
    Abi(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LedgerError {
    /// User-facing classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Rejected => ErrorKind::UserRejected,
            LedgerError::NoWallet(_) => ErrorKind::NoWalletFound,
            LedgerError::NoAccounts | LedgerError::Unavailable(_) => {
                ErrorKind::ProviderUnavailable
            }
            LedgerError::ChainSwitch { .. } => ErrorKind::WrongNetwork,
            LedgerError::Reverted { reason, .. } => match classify(reason) {
                // A revert is never a transport fault
                ErrorKind::NetworkError => ErrorKind::TransactionFailed,
                kind => kind,
            },
            LedgerError::Transport(_) | LedgerError::Timeout(_) => ErrorKind::NetworkError,
            LedgerError::Rpc(message) => classify(message),
            LedgerError::Abi(_) => ErrorKind::TransactionFailed,
            LedgerError::Other(err) => classify(&err.to_string()),
        }
    }

    /// Convert a middleware failure, keeping JSON-RPC error payloads apart from transport faults
    pub fn from_middleware<E: MiddlewareError>(err: E) -> Self {
        if let Some(response) = err.as_error_response() {
            return LedgerError::Rpc(format!("{} (code {})", response.message, response.code));
        }
        if err.as_serde_error().is_some() {
            return LedgerError::Rpc(err.to_string());
        }
        LedgerError::Transport(err.to_string())
    }

    /// Convert a contract call failure, decoding `require` reasons when present
    pub fn from_contract<M: Middleware>(err: ContractError<M>) -> Self {
        if let Some(reason) = err.decode_revert::<String>() {
            return LedgerError::Reverted {
                reason,
                tx_hash: None,
            };
        }
        match err {
            ContractError::Revert(_) => LedgerError::Reverted {
                reason: "execution reverted".to_string(),
                tx_hash: None,
            },
            ContractError::ProviderError { e } => LedgerError::from(e),
            ContractError::MiddlewareError { e } => LedgerError::from_middleware(e),
            other => LedgerError::Rpc(other.to_string()),
        }
    }
}

impl From<ProviderError> for LedgerError {
    fn from(err: ProviderError) -> Self {
        LedgerError::from_middleware(err)
    }
}

/// Reduce a raw wallet or RPC failure message to an [`ErrorKind`]
///
/// Matching is by substring, case-insensitive. Rejection wins over revert
/// reasons because wallets wrap the original request text in their errors.
pub fn classify(message: &str) -> ErrorKind {
    let lower = message.to_lowercase();

    if lower.contains("user rejected")
        || lower.contains("user denied")
        || lower.contains("action_rejected")
        || lower.contains("code 4001")
        || lower.contains("\"code\":4001")
    {
        return ErrorKind::UserRejected;
    }
    if lower.contains("pool is empty") {
        return ErrorKind::PoolEmpty;
    }
    if lower.contains("insufficient output") || lower.contains("insufficient liquidity") {
        return ErrorKind::InsufficientLiquidity;
    }
    if lower.contains("error sending request")
        || lower.contains("connection refused")
        || lower.contains("connection reset")
        || lower.contains("timed out")
        || lower.contains("network error")
        || lower.contains("dns error")
    {
        return ErrorKind::NetworkError;
    }
    ErrorKind::TransactionFailed
}
