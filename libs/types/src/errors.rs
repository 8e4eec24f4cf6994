//! User-facing error classification
//!
//! Every failure that reaches the user is reduced to one [`ErrorKind`]. Entry-guard
//! refusals are a separate type because they never create a job.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classified failure kinds surfaced to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
pub enum ErrorKind {
    /// No compatible wallet is registered for the requested kind
    #[error("no wallet found")]
    NoWalletFound,

    /// A wallet exists but could not be reached or returned no accounts
    #[error("wallet provider unavailable")]
    ProviderUnavailable,

    /// The user declined a connection or transaction prompt
    #[error("request rejected by user")]
    UserRejected,

    /// The wallet is on a different chain and switching failed
    #[error("wrong network")]
    WrongNetwork,

    /// The ledger's liquidity guards would reject the action
    #[error("insufficient liquidity")]
    InsufficientLiquidity,

    /// The pool holds no reserves
    #[error("pool is empty")]
    PoolEmpty,

    /// Any other on-chain revert or RPC fault
    #[error("transaction failed")]
    TransactionFailed,

    /// Transient RPC or transport fault
    #[error("network error")]
    NetworkError,

    /// The session a job was started under was replaced before the job finished
    #[error("session changed")]
    SessionChanged,
}

impl ErrorKind {
    /// Short message shown next to a failed job
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorKind::NoWalletFound => {
                "No wallet detected! Please install MetaMask or Coinbase Wallet."
            }
            ErrorKind::ProviderUnavailable => "Wallet provider unavailable",
            ErrorKind::UserRejected => "Transaction rejected",
            ErrorKind::WrongNetwork => "Wrong network - switch to Sepolia",
            ErrorKind::InsufficientLiquidity | ErrorKind::PoolEmpty => "Liquidity issue",
            ErrorKind::TransactionFailed => "Transaction failed",
            ErrorKind::NetworkError => "Network error - reconnect wallet",
            ErrorKind::SessionChanged => "Wallet changed during transaction",
        }
    }
}

/// Reasons the mutation entry guard refuses to start a job
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardRejection {
    #[error("a mutation is already active on this panel")]
    Busy,

    #[error("no wallet session is connected")]
    NoSession,

    #[error("amount is empty")]
    EmptyInput,

    #[error("amount '{0}' is not a valid number")]
    InvalidNumber(String),

    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("amount exceeds the available balance")]
    ExceedsBalance,
}
