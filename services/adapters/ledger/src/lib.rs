//! # SimpleDEX Ledger Adapter
//!
//! ## Purpose
//!
//! The only crate that talks to the chain. Exposes the exchange through the
//! [`LedgerReader`], [`LedgerWriter`] and [`WalletProvider`] traits and reduces
//! every wallet or RPC failure to a [`types::ErrorKind`].
//!
//! ## Integration Points
//!
//! - **Input Sources**: JSON-RPC endpoint, local signing key
//! - **Output Destinations**: Connection manager (wallet providers), read-state
//!   cache (reader), mutation sequencer (writer)
//! - **Contracts**: SimpleDEX exchange (also the LP token) and two ERC-20 tokens
//!
//! ## Architecture Role
//!
//! ```text
//! WalletProvider ──bind(account)──→ LedgerHandles { reader, writer }
//!        │                                  │
//!   WalletSignal                     EthersLedger<SignerMiddleware<Provider<Http>, LocalWallet>>
//!        ↓                                  ↓
//! Connection Manager                 SimpleDEX + TokenA + TokenB
//! ```

pub mod abi;
pub mod error;
pub mod ethers_ledger;
pub mod local_wallet;
pub mod traits;

pub use error::{classify, LedgerError, LedgerResult};
pub use ethers_ledger::{EthersLedger, LedgerSettings};
pub use local_wallet::LocalKeyWallet;
pub use traits::{Inclusion, LedgerHandles, LedgerReader, LedgerWriter, WalletProvider, WalletSignal};
