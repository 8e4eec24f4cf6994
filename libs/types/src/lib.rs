//! # SimpleDEX Types
//!
//! Domain types shared by every SimpleDEX client crate.
//!
//! ## Design Philosophy
//!
//! - **Integer Amounts**: All on-chain quantities stay `U256` at 18-decimal scale;
//!   conversion to human-readable decimals happens only at the display edge
//! - **Immutable Snapshots**: Read results are replaced wholesale by the next poll,
//!   never mutated in place
//! - **Typed Identities**: Session and job identities are distinct newtypes so an
//!   identity check can never compare the wrong counter
//! - **Classified Errors**: Every failure the user can see maps onto one [`ErrorKind`]
//!
//! ## Integration Points
//!
//! - **Ledger Adapter**: Produces snapshots and history entries from contract reads
//! - **Read-State Cache**: Publishes snapshots keyed by semantic resource name
//! - **Mutation Sequencer**: Drives [`MutationJob`] through [`MutationStatus`]
//! - **CLI**: Renders snapshots and job progress text

pub mod errors;
pub mod identifiers;
pub mod mutation;
pub mod snapshots;

pub use errors::{ErrorKind, GuardRejection};
pub use identifiers::{ChainId, JobId, SessionId, SwapDirection, TokenId, WalletKind};
pub use mutation::{MutationJob, MutationKind, MutationOutcome, MutationStatus};
pub use snapshots::{BalanceSnapshot, HistoryEntry, HistoryKind, LpPosition, ReserveSnapshot};

/// Chain primitives re-exported so downstream crates agree on one definition
pub use ethers_core::types::{Address, H256, U256};

/// Maximum number of history entries kept for display
pub const HISTORY_LIMIT: usize = 10;

/// Fixed-point scale of every token handled by the exchange
pub const TOKEN_DECIMALS: u32 = 18;
