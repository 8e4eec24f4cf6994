//! # SimpleDEX Client
//!
//! ## Purpose
//!
//! Client-side state management for a two-token constant-product exchange:
//! wallet sessions, polled read state, debounced advisory reads and sequenced
//! write transactions. Rendering is left to whatever front end holds a
//! [`DexClient`]; the bundled `simpledex` binary is a command-line one.
//!
//! ## Integration Points
//!
//! - **Ledger**: [`ledger`] traits only; no RPC types leak past the adapter
//! - **Display Math**: [`simpledex_amm`] for rates, pool share and previews
//! - **Configuration**: [`simpledex_config::DexConfig`]
//!
//! ## Architecture Role
//!
//! ```text
//! WalletProvider ─→ ConnectionManager ─→ DexClient binder ─→ ReadStateCache ─→ Observation<T>
//!                          │                                       ↑
//!                          └──────────── MutationSequencer ────────┘ invalidate
//!                                               ↑
//!                                  Swap / AddLiquidity / RemoveLiquidity panels
//! ```
//!
//! ## Concurrency Model
//!
//! One Tokio task per registered read, one per pending debounced read, one
//! wallet-signal listener and one session binder. Every task that publishes
//! after an await re-checks an identity (write gate, input generation, session
//! id or job id) before it writes.

pub mod cache;
pub mod client;
pub mod connection;
pub mod debounce;
pub mod history;
pub mod logging;
pub mod panels;
pub mod sequencer;

pub use cache::{CacheKey, CacheStats, Observation, ReadState, ReadStateCache, ReadStatus};
pub use client::{Bindings, DexClient};
pub use connection::{ConnectionManager, Session, SessionState};
pub use debounce::DebouncedRead;
pub use history::{explorer_tx_url, HistoryLoader};
pub use logging::{init_tracing, LogEmoji};
pub use panels::{parse_input, AddLiquidityPanel, RemoveLiquidityPanel, SwapPanel};
pub use sequencer::{MutationRequest, MutationSequencer};
