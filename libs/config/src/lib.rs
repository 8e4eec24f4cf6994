//! # SimpleDEX Client Configuration
//!
//! Every tunable of the client lives in [`DexConfig`]: the target network,
//! deployed contract addresses, polling cadences, debounce quiet periods,
//! sequencer display windows and the history scan policy.
//!
//! ## Sources
//!
//! Layered lowest to highest priority:
//!
//! 1. Built-in defaults (Sepolia deployment, original client timings)
//! 2. Optional TOML file
//! 3. `SIMPLEDEX__<SECTION>__<KEY>` environment variables
//!
//! ## Usage
//!
//! ```rust,no_run
//! use simpledex_config::DexConfig;
//!
//! let config = DexConfig::load(None).unwrap();
//! println!("polling reserves every {:?}", config.polling.reserves());
//! ```

pub mod dex_config;
pub mod loader;

// Re-export commonly used types
pub use dex_config::{
    ContractsConfig, DebounceConfig, DexConfig, HistoryConfig, HistoryErrorPolicy, LoggingConfig,
    NetworkConfig, PollingConfig, SequencerConfig, WalletConfig,
};
pub use loader::{load_config, ENV_PREFIX, ENV_SEPARATOR};
