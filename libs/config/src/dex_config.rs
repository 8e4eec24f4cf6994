//! Configuration sections and their defaults

use ethers_core::types::Address;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use types::ChainId;

/// Complete client configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DexConfig {
    pub network: NetworkConfig,
    pub contracts: ContractsConfig,
    pub wallet: WalletConfig,
    pub polling: PollingConfig,
    pub debounce: DebounceConfig,
    pub sequencer: SequencerConfig,
    pub history: HistoryConfig,
    pub logging: LoggingConfig,
}

/// Target chain and its endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Chain the exchange is deployed on
    pub chain_id: u64,
    /// JSON-RPC endpoint; `${VAR}` references are expanded at load time
    pub rpc_url: String,
    /// Block explorer base used for transaction links
    pub explorer_url: String,
}

/// Deployed contract addresses
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractsConfig {
    /// Exchange contract, which is also the LP token
    pub dex: Address,
    pub token_a: Address,
    pub token_b: Address,
}

/// Local signer settings for the `LocalKey` wallet
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Hex private key or a `${VAR}` reference to one
    #[serde(skip_serializing)]
    pub private_key: Option<String>,
}

impl fmt::Debug for WalletConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletConfig")
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Read-state polling cadences
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub reserves_ms: u64,
    pub balances_ms: u64,
    /// Balance polls per session before polling stops (invalidation still refreshes)
    pub balance_max_cycles: Option<u32>,
    pub lp_position_ms: u64,
}

/// Quiet periods for derived reads driven by typing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebounceConfig {
    pub quote_ms: u64,
    pub withdrawal_preview_ms: u64,
}

/// Mutation sequencer timings and guards
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    /// How long a success message stays before returning to idle
    pub success_display_ms: u64,
    /// How long a failure message stays before returning to idle
    pub failure_display_ms: u64,
    /// Delays after success at which affected reads are invalidated again
    pub reinvalidate_after_ms: Vec<u64>,
    /// Give up waiting for inclusion after this long
    pub confirmation_timeout_secs: u64,
    /// Receipt polling interval while confirming
    pub receipt_poll_ms: u64,
    /// Re-quote before submitting and fail if the output dropped by more than this
    pub slippage_guard_bps: Option<u32>,
}

/// What the history loader does when one event query fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryErrorPolicy {
    /// Log the failure and keep the other kinds' results
    #[default]
    Tolerate,
    /// Fail the whole load
    Surface,
}

/// Transaction history scan settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub block_window: u64,
    pub max_entries: usize,
    pub on_query_error: HistoryErrorPolicy,
}

/// Tracing subscriber settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            chain_id: ChainId::SEPOLIA.0,
            rpc_url: "https://rpc.sepolia.org".to_string(),
            explorer_url: "https://sepolia.etherscan.io".to_string(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            reserves_ms: 10_000,
            balances_ms: 5_000,
            balance_max_cycles: Some(6), // 30 seconds
            lp_position_ms: 10_000,
        }
    }
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            quote_ms: 500,
            withdrawal_preview_ms: 300,
        }
    }
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            success_display_ms: 3_000,
            failure_display_ms: 4_000,
            reinvalidate_after_ms: vec![5_000, 10_000],
            confirmation_timeout_secs: 120,
            receipt_poll_ms: 500,
            slippage_guard_bps: None,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            block_window: 10_000,
            max_entries: types::HISTORY_LIMIT,
            on_query_error: HistoryErrorPolicy::Tolerate,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl NetworkConfig {
    pub fn chain(&self) -> ChainId {
        ChainId(self.chain_id)
    }
}

impl ContractsConfig {
    /// Whether every contract address has been set
    pub fn is_deployed(&self) -> bool {
        !self.dex.is_zero() && !self.token_a.is_zero() && !self.token_b.is_zero()
    }
}

impl PollingConfig {
    pub fn reserves(&self) -> Duration {
        Duration::from_millis(self.reserves_ms)
    }

    pub fn balances(&self) -> Duration {
        Duration::from_millis(self.balances_ms)
    }

    pub fn lp_position(&self) -> Duration {
        Duration::from_millis(self.lp_position_ms)
    }
}

impl DebounceConfig {
    pub fn quote(&self) -> Duration {
        Duration::from_millis(self.quote_ms)
    }

    pub fn withdrawal_preview(&self) -> Duration {
        Duration::from_millis(self.withdrawal_preview_ms)
    }
}

impl SequencerConfig {
    pub fn success_display(&self) -> Duration {
        Duration::from_millis(self.success_display_ms)
    }

    pub fn failure_display(&self) -> Duration {
        Duration::from_millis(self.failure_display_ms)
    }

    pub fn reinvalidate_after(&self) -> Vec<Duration> {
        self.reinvalidate_after_ms
            .iter()
            .copied()
            .map(Duration::from_millis)
            .collect()
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    pub fn receipt_poll(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_ms)
    }
}

impl DexConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.network.rpc_url.trim().is_empty() {
            anyhow::bail!("network.rpc_url must not be empty");
        }
        if self.network.chain_id == 0 {
            anyhow::bail!("network.chain_id must be positive");
        }

        if self.polling.reserves_ms == 0
            || self.polling.balances_ms == 0
            || self.polling.lp_position_ms == 0
        {
            anyhow::bail!("polling intervals must be positive");
        }
        if self.polling.balance_max_cycles == Some(0) {
            anyhow::bail!("polling.balance_max_cycles must be positive when set");
        }

        if self.sequencer.receipt_poll_ms == 0 {
            anyhow::bail!("sequencer.receipt_poll_ms must be positive");
        }
        if self.sequencer.confirmation_timeout_secs == 0 {
            anyhow::bail!("sequencer.confirmation_timeout_secs must be positive");
        }
        if let Some(bps) = self.sequencer.slippage_guard_bps {
            if bps > 10_000 {
                anyhow::bail!("sequencer.slippage_guard_bps must be <= 10000 (100%)");
            }
        }

        if self.history.max_entries == 0 {
            anyhow::bail!("history.max_entries must be positive");
        }

        if self.contracts.is_deployed() {
            let c = &self.contracts;
            if c.token_a == c.token_b || c.dex == c.token_a || c.dex == c.token_b {
                anyhow::bail!("contract addresses must be distinct");
            }
        }

        Ok(())
    }

    /// Serialize to TOML, omitting secrets
    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
