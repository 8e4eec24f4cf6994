//! Wallet provider backed by a locally held private key
//!
//! There is no user prompt to decline and no chain to switch to: the RPC
//! endpoint decides the chain. A request for any other chain fails with
//! [`LedgerError::ChainSwitch`] so the connection manager reports a wrong
//! network instead of signing for the wrong chain.

use crate::error::{LedgerError, LedgerResult};
use crate::ethers_ledger::{EthersLedger, LedgerSettings};
use crate::traits::{LedgerHandles, WalletProvider, WalletSignal};
use anyhow::Context;
use async_trait::async_trait;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::Address;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};
use types::{ChainId, WalletKind};
use url::Url;

const SIGNAL_CAPACITY: usize = 16;

pub struct LocalKeyWallet {
    provider: Provider<Http>,
    wallet: LocalWallet,
    settings: LedgerSettings,
    signals: broadcast::Sender<WalletSignal>,
}

impl LocalKeyWallet {
    /// Build the provider over a pooled HTTP client and parse the signing key
    pub fn new(rpc_url: &str, private_key: &str, settings: LedgerSettings) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let url: Url = rpc_url.parse().context("Invalid RPC URL")?;
        let provider = Provider::new(Http::new_with_client(url, http_client));

        let wallet = private_key
            .trim()
            .parse::<LocalWallet>()
            .context("Invalid private key format")?;

        let (signals, _) = broadcast::channel(SIGNAL_CAPACITY);

        info!("🔑 Local key wallet ready for {:?}", wallet.address());
        Ok(Self {
            provider,
            wallet,
            settings,
            signals,
        })
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }
}

#[async_trait]
impl WalletProvider for LocalKeyWallet {
    fn kind(&self) -> WalletKind {
        WalletKind::LocalKey
    }

    async fn request_accounts(&self) -> LedgerResult<Vec<Address>> {
        Ok(vec![self.wallet.address()])
    }

    async fn chain_id(&self) -> LedgerResult<ChainId> {
        let id = self
            .provider
            .get_chainid()
            .await
            .map_err(LedgerError::from_middleware)?;
        Ok(ChainId(id.as_u64()))
    }

    async fn switch_chain(&self, chain: ChainId) -> LedgerResult<()> {
        let current = self.chain_id().await?;
        if current == chain {
            return Ok(());
        }
        Err(LedgerError::ChainSwitch {
            requested: chain,
            reason: format!("RPC endpoint serves {}", current),
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletSignal> {
        self.signals.subscribe()
    }

    async fn bind(&self, account: Address) -> LedgerResult<LedgerHandles> {
        if account != self.wallet.address() {
            return Err(LedgerError::Unavailable(format!(
                "local key does not control {:?}",
                account
            )));
        }

        let chain = self.chain_id().await?;
        let signer = self.wallet.clone().with_chain_id(chain.0);
        let client = Arc::new(SignerMiddleware::new(self.provider.clone(), signer));
        let ledger = Arc::new(EthersLedger::new(client, account, self.settings.clone())?);

        debug!("Bound ledger handles for {:?} on {}", account, chain);
        Ok(LedgerHandles {
            reader: ledger.clone(),
            writer: ledger,
        })
    }
}
