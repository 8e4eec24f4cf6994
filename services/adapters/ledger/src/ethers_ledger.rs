//! `ethers`-backed ledger reader and writer
//!
//! One instance is bound to one middleware stack (and therefore one signing
//! account). Reconnecting builds a new instance instead of mutating this one.

use crate::abi;
use crate::error::{LedgerError, LedgerResult};
use crate::traits::{Inclusion, LedgerReader, LedgerWriter};
use async_trait::async_trait;
use ethers::abi::{Detokenize, Tokenize};
use ethers::contract::{Contract, ContractCall};
use ethers::providers::Middleware;
use ethers::types::{Address, BlockNumber, Filter, H256, U256, U64};
use simpledex_config::{ContractsConfig, SequencerConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use types::{HistoryEntry, HistoryKind, TokenId};

/// Contract addresses and receipt-wait settings
#[derive(Debug, Clone)]
pub struct LedgerSettings {
    pub dex: Address,
    pub token_a: Address,
    pub token_b: Address,
    pub receipt_poll: Duration,
    pub confirmation_timeout: Duration,
}

impl LedgerSettings {
    pub fn from_config(contracts: &ContractsConfig, sequencer: &SequencerConfig) -> Self {
        Self {
            dex: contracts.dex,
            token_a: contracts.token_a,
            token_b: contracts.token_b,
            receipt_poll: sequencer.receipt_poll(),
            confirmation_timeout: sequencer.confirmation_timeout(),
        }
    }

    pub fn token_address(&self, token: TokenId) -> Address {
        match token {
            TokenId::A => self.token_a,
            TokenId::B => self.token_b,
        }
    }
}

pub struct EthersLedger<M: Middleware> {
    client: Arc<M>,
    account: Address,
    settings: LedgerSettings,
    dex: Contract<M>,
    token_a: Contract<M>,
    token_b: Contract<M>,
}

impl<M: Middleware + 'static> EthersLedger<M> {
    pub fn new(client: Arc<M>, account: Address, settings: LedgerSettings) -> LedgerResult<Self> {
        let dex_abi = abi::dex_abi().map_err(|e| LedgerError::Abi(e.to_string()))?;
        let erc20_abi = abi::erc20_abi().map_err(|e| LedgerError::Abi(e.to_string()))?;

        let dex = Contract::new(settings.dex, dex_abi, client.clone());
        let token_a = Contract::new(settings.token_a, erc20_abi.clone(), client.clone());
        let token_b = Contract::new(settings.token_b, erc20_abi, client.clone());

        debug!(
            "Ledger bound for {:?} (dex {:?}, tokens {:?}/{:?})",
            account, settings.dex, settings.token_a, settings.token_b
        );

        Ok(Self {
            client,
            account,
            settings,
            dex,
            token_a,
            token_b,
        })
    }

    fn token(&self, token: TokenId) -> &Contract<M> {
        match token {
            TokenId::A => &self.token_a,
            TokenId::B => &self.token_b,
        }
    }

    fn method<T: Detokenize, A: Tokenize>(
        contract: &Contract<M>,
        name: &str,
        args: A,
    ) -> LedgerResult<ContractCall<M, T>> {
        contract
            .method::<A, T>(name, args)
            .map_err(|e| LedgerError::Abi(e.to_string()))
    }

    async fn send<D: Detokenize + Send + Sync>(
        &self,
        call: ContractCall<M, D>,
        label: &str,
    ) -> LedgerResult<H256> {
        let call = call.from(self.account);
        let pending = call.send().await.map_err(LedgerError::from_contract)?;
        let tx_hash = pending.tx_hash();
        info!("📤 {} submitted: {:?}", label, tx_hash);
        Ok(tx_hash)
    }
}

#[async_trait]
impl<M: Middleware + 'static> LedgerReader for EthersLedger<M> {
    async fn reserves(&self) -> LedgerResult<(U256, U256)> {
        Self::method::<(U256, U256), _>(&self.dex, "getReserves", ())?
            .call()
            .await
            .map_err(LedgerError::from_contract)
    }

    async fn token_balance(&self, token: TokenId, owner: Address) -> LedgerResult<U256> {
        Self::method::<U256, _>(self.token(token), "balanceOf", owner)?
            .call()
            .await
            .map_err(LedgerError::from_contract)
    }

    async fn lp_balance(&self, owner: Address) -> LedgerResult<U256> {
        Self::method::<U256, _>(&self.dex, "balanceOf", owner)?
            .call()
            .await
            .map_err(LedgerError::from_contract)
    }

    async fn lp_total_supply(&self) -> LedgerResult<U256> {
        Self::method::<U256, _>(&self.dex, "totalSupply", ())?
            .call()
            .await
            .map_err(LedgerError::from_contract)
    }

    async fn swap_quote(&self, token_in: TokenId, amount_in: U256) -> LedgerResult<U256> {
        let token_address = self.settings.token_address(token_in);
        Self::method::<U256, _>(&self.dex, "getSwapOutput", (token_address, amount_in))?
            .call()
            .await
            .map_err(LedgerError::from_contract)
    }

    async fn block_number(&self) -> LedgerResult<u64> {
        let block = self
            .client
            .get_block_number()
            .await
            .map_err(LedgerError::from_middleware)?;
        Ok(block.as_u64())
    }

    async fn events(
        &self,
        kind: HistoryKind,
        from_block: u64,
        to_block: u64,
    ) -> LedgerResult<Vec<HistoryEntry>> {
        let filter = Filter::new()
            .address(self.settings.dex)
            .topic0(abi::event_topic(kind))
            .from_block(BlockNumber::Number(U64::from(from_block)))
            .to_block(BlockNumber::Number(U64::from(to_block)));

        let logs = self
            .client
            .get_logs(&filter)
            .await
            .map_err(LedgerError::from_middleware)?;

        // Logs without a block or hash are pending and not yet history
        let entries: Vec<HistoryEntry> = logs
            .into_iter()
            .filter_map(|log| {
                let block = log.block_number?;
                let hash = log.transaction_hash?;
                Some(HistoryEntry::new(kind, block.as_u64(), hash))
            })
            .collect();

        debug!(
            "{} {} events in blocks {}..={}",
            entries.len(),
            kind.event_name(),
            from_block,
            to_block
        );
        Ok(entries)
    }
}

#[async_trait]
impl<M: Middleware + 'static> LedgerWriter for EthersLedger<M> {
    fn account(&self) -> Address {
        self.account
    }

    async fn approve(&self, token: TokenId, amount: U256) -> LedgerResult<H256> {
        let call = Self::method::<bool, _>(self.token(token), "approve", (self.settings.dex, amount))?;
        self.send(call, &format!("Approve {}", token)).await
    }

    async fn swap(&self, token_in: TokenId, amount_in: U256) -> LedgerResult<H256> {
        let token_address = self.settings.token_address(token_in);
        let call = Self::method::<U256, _>(&self.dex, "swap", (token_address, amount_in))?;
        self.send(call, "Swap").await
    }

    async fn add_liquidity(&self, amount_a: U256, amount_b: U256) -> LedgerResult<H256> {
        let call = Self::method::<U256, _>(&self.dex, "addLiquidity", (amount_a, amount_b))?;
        self.send(call, "Add liquidity").await
    }

    async fn remove_liquidity(&self, lp_amount: U256) -> LedgerResult<H256> {
        let call = Self::method::<(U256, U256), _>(&self.dex, "removeLiquidity", lp_amount)?;
        self.send(call, "Remove liquidity").await
    }

    /// Poll for the receipt until it appears or the confirmation timeout elapses
    async fn wait_for_inclusion(&self, tx_hash: H256) -> LedgerResult<Inclusion> {
        debug!("⏳ Monitoring confirmation for tx: {:?}", tx_hash);

        let poll_interval = self.settings.receipt_poll;
        let poll = async {
            loop {
                match self.client.get_transaction_receipt(tx_hash).await {
                    Ok(Some(receipt)) => return receipt,
                    Ok(None) => {}
                    Err(e) => warn!("Error checking transaction receipt: {}", e),
                }
                tokio::time::sleep(poll_interval).await;
            }
        };

        let receipt = timeout(self.settings.confirmation_timeout, poll)
            .await
            .map_err(|_| LedgerError::Timeout(format!("inclusion of {:?}", tx_hash)))?;

        let inclusion = Inclusion {
            tx_hash,
            block_number: receipt.block_number.map(|b| b.as_u64()),
            success: receipt.status == Some(U64::from(1u64)),
        };

        if inclusion.success {
            info!(
                "✅ Transaction confirmed in block {}: {:?}",
                inclusion.block_number.unwrap_or_default(),
                tx_hash
            );
        } else {
            warn!("❌ Transaction reverted: {:?}", tx_hash);
        }
        Ok(inclusion)
    }
}
