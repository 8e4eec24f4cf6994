//! Seams between the client and the chain
//!
//! The client only ever sees these traits. Implementations own the RPC
//! transport, the signer and the contract bindings.

use crate::error::LedgerResult;
use async_trait::async_trait;
use ethers::types::{Address, H256, U256};
use std::sync::Arc;
use tokio::sync::broadcast;
use types::{ChainId, HistoryEntry, HistoryKind, TokenId, WalletKind};

/// Read-only view of the exchange and its tokens
#[async_trait]
pub trait LedgerReader: Send + Sync {
    /// Pool reserves `(token_a, token_b)`
    async fn reserves(&self) -> LedgerResult<(U256, U256)>;

    async fn token_balance(&self, token: TokenId, owner: Address) -> LedgerResult<U256>;

    async fn lp_balance(&self, owner: Address) -> LedgerResult<U256>;

    async fn lp_total_supply(&self) -> LedgerResult<U256>;

    /// Advisory output for swapping `amount_in` of `token_in`
    async fn swap_quote(&self, token_in: TokenId, amount_in: U256) -> LedgerResult<U256>;

    async fn block_number(&self) -> LedgerResult<u64>;

    /// Events of one kind emitted by the exchange in `[from_block, to_block]`
    async fn events(
        &self,
        kind: HistoryKind,
        from_block: u64,
        to_block: u64,
    ) -> LedgerResult<Vec<HistoryEntry>>;
}

/// Outcome of waiting for a transaction to be included
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inclusion {
    pub tx_hash: H256,
    pub block_number: Option<u64>,
    /// `false` for a reverted receipt
    pub success: bool,
}

/// State-changing calls signed by the session account
#[async_trait]
pub trait LedgerWriter: Send + Sync {
    /// Account the writer signs for
    fn account(&self) -> Address;

    /// Allow the exchange to pull exactly `amount` of `token`
    async fn approve(&self, token: TokenId, amount: U256) -> LedgerResult<H256>;

    async fn swap(&self, token_in: TokenId, amount_in: U256) -> LedgerResult<H256>;

    async fn add_liquidity(&self, amount_a: U256, amount_b: U256) -> LedgerResult<H256>;

    async fn remove_liquidity(&self, lp_amount: U256) -> LedgerResult<H256>;

    async fn wait_for_inclusion(&self, tx_hash: H256) -> LedgerResult<Inclusion>;
}

/// Unsolicited notifications from a wallet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletSignal {
    AccountsChanged(Vec<Address>),
    ChainChanged(ChainId),
}

/// Reader and writer bound to one account
#[derive(Clone)]
pub struct LedgerHandles {
    pub reader: Arc<dyn LedgerReader>,
    pub writer: Arc<dyn LedgerWriter>,
}

/// A wallet that can grant account access and sign for it
#[async_trait]
pub trait WalletProvider: Send + Sync {
    fn kind(&self) -> WalletKind;

    /// Ask for account access; the first address is the active account
    async fn request_accounts(&self) -> LedgerResult<Vec<Address>>;

    async fn chain_id(&self) -> LedgerResult<ChainId>;

    async fn switch_chain(&self, chain: ChainId) -> LedgerResult<()>;

    fn subscribe(&self) -> broadcast::Receiver<WalletSignal>;

    /// Build fresh ledger handles signing for `account`
    async fn bind(&self, account: Address) -> LedgerResult<LedgerHandles>;
}
