//! Immutable read snapshots and history entries
//!
//! A snapshot is created once per successful read and superseded by the next
//! one. `Default` is the defined zero state shown for a disconnected account.

use crate::identifiers::TokenId;
use crate::mutation::MutationKind;
use chrono::{DateTime, Utc};
use ethers_core::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pool reserves at one point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReserveSnapshot {
    pub reserve_a: U256,
    pub reserve_b: U256,
    pub observed_at: DateTime<Utc>,
}

impl ReserveSnapshot {
    pub fn new(reserve_a: U256, reserve_b: U256) -> Self {
        Self {
            reserve_a,
            reserve_b,
            observed_at: Utc::now(),
        }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn reserve_of(&self, token: TokenId) -> U256 {
        match token {
            TokenId::A => self.reserve_a,
            TokenId::B => self.reserve_b,
        }
    }

    /// Either side empty means swaps cannot be priced
    pub fn is_empty(&self) -> bool {
        self.reserve_a.is_zero() || self.reserve_b.is_zero()
    }
}

/// Token balances of one account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    /// `None` for the zero state of a disconnected session
    pub account: Option<Address>,
    pub token_a: U256,
    pub token_b: U256,
    pub observed_at: DateTime<Utc>,
}

impl BalanceSnapshot {
    pub fn new(account: Address, token_a: U256, token_b: U256) -> Self {
        Self {
            account: Some(account),
            token_a,
            token_b,
            observed_at: Utc::now(),
        }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, token: TokenId) -> U256 {
        match token {
            TokenId::A => self.token_a,
            TokenId::B => self.token_b,
        }
    }
}

/// LP token holdings of one account alongside the LP total supply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LpPosition {
    pub account: Option<Address>,
    pub lp_balance: U256,
    pub total_supply: U256,
    pub observed_at: DateTime<Utc>,
}

impl LpPosition {
    pub fn new(account: Address, lp_balance: U256, total_supply: U256) -> Self {
        Self {
            account: Some(account),
            lp_balance,
            total_supply,
            observed_at: Utc::now(),
        }
    }
}

/// Ledger event families shown in the history list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HistoryKind {
    Swap,
    AddLiquidity,
    RemoveLiquidity,
}

impl HistoryKind {
    pub const ALL: [HistoryKind; 3] = [
        HistoryKind::Swap,
        HistoryKind::AddLiquidity,
        HistoryKind::RemoveLiquidity,
    ];

    /// Name of the contract event backing this kind
    pub fn event_name(&self) -> &'static str {
        match self {
            HistoryKind::Swap => "Swap",
            HistoryKind::AddLiquidity => "LiquidityAdded",
            HistoryKind::RemoveLiquidity => "LiquidityRemoved",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HistoryKind::Swap => "Swap",
            HistoryKind::AddLiquidity => "Add",
            HistoryKind::RemoveLiquidity => "Remove",
        }
    }
}

impl From<MutationKind> for HistoryKind {
    fn from(kind: MutationKind) -> Self {
        match kind {
            MutationKind::Swap => HistoryKind::Swap,
            MutationKind::AddLiquidity => HistoryKind::AddLiquidity,
            MutationKind::RemoveLiquidity => HistoryKind::RemoveLiquidity,
        }
    }
}

impl fmt::Display for HistoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

/// One ledger event projected for the history list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub kind: HistoryKind,
    pub block_number: u64,
    pub tx_hash: H256,
}

impl HistoryEntry {
    pub fn new(kind: HistoryKind, block_number: u64, tx_hash: H256) -> Self {
        Self {
            kind,
            block_number,
            tx_hash,
        }
    }

    /// `0x1234...abcd` form used in compact listings
    pub fn short_hash(&self) -> String {
        let full = format!("{:?}", self.tx_hash);
        format!("{}...{}", &full[..6], &full[full.len() - 4..])
    }
}
