//! Mutation jobs and their status lifecycle
//!
//! ```text
//! Idle → Quoting → Approving → Submitting → Confirming → Succeeded | Failed → Idle
//! ```

use crate::errors::ErrorKind;
use crate::identifiers::{JobId, TokenId};
use ethers_core::types::{H256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// User-initiated write actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MutationKind {
    Swap,
    AddLiquidity,
    RemoveLiquidity,
}

impl MutationKind {
    fn success_text(&self) -> &'static str {
        match self {
            MutationKind::Swap => "✓ Swap successful!",
            MutationKind::AddLiquidity => "✓ Liquidity added!",
            MutationKind::RemoveLiquidity => "✓ Liquidity removed!",
        }
    }

    fn failure_text(&self) -> &'static str {
        match self {
            MutationKind::Swap => "✗ Swap failed",
            MutationKind::AddLiquidity => "✗ Failed to add liquidity",
            MutationKind::RemoveLiquidity => "✗ Failed to remove liquidity",
        }
    }

    fn submitting_text(&self) -> &'static str {
        match self {
            MutationKind::Swap => "Swapping...",
            MutationKind::AddLiquidity => "Adding liquidity...",
            MutationKind::RemoveLiquidity => "Removing liquidity...",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationKind::Swap => f.write_str("swap"),
            MutationKind::AddLiquidity => f.write_str("add-liquidity"),
            MutationKind::RemoveLiquidity => f.write_str("remove-liquidity"),
        }
    }
}

/// Sequencer states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MutationStatus {
    #[default]
    Idle,
    Quoting,
    Approving,
    Submitting,
    Confirming,
    Succeeded,
    Failed,
}

impl MutationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MutationStatus::Succeeded | MutationStatus::Failed)
    }

    /// Anything other than `Idle` blocks a new job on the same panel
    pub fn is_active(&self) -> bool {
        !matches!(self, MutationStatus::Idle)
    }

    /// Whether a transition from `self` to `next` is part of the state machine
    pub fn can_transition_to(&self, next: MutationStatus) -> bool {
        use MutationStatus::*;
        match (self, next) {
            (Idle, Quoting) | (Idle, Approving) | (Idle, Submitting) => true,
            (Quoting, Approving) | (Quoting, Submitting) => true,
            (Approving, Approving) | (Approving, Submitting) => true,
            (Submitting, Confirming) => true,
            (Confirming, Succeeded) => true,
            (Quoting | Approving | Submitting | Confirming, Failed) => true,
            (Succeeded | Failed, Idle) => true,
            _ => false,
        }
    }
}

/// One user-initiated multi-step ledger action and its progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationJob {
    pub id: JobId,
    pub kind: MutationKind,
    pub inputs: Vec<U256>,
    pub status: MutationStatus,
    /// Token currently being approved while `Approving`
    pub approving: Option<TokenId>,
    pub error: Option<ErrorKind>,
    /// Advisory output quote captured during `Quoting`
    pub quote: Option<U256>,
    /// Hash of the primary call once submitted
    pub tx_hash: Option<H256>,
}

impl MutationJob {
    pub fn new(id: JobId, kind: MutationKind, inputs: Vec<U256>) -> Self {
        Self {
            id,
            kind,
            inputs,
            status: MutationStatus::Idle,
            approving: None,
            error: None,
            quote: None,
            tx_hash: None,
        }
    }

    /// User-facing progress line for the current status
    pub fn status_text(&self) -> String {
        match self.status {
            MutationStatus::Idle => String::new(),
            MutationStatus::Quoting => "Checking pool...".to_string(),
            MutationStatus::Approving => match self.approving {
                Some(token) => format!("Approving {}...", token),
                None => "Approving tokens...".to_string(),
            },
            MutationStatus::Submitting => self.kind.submitting_text().to_string(),
            MutationStatus::Confirming => "Waiting for confirmation...".to_string(),
            MutationStatus::Succeeded => self.kind.success_text().to_string(),
            MutationStatus::Failed => match self.error {
                Some(ErrorKind::UserRejected) => "✗ Transaction rejected".to_string(),
                Some(ErrorKind::InsufficientLiquidity | ErrorKind::PoolEmpty) => {
                    "✗ Liquidity issue".to_string()
                }
                Some(ErrorKind::SessionChanged) => {
                    format!("✗ {}", ErrorKind::SessionChanged.user_message())
                }
                _ => self.kind.failure_text().to_string(),
            },
        }
    }
}

/// Terminal result of one sequencer run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationOutcome {
    pub job_id: JobId,
    pub kind: MutationKind,
    pub status: MutationStatus,
    pub error: Option<ErrorKind>,
    pub tx_hash: Option<H256>,
}

impl MutationOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == MutationStatus::Succeeded
    }
}
