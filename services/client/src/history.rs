//! Recent exchange activity
//!
//! Scans a trailing block window for swap and liquidity events, merges the
//! three event kinds and keeps the newest entries.

use crate::log_warning;
use futures::future::join_all;
use ledger::{LedgerReader, LedgerResult};
use simpledex_config::{HistoryConfig, HistoryErrorPolicy};
use tracing::debug;
use types::{HistoryEntry, HistoryKind, H256};

#[derive(Debug, Clone)]
pub struct HistoryLoader {
    block_window: u64,
    max_entries: usize,
    policy: HistoryErrorPolicy,
}

impl HistoryLoader {
    pub fn new(config: &HistoryConfig) -> Self {
        Self {
            block_window: config.block_window,
            max_entries: config.max_entries,
            policy: config.on_query_error,
        }
    }

    /// Newest entries across all kinds, ordered by block descending
    pub async fn load(&self, reader: &dyn LedgerReader) -> LedgerResult<Vec<HistoryEntry>> {
        let to_block = reader.block_number().await?;
        let from_block = to_block.saturating_sub(self.block_window);
        debug!("Scanning history blocks {}..={}", from_block, to_block);

        let queries = HistoryKind::ALL
            .iter()
            .map(|kind| reader.events(*kind, from_block, to_block));
        let results = join_all(queries).await;

        let mut entries = Vec::new();
        for (kind, result) in HistoryKind::ALL.iter().zip(results) {
            match result {
                Ok(mut found) => entries.append(&mut found),
                Err(e) => match self.policy {
                    HistoryErrorPolicy::Tolerate => {
                        log_warning!("{} event query failed, history is partial: {}", kind, e);
                    }
                    HistoryErrorPolicy::Surface => return Err(e),
                },
            }
        }

        entries.sort_by(|a, b| b.block_number.cmp(&a.block_number));
        entries.truncate(self.max_entries);
        Ok(entries)
    }
}

/// Block-explorer link for a transaction
pub fn explorer_tx_url(explorer_base: &str, tx_hash: H256) -> String {
    format!("{}/tx/{:?}", explorer_base.trim_end_matches('/'), tx_hash)
}
