//! # Mutation Sequencer - Approve, Submit, Confirm
//!
//! ## Purpose
//!
//! Drives one user-initiated write through its fixed step sequence and reports
//! exactly one terminal outcome per started job. Each interface panel owns one
//! sequencer; a sequencer runs at most one job at a time.
//!
//! ## Integration Points
//!
//! - **Input Sources**: [`MutationRequest`]s from interface panels
//! - **Ledger**: The session's reader (preflight, quotes) and writer (approvals,
//!   primary call, inclusion)
//! - **Output Destinations**: Progress `watch` channel, read-state cache
//!   invalidation after success
//!
//! ## Architecture Role
//!
//! ```text
//! Idle → [Quoting] → Approving × n → Submitting → Confirming → Succeeded ─┐
//!            │            │              │             │                  ├─ display window → Idle
//!            └────────────┴──────────────┴─────────────┴──→ Failed ───────┘
//! ```
//!
//! Before every step that touches the ledger the job's session must still be
//! current; otherwise the job fails with [`ErrorKind::SessionChanged`] and the
//! step is never issued.

use crate::cache::{CacheKey, ReadStateCache};
use crate::connection::{ConnectionManager, Session};
use crate::{log_error, log_execution, log_success, log_warning};
use ethers::types::{Address, H256, U256};
use ledger::LedgerError;
use simpledex_amm::PoolMath;
use simpledex_config::SequencerConfig;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;
use types::{
    BalanceSnapshot, ErrorKind, GuardRejection, JobId, LpPosition, MutationJob, MutationKind,
    MutationOutcome, MutationStatus, TokenId,
};

const BPS_DENOMINATOR: u64 = 10_000;

/// Validated amounts for one write action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationRequest {
    Swap { token_in: TokenId, amount_in: U256 },
    AddLiquidity { amount_a: U256, amount_b: U256 },
    RemoveLiquidity { lp_amount: U256 },
}

impl MutationRequest {
    pub fn kind(&self) -> MutationKind {
        match self {
            MutationRequest::Swap { .. } => MutationKind::Swap,
            MutationRequest::AddLiquidity { .. } => MutationKind::AddLiquidity,
            MutationRequest::RemoveLiquidity { .. } => MutationKind::RemoveLiquidity,
        }
    }

    pub fn inputs(&self) -> Vec<U256> {
        match *self {
            MutationRequest::Swap { amount_in, .. } => vec![amount_in],
            MutationRequest::AddLiquidity { amount_a, amount_b } => vec![amount_a, amount_b],
            MutationRequest::RemoveLiquidity { lp_amount } => vec![lp_amount],
        }
    }

    /// Tokens the exchange pulls from the account, with exact amounts, in order
    pub fn approvals(&self) -> Vec<(TokenId, U256)> {
        match *self {
            MutationRequest::Swap {
                token_in,
                amount_in,
            } => vec![(token_in, amount_in)],
            MutationRequest::AddLiquidity { amount_a, amount_b } => {
                vec![(TokenId::A, amount_a), (TokenId::B, amount_b)]
            }
            // LP shares are burned by the exchange itself
            MutationRequest::RemoveLiquidity { .. } => Vec::new(),
        }
    }

    /// Cache keys whose value a confirmed run changes
    pub fn affected_keys(&self, account: Address) -> Vec<CacheKey> {
        let mut keys = vec![
            CacheKey::Balances(account),
            CacheKey::Reserves,
            CacheKey::History,
        ];
        if !matches!(self, MutationRequest::Swap { .. }) {
            keys.push(CacheKey::LpPosition(account));
        }
        keys
    }

    fn first_step(&self) -> MutationStatus {
        match self {
            MutationRequest::Swap { .. } => MutationStatus::Quoting,
            MutationRequest::AddLiquidity { .. } => MutationStatus::Approving,
            MutationRequest::RemoveLiquidity { .. } => MutationStatus::Submitting,
        }
    }
}

/// Per-panel transaction sequencer
#[derive(Clone)]
pub struct MutationSequencer {
    inner: Arc<SequencerInner>,
}

struct SequencerInner {
    connection: ConnectionManager,
    cache: ReadStateCache,
    config: SequencerConfig,
    /// `None` is `Idle`
    progress: watch::Sender<Option<MutationJob>>,
    next_job: AtomicU64,
}

impl MutationSequencer {
    pub fn new(connection: ConnectionManager, cache: ReadStateCache, config: SequencerConfig) -> Self {
        let (progress, _) = watch::channel(None);
        Self {
            inner: Arc::new(SequencerInner {
                connection,
                cache,
                config,
                progress,
                next_job: AtomicU64::new(0),
            }),
        }
    }

    /// Progress of the current job; `None` while idle
    pub fn subscribe(&self) -> watch::Receiver<Option<MutationJob>> {
        self.inner.progress.subscribe()
    }

    pub fn current(&self) -> Option<MutationJob> {
        self.inner.progress.borrow().clone()
    }

    pub fn status(&self) -> MutationStatus {
        self.inner
            .progress
            .borrow()
            .as_ref()
            .map_or(MutationStatus::Idle, |job| job.status)
    }

    /// Return a terminal job to `Idle` before its display window ends
    pub fn dismiss(&self) -> bool {
        self.inner.progress.send_if_modified(|slot| {
            if slot.as_ref().is_some_and(|job| job.status.is_terminal()) {
                *slot = None;
                true
            } else {
                false
            }
        })
    }

    /// Run one job to its terminal state
    ///
    /// Guard refusals return `Err` and create no job. Every started job
    /// returns exactly one outcome, successful or not.
    pub async fn run(&self, request: MutationRequest) -> Result<MutationOutcome, GuardRejection> {
        if self.status().is_active() {
            return Err(GuardRejection::Busy);
        }
        let session = self.inner.connection.current().ok_or(GuardRejection::NoSession)?;
        if request.inputs().iter().any(|amount| amount.is_zero()) {
            return Err(GuardRejection::ZeroAmount);
        }
        self.check_balances(&request, session.account)?;

        let id = JobId::new(self.inner.next_job.fetch_add(1, Ordering::SeqCst) + 1);
        let job = MutationJob::new(id, request.kind(), request.inputs());
        let claimed = self.inner.progress.send_if_modified(|slot| {
            if slot.as_ref().is_some_and(|job| job.status.is_active()) {
                false
            } else {
                *slot = Some(job);
                true
            }
        });
        if !claimed {
            return Err(GuardRejection::Busy);
        }

        log_execution!("Starting {} {} for {:?}", request.kind(), id, session.account);
        let result = self.execute(id, &session, &request).await;
        Ok(self.finish(id, &session, &request, result))
    }

    /// Best-known balance backstop; panels clamp before this is reached
    fn check_balances(&self, request: &MutationRequest, account: Address) -> Result<(), GuardRejection> {
        let cache = &self.inner.cache;
        let exceeds = match *request {
            MutationRequest::Swap {
                token_in,
                amount_in,
            } => cache
                .peek::<BalanceSnapshot>(CacheKey::Balances(account))
                .filter(|state| state.is_known())
                .is_some_and(|state| amount_in > state.value.balance_of(token_in)),
            MutationRequest::AddLiquidity { amount_a, amount_b } => cache
                .peek::<BalanceSnapshot>(CacheKey::Balances(account))
                .filter(|state| state.is_known())
                .is_some_and(|state| {
                    amount_a > state.value.balance_of(TokenId::A)
                        || amount_b > state.value.balance_of(TokenId::B)
                }),
            MutationRequest::RemoveLiquidity { lp_amount } => cache
                .peek::<LpPosition>(CacheKey::LpPosition(account))
                .filter(|state| state.is_known())
                .is_some_and(|state| lp_amount > state.value.lp_balance),
        };

        if exceeds {
            Err(GuardRejection::ExceedsBalance)
        } else {
            Ok(())
        }
    }

    async fn execute(
        &self,
        id: JobId,
        session: &Session,
        request: &MutationRequest,
    ) -> Result<H256, ErrorKind> {
        let reader = &session.reader;
        let writer = &session.writer;
        self.transition(id, request.first_step(), |_| {});

        let mut advisory_quote = None;
        if let MutationRequest::Swap {
            token_in,
            amount_in,
        } = *request
        {
            self.ensure_session(session)?;
            let (reserve_a, reserve_b) = reader.reserves().await.map_err(failed("reserve preflight"))?;
            if reserve_a.is_zero() || reserve_b.is_zero() {
                log_warning!("Pool is empty, {} not attempted", id);
                return Err(ErrorKind::PoolEmpty);
            }

            match reader.swap_quote(token_in, amount_in).await {
                Ok(quote) => {
                    advisory_quote = Some(quote);
                    self.update(id, |job| job.quote = Some(quote));
                }
                // Quotes are advisory only
                Err(e) => log_warning!("Quote for {} unavailable: {}", id, e),
            }
        }

        for (token, amount) in request.approvals() {
            self.ensure_session(session)?;
            self.transition(id, MutationStatus::Approving, |job| job.approving = Some(token));
            log_execution!("Approving {} {} for {}", amount, token, id);

            let tx_hash = writer.approve(token, amount).await.map_err(failed("approval"))?;
            let inclusion = writer
                .wait_for_inclusion(tx_hash)
                .await
                .map_err(failed("approval confirmation"))?;
            if !inclusion.success {
                log_error!("Approval {:?} reverted", tx_hash);
                return Err(ErrorKind::TransactionFailed);
            }
        }

        if let (Some(bps), Some(advisory), MutationRequest::Swap { token_in, amount_in }) =
            (self.inner.config.slippage_guard_bps, advisory_quote, *request)
        {
            self.ensure_session(session)?;
            let fresh = reader
                .swap_quote(token_in, amount_in)
                .await
                .map_err(failed("slippage re-quote"))?;
            let floor = PoolMath::mul_div(
                advisory,
                U256::from(BPS_DENOMINATOR - u64::from(bps.min(BPS_DENOMINATOR as u32))),
                U256::from(BPS_DENOMINATOR),
            );
            if fresh < floor {
                log_warning!(
                    "Quote moved from {} to {} (floor {}), {} abandoned",
                    advisory,
                    fresh,
                    floor,
                    id
                );
                return Err(ErrorKind::InsufficientLiquidity);
            }
        }

        self.ensure_session(session)?;
        self.transition(id, MutationStatus::Submitting, |job| job.approving = None);
        let submitted = match *request {
            MutationRequest::Swap {
                token_in,
                amount_in,
            } => writer.swap(token_in, amount_in).await,
            MutationRequest::AddLiquidity { amount_a, amount_b } => {
                writer.add_liquidity(amount_a, amount_b).await
            }
            MutationRequest::RemoveLiquidity { lp_amount } => writer.remove_liquidity(lp_amount).await,
        };
        let tx_hash = submitted.map_err(failed("submission"))?;
        log_execution!("Submitted {} as {:?}", id, tx_hash);

        self.transition(id, MutationStatus::Confirming, |job| job.tx_hash = Some(tx_hash));
        let inclusion = writer
            .wait_for_inclusion(tx_hash)
            .await
            .map_err(failed("confirmation"))?;
        if !inclusion.success {
            log_error!("{} reverted in block {:?}", id, inclusion.block_number);
            return Err(ErrorKind::TransactionFailed);
        }

        Ok(tx_hash)
    }

    fn finish(
        &self,
        id: JobId,
        session: &Session,
        request: &MutationRequest,
        result: Result<H256, ErrorKind>,
    ) -> MutationOutcome {
        let window = match &result {
            Ok(tx_hash) => {
                self.transition(id, MutationStatus::Succeeded, |job| job.tx_hash = Some(*tx_hash));
                log_success!("{} {} confirmed", request.kind(), id);
                self.refresh_after_success(session, request);
                self.inner.config.success_display()
            }
            Err(kind) => {
                let kind = *kind;
                self.transition(id, MutationStatus::Failed, |job| job.error = Some(kind));
                log_error!("{} {} failed: {}", request.kind(), id, kind);
                self.inner.config.failure_display()
            }
        };

        let outcome = self
            .current()
            .filter(|job| job.id == id)
            .map(|job| MutationOutcome {
                job_id: id,
                kind: job.kind,
                status: job.status,
                error: job.error,
                tx_hash: job.tx_hash,
            })
            .unwrap_or_else(|| MutationOutcome {
                job_id: id,
                kind: request.kind(),
                status: if result.is_ok() {
                    MutationStatus::Succeeded
                } else {
                    MutationStatus::Failed
                },
                error: result.err(),
                tx_hash: None,
            });

        self.schedule_idle(id, window);
        outcome
    }

    /// Invalidate now, then again after each configured delay while the session lasts
    fn refresh_after_success(&self, session: &Session, request: &MutationRequest) {
        let keys = request.affected_keys(session.account);
        let refreshed = self.inner.cache.invalidate_all(&keys);
        debug!("Invalidated {} of {} keys", refreshed, keys.len());

        let delays = self.inner.config.reinvalidate_after();
        if delays.is_empty() {
            return;
        }

        let cache = self.inner.cache.clone();
        let connection = self.inner.connection.clone();
        let session_id = session.id;
        let start = Instant::now();
        tokio::spawn(async move {
            for delay in delays {
                tokio::time::sleep_until(start + delay).await;
                if !connection.is_current(session_id) {
                    debug!("{} ended, skipping delayed refresh", session_id);
                    return;
                }
                cache.invalidate_all(&keys);
            }
        });
    }

    fn schedule_idle(&self, id: JobId, window: std::time::Duration) {
        let inner = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let Some(inner) = inner.upgrade() else {
                return;
            };
            // A dismissed or replaced job is left alone
            inner.progress.send_if_modified(|slot| {
                if slot.as_ref().is_some_and(|job| job.id == id && job.status.is_terminal()) {
                    *slot = None;
                    true
                } else {
                    false
                }
            });
        });
    }

    fn ensure_session(&self, session: &Session) -> Result<(), ErrorKind> {
        if self.inner.connection.is_current(session.id) {
            Ok(())
        } else {
            log_warning!("{} is no longer current", session.id);
            Err(ErrorKind::SessionChanged)
        }
    }

    fn transition(&self, id: JobId, next: MutationStatus, apply: impl FnOnce(&mut MutationJob)) {
        self.update(id, |job| {
            debug_assert!(
                job.status == next || job.status.can_transition_to(next),
                "invalid transition {:?} -> {:?}",
                job.status,
                next
            );
            job.status = next;
            apply(job);
        });
    }

    fn update(&self, id: JobId, apply: impl FnOnce(&mut MutationJob)) {
        self.inner.progress.send_if_modified(|slot| match slot {
            Some(job) if job.id == id => {
                apply(job);
                true
            }
            _ => false,
        });
    }
}

fn failed(step: &'static str) -> impl Fn(LedgerError) -> ErrorKind {
    move |e| {
        let kind = e.kind();
        log_error!("{} failed ({}): {}", step, kind, e);
        kind
    }
}
