//! # DEX Client - Session-Bound Read State
//!
//! ## Purpose
//!
//! Top-level handle a front end holds. Wires the connection manager to the
//! read-state cache: every published session change resets all registrations
//! to their zero state and, for a new session, registers the reserve, balance,
//! LP position and history reads against that session's ledger reader.
//!
//! ## Integration Points
//!
//! - **Input Sources**: [`DexConfig`], registered wallet providers
//! - **Output Destinations**: [`Observation`]s for display, interface panels
//!
//! ## Architecture Role
//!
//! ```text
//! ConnectionManager ──watch<SessionState>──→ binder task
//!                                               │ reset_all()
//!                                               ↓
//!                     reserves 10s · balances 5s × 6 · LP 10s · history once
//!                                               │
//!                                               ↓
//!                                    Bindings { Observation<..> }
//! ```

use crate::cache::{CacheKey, Observation, ReadStateCache};
use crate::connection::{ConnectionManager, Session, SessionState};
use crate::history::{explorer_tx_url, HistoryLoader};
use crate::panels::{AddLiquidityPanel, RemoveLiquidityPanel, SwapPanel};
use crate::log_network;
use futures::future::try_join;
use ledger::WalletProvider;
use parking_lot::RwLock;
use simpledex_amm::{Decimal, PoolMath};
use simpledex_config::DexConfig;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;
use types::{
    BalanceSnapshot, ErrorKind, HistoryEntry, LpPosition, ReserveSnapshot, SessionId, TokenId,
    WalletKind, H256,
};

/// Observations registered for the current session
#[derive(Clone)]
pub struct Bindings {
    pub session: SessionState,
    pub reserves: Observation<ReserveSnapshot>,
    pub balances: Observation<BalanceSnapshot>,
    pub lp_position: Observation<LpPosition>,
    pub history: Observation<Vec<HistoryEntry>>,
}

impl Bindings {
    fn detached() -> Self {
        Self {
            session: None,
            reserves: Observation::detached(),
            balances: Observation::detached(),
            lp_position: Observation::detached(),
            history: Observation::detached(),
        }
    }
}

pub struct DexClient {
    config: DexConfig,
    connection: ConnectionManager,
    cache: ReadStateCache,
    bindings: Arc<RwLock<Bindings>>,
    bound: Arc<watch::Sender<Option<SessionId>>>,
    binder: JoinHandle<()>,
}

impl DexClient {
    /// Build the client and start following session changes
    ///
    /// Must be called inside a Tokio runtime.
    pub fn new(config: DexConfig) -> Self {
        let connection = ConnectionManager::new(config.network.chain());
        let cache = ReadStateCache::new();
        let bindings = Arc::new(RwLock::new(Bindings::detached()));
        let (bound, _) = watch::channel(None);
        let bound = Arc::new(bound);

        let binder = tokio::spawn(bind_sessions(
            connection.subscribe(),
            cache.clone(),
            config.clone(),
            bindings.clone(),
            bound.clone(),
        ));

        Self {
            config,
            connection,
            cache,
            bindings,
            bound,
            binder,
        }
    }

    pub fn register_wallet(&self, provider: Arc<dyn WalletProvider>) {
        self.connection.register_wallet(provider);
    }

    /// Connect and wait until the session's reads are registered
    pub async fn connect(&self, kind: WalletKind) -> Result<Arc<Session>, ErrorKind> {
        let session = self.connection.connect(kind).await?;
        let mut bound = self.bound.subscribe();
        let connection = self.connection.clone();
        let id = session.id;
        // A newer session replacing this one also ends the wait
        let _ = bound
            .wait_for(|current| *current == Some(id) || !connection.is_current(id))
            .await;
        Ok(session)
    }

    pub fn disconnect(&self) {
        self.connection.disconnect();
    }

    /// Stop background work and reset every read
    pub fn shutdown(&self) {
        self.binder.abort();
        self.connection.disconnect();
        self.cache.shutdown();
        *self.bindings.write() = Bindings::detached();
    }

    pub fn config(&self) -> &DexConfig {
        &self.config
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn cache(&self) -> &ReadStateCache {
        &self.cache
    }

    pub fn session(&self) -> SessionState {
        self.connection.current()
    }

    /// Session whose reads are currently registered
    pub fn bound_session(&self) -> Option<SessionId> {
        *self.bound.borrow()
    }

    pub fn subscribe_bound(&self) -> watch::Receiver<Option<SessionId>> {
        self.bound.subscribe()
    }

    pub fn bindings(&self) -> Bindings {
        self.bindings.read().clone()
    }

    pub fn reserves(&self) -> Observation<ReserveSnapshot> {
        self.bindings.read().reserves.clone()
    }

    pub fn balances(&self) -> Observation<BalanceSnapshot> {
        self.bindings.read().balances.clone()
    }

    pub fn lp_position(&self) -> Observation<LpPosition> {
        self.bindings.read().lp_position.clone()
    }

    pub fn history(&self) -> Observation<Vec<HistoryEntry>> {
        self.bindings.read().history.clone()
    }

    /// Units of token B per token A at current reserves
    pub fn exchange_rate(&self) -> Decimal {
        let reserves = self.reserves().value();
        PoolMath::exchange_rate(reserves.reserve_a, reserves.reserve_b)
    }

    pub fn refresh_history(&self) -> bool {
        self.cache.invalidate(CacheKey::History)
    }

    pub fn explorer_url(&self, tx_hash: H256) -> String {
        explorer_tx_url(&self.config.network.explorer_url, tx_hash)
    }

    pub fn swap_panel(&self) -> SwapPanel {
        SwapPanel::new(
            self.connection.clone(),
            self.cache.clone(),
            &self.config.sequencer,
            &self.config.debounce,
        )
    }

    pub fn add_liquidity_panel(&self) -> AddLiquidityPanel {
        AddLiquidityPanel::new(
            self.connection.clone(),
            self.cache.clone(),
            &self.config.sequencer,
        )
    }

    pub fn remove_liquidity_panel(&self) -> RemoveLiquidityPanel {
        RemoveLiquidityPanel::new(
            self.connection.clone(),
            self.cache.clone(),
            &self.config.sequencer,
            &self.config.debounce,
        )
    }
}

impl Drop for DexClient {
    fn drop(&mut self) {
        self.binder.abort();
        self.cache.shutdown();
    }
}

async fn bind_sessions(
    mut sessions: watch::Receiver<SessionState>,
    cache: ReadStateCache,
    config: DexConfig,
    bindings: Arc<RwLock<Bindings>>,
    bound: Arc<watch::Sender<Option<SessionId>>>,
) {
    loop {
        let session = sessions.borrow_and_update().clone();

        // Nothing from the previous session may stay visible
        cache.reset_all();
        let next = match &session {
            Some(session) => bind(&cache, &config, session),
            None => Bindings::detached(),
        };
        *bindings.write() = next;
        bound.send_replace(session.as_ref().map(|session| session.id));

        match &session {
            Some(session) => log_network!("Bound reads for {} ({:?})", session.id, session.account),
            None => debug!("Reads reset, no session"),
        }

        if sessions.changed().await.is_err() {
            return;
        }
    }
}

fn bind(cache: &ReadStateCache, config: &DexConfig, session: &Arc<Session>) -> Bindings {
    let polling = &config.polling;
    let account = session.account;

    let reader = session.reader.clone();
    let reserves = cache.observe(
        CacheKey::Reserves,
        move || {
            let reader = reader.clone();
            async move {
                let (reserve_a, reserve_b) = reader.reserves().await?;
                Ok(ReserveSnapshot::new(reserve_a, reserve_b))
            }
        },
        Some(polling.reserves()),
        None,
    );

    let reader = session.reader.clone();
    let balances = cache.observe(
        CacheKey::Balances(account),
        move || {
            let reader = reader.clone();
            async move {
                let (token_a, token_b) = try_join(
                    reader.token_balance(TokenId::A, account),
                    reader.token_balance(TokenId::B, account),
                )
                .await?;
                Ok(BalanceSnapshot::new(account, token_a, token_b))
            }
        },
        Some(polling.balances()),
        polling.balance_max_cycles,
    );

    let reader = session.reader.clone();
    let lp_position = cache.observe(
        CacheKey::LpPosition(account),
        move || {
            let reader = reader.clone();
            async move {
                let (lp_balance, total_supply) =
                    try_join(reader.lp_balance(account), reader.lp_total_supply()).await?;
                Ok(LpPosition::new(account, lp_balance, total_supply))
            }
        },
        Some(polling.lp_position()),
        None,
    );

    let reader = session.reader.clone();
    let loader = HistoryLoader::new(&config.history);
    let history = cache.observe(
        CacheKey::History,
        move || {
            let reader = reader.clone();
            let loader = loader.clone();
            async move { loader.load(reader.as_ref()).await }
        },
        None,
        None,
    );

    Bindings {
        session: Some(session.clone()),
        reserves,
        balances,
        lp_position,
        history,
    }
}
