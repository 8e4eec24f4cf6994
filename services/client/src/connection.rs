//! # Connection Manager - Wallet Session Lifecycle
//!
//! ## Purpose
//!
//! Owns the single active wallet session: connects through a registered
//! [`WalletProvider`], enforces the configured chain, binds fresh ledger handles
//! and publishes every session change to subscribers. Sessions are immutable;
//! any account or chain change produces a new [`Session`] with a new
//! [`SessionId`].
//!
//! ## Integration Points
//!
//! - **Input Sources**: User connect/disconnect requests, [`WalletSignal`]s
//! - **Output Destinations**: `watch` channel consumed by the client bindings,
//!   identity checks from the mutation sequencer
//!
//! ## Architecture Role
//!
//! ```text
//! connect(kind) → request_accounts → chain check/switch → bind(account) → publish Some(session)
//!                                                                              ↑
//! WalletSignal::AccountsChanged([])        → publish None                      │
//! WalletSignal::AccountsChanged([other..]) → connect(last kind) ───────────────┤
//! WalletSignal::ChainChanged(_)            → publish None → connect(last kind) ┘
//! ```

use crate::{log_network, log_warning};
use dashmap::DashMap;
use ethers::types::Address;
use ledger::{LedgerReader, LedgerWriter, WalletProvider, WalletSignal};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use types::{ChainId, ErrorKind, SessionId, WalletKind};

/// An authorised wallet connection bound to one account on one chain
pub struct Session {
    pub id: SessionId,
    pub account: Address,
    pub chain_id: ChainId,
    pub wallet: WalletKind,
    pub reader: Arc<dyn LedgerReader>,
    pub writer: Arc<dyn LedgerWriter>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("account", &self.account)
            .field("chain_id", &self.chain_id)
            .field("wallet", &self.wallet)
            .finish()
    }
}

/// Published session state; `None` while disconnected
pub type SessionState = Option<Arc<Session>>;

#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

struct Inner {
    target_chain: ChainId,
    wallets: DashMap<WalletKind, Arc<dyn WalletProvider>>,
    session_tx: watch::Sender<SessionState>,
    next_session: AtomicU64,
    /// Bumped by every teardown; a connect that started before a teardown does not publish
    epoch: AtomicU64,
    last_kind: Mutex<Option<WalletKind>>,
    listener: Mutex<Option<(WalletKind, JoinHandle<()>)>>,
    connect_lock: tokio::sync::Mutex<()>,
}

impl ConnectionManager {
    pub fn new(target_chain: ChainId) -> Self {
        let (session_tx, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                target_chain,
                wallets: DashMap::new(),
                session_tx,
                next_session: AtomicU64::new(0),
                epoch: AtomicU64::new(0),
                last_kind: Mutex::new(None),
                listener: Mutex::new(None),
                connect_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Make a wallet available to `connect`
    pub fn register_wallet(&self, provider: Arc<dyn WalletProvider>) {
        let kind = provider.kind();
        debug!("Registered wallet provider: {}", kind);
        self.inner.wallets.insert(kind, provider);
    }

    pub fn target_chain(&self) -> ChainId {
        self.inner.target_chain
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.session_tx.subscribe()
    }

    pub fn current(&self) -> SessionState {
        self.inner.session_tx.borrow().clone()
    }

    /// Whether `id` names the session that is active right now
    pub fn is_current(&self, id: SessionId) -> bool {
        self.inner
            .session_tx
            .borrow()
            .as_ref()
            .is_some_and(|session| session.id == id)
    }

    /// Authorise an account through `kind` and publish the resulting session
    pub async fn connect(&self, kind: WalletKind) -> Result<Arc<Session>, ErrorKind> {
        self.inner.connect(kind).await
    }

    /// Forget the session locally; nothing happens on-chain
    pub fn disconnect(&self) {
        if let Some((_, listener)) = self.inner.listener.lock().take() {
            listener.abort();
        }
        self.inner.teardown("disconnect requested");
    }
}

impl Inner {
    async fn connect(self: &Arc<Self>, kind: WalletKind) -> Result<Arc<Session>, ErrorKind> {
        let _serial = self.connect_lock.lock().await;
        let epoch = self.epoch.load(Ordering::SeqCst);

        let provider = self
            .wallets
            .get(&kind)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                log_warning!("No wallet registered for {}", kind);
                ErrorKind::NoWalletFound
            })?;

        log_network!("Connecting {}...", kind);

        let accounts = provider.request_accounts().await.map_err(|e| {
            log_warning!("Account request failed: {}", e);
            match e.kind() {
                ErrorKind::UserRejected => ErrorKind::UserRejected,
                _ => ErrorKind::ProviderUnavailable,
            }
        })?;
        let account = *accounts.first().ok_or_else(|| {
            log_warning!("{} returned no accounts", kind);
            ErrorKind::ProviderUnavailable
        })?;

        self.ensure_chain(provider.as_ref()).await?;

        let handles = provider.bind(account).await.map_err(|e| {
            log_warning!("Failed to bind ledger handles: {}", e);
            ErrorKind::ProviderUnavailable
        })?;

        if self.epoch.load(Ordering::SeqCst) != epoch {
            info!("Connect to {} superseded by a teardown", kind);
            return Err(ErrorKind::SessionChanged);
        }

        let id = SessionId::new(self.next_session.fetch_add(1, Ordering::SeqCst) + 1);
        let session = Arc::new(Session {
            id,
            account,
            chain_id: self.target_chain,
            wallet: kind,
            reader: handles.reader,
            writer: handles.writer,
        });

        *self.last_kind.lock() = Some(kind);
        self.ensure_listener(kind, provider.as_ref());
        self.session_tx.send_replace(Some(session.clone()));

        log_network!("Connected {:?} via {} ({})", account, kind, id);
        Ok(session)
    }

    /// Read the wallet's chain and switch to the target if it differs
    async fn ensure_chain(&self, provider: &dyn WalletProvider) -> Result<(), ErrorKind> {
        let chain = provider.chain_id().await.map_err(|e| {
            log_warning!("Failed to read wallet chain: {}", e);
            ErrorKind::ProviderUnavailable
        })?;
        if chain == self.target_chain {
            return Ok(());
        }

        info!("Wallet on {}, requesting switch to {}", chain, self.target_chain);
        if let Err(e) = provider.switch_chain(self.target_chain).await {
            log_warning!("Chain switch failed: {}", e);
            return Err(ErrorKind::WrongNetwork);
        }

        match provider.chain_id().await {
            Ok(chain) if chain == self.target_chain => Ok(()),
            Ok(chain) => {
                log_warning!("Wallet still on {} after switch", chain);
                Err(ErrorKind::WrongNetwork)
            }
            Err(e) => {
                log_warning!("Failed to re-read wallet chain: {}", e);
                Err(ErrorKind::WrongNetwork)
            }
        }
    }

    /// One signal listener per connected wallet kind
    fn ensure_listener(self: &Arc<Self>, kind: WalletKind, provider: &dyn WalletProvider) {
        let mut listener = self.listener.lock();
        if let Some((current, handle)) = listener.as_ref() {
            if *current == kind && !handle.is_finished() {
                return;
            }
        }
        if let Some((_, old)) = listener.take() {
            old.abort();
        }

        let signals = provider.subscribe();
        let weak = Arc::downgrade(self);
        *listener = Some((kind, tokio::spawn(listen(weak, signals))));
    }

    fn teardown(&self, reason: &str) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let previous = self.session_tx.send_replace(None);
        if let Some(session) = previous {
            log_network!("Session {} closed: {}", session.id, reason);
        }
    }

    async fn handle_signal(self: &Arc<Self>, signal: WalletSignal) {
        let last_kind = *self.last_kind.lock();
        let Some(kind) = last_kind else {
            return;
        };

        match signal {
            WalletSignal::AccountsChanged(accounts) => match accounts.first() {
                None => self.teardown("wallet reported no accounts"),
                Some(first) => {
                    let current = self.session_tx.borrow().as_ref().map(|s| s.account);
                    if current != Some(*first) {
                        info!("Active account changed to {:?}, reconnecting", first);
                        if let Err(kind) = self.connect(kind).await {
                            log_warning!("Reconnect after account change failed: {}", kind);
                        }
                    }
                }
            },
            WalletSignal::ChainChanged(chain) => {
                // Full restart: dependents reset before the new session exists
                self.teardown(&format!("wallet switched to {}", chain));
                if let Err(kind) = self.connect(kind).await {
                    log_warning!("Reconnect after chain change failed: {}", kind);
                }
            }
        }
    }
}

async fn listen(inner: Weak<Inner>, mut signals: broadcast::Receiver<WalletSignal>) {
    loop {
        let signal = match signals.recv().await {
            Ok(signal) => signal,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                log_warning!("Missed {} wallet signals", skipped);
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => return,
        };

        let Some(inner) = inner.upgrade() else {
            return;
        };
        debug!("Wallet signal: {:?}", signal);
        inner.handle_signal(signal).await;
    }
}
