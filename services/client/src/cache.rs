//! # Read-State Cache - Polled Ledger Reads
//!
//! ## Purpose
//!
//! Keeps the latest known value of every registered ledger read behind a
//! `watch` channel. Each registration owns one background task that fetches
//! immediately, then on its interval (optionally for a bounded number of
//! cycles), and again whenever the key is invalidated.
//!
//! ## Integration Points
//!
//! - **Input Sources**: Fetch closures over the session's [`ledger::LedgerReader`]
//! - **Output Destinations**: [`Observation`] handles held by the client and panels
//! - **Invalidation**: Mutation sequencer after confirmed transactions
//!
//! ## Failure Policy
//!
//! A failed fetch keeps the last good value and marks it `Stale` with the
//! classified error. Unregistering publishes the value type's zero state and
//! closes the registration's write gate, so a fetch that was already in
//! flight can never overwrite the zero state.

use crate::log_warning;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use ethers::types::Address;
use futures::future::BoxFuture;
use ledger::LedgerError;
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;
use types::ErrorKind;

/// Identity of one registered read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Reserves,
    Balances(Address),
    LpPosition(Address),
    History,
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Reserves => f.write_str("reserves"),
            CacheKey::Balances(account) => write!(f, "balances:{:?}", account),
            CacheKey::LpPosition(account) => write!(f, "lp:{:?}", account),
            CacheKey::History => f.write_str("history"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadStatus {
    /// No fetch has completed since registration
    #[default]
    Loading,
    Fresh,
    /// The latest fetch failed; the value is from an earlier success or the zero state
    Stale(ErrorKind),
}

/// Latest known value of a read and how it was obtained
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReadState<T> {
    pub value: T,
    pub status: ReadStatus,
    pub updated_at: Option<DateTime<Utc>>,
}

impl<T> ReadState<T> {
    pub fn is_fresh(&self) -> bool {
        self.status == ReadStatus::Fresh
    }

    /// Whether `value` came from the ledger at some point
    pub fn is_known(&self) -> bool {
        self.updated_at.is_some()
    }
}

/// Subscriber handle for one registered read
#[derive(Clone)]
pub struct Observation<T> {
    key: Option<CacheKey>,
    rx: watch::Receiver<ReadState<T>>,
}

impl<T: Clone + Default> Observation<T> {
    /// A handle that always reads the zero state, for when nothing is registered
    pub fn detached() -> Self {
        let (_tx, rx) = watch::channel(ReadState::default());
        Self { key: None, rx }
    }

    pub fn key(&self) -> Option<CacheKey> {
        self.key
    }

    pub fn current(&self) -> ReadState<T> {
        self.rx.borrow().clone()
    }

    pub fn value(&self) -> T {
        self.rx.borrow().value.clone()
    }

    /// Wait for the next published state; `None` once the registration is gone
    pub async fn changed(&mut self) -> Option<ReadState<T>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Wait until a published state satisfies `predicate`
    pub async fn wait_for(&mut self, mut predicate: impl FnMut(&ReadState<T>) -> bool) -> Option<ReadState<T>> {
        self.rx.wait_for(|state| predicate(state)).await.ok().map(|state| state.clone())
    }
}

type FetchFn<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, LedgerError>> + Send + Sync>;

/// Closed gate means the registration was reset; nothing may publish afterwards
type WriteGate = Arc<Mutex<bool>>;

struct Registration {
    notify: Arc<Notify>,
    gate: WriteGate,
    task: JoinHandle<()>,
    /// `watch::Sender<ReadState<T>>` for the registered `T`
    sender: Box<dyn Any + Send + Sync>,
    reset: Box<dyn Fn() + Send + Sync>,
}

impl Registration {
    /// Stop polling and publish the zero state
    fn close(self) {
        {
            let mut open = self.gate.lock();
            *open = false;
            (self.reset)();
        }
        self.task.abort();
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub registered: usize,
    pub fetches: u64,
    pub failures: u64,
    pub invalidations: u64,
}

#[derive(Default)]
struct Counters {
    fetches: AtomicU64,
    failures: AtomicU64,
    invalidations: AtomicU64,
}

#[derive(Clone, Default)]
pub struct ReadStateCache {
    registrations: Arc<DashMap<CacheKey, Registration>>,
    counters: Arc<Counters>,
}

impl ReadStateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a polling read under `key`
    ///
    /// `fetch` runs immediately and then every `interval`. With `max_cycles`
    /// set, interval polling stops after that many polls past the first fetch;
    /// the registration stays alive for [`invalidate`](Self::invalidate).
    /// `interval: None` fetches once and then only on invalidation. An
    /// existing registration under `key` is stopped and reset first.
    pub fn observe<T, F, Fut>(
        &self,
        key: CacheKey,
        fetch: F,
        interval: Option<Duration>,
        max_cycles: Option<u32>,
    ) -> Observation<T>
    where
        T: Clone + Default + Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, LedgerError>> + Send + 'static,
    {
        let fetch: FetchFn<T> = Arc::new(move || Box::pin(fetch()));
        let (tx, rx) = watch::channel(ReadState::<T>::default());
        let notify = Arc::new(Notify::new());
        let gate: WriteGate = Arc::new(Mutex::new(true));

        let task = tokio::spawn(poll_loop(
            key,
            fetch,
            tx.clone(),
            notify.clone(),
            gate.clone(),
            interval,
            max_cycles,
            self.counters.clone(),
        ));

        let reset_tx = tx.clone();
        let registration = Registration {
            notify,
            gate,
            task,
            sender: Box::new(tx),
            reset: Box::new(move || {
                reset_tx.send_replace(ReadState::default());
            }),
        };

        if let Some(previous) = self.registrations.insert(key, registration) {
            debug!("Replacing registration for {}", key);
            previous.close();
        }

        debug!(
            "Registered {} (interval {:?}, cycles {:?})",
            key, interval, max_cycles
        );
        Observation { key: Some(key), rx }
    }

    /// Handle to an existing registration, if one of type `T` exists
    pub fn subscribe<T>(&self, key: CacheKey) -> Option<Observation<T>>
    where
        T: Clone + Default + Send + Sync + 'static,
    {
        let entry = self.registrations.get(&key)?;
        let sender = entry.sender.downcast_ref::<watch::Sender<ReadState<T>>>()?;
        Some(Observation {
            key: Some(key),
            rx: sender.subscribe(),
        })
    }

    /// Current state of a registration without subscribing
    pub fn peek<T>(&self, key: CacheKey) -> Option<ReadState<T>>
    where
        T: Clone + Default + Send + Sync + 'static,
    {
        let entry = self.registrations.get(&key)?;
        let sender = entry.sender.downcast_ref::<watch::Sender<ReadState<T>>>()?;
        let state = sender.borrow().clone();
        Some(state)
    }

    /// Force an immediate re-fetch; `false` when `key` is not registered
    pub fn invalidate(&self, key: CacheKey) -> bool {
        match self.registrations.get(&key) {
            Some(entry) => {
                self.counters.invalidations.fetch_add(1, Ordering::Relaxed);
                entry.notify.notify_one();
                debug!("Invalidated {}", key);
                true
            }
            None => false,
        }
    }

    /// Invalidate several keys, returning how many were registered
    pub fn invalidate_all(&self, keys: &[CacheKey]) -> usize {
        keys.iter().filter(|key| self.invalidate(**key)).count()
    }

    /// Stop polling `key` and publish its zero state
    pub fn unregister(&self, key: CacheKey) -> bool {
        match self.registrations.remove(&key) {
            Some((_, registration)) => {
                registration.close();
                debug!("Unregistered {}", key);
                true
            }
            None => false,
        }
    }

    /// Unregister every key
    pub fn reset_all(&self) {
        let keys: Vec<CacheKey> = self.registrations.iter().map(|entry| *entry.key()).collect();
        for key in keys {
            self.unregister(key);
        }
    }

    pub fn shutdown(&self) {
        self.reset_all();
    }

    pub fn is_registered(&self, key: CacheKey) -> bool {
        self.registrations.contains_key(&key)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            registered: self.registrations.len(),
            fetches: self.counters.fetches.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
            invalidations: self.counters.invalidations.load(Ordering::Relaxed),
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn poll_loop<T: Clone + Send + Sync + 'static>(
    key: CacheKey,
    fetch: FetchFn<T>,
    tx: watch::Sender<ReadState<T>>,
    notify: Arc<Notify>,
    gate: WriteGate,
    interval: Option<Duration>,
    max_cycles: Option<u32>,
    counters: Arc<Counters>,
) {
    fetch_once(key, &fetch, &tx, &gate, &counters).await;

    let mut ticker = interval.map(|period| {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });
    let mut cycles: u32 = 0;

    loop {
        let budget_left = max_cycles.map_or(true, |max| cycles < max);
        let tick = async {
            match ticker.as_mut() {
                Some(ticker) if budget_left => {
                    ticker.tick().await;
                }
                _ => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = tick => {
                cycles += 1;
                if max_cycles == Some(cycles) {
                    debug!("{} reached its poll budget of {} cycles", key, cycles);
                }
            }
            _ = notify.notified() => {}
        }

        fetch_once(key, &fetch, &tx, &gate, &counters).await;
    }
}

async fn fetch_once<T: Clone>(
    key: CacheKey,
    fetch: &FetchFn<T>,
    tx: &watch::Sender<ReadState<T>>,
    gate: &WriteGate,
    counters: &Counters,
) {
    counters.fetches.fetch_add(1, Ordering::Relaxed);
    let result = fetch().await;

    let open = gate.lock();
    if !*open {
        debug!("Discarding {} result fetched across a reset", key);
        return;
    }

    match result {
        Ok(value) => {
            tx.send_replace(ReadState {
                value,
                status: ReadStatus::Fresh,
                updated_at: Some(Utc::now()),
            });
        }
        Err(e) => {
            counters.failures.fetch_add(1, Ordering::Relaxed);
            let kind = e.kind();
            log_warning!("Read {} failed ({}): {}", key, kind, e);
            tx.send_modify(|state| state.status = ReadStatus::Stale(kind));
        }
    }
}
