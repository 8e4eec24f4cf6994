//! Debounced single-value reads
//!
//! A [`DebouncedRead`] waits for its input to stay unchanged for a quiet
//! period before fetching. Every new input supersedes the previous one: the
//! pending timer is cancelled and a result that arrives for an older input
//! is dropped.

use crate::cache::{ReadState, ReadStatus};
use chrono::Utc;
use futures::future::BoxFuture;
use ledger::LedgerError;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

type FetchFn<I, T> = Arc<dyn Fn(I) -> BoxFuture<'static, Result<T, LedgerError>> + Send + Sync>;

struct Pending {
    generation: u64,
    task: Option<JoinHandle<()>>,
}

pub struct DebouncedRead<I, T> {
    name: &'static str,
    quiet: Duration,
    fetch: FetchFn<I, T>,
    tx: Arc<watch::Sender<ReadState<T>>>,
    pending: Arc<Mutex<Pending>>,
}

impl<I, T> DebouncedRead<I, T>
where
    I: Send + 'static,
    T: Clone + Default + Send + Sync + 'static,
{
    pub fn new<F, Fut>(name: &'static str, quiet: Duration, fetch: F) -> Self
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, LedgerError>> + Send + 'static,
    {
        let (tx, _) = watch::channel(ReadState::default());
        Self {
            name,
            quiet,
            fetch: Arc::new(move |input| Box::pin(fetch(input))),
            tx: Arc::new(tx),
            pending: Arc::new(Mutex::new(Pending {
                generation: 0,
                task: None,
            })),
        }
    }

    /// Replace the input and restart the quiet period
    pub fn set_input(&self, input: I) {
        let mut pending = self.pending.lock();
        pending.generation += 1;
        let generation = pending.generation;
        if let Some(task) = pending.task.take() {
            task.abort();
        }

        self.tx.send_modify(|state| state.status = ReadStatus::Loading);

        let name = self.name;
        let quiet = self.quiet;
        let fetch = self.fetch.clone();
        let tx = self.tx.clone();
        let gate = self.pending.clone();

        pending.task = Some(tokio::spawn(async move {
            tokio::time::sleep(quiet).await;
            let result = fetch(input).await;

            // Holding the lock orders this publish against set_input/clear
            let pending = gate.lock();
            if pending.generation != generation {
                debug!("{}: dropping result for superseded input", name);
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
                    let kind = e.kind();
                    warn!("{}: read failed ({}): {}", name, kind, e);
                    tx.send_replace(ReadState {
                        value: T::default(),
                        status: ReadStatus::Stale(kind),
                        updated_at: None,
                    });
                }
            }
        }));
    }

    /// Cancel any pending read and publish the zero value
    pub fn clear(&self) {
        let mut pending = self.pending.lock();
        pending.generation += 1;
        if let Some(task) = pending.task.take() {
            task.abort();
        }
        self.tx.send_replace(ReadState::default());
    }

    pub fn current(&self) -> ReadState<T> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ReadState<T>> {
        self.tx.subscribe()
    }
}

impl<I, T> Drop for DebouncedRead<I, T> {
    fn drop(&mut self) {
        if let Some(task) = self.pending.lock().task.take() {
            task.abort();
        }
    }
}
