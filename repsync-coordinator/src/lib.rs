#![deny(missing_docs)]
//! Event coordinator over the single-slot debounce executor.
//!
//! Wraps one [`SlotScheduler`] and turns its raw value-or-error outcomes
//! into typed success/failure events using caller-supplied builders. Every
//! settled event fans out on global broadcast channels, independent of key;
//! each call additionally gets its own buffered settlement handle. The
//! coordinator also provides the system's only cross-boundary ordering
//! guarantee: [`flush`](WriteCoordinator::flush) resolves once a key's
//! outcome has fully settled and its events are published.
//!
//! The coordinator never retries. Whether a factory fails before its first
//! await point or rejects later, exactly one failure event is emitted per
//! non-superseded call, carrying the original error verbatim.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use repsync_debounce::{DEFAULT_DEBOUNCE, SlotScheduler};
use repsync_types::{EntityKey, FlushOutcome, ScheduleOutcome, WriteFuture, WriteSettlement};
use tokio::sync::{broadcast, oneshot, watch};
use tracing::trace;

/// Buffer size for the global success/failure broadcast channels. A lagging
/// observer loses oldest events; the per-call handle is the lossless surface.
const EVENT_CAPACITY: usize = 64;

/// Handle to one `enqueue()` call.
///
/// Settles exactly once with [`WriteSettlement`], or resolves `None` if the
/// call was superseded before execution. The settlement is buffered, so
/// awaiting after the fact still observes it.
#[must_use = "a write handle resolves to the write's settlement"]
pub struct WriteHandle<T, E, S, F> {
    rx: oneshot::Receiver<WriteSettlement<T, E, S, F>>,
}

impl<T, E, S, F> WriteHandle<T, E, S, F> {
    /// Await the terminal settlement. `None` means superseded: the factory
    /// never ran and no event was published.
    pub async fn settled(self) -> Option<WriteSettlement<T, E, S, F>> {
        self.rx.await.ok()
    }

    /// Await the raw value-or-error response, discarding the typed event.
    pub async fn response(self) -> Option<Result<T, E>> {
        self.settled().await.map(WriteSettlement::into_response)
    }
}

/// One unsettled enqueue, tracked so `flush` can await its completion.
struct PendingEntry {
    id: u64,
    done_rx: watch::Receiver<bool>,
}

/// Event coordinator for debounced entity writes.
///
/// Generic over the write's value type `T`, its error type `E`, and the
/// caller-defined success/failure event types `S` and `F`. One instance per
/// logical editing scope; shared state is instance-owned, never global.
pub struct WriteCoordinator<T, E, S, F> {
    scheduler: SlotScheduler<T, E>,
    success_tx: broadcast::Sender<S>,
    failure_tx: broadcast::Sender<F>,
    pending: Arc<Mutex<HashMap<EntityKey, PendingEntry>>>,
    next_id: AtomicU64,
}

impl<T, E, S, F> Default for WriteCoordinator<T, E, S, F>
where
    T: Send + 'static,
    E: Send + 'static,
    S: Clone + Send + 'static,
    F: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl<T, E, S, F> WriteCoordinator<T, E, S, F>
where
    T: Send + 'static,
    E: Send + 'static,
    S: Clone + Send + 'static,
    F: Clone + Send + 'static,
{
    /// Create a coordinator with the given debounce window.
    pub fn new(debounce: Duration) -> Self {
        let (success_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let (failure_tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            scheduler: SlotScheduler::new(debounce),
            success_tx,
            failure_tx,
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }

    fn lock_pending(&self) -> MutexGuard<'_, HashMap<EntityKey, PendingEntry>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue a debounced write for `key`.
    ///
    /// `on_success` / `on_failure` build the typed event from the settled
    /// outcome; any context they need travels by closure capture. The
    /// returned handle settles once, or resolves `None` when a later
    /// enqueue for the same key supersedes this one.
    pub fn enqueue(
        &self,
        key: EntityKey,
        factory: impl FnOnce() -> WriteFuture<T, E> + Send + 'static,
        on_success: impl FnOnce(&T) -> S + Send + 'static,
        on_failure: impl FnOnce(&E) -> F + Send + 'static,
    ) -> WriteHandle<T, E, S, F> {
        let sched_handle = self.scheduler.schedule(key.clone(), factory);

        let (settle_tx, settle_rx) = oneshot::channel();
        let (done_tx, done_rx) = watch::channel(false);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock_pending()
            .insert(key.clone(), PendingEntry { id, done_rx });

        let success_tx = self.success_tx.clone();
        let failure_tx = self.failure_tx.clone();
        let pending = Arc::clone(&self.pending);
        tokio::spawn(async move {
            match sched_handle.outcome().await {
                ScheduleOutcome::Settled(Ok(value)) => {
                    let event = on_success(&value);
                    trace!(key = %key, "publishing success event");
                    let _ = success_tx.send(event.clone());
                    let _ = settle_tx.send(WriteSettlement::Success { value, event });
                }
                ScheduleOutcome::Settled(Err(error)) => {
                    let event = on_failure(&error);
                    trace!(key = %key, "publishing failure event");
                    let _ = failure_tx.send(event.clone());
                    let _ = settle_tx.send(WriteSettlement::Failure { error, event });
                }
                ScheduleOutcome::Superseded => {
                    trace!(key = %key, "enqueue superseded, no event");
                    // settle_tx drops here; the handle resolves None.
                }
            }
            // Release the flush barrier for this call. Only remove the map
            // entry if a newer enqueue has not already replaced it.
            let mut map = pending.lock().unwrap_or_else(PoisonError::into_inner);
            if map.get(&key).is_some_and(|entry| entry.id == id) {
                map.remove(&key);
            }
            drop(map);
            let _ = done_tx.send(true);
        });

        WriteHandle { rx: settle_rx }
    }

    /// Observe every success event, independent of key.
    pub fn subscribe_success(&self) -> broadcast::Receiver<S> {
        self.success_tx.subscribe()
    }

    /// Observe every failure event, independent of key.
    pub fn subscribe_failure(&self) -> broadcast::Receiver<F> {
        self.failure_tx.subscribe()
    }

    /// The key whose factory is currently being awaited, `None` when idle.
    ///
    /// Distinct from [`active_key`](Self::active_key), which reflects the
    /// debouncing state.
    pub fn processing_key(&self) -> watch::Receiver<Option<EntityKey>> {
        self.scheduler.processing_key()
    }

    /// The key currently holding the debounce slot, if any.
    pub fn active_key(&self) -> Option<EntityKey> {
        self.scheduler.active_key()
    }

    /// Force `key`'s pending write to run now, then wait until its outcome
    /// has fully settled and events are published.
    ///
    /// This is the barrier callers take before any operation whose
    /// correctness depends on the entity's durable state. Flushing a key
    /// with nothing pending or in flight is an immediate successful no-op.
    pub async fn flush(&self, key: &EntityKey) -> FlushOutcome {
        let entry_rx = self.lock_pending().get(key).map(|e| e.done_rx.clone());
        let Some(mut done_rx) = entry_rx else {
            trace!(key = %key, "nothing to flush");
            return FlushOutcome::NothingToFlush;
        };

        let forced = self.scheduler.force_execute(key);
        trace!(key = %key, forced, "flushing");
        // An Err here means the settle task already finished and dropped
        // the sender, which only happens after publishing; either way the
        // barrier holds.
        let _ = done_rx.wait_for(|done| *done).await;
        FlushOutcome::Flushed
    }

    /// Flush whichever key currently holds the debounce slot.
    pub async fn flush_active(&self) -> FlushOutcome {
        match self.scheduler.active_key() {
            Some(key) => self.flush(&key).await,
            None => FlushOutcome::NothingToFlush,
        }
    }

    /// Reconfigure the debounce window for future enqueues only.
    pub fn set_debounce(&self, window: Duration) {
        self.scheduler.set_debounce(window);
    }

    /// The currently configured debounce window.
    pub fn debounce(&self) -> Duration {
        self.scheduler.debounce()
    }

    /// Shut down the underlying scheduler: cancel all timers and silently
    /// complete all outstanding handles. In-flight factories run to
    /// completion, but their results become unobservable and no events are
    /// published for them.
    pub fn shutdown(&self) {
        self.scheduler.shutdown();
    }
}
