#![deny(missing_docs)]
//! Single-slot keyed debounce executor.
//!
//! Coalesces rapid writes to one entity behind a debounce window while
//! keeping at most one key armed globally: scheduling a different key
//! forces the previous key's latest stored factory to execute immediately
//! (flush-on-switch). Per key, only the most recently scheduled factory
//! ever runs; earlier handles complete silently.
//!
//! The scheduler knows nothing about success/failure event typing — it
//! passes the factory's `Result` through verbatim. Typed events live one
//! layer up, in `repsync-coordinator`.
//!
//! All methods are synchronous and never block the caller: timers and
//! factory executions run on spawned Tokio tasks, so every method must be
//! called from within a Tokio runtime.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use repsync_types::{EntityKey, ScheduleOutcome, WriteFactory, WriteFuture};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Default debounce window, matching the live-session autosave cadence.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Handle to one `schedule()` call.
///
/// Resolves exactly once: with the factory's result, or silently if the
/// call was superseded (or the scheduler shut down) before execution. The
/// outcome is buffered, so awaiting after settlement still observes it.
#[must_use = "a schedule handle resolves to the write's outcome"]
pub struct ScheduleHandle<T, E> {
    rx: oneshot::Receiver<Result<T, E>>,
}

impl<T, E> ScheduleHandle<T, E> {
    /// Await the terminal outcome of this call.
    pub async fn outcome(self) -> ScheduleOutcome<T, E> {
        match self.rx.await {
            Ok(result) => ScheduleOutcome::Settled(result),
            // Sender dropped without sending: superseded or shut down.
            Err(_) => ScheduleOutcome::Superseded,
        }
    }
}

/// One pending (debouncing) write request. Presence in the slot map means
/// the factory has not started executing yet.
struct Slot<T, E> {
    factory: WriteFactory<T, E>,
    tx: oneshot::Sender<Result<T, E>>,
    timer: Option<JoinHandle<()>>,
    generation: u64,
}

struct State<T, E> {
    /// Pending requests, at most one per key.
    slots: HashMap<EntityKey, Slot<T, E>>,
    /// Executions currently awaited, per key. Distinct keys may be in
    /// flight concurrently after a flush-on-switch.
    in_flight: HashMap<EntityKey, u32>,
    /// The one key allowed to hold a live timer.
    active: Option<EntityKey>,
    debounce: Duration,
    generation: u64,
    closed: bool,
}

impl<T, E> State<T, E> {
    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }
}

struct Inner<T, E> {
    state: Mutex<State<T, E>>,
    processing_tx: watch::Sender<Option<EntityKey>>,
}

/// Single-slot keyed debounce executor.
///
/// Cheap to clone; clones share the same slot state. Each logical editing
/// scope (one live session screen) owns one instance — there is no
/// process-wide singleton.
pub struct SlotScheduler<T, E> {
    inner: Arc<Inner<T, E>>,
}

impl<T, E> Clone for SlotScheduler<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, E> Default for SlotScheduler<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl<T, E> SlotScheduler<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Create a scheduler with the given debounce window.
    pub fn new(debounce: Duration) -> Self {
        let (processing_tx, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    slots: HashMap::new(),
                    in_flight: HashMap::new(),
                    active: None,
                    debounce,
                    generation: 0,
                    closed: false,
                }),
                processing_tx,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T, E>> {
        // Poisoning only happens if a holder panicked; the state itself
        // stays structurally valid, so keep going.
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Coalesce a write for `key` behind the debounce window.
    ///
    /// Scheduling a different key first force-executes the previous active
    /// key's stored factory. Scheduling the same key again before its timer
    /// elapses replaces the stored factory; the earlier call's handle
    /// completes silently.
    pub fn schedule(
        &self,
        key: EntityKey,
        factory: impl FnOnce() -> WriteFuture<T, E> + Send + 'static,
    ) -> ScheduleHandle<T, E> {
        let (tx, rx) = oneshot::channel();
        let handle = ScheduleHandle { rx };

        let mut st = self.lock();
        if st.closed {
            // tx drops here; the handle completes silently.
            return handle;
        }

        // Flush-on-switch: the previous active key loses the rest of its
        // window the moment a different key starts being edited.
        if let Some(active) = st.active.clone() {
            if active != key {
                trace!(prev = %active, next = %key, "active key switch, flushing previous");
                self.execute_locked(&mut st, &active);
            }
        }

        // Last-write-wins: drop any pending predecessor for this key.
        if let Some(prev) = st.slots.remove(&key) {
            if let Some(timer) = prev.timer {
                timer.abort();
            }
            debug!(key = %key, "superseded pending write");
            // prev.tx drops here; its handle completes silently.
        }

        let generation = st.next_generation();
        let window = st.debounce;
        st.active = Some(key.clone());

        let sched = self.clone();
        let timer_key = key.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            sched.timer_elapsed(&timer_key, generation);
        });

        trace!(key = %key, window_ms = window.as_millis() as u64, "armed debounce timer");
        st.slots.insert(
            key,
            Slot {
                factory: Box::new(factory),
                tx,
                timer: Some(timer),
                generation,
            },
        );
        handle
    }

    /// Cancel `key`'s timer and run its stored factory now.
    ///
    /// Returns `true` if a factory was stored and is now executing,
    /// `false` if there was nothing pending for the key. Does not touch
    /// executions already in flight.
    pub fn force_execute(&self, key: &EntityKey) -> bool {
        let mut st = self.lock();
        if st.closed {
            return false;
        }
        self.execute_locked(&mut st, key)
    }

    /// The key currently holding the debounce slot, if any.
    ///
    /// Stays set while the key's latest write is in flight and clears on
    /// settlement, unless something newer was scheduled meanwhile.
    pub fn active_key(&self) -> Option<EntityKey> {
        self.lock().active.clone()
    }

    /// The currently configured debounce window.
    pub fn debounce(&self) -> Duration {
        self.lock().debounce
    }

    /// Reconfigure the debounce window for future `schedule()` calls.
    ///
    /// An already-armed timer keeps its original window.
    pub fn set_debounce(&self, window: Duration) {
        self.lock().debounce = window;
    }

    /// Observe the key whose factory is currently being awaited.
    ///
    /// Distinct from [`active_key`](Self::active_key), which covers the
    /// debouncing state. `None` when nothing executes.
    pub fn processing_key(&self) -> watch::Receiver<Option<EntityKey>> {
        self.inner.processing_tx.subscribe()
    }

    /// Cancel all timers and silently complete all outstanding handles.
    ///
    /// Factories already executing run to completion, but their results
    /// become unobservable. Subsequent `schedule()` calls complete
    /// silently without arming anything.
    pub fn shutdown(&self) {
        let mut st = self.lock();
        if st.closed {
            return;
        }
        st.closed = true;
        st.active = None;
        let drained = st.slots.drain().collect::<Vec<_>>();
        drop(st);
        for (key, slot) in drained {
            if let Some(timer) = slot.timer {
                timer.abort();
            }
            trace!(key = %key, "dropped pending write on shutdown");
            // slot.tx drops here; its handle completes silently.
        }
        let _ = self.inner.processing_tx.send(None);
    }

    /// Timer callback. The generation check guards against a stale timer
    /// racing its own abort after the slot was superseded.
    fn timer_elapsed(&self, key: &EntityKey, generation: u64) {
        let mut st = self.lock();
        let current = st
            .slots
            .get(key)
            .is_some_and(|slot| slot.generation == generation);
        if current {
            trace!(key = %key, "debounce window elapsed");
            self.execute_locked(&mut st, key);
        }
    }

    /// Promote `key`'s pending request to processing. Caller holds the lock.
    fn execute_locked(&self, st: &mut State<T, E>, key: &EntityKey) -> bool {
        let Some(slot) = st.slots.remove(key) else {
            return false;
        };
        if let Some(timer) = slot.timer {
            timer.abort();
        }
        *st.in_flight.entry(key.clone()).or_insert(0) += 1;
        let _ = self.inner.processing_tx.send(Some(key.clone()));
        trace!(key = %key, "executing write factory");

        let sched = self.clone();
        let key = key.clone();
        let factory = slot.factory;
        let tx = slot.tx;
        // The factory is invoked on the spawned task, outside the lock, so
        // a factory that touches the scheduler cannot deadlock it.
        tokio::spawn(async move {
            let result = factory().await;
            sched.settle(&key, tx, result);
        });
        true
    }

    /// Record one execution's completion and deliver its result.
    fn settle(&self, key: &EntityKey, tx: oneshot::Sender<Result<T, E>>, result: Result<T, E>) {
        let mut st = self.lock();
        if let Some(count) = st.in_flight.get_mut(key) {
            *count -= 1;
            if *count == 0 {
                st.in_flight.remove(key);
            }
        }
        if st.active.as_ref() == Some(key) && !st.slots.contains_key(key) {
            st.active = None;
        }
        let closed = st.closed;
        drop(st);

        self.inner.processing_tx.send_if_modified(|current| {
            if current.as_ref() == Some(key) {
                *current = None;
                true
            } else {
                false
            }
        });

        if closed {
            trace!(key = %key, "scheduler shut down, result unobservable");
            return; // tx drops; the handle completes silently.
        }
        trace!(key = %key, ok = result.is_ok(), "write settled");
        // The receiver may already be gone; that is the caller's choice.
        let _ = tx.send(result);
    }
}
