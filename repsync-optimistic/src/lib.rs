#![deny(missing_docs)]
//! Optimistic per-entity state, made an explicit state machine.
//!
//! A cell is either `Authoritative` (local state matches what the backend
//! confirmed) or `OptimisticPending` (a local change is displayed while its
//! write is still in flight, with the pre-mutation snapshot retained for
//! revert). Snapshots are copy-on-write: the first `apply` after a settled
//! state captures the snapshot, and further applies before settlement keep
//! that original snapshot, so a revert always lands on the last
//! authoritative value no matter how many times the user re-edited.
//!
//! This crate owns steps 1–2 and 4–5 of the write contract: snapshot,
//! apply, then reconcile on success or revert on failure. Enqueueing the
//! write and taking the flush barrier is `repsync-coordinator`'s job.

use std::collections::HashMap;

use repsync_types::EntityKey;
use serde::{Deserialize, Serialize};

/// The two states of an optimistically edited entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellState<T> {
    /// Local state matches the backend's last confirmed value.
    Authoritative(T),
    /// A local change is displayed while its write is unconfirmed.
    OptimisticPending {
        /// The value currently shown to the user.
        displayed: T,
        /// The last authoritative value, kept for revert.
        snapshot: T,
    },
}

/// Optimistic state for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimisticCell<T> {
    state: CellState<T>,
}

impl<T: Clone> OptimisticCell<T> {
    /// Create a cell from a backend-confirmed value.
    pub fn new(authoritative: T) -> Self {
        Self {
            state: CellState::Authoritative(authoritative),
        }
    }

    /// The value to display: the optimistic guess while pending, otherwise
    /// the confirmed value.
    pub fn value(&self) -> &T {
        match &self.state {
            CellState::Authoritative(value) => value,
            CellState::OptimisticPending { displayed, .. } => displayed,
        }
    }

    /// The retained pre-mutation snapshot, while pending.
    pub fn snapshot(&self) -> Option<&T> {
        match &self.state {
            CellState::Authoritative(_) => None,
            CellState::OptimisticPending { snapshot, .. } => Some(snapshot),
        }
    }

    /// `true` while an unconfirmed local change is displayed.
    pub fn is_pending(&self) -> bool {
        matches!(self.state, CellState::OptimisticPending { .. })
    }

    /// The current machine state.
    pub fn state(&self) -> &CellState<T> {
        &self.state
    }

    /// Display `value` immediately, before its write is confirmed.
    ///
    /// The first apply captures the current authoritative value as the
    /// snapshot; re-applying while already pending replaces only the
    /// displayed value and keeps the original snapshot.
    pub fn apply(&mut self, value: T) {
        let snapshot = match &self.state {
            CellState::Authoritative(current) => current.clone(),
            CellState::OptimisticPending { snapshot, .. } => snapshot.clone(),
        };
        self.state = CellState::OptimisticPending {
            displayed: value,
            snapshot,
        };
    }

    /// Accept the backend's response as the new confirmed value.
    ///
    /// The response may differ from the optimistic guess (server-computed
    /// fields); it wins either way. Drops any retained snapshot.
    pub fn reconcile(&mut self, authoritative: T) {
        self.state = CellState::Authoritative(authoritative);
    }

    /// Restore the pre-mutation snapshot after a failed write.
    ///
    /// Returns `true` if a pending change was reverted, `false` if the
    /// cell was already authoritative (revert is then a no-op).
    pub fn revert(&mut self) -> bool {
        match &self.state {
            CellState::Authoritative(_) => false,
            CellState::OptimisticPending { snapshot, .. } => {
                self.state = CellState::Authoritative(snapshot.clone());
                true
            }
        }
    }
}

/// Keyed optimistic cells for one live session.
///
/// The UI layer holds one store per editing scope and drives it from the
/// coordinator's per-call settlement: `apply` before enqueueing the write,
/// then `reconcile` on the success event or `revert` on the failure event.
#[derive(Debug, Clone)]
pub struct OptimisticStore<T> {
    cells: HashMap<EntityKey, OptimisticCell<T>>,
}

impl<T> Default for OptimisticStore<T> {
    fn default() -> Self {
        Self {
            cells: HashMap::new(),
        }
    }
}

impl<T: Clone> OptimisticStore<T> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            cells: HashMap::new(),
        }
    }

    /// Seed a cell with a backend-confirmed value.
    pub fn insert(&mut self, key: EntityKey, authoritative: T) {
        self.cells.insert(key, OptimisticCell::new(authoritative));
    }

    /// The displayed value for `key`, if present.
    pub fn value(&self, key: &EntityKey) -> Option<&T> {
        self.cells.get(key).map(OptimisticCell::value)
    }

    /// Direct access to a cell.
    pub fn cell(&self, key: &EntityKey) -> Option<&OptimisticCell<T>> {
        self.cells.get(key)
    }

    /// `true` while `key` has an unconfirmed local change.
    pub fn is_pending(&self, key: &EntityKey) -> bool {
        self.cells.get(key).is_some_and(OptimisticCell::is_pending)
    }

    /// Display `value` for `key` immediately. Returns `false` if the key
    /// was never seeded.
    pub fn apply(&mut self, key: &EntityKey, value: T) -> bool {
        match self.cells.get_mut(key) {
            Some(cell) => {
                cell.apply(value);
                true
            }
            None => false,
        }
    }

    /// Accept the backend's response for `key`. Returns `false` if the key
    /// was never seeded.
    pub fn reconcile(&mut self, key: &EntityKey, authoritative: T) -> bool {
        match self.cells.get_mut(key) {
            Some(cell) => {
                cell.reconcile(authoritative);
                true
            }
            None => false,
        }
    }

    /// Revert `key` to its snapshot after a failed write. Returns `true`
    /// only if a pending change was actually reverted.
    pub fn revert(&mut self, key: &EntityKey) -> bool {
        self.cells.get_mut(key).is_some_and(OptimisticCell::revert)
    }
}
