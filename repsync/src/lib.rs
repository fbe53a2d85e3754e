#![deny(missing_docs)]
//! # repsync — umbrella crate
//!
//! Single import surface for the live-session write coordination core.
//! Re-exports the member crates behind feature flags, plus a `prelude` for
//! the happy path: coordinator + optimistic store.

pub use repsync_types;

#[cfg(feature = "coordinator")]
pub use repsync_coordinator;
#[cfg(feature = "debounce")]
pub use repsync_debounce;
#[cfg(feature = "optimistic")]
pub use repsync_optimistic;

/// Happy-path imports for wiring a live editing scope.
pub mod prelude {
    pub use repsync_types::{
        EntityKey, FlushOutcome, KeyError, ScheduleOutcome, SessionSet, SetStatus, SetWriteError,
        WriteFactory, WriteFuture, WriteSettlement,
    };

    #[cfg(feature = "debounce")]
    pub use repsync_debounce::{DEFAULT_DEBOUNCE, ScheduleHandle, SlotScheduler};

    #[cfg(feature = "coordinator")]
    pub use repsync_coordinator::{WriteCoordinator, WriteHandle};

    #[cfg(feature = "optimistic")]
    pub use repsync_optimistic::{CellState, OptimisticCell, OptimisticStore};
}
