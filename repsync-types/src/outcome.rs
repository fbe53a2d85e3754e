//! Settlement shapes spoken between the scheduler, the coordinator, and
//! their callers.

use futures::future::BoxFuture;

/// Future produced by a write factory.
pub type WriteFuture<T, E> = BoxFuture<'static, Result<T, E>>;

/// A zero-argument operation performing the authoritative write.
///
/// Invoked at most once per settled schedule. A factory that fails before
/// reaching any await point is expressed as an immediately-ready `Err`
/// future and is treated exactly like an asynchronous rejection.
pub type WriteFactory<T, E> = Box<dyn FnOnce() -> WriteFuture<T, E> + Send>;

/// Terminal outcome of one `schedule()` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleOutcome<T, E> {
    /// The factory ran; this is its result, passed through verbatim.
    Settled(Result<T, E>),
    /// A later call for the same key replaced this one before execution.
    /// The factory never ran.
    Superseded,
}

impl<T, E> ScheduleOutcome<T, E> {
    /// `true` if this call was replaced before its factory ran.
    pub fn is_superseded(&self) -> bool {
        matches!(self, Self::Superseded)
    }

    /// The settled result, if the factory ran.
    pub fn settled(self) -> Option<Result<T, E>> {
        match self {
            Self::Settled(result) => Some(result),
            Self::Superseded => None,
        }
    }
}

/// Terminal event of one coordinator enqueue: the raw outcome paired with
/// the typed event built from it.
#[derive(Debug, Clone)]
pub enum WriteSettlement<T, E, S, F> {
    /// The write succeeded.
    Success {
        /// Authoritative value returned by the backend.
        value: T,
        /// Typed success event built by the caller's `on_success`.
        event: S,
    },
    /// The write failed.
    Failure {
        /// The original error, unwrapped and unmodified.
        error: E,
        /// Typed failure event built by the caller's `on_failure`.
        event: F,
    },
}

impl<T, E, S, F> WriteSettlement<T, E, S, F> {
    /// Collapse to the raw value-or-error response.
    pub fn into_response(self) -> Result<T, E> {
        match self {
            Self::Success { value, .. } => Ok(value),
            Self::Failure { error, .. } => Err(error),
        }
    }

    /// The success event, if the write succeeded.
    pub fn success_event(&self) -> Option<&S> {
        match self {
            Self::Success { event, .. } => Some(event),
            Self::Failure { .. } => None,
        }
    }

    /// The failure event, if the write failed.
    pub fn failure_event(&self) -> Option<&F> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { event, .. } => Some(event),
        }
    }
}

/// Result of a flush barrier.
///
/// `NothingToFlush` is a successful no-op, not an error: the barrier's
/// contract is "this key's durable state is settled", which holds trivially
/// when nothing was pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// A pending or in-flight write existed and has fully settled.
    Flushed,
    /// No pending or in-flight write existed for the key.
    NothingToFlush,
}
