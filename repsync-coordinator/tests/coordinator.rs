//! Behavioral tests for the write coordinator: typed events, global
//! fan-out, and the flush barrier. Runs under a paused Tokio clock.

use std::time::Duration;

use futures::FutureExt;
use repsync_coordinator::{WriteCoordinator, WriteHandle};
use repsync_types::{EntityKey, FlushOutcome, SetStatus, SetWriteError, WriteSettlement};
use tokio::time::{Instant, sleep};

const WINDOW: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, PartialEq)]
struct SavedEvent {
    key: EntityKey,
    status: SetStatus,
}

#[derive(Debug, Clone, PartialEq)]
struct FailedEvent {
    key: EntityKey,
    error: SetWriteError,
}

type TestCoordinator = WriteCoordinator<SetStatus, SetWriteError, SavedEvent, FailedEvent>;
type TestHandle = WriteHandle<SetStatus, SetWriteError, SavedEvent, FailedEvent>;

fn key(s: &str) -> EntityKey {
    EntityKey::new(s).unwrap()
}

/// Enqueue a write that settles `Ok(status)` after `delay` of paused time.
fn enqueue_saved(
    coord: &TestCoordinator,
    k: &EntityKey,
    status: SetStatus,
    delay: Duration,
) -> TestHandle {
    let event_key = k.clone();
    let fail_key = k.clone();
    coord.enqueue(
        k.clone(),
        move || {
            async move {
                sleep(delay).await;
                Ok(status)
            }
            .boxed()
        },
        move |status| SavedEvent {
            key: event_key,
            status: *status,
        },
        move |error| FailedEvent {
            key: fail_key,
            error: error.clone(),
        },
    )
}

/// Enqueue a write that rejects with `error` once its window elapses.
fn enqueue_failing(coord: &TestCoordinator, k: &EntityKey, error: SetWriteError) -> TestHandle {
    let event_key = k.clone();
    let fail_key = k.clone();
    coord.enqueue(
        k.clone(),
        move || async move { Err(error) }.boxed(),
        move |status| SavedEvent {
            key: event_key,
            status: *status,
        },
        move |error| FailedEvent {
            key: fail_key,
            error: error.clone(),
        },
    )
}

// Scenario: rapid re-entry of the same set keeps only the latest write.
#[tokio::test(start_paused = true)]
async fn rescheduled_set_emits_one_success_with_latest_value() {
    let coord = TestCoordinator::new(WINDOW);
    let mut success = coord.subscribe_success();

    let first = enqueue_saved(&coord, &key("set-1"), SetStatus::Completed, Duration::ZERO);
    sleep(WINDOW / 2).await;
    let second = enqueue_saved(&coord, &key("set-1"), SetStatus::Failed, Duration::ZERO);

    // The first call was superseded: no settlement, no event, ever.
    assert!(first.settled().await.is_none());

    let settlement = second.settled().await.unwrap();
    match &settlement {
        WriteSettlement::Success { value, event } => {
            assert_eq!(*value, SetStatus::Failed);
            assert_eq!(event.status, SetStatus::Failed);
        }
        WriteSettlement::Failure { .. } => panic!("expected success"),
    }

    // Exactly one global success event.
    let event = success.recv().await.unwrap();
    assert_eq!(event.status, SetStatus::Failed);
    assert!(success.try_recv().is_err());
}

// Scenario: editing a second set flushes the first one immediately.
#[tokio::test(start_paused = true)]
async fn switching_sets_flushes_previous_before_next_debounce() {
    let coord = TestCoordinator::new(WINDOW);
    let mut success = coord.subscribe_success();
    let start = Instant::now();

    let a = enqueue_saved(
        &coord,
        &key("set-1"),
        SetStatus::Completed,
        Duration::from_millis(50),
    );
    sleep(Duration::from_millis(10)).await;
    let b = enqueue_saved(&coord, &key("set-2"), SetStatus::Completed, Duration::ZERO);

    // set-1's event arrives while set-2 is still debouncing.
    let first_event = success.recv().await.unwrap();
    assert_eq!(first_event.key, key("set-1"));
    assert!(start.elapsed() < WINDOW);

    let second_event = success.recv().await.unwrap();
    assert_eq!(second_event.key, key("set-2"));

    assert!(a.settled().await.is_some());
    assert!(b.settled().await.is_some());
}

// Scenario: a rejecting write surfaces the unmodified error everywhere.
#[tokio::test(start_paused = true)]
async fn failure_carries_original_error_on_both_channels() {
    let coord = TestCoordinator::new(WINDOW);
    let mut failure = coord.subscribe_failure();

    let error = SetWriteError::Network("network".into());
    let handle = enqueue_failing(&coord, &key("set-1"), error.clone());

    let settlement = handle.settled().await.unwrap();
    match &settlement {
        WriteSettlement::Failure {
            error: settled_error,
            event,
        } => {
            assert_eq!(*settled_error, error);
            assert_eq!(event.error, error);
        }
        WriteSettlement::Success { .. } => panic!("expected failure"),
    }

    let event = failure.recv().await.unwrap();
    assert_eq!(event.error, error);
    assert!(failure.try_recv().is_err());
}

// Scenario: flushing a key with nothing scheduled is a prompt no-op.
#[tokio::test(start_paused = true)]
async fn flush_with_nothing_pending_is_immediate_noop() {
    let coord = TestCoordinator::new(WINDOW);
    let start = Instant::now();

    assert_eq!(
        coord.flush(&key("nonexistent")).await,
        FlushOutcome::NothingToFlush
    );
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert_eq!(coord.flush_active().await, FlushOutcome::NothingToFlush);
}

#[tokio::test(start_paused = true)]
async fn flush_waits_for_full_settlement() {
    let coord = TestCoordinator::new(WINDOW);
    let mut success = coord.subscribe_success();
    let start = Instant::now();

    let handle = enqueue_saved(
        &coord,
        &key("set-1"),
        SetStatus::Completed,
        Duration::from_millis(50),
    );

    assert_eq!(coord.flush(&key("set-1")).await, FlushOutcome::Flushed);
    assert!(start.elapsed() < WINDOW);

    // By the time flush resolves, the event is already published and the
    // per-call settlement is buffered.
    assert!(success.try_recv().is_ok());
    assert!(handle.settled().await.is_some());

    // A second flush finds nothing left.
    assert_eq!(coord.flush(&key("set-1")).await, FlushOutcome::NothingToFlush);
}

#[tokio::test(start_paused = true)]
async fn concurrent_flushes_both_resolve() {
    let coord = TestCoordinator::new(WINDOW);

    let handle = enqueue_saved(
        &coord,
        &key("set-1"),
        SetStatus::Completed,
        Duration::from_millis(100),
    );

    let k = key("set-1");
    let (first, second) = tokio::join!(coord.flush(&k), coord.flush(&k));
    assert_eq!(first, FlushOutcome::Flushed);
    assert_eq!(second, FlushOutcome::Flushed);
    assert!(handle.settled().await.is_some());
}

#[tokio::test(start_paused = true)]
async fn flush_active_flushes_the_armed_key() {
    let coord = TestCoordinator::new(WINDOW);
    let start = Instant::now();

    let handle = enqueue_saved(&coord, &key("set-3"), SetStatus::Skipped, Duration::ZERO);
    assert_eq!(coord.active_key(), Some(key("set-3")));

    assert_eq!(coord.flush_active().await, FlushOutcome::Flushed);
    assert!(start.elapsed() < WINDOW);
    assert!(handle.settled().await.is_some());
    assert_eq!(coord.active_key(), None);
}

#[tokio::test(start_paused = true)]
async fn late_settled_await_still_observes_outcome() {
    let coord = TestCoordinator::new(WINDOW);

    let handle = enqueue_saved(&coord, &key("set-1"), SetStatus::Completed, Duration::ZERO);
    sleep(WINDOW * 3).await;

    let response = handle.response().await.unwrap();
    assert_eq!(response, Ok(SetStatus::Completed));
}

// Locks in the decision that a factory failing before its first await
// point behaves exactly like an async rejection: one failure event.
#[tokio::test(start_paused = true)]
async fn immediately_failing_factory_emits_one_failure_event() {
    let coord = TestCoordinator::new(WINDOW);
    let mut failure = coord.subscribe_failure();

    let event_key = key("set-1");
    let fail_key = key("set-1");
    let handle = coord.enqueue(
        key("set-1"),
        || futures::future::ready(Err(SetWriteError::Rejected("bad payload".into()))).boxed(),
        move |status| SavedEvent {
            key: event_key,
            status: *status,
        },
        move |error| FailedEvent {
            key: fail_key,
            error: error.clone(),
        },
    );

    let settlement = handle.settled().await.unwrap();
    assert!(settlement.failure_event().is_some());

    assert!(failure.recv().await.is_ok());
    assert!(failure.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn processing_key_visible_through_coordinator() {
    let coord = TestCoordinator::new(WINDOW);
    let mut processing = coord.processing_key();
    assert_eq!(*processing.borrow(), None);

    let handle = enqueue_saved(
        &coord,
        &key("set-1"),
        SetStatus::Completed,
        Duration::from_millis(50),
    );

    let flushed = coord.flush(&key("set-1")).await;
    assert_eq!(flushed, FlushOutcome::Flushed);
    // Execution has come and gone; the watch is back to idle.
    processing.wait_for(|k| k.is_none()).await.unwrap();
    assert!(handle.settled().await.is_some());
}

#[tokio::test(start_paused = true)]
async fn shutdown_suppresses_pending_writes_and_events() {
    let coord = TestCoordinator::new(WINDOW);
    let mut success = coord.subscribe_success();

    let handle = enqueue_saved(&coord, &key("set-1"), SetStatus::Completed, Duration::ZERO);
    coord.shutdown();

    assert!(handle.settled().await.is_none());
    // Give the settle task a chance to run; no event may appear.
    sleep(Duration::from_millis(1)).await;
    assert!(success.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn set_debounce_reconfigures_future_enqueues() {
    let coord = TestCoordinator::new(WINDOW);
    coord.set_debounce(Duration::from_millis(50));
    assert_eq!(coord.debounce(), Duration::from_millis(50));

    let start = Instant::now();
    let handle = enqueue_saved(&coord, &key("set-1"), SetStatus::Completed, Duration::ZERO);
    assert!(handle.settled().await.is_some());
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(50) && elapsed < WINDOW);
}
