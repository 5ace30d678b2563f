//! Integration tests for the Store runtime
//!
//! Covers the feedback loop the inventory engine relies on: effects feed
//! actions back, fed-back actions are broadcast only after they were reduced,
//! and shutdown refuses new work while letting running effects settle.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use std::time::Duration;
use stockroom_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};
use stockroom_runtime::{Store, StoreConfig, StoreError};
use tokio::sync::broadcast::error::TryRecvError;
use tokio_test::{assert_err, assert_ok};

// ============================================================================
// Test Fixtures
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum ShelfAction {
    /// Add jars after a remote round trip
    Restock { id: u64, jars: u32 },
    /// The remote confirmed a restock
    Restocked { id: u64, jars: u32 },
    /// Hold jars, releasing them after a delay
    Reserve { id: u64, jars: u32, hold: Duration },
    /// A reservation expired
    Released { id: u64, jars: u32 },
    /// Remote call that takes a while
    SlowCount { delay: Duration },
    /// Result of a slow count
    Counted,
}

#[derive(Debug, Clone, Default)]
struct ShelfState {
    jars: u32,
    reserved: u32,
    confirmed: Vec<u64>,
}

#[derive(Clone)]
struct ShelfReducer;

impl Reducer for ShelfReducer {
    type State = ShelfState;
    type Action = ShelfAction;
    type Environment = ();

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        _env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            ShelfAction::Restock { id, jars } => smallvec![Effect::future(async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Some(ShelfAction::Restocked { id, jars })
            })],
            ShelfAction::Restocked { id, jars } => {
                state.jars += jars;
                state.confirmed.push(id);
                SmallVec::new()
            },
            ShelfAction::Reserve { id, jars, hold } => {
                state.reserved += jars;
                smallvec![Effect::delay(hold, ShelfAction::Released { id, jars })]
            },
            ShelfAction::Released { jars, .. } => {
                state.reserved -= jars;
                SmallVec::new()
            },
            ShelfAction::SlowCount { delay } => smallvec![Effect::future(async move {
                tokio::time::sleep(delay).await;
                Some(ShelfAction::Counted)
            })],
            ShelfAction::Counted => SmallVec::new(),
        }
    }
}

fn store() -> Store<ShelfState, ShelfAction, (), ShelfReducer> {
    Store::new(ShelfState::default(), ShelfReducer, ())
}

// ============================================================================
// Feedback and Broadcast
// ============================================================================

#[tokio::test]
async fn send_and_wait_for_returns_the_fed_back_action() {
    let store = store();

    let result = assert_ok!(
        store
            .send_and_wait_for(
                ShelfAction::Restock { id: 1, jars: 3 },
                |action| matches!(action, ShelfAction::Restocked { id: 1, .. }),
                Duration::from_secs(1),
            )
            .await
    );

    assert_eq!(result, ShelfAction::Restocked { id: 1, jars: 3 });
    // Broadcast happens after the reducer ran, so the state already shows it.
    assert_eq!(store.state(|s| s.jars).await, 3);
}

#[tokio::test]
async fn send_and_wait_for_times_out() {
    let store = store();

    let result = store
        .send_and_wait_for(
            ShelfAction::Restock { id: 1, jars: 3 },
            |action| matches!(action, ShelfAction::Counted),
            Duration::from_millis(50),
        )
        .await;

    assert_eq!(assert_err!(result), StoreError::Timeout);
}

#[tokio::test]
async fn concurrent_waiters_get_their_own_result() {
    let store = store();

    let mut waiters = Vec::new();
    for id in 1..=5 {
        let store = store.clone();
        waiters.push(tokio::spawn(async move {
            store
                .send_and_wait_for(
                    ShelfAction::Restock { id, jars: 1 },
                    move |action| matches!(action, ShelfAction::Restocked { id: done, .. } if *done == id),
                    Duration::from_secs(1),
                )
                .await
        }));
    }

    for (index, waiter) in waiters.into_iter().enumerate() {
        let id = u64::try_from(index).unwrap() + 1;
        let result = waiter.await.unwrap().unwrap();
        assert_eq!(result, ShelfAction::Restocked { id, jars: 1 });
    }
    assert_eq!(store.state(|s| s.jars).await, 5);
    assert_eq!(store.state(|s| s.confirmed.len()).await, 5);
}

#[tokio::test]
async fn delay_effect_fires_after_its_duration() {
    let store = store();
    let mut actions = store.subscribe_actions();

    store
        .send(ShelfAction::Reserve {
            id: 7,
            jars: 2,
            hold: Duration::from_millis(30),
        })
        .await
        .unwrap();
    assert_eq!(store.state(|s| s.reserved).await, 2);

    tokio::time::sleep(Duration::from_millis(5)).await;
    assert_eq!(actions.try_recv().unwrap_err(), TryRecvError::Empty);

    let released = tokio::time::timeout(Duration::from_secs(1), actions.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(released, ShelfAction::Released { id: 7, jars: 2 });
    assert_eq!(store.state(|s| s.reserved).await, 0);
}

#[tokio::test]
async fn external_actions_are_not_broadcast() {
    let store = store();
    let mut actions = store.subscribe_actions();

    let mut handle = store
        .send(ShelfAction::Restock { id: 1, jars: 1 })
        .await
        .unwrap();
    handle.wait().await;

    assert_eq!(
        actions.try_recv().unwrap(),
        ShelfAction::Restocked { id: 1, jars: 1 }
    );
    assert_eq!(actions.try_recv().unwrap_err(), TryRecvError::Empty);
}

#[tokio::test]
async fn slow_subscribers_lag_without_blocking_the_store() {
    let store = Store::with_config(
        ShelfState::default(),
        ShelfReducer,
        (),
        StoreConfig::default().with_broadcast_capacity(4),
    );
    let mut actions = store.subscribe_actions();

    let mut handles = Vec::new();
    for id in 0..20 {
        handles.push(store.send(ShelfAction::Restock { id, jars: 1 }).await.unwrap());
    }
    for handle in &mut handles {
        handle.wait().await;
    }
    assert_eq!(store.state(|s| s.jars).await, 20);

    let mut lagged = false;
    let mut received = 0;
    loop {
        match actions.try_recv() {
            Ok(_) => received += 1,
            Err(TryRecvError::Lagged(_)) => lagged = true,
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
    assert!(lagged);
    assert!(received > 0 && received < 20);
}

// ============================================================================
// Shutdown
// ============================================================================

#[tokio::test]
async fn shutdown_refuses_new_actions_but_reduces_feedback() {
    let store = store();
    store
        .send(ShelfAction::Restock { id: 1, jars: 4 })
        .await
        .unwrap();

    assert_ok!(store.shutdown(Duration::from_secs(1)).await);

    assert!(store.is_shutting_down());
    assert_eq!(store.state(|s| s.jars).await, 4);
    assert_eq!(
        store
            .send(ShelfAction::Restock { id: 2, jars: 1 })
            .await
            .unwrap_err(),
        StoreError::ShutdownInProgress
    );
}

#[tokio::test]
async fn shutdown_times_out_with_effects_running() {
    let store = store();
    store
        .send(ShelfAction::SlowCount {
            delay: Duration::from_millis(500),
        })
        .await
        .unwrap();

    let result = store.shutdown(Duration::from_millis(30)).await;

    assert_eq!(result.unwrap_err(), StoreError::ShutdownTimeout(1));
    assert_eq!(store.pending_effects(), 1);
}
