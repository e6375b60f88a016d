//! End-to-end tests of the reservation engine over the in-memory store.
//!
//! Covers the hold state machine, idempotent replay, lazy expiry and the
//! availability cache invalidation contract.

#![allow(clippy::unwrap_used, clippy::panic)]

use chrono::Utc;
use slotbook_core::engine::{CancelHoldResult, ConfirmHoldResult, CreateHoldResult};
use slotbook_core::store::ReservationStore;
use slotbook_core::{Clock, EngineConfig, EngineError, HoldStatus, IdempotencyKey, ReservationEngine, SlotId};
use slotbook_testing::mocks::{FixedClock, InMemoryStore};
use std::sync::Arc;

struct Harness {
    engine: ReservationEngine,
    store: Arc<InMemoryStore>,
    clock: Arc<FixedClock>,
}

fn harness() -> Harness {
    let clock = Arc::new(FixedClock::new(Utc::now()));
    let store = Arc::new(InMemoryStore::with_clock(clock.clone()));
    let engine = ReservationEngine::new(store.clone(), clock.clone(), EngineConfig::default());
    Harness {
        engine,
        store,
        clock,
    }
}

async fn remaining(store: &InMemoryStore, slot_id: SlotId) -> u32 {
    store.slot(slot_id).await.unwrap().unwrap().remaining
}

fn key(s: &str) -> IdempotencyKey {
    IdempotencyKey::new(s)
}

#[tokio::test]
async fn hold_confirm_cancel_round_trip() {
    let h = harness();
    let slot = h.store.insert_slot(5, 5).await;

    let created = h.engine.create_hold(slot.id, key("key-A")).await.unwrap();
    let CreateHoldResult::Created(receipt) = &created else {
        panic!("expected Created, got {created:?}");
    };
    assert!(!created.is_idempotent());
    assert_eq!(created.http_status(), 201);
    assert_eq!(receipt.status, HoldStatus::Held);
    assert_eq!(receipt.slot_id, slot.id);
    assert_eq!(
        receipt.expires_at,
        Some(h.clock.now() + chrono::Duration::minutes(5))
    );
    // A hold consumes nothing at creation time.
    assert_eq!(remaining(&h.store, slot.id).await, 5);

    let confirmed = h.engine.confirm_hold(receipt.hold_id).await.unwrap();
    assert!(matches!(confirmed, ConfirmHoldResult::Confirmed { .. }));
    assert_eq!(confirmed.http_status(), 200);
    assert_eq!(remaining(&h.store, slot.id).await, 4);

    let cancelled = h.engine.cancel_hold(receipt.hold_id).await.unwrap();
    assert!(matches!(
        cancelled,
        CancelHoldResult::Cancelled { released: true, .. }
    ));
    assert_eq!(cancelled.message(), "Confirmed hold cancelled, slot returned");
    assert_eq!(remaining(&h.store, slot.id).await, 5);
}

#[tokio::test]
async fn replayed_create_returns_the_same_hold() {
    let h = harness();
    let slot = h.store.insert_slot(5, 5).await;

    let first = h.engine.create_hold(slot.id, key("key-A")).await.unwrap();
    let CreateHoldResult::Created(first_receipt) = first else {
        panic!("expected Created");
    };

    let second = h.engine.create_hold(slot.id, key("key-A")).await.unwrap();
    let CreateHoldResult::Replayed(second_receipt) = &second else {
        panic!("expected Replayed, got {second:?}");
    };
    assert!(second.is_idempotent());
    assert_eq!(second.http_status(), 200);
    assert_eq!(second_receipt.hold_id, first_receipt.hold_id);
    assert_eq!(second_receipt.status, HoldStatus::Held);
}

#[tokio::test]
async fn replay_reports_the_holds_current_status() {
    let h = harness();
    let slot = h.store.insert_slot(5, 5).await;

    let created = h.engine.create_hold(slot.id, key("key-A")).await.unwrap();
    let CreateHoldResult::Created(receipt) = created else {
        panic!("expected Created");
    };
    h.engine.confirm_hold(receipt.hold_id).await.unwrap();

    // Retrying the original request after confirmation still replays
    // rather than creating a second reservation.
    let replayed = h.engine.create_hold(slot.id, key("key-A")).await.unwrap();
    let CreateHoldResult::Replayed(replay) = replayed else {
        panic!("expected Replayed");
    };
    assert_eq!(replay.hold_id, receipt.hold_id);
    assert_eq!(replay.status, HoldStatus::Confirmed);
    assert_eq!(remaining(&h.store, slot.id).await, 4);
}

#[tokio::test]
async fn create_against_full_slot_is_rejected_without_a_record() {
    let h = harness();
    let slot = h.store.insert_slot(3, 0).await;

    let result = h.engine.create_hold(slot.id, key("key-full")).await.unwrap();
    assert!(matches!(result, CreateHoldResult::NoCapacity { slot_id } if slot_id == slot.id));
    assert!(!result.is_success());
    assert_eq!(result.http_status(), 409);
    assert_eq!(result.message(), "No available capacity");

    assert!(
        h.store
            .hold_by_idempotency_key(&key("key-full"))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn create_against_unknown_slot_is_not_found() {
    let h = harness();

    let err = h
        .engine
        .create_hold(SlotId::new(404), key("key-x"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::SlotNotFound(id) if id == SlotId::new(404)));
    assert_eq!(err.http_status(), 404);
}

#[tokio::test]
async fn double_confirm_decrements_exactly_once() {
    let h = harness();
    let slot = h.store.insert_slot(5, 5).await;

    let CreateHoldResult::Created(receipt) =
        h.engine.create_hold(slot.id, key("key-A")).await.unwrap()
    else {
        panic!("expected Created");
    };

    h.engine.confirm_hold(receipt.hold_id).await.unwrap();
    let second = h.engine.confirm_hold(receipt.hold_id).await.unwrap();

    assert!(matches!(second, ConfirmHoldResult::AlreadyConfirmed { .. }));
    assert!(second.is_success());
    assert_eq!(remaining(&h.store, slot.id).await, 4);
}

#[tokio::test]
async fn confirm_of_a_cancelled_hold_is_a_conflict() {
    let h = harness();
    let slot = h.store.insert_slot(5, 5).await;

    let CreateHoldResult::Created(receipt) =
        h.engine.create_hold(slot.id, key("key-A")).await.unwrap()
    else {
        panic!("expected Created");
    };
    h.engine.cancel_hold(receipt.hold_id).await.unwrap();

    let result = h.engine.confirm_hold(receipt.hold_id).await.unwrap();
    assert!(matches!(result, ConfirmHoldResult::AlreadyCancelled { .. }));
    assert_eq!(result.http_status(), 409);
    assert_eq!(remaining(&h.store, slot.id).await, 5);
}

#[tokio::test]
async fn expired_hold_cannot_be_confirmed_and_stays_held() {
    let h = harness();
    let slot = h.store.insert_slot(5, 5).await;

    let CreateHoldResult::Created(receipt) =
        h.engine.create_hold(slot.id, key("key-A")).await.unwrap()
    else {
        panic!("expected Created");
    };

    h.clock.advance(chrono::Duration::minutes(6));

    let result = h.engine.confirm_hold(receipt.hold_id).await.unwrap();
    assert!(matches!(result, ConfirmHoldResult::Expired { .. }));
    assert_eq!(result.http_status(), 410);
    assert_eq!(remaining(&h.store, slot.id).await, 5);

    // No auto-transition: the hold is left held until explicitly cancelled.
    let stored = h.store.hold(receipt.hold_id).await.unwrap().unwrap();
    assert_eq!(stored.status, HoldStatus::Held);

    let cancelled = h.engine.cancel_hold(receipt.hold_id).await.unwrap();
    assert!(matches!(
        cancelled,
        CancelHoldResult::Cancelled { released: false, .. }
    ));
}

#[tokio::test]
async fn double_cancel_increments_exactly_once() {
    let h = harness();
    let slot = h.store.insert_slot(5, 5).await;

    let CreateHoldResult::Created(receipt) =
        h.engine.create_hold(slot.id, key("key-A")).await.unwrap()
    else {
        panic!("expected Created");
    };
    h.engine.confirm_hold(receipt.hold_id).await.unwrap();
    assert_eq!(remaining(&h.store, slot.id).await, 4);

    h.engine.cancel_hold(receipt.hold_id).await.unwrap();
    let second = h.engine.cancel_hold(receipt.hold_id).await.unwrap();

    assert!(matches!(second, CancelHoldResult::AlreadyCancelled { .. }));
    assert_eq!(second.message(), "Hold already cancelled");
    assert_eq!(remaining(&h.store, slot.id).await, 5);
}

#[tokio::test]
async fn cancelling_a_held_hold_leaves_the_counter_alone() {
    let h = harness();
    let slot = h.store.insert_slot(5, 5).await;

    let CreateHoldResult::Created(receipt) =
        h.engine.create_hold(slot.id, key("key-A")).await.unwrap()
    else {
        panic!("expected Created");
    };

    let cancelled = h.engine.cancel_hold(receipt.hold_id).await.unwrap();
    assert!(matches!(
        cancelled,
        CancelHoldResult::Cancelled { released: false, .. }
    ));
    assert_eq!(cancelled.message(), "Hold cancelled successfully");
    assert_eq!(remaining(&h.store, slot.id).await, 5);
}

#[tokio::test]
async fn sequential_confirms_on_the_last_unit_oversell_protection() {
    let h = harness();
    let slot = h.store.insert_slot(1, 1).await;

    // Soft holds are unbounded: both creates succeed on a capacity-1 slot.
    let CreateHoldResult::Created(first) =
        h.engine.create_hold(slot.id, key("key-A")).await.unwrap()
    else {
        panic!("expected Created");
    };
    let CreateHoldResult::Created(second) =
        h.engine.create_hold(slot.id, key("key-B")).await.unwrap()
    else {
        panic!("expected Created");
    };

    let winner = h.engine.confirm_hold(first.hold_id).await.unwrap();
    assert!(matches!(winner, ConfirmHoldResult::Confirmed { .. }));

    let loser = h.engine.confirm_hold(second.hold_id).await.unwrap();
    assert!(matches!(loser, ConfirmHoldResult::Oversold { .. }));
    assert_eq!(loser.http_status(), 409);
    assert_eq!(loser.message(), "No available capacity (oversell protection)");

    assert_eq!(remaining(&h.store, slot.id).await, 0);
    // The losing hold is untouched and can still be cancelled.
    let stored = h.store.hold(second.hold_id).await.unwrap().unwrap();
    assert_eq!(stored.status, HoldStatus::Held);
}

#[tokio::test]
async fn confirm_of_unknown_hold_is_not_found() {
    let h = harness();
    let err = h
        .engine
        .confirm_hold(slotbook_core::HoldId::new(12345))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::HoldNotFound(_)));
    assert_eq!(err.http_status(), 404);
}

#[tokio::test]
async fn availability_reflects_every_committed_mutation() {
    let h = harness();
    let a = h.store.insert_slot(5, 5).await;
    let b = h.store.insert_slot(2, 2).await;

    let before = h.engine.get_available_slots().await.unwrap();
    assert_eq!(before.len(), 2);
    assert_eq!(before[0].slot_id, a.id);
    assert_eq!(before[0].remaining, 5);
    assert_eq!(before[1].slot_id, b.id);

    let CreateHoldResult::Created(receipt) =
        h.engine.create_hold(a.id, key("key-A")).await.unwrap()
    else {
        panic!("expected Created");
    };
    h.engine.confirm_hold(receipt.hold_id).await.unwrap();

    // Well within the 10s TTL, but the mutation invalidated the cache.
    let after = h.engine.get_available_slots().await.unwrap();
    assert_eq!(after[0].remaining, 4);

    h.engine.cancel_hold(receipt.hold_id).await.unwrap();
    let restored = h.engine.get_available_slots().await.unwrap();
    assert_eq!(restored[0].remaining, 5);
}

#[tokio::test]
async fn availability_is_served_from_cache_between_mutations() {
    let h = harness();
    let slot = h.store.insert_slot(5, 5).await;

    let first = h.engine.get_available_slots().await.unwrap();
    assert_eq!(first[0].remaining, 5);

    // Mutate the store behind the engine's back; no engine mutation means
    // no invalidation, so the cached view stays for up to one TTL.
    let mut tx = h.store.begin().await.unwrap();
    assert!(tx.decrement_remaining(slot.id).await.unwrap());
    tx.commit().await.unwrap();

    let cached = h.engine.get_available_slots().await.unwrap();
    assert_eq!(cached[0].remaining, 5);
}
