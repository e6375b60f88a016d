//! Store contracts: passive persistence collaborators with no business logic.
//!
//! The engine is the sole writer of slot counters and hold state; the store
//! contributes exactly two things it can do better than application code:
//! durable atomicity (the conditional counter updates) and row-level locking
//! scoped to an explicit transaction object.
//!
//! A [`StoreTransaction`] is obtained from [`ReservationStore::begin`] and
//! must be explicitly committed; dropping an uncommitted transaction rolls
//! it back. The transaction-scoped operations are split into [`SlotStore`]
//! and [`HoldStore`] so each table's contract stays independently small.

use crate::error::StoreError;
use crate::types::{Hold, HoldId, HoldStatus, IdempotencyKey, NewHold, Slot, SlotId};
use async_trait::async_trait;

/// Transaction-scoped operations on the `slots` table.
#[async_trait]
pub trait SlotStore {
    /// Point-read of a slot under an exclusive row lock
    /// (`SELECT … FOR UPDATE` semantics).
    ///
    /// The lock is held until the enclosing transaction commits or rolls
    /// back, serializing concurrent readers and writers of the same slot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    async fn slot_for_update(&mut self, id: SlotId) -> Result<Option<Slot>, StoreError>;

    /// Atomically apply `remaining -= 1` only if `remaining > 0`.
    ///
    /// Returns whether the decrement applied. This is a single conditional
    /// update at the storage layer, never a read-then-write pair: it is the
    /// mutual-exclusion point that decides which of two racing confirms
    /// actually consumed a unit.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    async fn decrement_remaining(&mut self, id: SlotId) -> Result<bool, StoreError>;

    /// Atomically apply `remaining += 1` only if `remaining < capacity`.
    ///
    /// Returns whether the increment applied; the cap guards against
    /// returning more units than were ever consumed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    async fn increment_remaining(&mut self, id: SlotId) -> Result<bool, StoreError>;
}

/// Transaction-scoped operations on the `holds` table.
#[async_trait]
pub trait HoldStore {
    /// Insert a new hold in state `held`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if the idempotency key already
    /// exists (unique-constraint violation), other [`StoreError`] variants
    /// on backend failure.
    async fn insert_hold(&mut self, hold: NewHold) -> Result<Hold, StoreError>;

    /// Update a hold's status, returning the updated record,
    /// or `None` if the hold does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    async fn update_hold_status(
        &mut self,
        id: HoldId,
        status: HoldStatus,
    ) -> Result<Option<Hold>, StoreError>;
}

/// An open transaction against the reservation store.
///
/// Implementations roll back on drop if neither [`commit`](Self::commit)
/// nor [`rollback`](Self::rollback) was called.
#[async_trait]
pub trait StoreTransaction: SlotStore + HoldStore + Send {
    /// Commit all changes made through this transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the commit fails; changes are discarded.
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    /// Discard all changes made through this transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails during rollback.
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// The durable reservation store: plain reads plus transaction entry.
///
/// Consumed by the engine as `Arc<dyn ReservationStore>`; backends are the
/// Postgres implementation in `slotbook-postgres` and the deterministic
/// in-memory store in `slotbook-testing`.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Open a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if a transaction cannot be started.
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;

    /// All slots in store iteration order (ascending id).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    async fn list_slots(&self) -> Result<Vec<Slot>, StoreError>;

    /// Unlocked point-read of a slot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    async fn slot(&self, id: SlotId) -> Result<Option<Slot>, StoreError>;

    /// Point-read of a hold by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    async fn hold(&self, id: HoldId) -> Result<Option<Hold>, StoreError>;

    /// Point-read of a hold by its idempotency key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    async fn hold_by_idempotency_key(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<Hold>, StoreError>;
}
