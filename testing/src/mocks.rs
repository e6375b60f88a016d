//! Mock implementations of the core contracts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use slotbook_core::clock::{Clock, SystemClock};
use slotbook_core::error::StoreError;
use slotbook_core::store::{HoldStore, ReservationStore, SlotStore, StoreTransaction};
use slotbook_core::types::{Hold, HoldId, HoldStatus, IdempotencyKey, NewHold, Slot, SlotId};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tokio::sync::{Mutex, OwnedMutexGuard};

// ============================================================================
// FixedClock
// ============================================================================

/// Fixed clock for deterministic tests.
///
/// Returns the same instant until explicitly moved, making lazy-expiry
/// behavior reproducible.
pub struct FixedClock {
    now: StdMutex<DateTime<Utc>>,
}

impl FixedClock {
    /// Create a clock frozen at `now`.
    #[must_use]
    pub const fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: StdMutex::new(now),
        }
    }

    /// Move the clock to an absolute instant.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    /// Advance the clock by a duration.
    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ============================================================================
// InMemoryStore
// ============================================================================

#[derive(Default)]
struct Tables {
    slots: BTreeMap<i64, Slot>,
    holds: BTreeMap<i64, Hold>,
    holds_by_key: HashMap<String, i64>,
    next_slot_id: i64,
    next_hold_id: i64,
}

/// In-memory implementation of the reservation store.
///
/// A transaction takes the whole-table mutex for its lifetime, so
/// transactions serialize, a coarse but faithful rendering of row-level
/// locking: everything a real backend would serialize, this serializes too.
/// Mutations apply in place and are reverted through an undo log if the
/// transaction rolls back or is dropped uncommitted. Id assignment is
/// monotonic and, like a database sequence, not rewound by rollback.
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryStore {
    /// Create an empty store stamping records with the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store stamping records with the given clock.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            tables: Arc::new(Mutex::new(Tables::default())),
            clock,
        }
    }

    /// Fixture helper: provision a slot and return it.
    pub async fn insert_slot(&self, capacity: u32, remaining: u32) -> Slot {
        let mut tables = self.tables.lock().await;
        tables.next_slot_id += 1;
        let slot = Slot {
            id: SlotId::new(tables.next_slot_id),
            capacity,
            remaining,
        };
        tables.slots.insert(slot.id.as_i64(), slot);
        slot
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

enum Undo {
    SlotRemaining { id: i64, prev: u32 },
    HoldStatus {
        id: i64,
        prev_status: HoldStatus,
        prev_updated_at: DateTime<Utc>,
    },
    HoldInserted { id: i64, key: String },
}

/// An open transaction against an [`InMemoryStore`].
pub struct InMemoryTransaction {
    tables: OwnedMutexGuard<Tables>,
    undo: Vec<Undo>,
    committed: bool,
    clock: Arc<dyn Clock>,
}

impl InMemoryTransaction {
    fn revert(&mut self) {
        while let Some(entry) = self.undo.pop() {
            match entry {
                Undo::SlotRemaining { id, prev } => {
                    if let Some(slot) = self.tables.slots.get_mut(&id) {
                        slot.remaining = prev;
                    }
                }
                Undo::HoldStatus {
                    id,
                    prev_status,
                    prev_updated_at,
                } => {
                    if let Some(hold) = self.tables.holds.get_mut(&id) {
                        hold.status = prev_status;
                        hold.updated_at = prev_updated_at;
                    }
                }
                Undo::HoldInserted { id, key } => {
                    self.tables.holds.remove(&id);
                    self.tables.holds_by_key.remove(&key);
                }
            }
        }
    }
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        if !self.committed {
            self.revert();
        }
    }
}

#[async_trait]
impl SlotStore for InMemoryTransaction {
    async fn slot_for_update(&mut self, id: SlotId) -> Result<Option<Slot>, StoreError> {
        // The whole-table guard held by this transaction is the lock.
        Ok(self.tables.slots.get(&id.as_i64()).copied())
    }

    async fn decrement_remaining(&mut self, id: SlotId) -> Result<bool, StoreError> {
        let Some(slot) = self.tables.slots.get_mut(&id.as_i64()) else {
            return Ok(false);
        };
        if slot.remaining == 0 {
            return Ok(false);
        }
        self.undo.push(Undo::SlotRemaining {
            id: id.as_i64(),
            prev: slot.remaining,
        });
        slot.remaining -= 1;
        Ok(true)
    }

    async fn increment_remaining(&mut self, id: SlotId) -> Result<bool, StoreError> {
        let Some(slot) = self.tables.slots.get_mut(&id.as_i64()) else {
            return Ok(false);
        };
        if slot.remaining >= slot.capacity {
            return Ok(false);
        }
        self.undo.push(Undo::SlotRemaining {
            id: id.as_i64(),
            prev: slot.remaining,
        });
        slot.remaining += 1;
        Ok(true)
    }
}

#[async_trait]
impl HoldStore for InMemoryTransaction {
    async fn insert_hold(&mut self, hold: NewHold) -> Result<Hold, StoreError> {
        let key = hold.idempotency_key.as_str().to_owned();
        if self.tables.holds_by_key.contains_key(&key) {
            return Err(StoreError::Conflict { key });
        }

        self.tables.next_hold_id += 1;
        let now = self.clock.now();
        let record = Hold {
            id: HoldId::new(self.tables.next_hold_id),
            slot_id: hold.slot_id,
            status: HoldStatus::Held,
            idempotency_key: hold.idempotency_key,
            expires_at: hold.expires_at,
            created_at: now,
            updated_at: now,
        };
        self.tables.holds.insert(record.id.as_i64(), record.clone());
        self.tables.holds_by_key.insert(key.clone(), record.id.as_i64());
        self.undo.push(Undo::HoldInserted {
            id: record.id.as_i64(),
            key,
        });
        Ok(record)
    }

    async fn update_hold_status(
        &mut self,
        id: HoldId,
        status: HoldStatus,
    ) -> Result<Option<Hold>, StoreError> {
        let now = self.clock.now();
        let Some(hold) = self.tables.holds.get_mut(&id.as_i64()) else {
            return Ok(None);
        };
        self.undo.push(Undo::HoldStatus {
            id: id.as_i64(),
            prev_status: hold.status,
            prev_updated_at: hold.updated_at,
        });
        hold.status = status;
        hold.updated_at = now;
        Ok(Some(hold.clone()))
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn commit(mut self: Box<Self>) -> Result<(), StoreError> {
        self.committed = true;
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<(), StoreError> {
        self.revert();
        self.committed = true;
        Ok(())
    }
}

#[async_trait]
impl ReservationStore for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let tables = Arc::clone(&self.tables).lock_owned().await;
        Ok(Box::new(InMemoryTransaction {
            tables,
            undo: Vec::new(),
            committed: false,
            clock: Arc::clone(&self.clock),
        }))
    }

    async fn list_slots(&self) -> Result<Vec<Slot>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.slots.values().copied().collect())
    }

    async fn slot(&self, id: SlotId) -> Result<Option<Slot>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.slots.get(&id.as_i64()).copied())
    }

    async fn hold(&self, id: HoldId) -> Result<Option<Hold>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.holds.get(&id.as_i64()).cloned())
    }

    async fn hold_by_idempotency_key(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<Hold>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .holds_by_key
            .get(key.as_str())
            .and_then(|id| tables.holds.get(id))
            .cloned())
    }
}
