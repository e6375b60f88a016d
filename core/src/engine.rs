//! The inventory-control engine.
//!
//! Orchestrates the hold state machine over the store contracts:
//! `create_hold` (soft hold, no counter change), `confirm_hold` (the single
//! point where capacity is consumed, guarded by the store's atomic
//! conditional decrement), `cancel_hold` (returns a unit only for previously
//! confirmed holds) and `get_available_slots` (served through the TTL cache,
//! invalidated after every committed mutation).
//!
//! Business outcomes are returned as typed result enums; only store faults
//! and missing slots/holds surface as [`EngineError`].

use crate::cache::ReadThroughCache;
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::error::{EngineError, StoreError};
use crate::store::ReservationStore;
use crate::types::{Hold, HoldId, HoldStatus, IdempotencyKey, NewHold, SlotAvailability, SlotId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ============================================================================
// Operation results
// ============================================================================

/// Snapshot of a hold as returned to callers of `create_hold`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldReceipt {
    /// Hold identifier.
    pub hold_id: HoldId,
    /// Slot the hold references.
    pub slot_id: SlotId,
    /// Status at response time.
    pub status: HoldStatus,
    /// Confirmation deadline; present only for freshly created holds,
    /// matching the replay response shape of the wire contract.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Outcome of `create_hold`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CreateHoldResult {
    /// A new hold was created in state `held`.
    Created(HoldReceipt),
    /// The idempotency key was seen before; the original hold is returned
    /// unchanged, whatever its current status. No record was created.
    Replayed(HoldReceipt),
    /// The slot has no remaining capacity. No record was created.
    NoCapacity {
        /// The slot that was full.
        slot_id: SlotId,
    },
}

impl CreateHoldResult {
    /// Whether the request succeeded (including idempotent replay).
    #[must_use]
    pub const fn is_success(&self) -> bool {
        !matches!(self, Self::NoCapacity { .. })
    }

    /// Whether this was an idempotent replay of an earlier request.
    #[must_use]
    pub const fn is_idempotent(&self) -> bool {
        matches!(self, Self::Replayed(_))
    }

    /// HTTP status the adapter maps this outcome to.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::Created(_) => 201,
            Self::Replayed(_) => 200,
            Self::NoCapacity { .. } => 409,
        }
    }

    /// Human-readable outcome message.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::Created(_) => "Hold created successfully",
            Self::Replayed(_) => "Hold already exists",
            Self::NoCapacity { .. } => "No available capacity",
        }
    }
}

/// Outcome of `confirm_hold`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfirmHoldResult {
    /// The hold was confirmed; exactly one unit was consumed.
    Confirmed {
        /// Hold identifier.
        hold_id: HoldId,
        /// Slot whose counter was decremented.
        slot_id: SlotId,
    },
    /// The hold was already confirmed; no second decrement happened.
    AlreadyConfirmed {
        /// Hold identifier.
        hold_id: HoldId,
        /// Slot the hold references.
        slot_id: SlotId,
    },
    /// The hold was cancelled earlier and cannot be confirmed.
    AlreadyCancelled {
        /// Hold identifier.
        hold_id: HoldId,
    },
    /// The confirmation window passed; the hold stays `held` and must be
    /// cancelled explicitly. No state was mutated.
    Expired {
        /// Hold identifier.
        hold_id: HoldId,
    },
    /// The conditional decrement refused: capacity ran out between hold
    /// creation and confirmation. The transaction was rolled back.
    Oversold {
        /// Hold identifier.
        hold_id: HoldId,
        /// The slot that was full.
        slot_id: SlotId,
    },
}

impl ConfirmHoldResult {
    /// Whether the hold is confirmed after this call.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Confirmed { .. } | Self::AlreadyConfirmed { .. })
    }

    /// HTTP status the adapter maps this outcome to.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::Confirmed { .. } | Self::AlreadyConfirmed { .. } => 200,
            Self::AlreadyCancelled { .. } | Self::Oversold { .. } => 409,
            Self::Expired { .. } => 410,
        }
    }

    /// Human-readable outcome message.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::Confirmed { .. } => "Hold confirmed successfully",
            Self::AlreadyConfirmed { .. } => "Hold already confirmed",
            Self::AlreadyCancelled { .. } => "Hold already cancelled",
            Self::Expired { .. } => "Hold expired",
            Self::Oversold { .. } => "No available capacity (oversell protection)",
        }
    }
}

/// Outcome of `cancel_hold`.
///
/// Cancel never fails for a valid hold id; only "not found" is an error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CancelHoldResult {
    /// The hold is now cancelled.
    Cancelled {
        /// Hold identifier.
        hold_id: HoldId,
        /// Whether a previously consumed unit was returned to the slot.
        released: bool,
    },
    /// The hold was already cancelled; nothing changed.
    AlreadyCancelled {
        /// Hold identifier.
        hold_id: HoldId,
    },
}

impl CancelHoldResult {
    /// HTTP status the adapter maps this outcome to. Always 200.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        200
    }

    /// Human-readable outcome message.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::Cancelled { released: true, .. } => "Confirmed hold cancelled, slot returned",
            Self::Cancelled { released: false, .. } => "Hold cancelled successfully",
            Self::AlreadyCancelled { .. } => "Hold already cancelled",
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

/// The reservation engine.
///
/// Sole writer of slot counters and hold state. Cheap to share behind an
/// `Arc`; every operation is an independent unit of work and the design is
/// correct under true parallelism: the only mutual-exclusion points are the
/// store's conditional counter updates.
pub struct ReservationEngine {
    store: Arc<dyn ReservationStore>,
    clock: Arc<dyn Clock>,
    availability: ReadThroughCache<Vec<SlotAvailability>>,
    hold_ttl: chrono::Duration,
}

impl ReservationEngine {
    /// Create an engine over a store and clock with the given tunables.
    #[must_use]
    pub fn new(
        store: Arc<dyn ReservationStore>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            clock,
            availability: ReadThroughCache::new(config.cache_ttl()),
            hold_ttl: config.hold_ttl(),
        }
    }

    /// The availability view: every slot as `{slot_id, capacity, remaining}`
    /// in store iteration order, served through the cache.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] if the store read fails on a cache miss.
    pub async fn get_available_slots(&self) -> Result<Arc<Vec<SlotAvailability>>, EngineError> {
        let store = Arc::clone(&self.store);
        self.availability
            .get_or_compute(move || async move {
                let slots = store.list_slots().await?;
                Ok(slots.iter().map(SlotAvailability::from).collect::<Vec<_>>())
            })
            .await
            .map_err(|e: StoreError| {
                tracing::error!(error = %e, "failed to compute slot availability");
                EngineError::Store(e)
            })
    }

    /// Create a soft hold on `slot_id`, deduplicated by `key`.
    ///
    /// A hold reserves nothing of the counter at creation time; capacity is
    /// only consumed at confirmation. The capacity check here uses a locked
    /// slot read so concurrent creators never observe a stale `remaining`.
    /// The existence check and the insert run as separate transactional
    /// steps: losing the unique-key race to a concurrent retry is folded
    /// back into an idempotent replay.
    ///
    /// # Errors
    ///
    /// [`EngineError::SlotNotFound`] if the slot does not exist,
    /// [`EngineError::Store`] on store faults.
    pub async fn create_hold(
        &self,
        slot_id: SlotId,
        key: IdempotencyKey,
    ) -> Result<CreateHoldResult, EngineError> {
        if let Some(existing) = self.store.hold_by_idempotency_key(&key).await? {
            tracing::debug!(
                slot_id = %slot_id,
                idempotency_key = %key,
                hold_id = %existing.id,
                "create_hold replayed for known idempotency key"
            );
            return Ok(CreateHoldResult::Replayed(Self::replay_receipt(&existing)));
        }

        let slot = {
            let mut tx = self.store.begin().await?;
            let slot = tx.slot_for_update(slot_id).await.map_err(|e| {
                tracing::error!(slot_id = %slot_id, error = %e, "locked slot read failed");
                e
            })?;
            tx.commit().await?;
            slot
        };

        let Some(slot) = slot else {
            return Err(EngineError::SlotNotFound(slot_id));
        };

        if slot.remaining == 0 {
            return Ok(CreateHoldResult::NoCapacity { slot_id });
        }

        let now = self.clock.now();
        let new_hold = NewHold {
            slot_id,
            idempotency_key: key.clone(),
            expires_at: now + self.hold_ttl,
        };

        let mut tx = self.store.begin().await?;
        let hold = match tx.insert_hold(new_hold).await {
            Ok(hold) => {
                tx.commit().await?;
                hold
            }
            Err(StoreError::Conflict { .. }) => {
                // Lost the first-writer race to a concurrent request with
                // the same key; the winner's hold is the canonical answer.
                tx.rollback().await?;
                tracing::debug!(
                    slot_id = %slot_id,
                    idempotency_key = %key,
                    "create_hold lost idempotency-key race, replaying"
                );
                return match self.store.hold_by_idempotency_key(&key).await? {
                    Some(existing) => {
                        Ok(CreateHoldResult::Replayed(Self::replay_receipt(&existing)))
                    }
                    None => Err(EngineError::Store(StoreError::Conflict {
                        key: key.as_str().to_owned(),
                    })),
                };
            }
            Err(e) => {
                tracing::error!(
                    slot_id = %slot_id,
                    idempotency_key = %key,
                    error = %e,
                    "failed to create hold"
                );
                return Err(e.into());
            }
        };

        self.availability.invalidate().await;

        tracing::info!(
            hold_id = %hold.id,
            slot_id = %hold.slot_id,
            expires_at = %hold.expires_at,
            "hold created"
        );

        Ok(CreateHoldResult::Created(HoldReceipt {
            hold_id: hold.id,
            slot_id: hold.slot_id,
            status: hold.status,
            expires_at: Some(hold.expires_at),
        }))
    }

    /// Confirm a hold, consuming exactly one unit of its slot.
    ///
    /// The store's conditional decrement is the single source of truth for
    /// whether this confirm consumed a unit; the engine never infers
    /// capacity from a prior read. An expired hold is left `held` and must
    /// be cancelled explicitly.
    ///
    /// # Errors
    ///
    /// [`EngineError::HoldNotFound`] if the hold does not exist,
    /// [`EngineError::Store`] on store faults (the transaction rolls back).
    pub async fn confirm_hold(&self, hold_id: HoldId) -> Result<ConfirmHoldResult, EngineError> {
        let hold = self
            .store
            .hold(hold_id)
            .await?
            .ok_or(EngineError::HoldNotFound(hold_id))?;

        match hold.status {
            HoldStatus::Confirmed => {
                return Ok(ConfirmHoldResult::AlreadyConfirmed {
                    hold_id: hold.id,
                    slot_id: hold.slot_id,
                });
            }
            HoldStatus::Cancelled => {
                return Ok(ConfirmHoldResult::AlreadyCancelled { hold_id: hold.id });
            }
            HoldStatus::Held => {}
        }

        if hold.is_expired(self.clock.now()) {
            tracing::info!(hold_id = %hold.id, expires_at = %hold.expires_at, "confirm refused, hold expired");
            return Ok(ConfirmHoldResult::Expired { hold_id: hold.id });
        }

        let mut tx = self.store.begin().await?;

        let consumed = tx.decrement_remaining(hold.slot_id).await.map_err(|e| {
            tracing::error!(hold_id = %hold.id, slot_id = %hold.slot_id, error = %e, "failed to confirm hold");
            e
        })?;

        if !consumed {
            tx.rollback().await?;
            tracing::warn!(
                hold_id = %hold.id,
                slot_id = %hold.slot_id,
                "confirm refused, no remaining capacity"
            );
            return Ok(ConfirmHoldResult::Oversold {
                hold_id: hold.id,
                slot_id: hold.slot_id,
            });
        }

        let updated = tx
            .update_hold_status(hold.id, HoldStatus::Confirmed)
            .await
            .map_err(|e| {
                tracing::error!(hold_id = %hold.id, error = %e, "failed to confirm hold");
                e
            })?;
        if updated.is_none() {
            // The hold vanished between the read and the update.
            tx.rollback().await?;
            return Err(EngineError::HoldNotFound(hold.id));
        }

        tx.commit().await?;
        self.availability.invalidate().await;

        tracing::info!(hold_id = %hold.id, slot_id = %hold.slot_id, "hold confirmed");

        Ok(ConfirmHoldResult::Confirmed {
            hold_id: hold.id,
            slot_id: hold.slot_id,
        })
    }

    /// Cancel a hold, returning its unit if it had been confirmed.
    ///
    /// The release increment is best-effort capped at capacity: if it cannot
    /// apply, the counter is already inconsistent and blocking the cancel
    /// would not repair it, so the cancel proceeds and the anomaly is logged.
    ///
    /// # Errors
    ///
    /// [`EngineError::HoldNotFound`] if the hold does not exist,
    /// [`EngineError::Store`] on store faults (the transaction rolls back).
    pub async fn cancel_hold(&self, hold_id: HoldId) -> Result<CancelHoldResult, EngineError> {
        let hold = self
            .store
            .hold(hold_id)
            .await?
            .ok_or(EngineError::HoldNotFound(hold_id))?;

        if hold.status == HoldStatus::Cancelled {
            return Ok(CancelHoldResult::AlreadyCancelled { hold_id: hold.id });
        }

        let mut tx = self.store.begin().await?;

        let released = if hold.status == HoldStatus::Confirmed {
            let applied = tx.increment_remaining(hold.slot_id).await.map_err(|e| {
                tracing::error!(hold_id = %hold.id, slot_id = %hold.slot_id, error = %e, "failed to cancel hold");
                e
            })?;
            if !applied {
                tracing::warn!(
                    hold_id = %hold.id,
                    slot_id = %hold.slot_id,
                    "slot already at capacity while releasing a confirmed hold, cancelling anyway"
                );
            }
            applied
        } else {
            false
        };

        let updated = tx
            .update_hold_status(hold.id, HoldStatus::Cancelled)
            .await
            .map_err(|e| {
                tracing::error!(hold_id = %hold.id, error = %e, "failed to cancel hold");
                e
            })?;
        if updated.is_none() {
            tx.rollback().await?;
            return Err(EngineError::HoldNotFound(hold.id));
        }

        tx.commit().await?;
        self.availability.invalidate().await;

        tracing::info!(hold_id = %hold.id, slot_id = %hold.slot_id, released, "hold cancelled");

        Ok(CancelHoldResult::Cancelled {
            hold_id: hold.id,
            released,
        })
    }

    fn replay_receipt(hold: &Hold) -> HoldReceipt {
        HoldReceipt {
            hold_id: hold.id,
            slot_id: hold.slot_id,
            status: hold.status,
            expires_at: None,
        }
    }
}
