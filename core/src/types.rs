//! Domain types for the slot reservation system.
//!
//! Value objects and entities shared by the engine and the store backends:
//! capacity-bounded [`Slot`]s, single-unit [`Hold`]s moving through the
//! `held → confirmed/cancelled` state machine, and the identifier newtypes
//! that keep the two id spaces from mixing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a slot.
///
/// Backed by `i64` because slots are provisioned rows with a bigserial
/// primary key, not randomly generated values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotId(i64);

impl SlotId {
    /// Create a `SlotId` from a raw database id.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the raw id.
    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HoldId(i64);

impl HoldId {
    /// Create a `HoldId` from a raw database id.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the raw id.
    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for HoldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Caller-supplied deduplication token for hold creation.
///
/// The engine only requires uniqueness; format checks (the HTTP adapter
/// expects a canonical UUID string) happen before a key reaches the core.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Wrap a raw key string.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Get the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for IdempotencyKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

// ============================================================================
// Slot
// ============================================================================

/// A bookable resource with finite capacity.
///
/// `capacity` is immutable after provisioning; `remaining` is only ever
/// mutated through the store's atomic conditional increment/decrement, so
/// `0 <= remaining <= capacity` holds even under concurrent confirms and
/// cancels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    /// Stable identifier.
    pub id: SlotId,
    /// Total units, fixed at provisioning time.
    pub capacity: u32,
    /// Units currently unreserved.
    pub remaining: u32,
}

/// The availability projection of a slot, as served by `get_available_slots`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotAvailability {
    /// Slot identifier.
    pub slot_id: SlotId,
    /// Total units.
    pub capacity: u32,
    /// Unreserved units at computation time.
    pub remaining: u32,
}

impl From<&Slot> for SlotAvailability {
    fn from(slot: &Slot) -> Self {
        Self {
            slot_id: slot.id,
            capacity: slot.capacity,
            remaining: slot.remaining,
        }
    }
}

// ============================================================================
// Hold
// ============================================================================

/// Lifecycle state of a hold.
///
/// Transitions are engine-mediated only: `Held → Confirmed`,
/// `Held → Cancelled`, `Confirmed → Cancelled`. `Cancelled` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HoldStatus {
    /// Created, capacity not yet consumed, confirmable until `expires_at`.
    Held,
    /// Capacity consumed; exactly one unit decremented on the slot.
    Confirmed,
    /// Terminal; a previously confirmed hold returned its unit on the way here.
    Cancelled,
}

impl HoldStatus {
    /// Wire and storage representation (`held`, `confirmed`, `cancelled`).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Held => "held",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse the storage representation back into a status.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "held" => Some(Self::Held),
            "confirmed" => Some(Self::Confirmed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for HoldStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single-unit reservation record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hold {
    /// Stable identifier, assigned by the store at creation.
    pub id: HoldId,
    /// The slot this hold references (many holds may reference one slot).
    pub slot_id: SlotId,
    /// Current lifecycle state.
    pub status: HoldStatus,
    /// Deduplication token; unique across all holds.
    pub idempotency_key: IdempotencyKey,
    /// Instant after which a `held` hold is no longer confirmable.
    pub expires_at: DateTime<Utc>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Hold {
    /// Whether this hold's confirmation window has passed.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// Insert payload for a new hold.
///
/// The store assigns the id and timestamps; status always starts as `held`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewHold {
    /// Slot to reserve against.
    pub slot_id: SlotId,
    /// Caller-supplied deduplication token.
    pub idempotency_key: IdempotencyKey,
    /// Expiry instant for the confirmation window.
    pub expires_at: DateTime<Utc>,
}
