//! # Slotbook Core
//!
//! The inventory-control core of a finite-capacity time-slot reservation
//! system: clients reserve through a two-phase hold→confirm (or
//! hold→cancel) protocol, with the guarantees that no slot is ever oversold
//! under concurrent requests and that retried requests are idempotent.
//!
//! This crate contains:
//! - the domain model ([`types`]): slots, holds and the
//!   `held → confirmed/cancelled` state machine
//! - the store contracts ([`store`]): atomic conditional counter updates,
//!   locked reads and an explicit transaction object
//! - the availability cache ([`cache`]): single-entry TTL read-through
//!   cache with stampede protection
//! - the engine ([`engine`]): the four operations and their typed outcomes
//!
//! HTTP routing, request validation, auth and process wiring are external
//! adapters that call into [`engine::ReservationEngine`]; store backends
//! live in `slotbook-postgres` (durable) and `slotbook-testing`
//! (deterministic, in-memory).
//!
//! ## Example
//!
//! ```ignore
//! use slotbook_core::{clock::SystemClock, config::EngineConfig, engine::ReservationEngine};
//! use std::sync::Arc;
//!
//! let engine = ReservationEngine::new(store, Arc::new(SystemClock), EngineConfig::from_env());
//! let result = engine.create_hold(slot_id, key).await?;
//! ```

pub mod cache;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod store;
pub mod types;

pub use cache::ReadThroughCache;
pub use clock::{Clock, SystemClock};
pub use config::EngineConfig;
pub use engine::{
    CancelHoldResult, ConfirmHoldResult, CreateHoldResult, HoldReceipt, ReservationEngine,
};
pub use error::{EngineError, StoreError};
pub use store::{HoldStore, ReservationStore, SlotStore, StoreTransaction};
pub use types::{
    Hold, HoldId, HoldStatus, IdempotencyKey, NewHold, Slot, SlotAvailability, SlotId,
};
