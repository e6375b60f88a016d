//! # Slotbook Testing
//!
//! Testing utilities for the slotbook reservation core:
//! - [`mocks::InMemoryStore`]: a transactional in-memory implementation of
//!   the store contracts, with undo-log rollback
//! - [`mocks::FixedClock`]: deterministic time for expiry tests
//!
//! ## Example
//!
//! ```ignore
//! use slotbook_testing::mocks::{FixedClock, InMemoryStore};
//!
//! #[tokio::test]
//! async fn confirm_consumes_a_unit() {
//!     let store = Arc::new(InMemoryStore::new());
//!     let slot = store.insert_slot(5, 5).await;
//!     let engine = ReservationEngine::new(store.clone(), Arc::new(SystemClock), EngineConfig::default());
//!     // ...
//! }
//! ```

pub mod mocks;
