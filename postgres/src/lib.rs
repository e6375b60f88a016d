//! # Slotbook Postgres
//!
//! `PostgreSQL` implementation of the slotbook store contracts, built on
//! sqlx with connection pooling. Row-level locking (`SELECT … FOR UPDATE`)
//! and single-statement conditional counter updates give the engine the
//! atomic primitives it relies on for oversell prevention.
//!
//! Schema lives in `migrations/`; run it with `sqlx migrate run` or any
//! migration runner of your choice (migration orchestration is outside the
//! core).
//!
//! ## Example
//!
//! ```ignore
//! use slotbook_postgres::{PostgresConfig, PostgresReservationStore};
//! use std::sync::Arc;
//!
//! let pool = PostgresConfig::from_env().connect().await?;
//! let store = Arc::new(PostgresReservationStore::new(Arc::new(pool)));
//! ```

pub mod config;
pub mod store;

pub use config::PostgresConfig;
pub use store::{PgStoreTransaction, PostgresReservationStore};
