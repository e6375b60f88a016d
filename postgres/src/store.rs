//! Postgres-backed reservation store.
//!
//! Runtime-bound sqlx queries over a shared [`PgPool`]. The transaction
//! object wraps `sqlx::Transaction`; dropping it uncommitted rolls back,
//! matching the contract in `slotbook-core`.
//!
//! The two counter mutations are single conditional `UPDATE` statements;
//! the database row is the linearization point, never application-level
//! read-modify-write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use slotbook_core::error::StoreError;
use slotbook_core::store::{HoldStore, ReservationStore, SlotStore, StoreTransaction};
use slotbook_core::types::{Hold, HoldId, HoldStatus, IdempotencyKey, NewHold, Slot, SlotId};
use sqlx::postgres::PgPool;
use sqlx::{Postgres, Transaction};
use std::sync::Arc;

type SlotRow = (i64, i32, i32);
type HoldRow = (
    i64,
    i64,
    String,
    String,
    DateTime<Utc>,
    DateTime<Utc>,
    DateTime<Utc>,
);

const SELECT_HOLD: &str =
    "SELECT id, slot_id, status, idempotency_key, expires_at, created_at, updated_at
     FROM holds";

#[allow(clippy::cast_sign_loss)] // Counters are constrained non-negative by the schema
fn slot_from_row((id, capacity, remaining): SlotRow) -> Slot {
    Slot {
        id: SlotId::new(id),
        capacity: capacity as u32,
        remaining: remaining as u32,
    }
}

fn hold_from_row(row: HoldRow) -> Result<Hold, StoreError> {
    let (id, slot_id, status, idempotency_key, expires_at, created_at, updated_at) = row;
    let status = HoldStatus::parse(&status)
        .ok_or_else(|| StoreError::Corrupt(format!("unknown hold status: {status}")))?;
    Ok(Hold {
        id: HoldId::new(id),
        slot_id: SlotId::new(slot_id),
        status,
        idempotency_key: IdempotencyKey::new(idempotency_key),
        expires_at,
        created_at,
        updated_at,
    })
}

fn db_error(e: sqlx::Error) -> StoreError {
    StoreError::database(e)
}

/// Durable reservation store over `PostgreSQL`.
#[derive(Clone)]
pub struct PostgresReservationStore {
    pool: Arc<PgPool>,
}

impl PostgresReservationStore {
    /// Create a store over an existing connection pool.
    #[must_use]
    pub const fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Access the underlying pool (health checks, migrations).
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        self.pool.as_ref()
    }
}

#[async_trait]
impl ReservationStore for PostgresReservationStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let tx = self.pool.begin().await.map_err(db_error)?;
        Ok(Box::new(PgStoreTransaction { tx }))
    }

    async fn list_slots(&self) -> Result<Vec<Slot>, StoreError> {
        let rows: Vec<SlotRow> =
            sqlx::query_as("SELECT id, capacity, remaining FROM slots ORDER BY id")
                .fetch_all(self.pool.as_ref())
                .await
                .map_err(db_error)?;
        Ok(rows.into_iter().map(slot_from_row).collect())
    }

    async fn slot(&self, id: SlotId) -> Result<Option<Slot>, StoreError> {
        let row: Option<SlotRow> =
            sqlx::query_as("SELECT id, capacity, remaining FROM slots WHERE id = $1")
                .bind(id.as_i64())
                .fetch_optional(self.pool.as_ref())
                .await
                .map_err(db_error)?;
        Ok(row.map(slot_from_row))
    }

    async fn hold(&self, id: HoldId) -> Result<Option<Hold>, StoreError> {
        let row: Option<HoldRow> = sqlx::query_as(&format!("{SELECT_HOLD} WHERE id = $1"))
            .bind(id.as_i64())
            .fetch_optional(self.pool.as_ref())
            .await
            .map_err(db_error)?;
        row.map(hold_from_row).transpose()
    }

    async fn hold_by_idempotency_key(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<Hold>, StoreError> {
        let row: Option<HoldRow> =
            sqlx::query_as(&format!("{SELECT_HOLD} WHERE idempotency_key = $1"))
                .bind(key.as_str())
                .fetch_optional(self.pool.as_ref())
                .await
                .map_err(db_error)?;
        row.map(hold_from_row).transpose()
    }
}

/// An open Postgres transaction.
pub struct PgStoreTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl SlotStore for PgStoreTransaction {
    async fn slot_for_update(&mut self, id: SlotId) -> Result<Option<Slot>, StoreError> {
        let row: Option<SlotRow> =
            sqlx::query_as("SELECT id, capacity, remaining FROM slots WHERE id = $1 FOR UPDATE")
                .bind(id.as_i64())
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(db_error)?;
        Ok(row.map(slot_from_row))
    }

    async fn decrement_remaining(&mut self, id: SlotId) -> Result<bool, StoreError> {
        let result =
            sqlx::query("UPDATE slots SET remaining = remaining - 1 WHERE id = $1 AND remaining > 0")
                .bind(id.as_i64())
                .execute(&mut *self.tx)
                .await
                .map_err(db_error)?;
        Ok(result.rows_affected() == 1)
    }

    async fn increment_remaining(&mut self, id: SlotId) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE slots SET remaining = remaining + 1 WHERE id = $1 AND remaining < capacity",
        )
        .bind(id.as_i64())
        .execute(&mut *self.tx)
        .await
        .map_err(db_error)?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl HoldStore for PgStoreTransaction {
    async fn insert_hold(&mut self, hold: NewHold) -> Result<Hold, StoreError> {
        let row: HoldRow = sqlx::query_as(
            "INSERT INTO holds (slot_id, status, idempotency_key, expires_at, created_at, updated_at)
             VALUES ($1, $2, $3, $4, NOW(), NOW())
             RETURNING id, slot_id, status, idempotency_key, expires_at, created_at, updated_at",
        )
        .bind(hold.slot_id.as_i64())
        .bind(HoldStatus::Held.as_str())
        .bind(hold.idempotency_key.as_str())
        .bind(hold.expires_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                tracing::debug!(
                    idempotency_key = hold.idempotency_key.as_str(),
                    "hold insert hit the idempotency-key unique constraint"
                );
                StoreError::Conflict {
                    key: hold.idempotency_key.as_str().to_owned(),
                }
            }
            _ => db_error(e),
        })?;
        hold_from_row(row)
    }

    async fn update_hold_status(
        &mut self,
        id: HoldId,
        status: HoldStatus,
    ) -> Result<Option<Hold>, StoreError> {
        let row: Option<HoldRow> = sqlx::query_as(
            "UPDATE holds SET status = $2, updated_at = NOW() WHERE id = $1
             RETURNING id, slot_id, status, idempotency_key, expires_at, created_at, updated_at",
        )
        .bind(id.as_i64())
        .bind(status.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_error)?;
        row.map(hold_from_row).transpose()
    }
}

#[async_trait]
impl StoreTransaction for PgStoreTransaction {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(db_error)
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await.map_err(db_error)
    }
}
