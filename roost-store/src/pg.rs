use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use roost_core::catalog::CatalogProvider;
use roost_core::repository::{CapacitySnapshot, HoldGrant, HoldStore, InventoryLedger};
use roost_core::reservation::Reservation;
use roost_core::EngineError;
use roost_shared::StayRange;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

fn db_err(err: sqlx::Error) -> EngineError {
    EngineError::DownstreamUnavailable(format!("database error: {err}"))
}

/// Postgres lock_timeout expiry, raised while waiting on a row lock held by
/// a concurrent reservation touching the same (room type, night) keys.
fn is_lock_timeout(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(dbe) if dbe.code().as_deref() == Some("55P03"))
}

fn decode_reservation(row: &PgRow) -> Result<Reservation, EngineError> {
    let doc: serde_json::Value = row.try_get("doc").map_err(db_err)?;
    serde_json::from_value(doc)
        .map_err(|e| EngineError::DownstreamUnavailable(format!("corrupt reservation row: {e}")))
}

/// Durable hold store. The write path mirrors `MemoryHoldStore`: version is
/// the CAS token, terminal rows are never deleted.
pub struct PgHoldStore {
    pool: PgPool,
}

impl PgHoldStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HoldStore for PgHoldStore {
    async fn insert(&self, reservation: &Reservation) -> Result<(), EngineError> {
        let doc = serde_json::to_value(reservation)
            .map_err(|e| EngineError::DownstreamUnavailable(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO reservations
                (id, account_id, hotel_id, room_type_id, check_in, check_out,
                 room_count, guest_count, status, version, expires_at,
                 cancel_reason, payment_reference, doc, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(reservation.id)
        .bind(&reservation.account_id)
        .bind(reservation.hotel_id)
        .bind(reservation.room_type_id)
        .bind(reservation.stay.check_in)
        .bind(reservation.stay.check_out)
        .bind(reservation.room_count)
        .bind(reservation.guest_count)
        .bind(reservation.status.as_str())
        .bind(reservation.version)
        .bind(reservation.expires_at)
        .bind(&reservation.cancel_reason)
        .bind(&reservation.payment_reference)
        .bind(doc)
        .bind(reservation.created_at)
        .bind(reservation.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Reservation>, EngineError> {
        let row = sqlx::query("SELECT doc FROM reservations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.as_ref().map(decode_reservation).transpose()
    }

    async fn update(
        &self,
        expected_version: i64,
        next: &Reservation,
    ) -> Result<Reservation, EngineError> {
        let mut stored = next.clone();
        stored.version = expected_version + 1;
        stored.updated_at = Utc::now();

        let doc = serde_json::to_value(&stored)
            .map_err(|e| EngineError::DownstreamUnavailable(e.to_string()))?;

        let result = sqlx::query(
            r#"
            UPDATE reservations
               SET status = $2, version = $3, expires_at = $4,
                   cancel_reason = $5, payment_reference = $6,
                   doc = $7, updated_at = $8
             WHERE id = $1 AND version = $9
            "#,
        )
        .bind(stored.id)
        .bind(stored.status.as_str())
        .bind(stored.version)
        .bind(stored.expires_at)
        .bind(&stored.cancel_reason)
        .bind(&stored.payment_reference)
        .bind(doc)
        .bind(stored.updated_at)
        .bind(expected_version)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 1 {
            return Ok(stored);
        }

        // CAS miss: distinguish a concurrent writer from a bad id.
        let exists = sqlx::query("SELECT 1 FROM reservations WHERE id = $1")
            .bind(stored.id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        match exists {
            Some(_) => Err(EngineError::Conflict(stored.id)),
            None => Err(EngineError::NotFound(stored.id)),
        }
    }

    async fn list_expired(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Reservation>, EngineError> {
        let rows = sqlx::query(
            r#"
            SELECT doc FROM reservations
             WHERE status IN ('CREATED', 'AWAITING_CONFIRMATION')
               AND expires_at <= $1
             ORDER BY expires_at ASC
             LIMIT $2
            "#,
        )
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(decode_reservation).collect()
    }
}

/// Durable inventory ledger. Row locks are taken with `SELECT ... FOR
/// UPDATE` over the nights in ascending order, the same global key order
/// the in-memory ledger uses, and bounded by a statement-local
/// lock_timeout. Grant resolution claims the grant row first, which is what
/// makes commit/release idempotent across restarts.
pub struct PgInventoryLedger {
    pool: PgPool,
    catalog: Arc<dyn CatalogProvider>,
    max_attempts: u32,
}

impl PgInventoryLedger {
    pub fn new(pool: PgPool, catalog: Arc<dyn CatalogProvider>) -> Self {
        Self {
            pool,
            catalog,
            max_attempts: 3,
        }
    }

    async fn lock_rows(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        room_type_id: Uuid,
        nights: &[NaiveDate],
    ) -> Result<Vec<(NaiveDate, i32, i32, i32)>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT night, total_units, held_units, booked_units
              FROM room_night_capacity
             WHERE room_type_id = $1 AND night = ANY($2)
             ORDER BY night
               FOR UPDATE
            "#,
        )
        .bind(room_type_id)
        .bind(nights)
        .fetch_all(&mut **tx)
        .await?;

        rows.iter()
            .map(|row| {
                Ok((
                    row.try_get("night")?,
                    row.try_get("total_units")?,
                    row.try_get("held_units")?,
                    row.try_get("booked_units")?,
                ))
            })
            .collect()
    }

    /// Apply a commit or release for a grant exactly once.
    async fn resolve_grant(&self, grant: &HoldGrant, commit: bool) -> Result<(), EngineError> {
        let nights: Vec<NaiveDate> = grant.stay.iter_nights().collect();

        for _ in 0..self.max_attempts {
            let mut tx = self.pool.begin().await.map_err(db_err)?;
            sqlx::query("SET LOCAL lock_timeout = '500ms'")
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;

            let claimed = sqlx::query(
                "UPDATE inventory_grants SET resolved_at = NOW() WHERE id = $1 AND resolved_at IS NULL",
            )
            .bind(grant.id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

            if claimed.rows_affected() == 0 {
                // Already resolved; second resolve is a no-op.
                tx.rollback().await.map_err(db_err)?;
                return Ok(());
            }

            match Self::lock_rows(&mut tx, grant.room_type_id, &nights).await {
                Ok(_) => {}
                Err(err) if is_lock_timeout(&err) => continue,
                Err(err) => return Err(db_err(err)),
            }

            let statement = if commit {
                r#"
                UPDATE room_night_capacity
                   SET held_units = GREATEST(held_units - $3, 0),
                       booked_units = booked_units + $3
                 WHERE room_type_id = $1 AND night = ANY($2)
                "#
            } else {
                r#"
                UPDATE room_night_capacity
                   SET held_units = GREATEST(held_units - $3, 0)
                 WHERE room_type_id = $1 AND night = ANY($2)
                "#
            };
            sqlx::query(statement)
                .bind(grant.room_type_id)
                .bind(&nights)
                .bind(grant.room_count)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;

            tx.commit().await.map_err(db_err)?;
            return Ok(());
        }

        Err(EngineError::DownstreamUnavailable(
            "inventory row lock acquisition timed out".to_string(),
        ))
    }
}

#[async_trait]
impl InventoryLedger for PgInventoryLedger {
    async fn try_reserve(
        &self,
        room_type_id: Uuid,
        stay: StayRange,
        room_count: i32,
    ) -> Result<HoldGrant, EngineError> {
        if room_count < 1 {
            return Err(EngineError::ValidationFailed(
                "room_count must be at least 1".to_string(),
            ));
        }

        let nights: Vec<NaiveDate> = stay.iter_nights().collect();
        let total_units = self.catalog.total_units(room_type_id).await?;

        for _ in 0..self.max_attempts {
            let mut tx = self.pool.begin().await.map_err(db_err)?;
            sqlx::query("SET LOCAL lock_timeout = '500ms'")
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;

            // Seed rows the catalog knows about but the ledger has not
            // touched yet; provisioning itself is out of scope.
            sqlx::query(
                r#"
                INSERT INTO room_night_capacity (room_type_id, night, total_units)
                SELECT $1, night, $3 FROM UNNEST($2::date[]) AS night
                ON CONFLICT (room_type_id, night) DO NOTHING
                "#,
            )
            .bind(room_type_id)
            .bind(&nights)
            .bind(total_units)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

            let rows = match Self::lock_rows(&mut tx, room_type_id, &nights).await {
                Ok(rows) => rows,
                Err(err) if is_lock_timeout(&err) => continue,
                Err(err) => return Err(db_err(err)),
            };

            let unavailable: Vec<NaiveDate> = rows
                .iter()
                .filter(|(_, total, held, booked)| total - held - booked < room_count)
                .map(|(night, ..)| *night)
                .collect();
            if !unavailable.is_empty() {
                tx.rollback().await.map_err(db_err)?;
                return Err(EngineError::CapacityExceeded {
                    room_type_id,
                    unavailable_dates: unavailable,
                });
            }

            sqlx::query(
                r#"
                UPDATE room_night_capacity
                   SET held_units = held_units + $3
                 WHERE room_type_id = $1 AND night = ANY($2)
                "#,
            )
            .bind(room_type_id)
            .bind(&nights)
            .bind(room_count)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

            let grant = HoldGrant {
                id: Uuid::new_v4(),
                room_type_id,
                stay,
                room_count,
            };
            sqlx::query(
                r#"
                INSERT INTO inventory_grants (id, room_type_id, check_in, check_out, room_count)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(grant.id)
            .bind(room_type_id)
            .bind(stay.check_in)
            .bind(stay.check_out)
            .bind(room_count)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

            tx.commit().await.map_err(db_err)?;
            return Ok(grant);
        }

        Err(EngineError::DownstreamUnavailable(
            "inventory row lock acquisition timed out".to_string(),
        ))
    }

    async fn release(&self, grant: &HoldGrant) -> Result<(), EngineError> {
        self.resolve_grant(grant, false).await
    }

    async fn commit(&self, grant: &HoldGrant) -> Result<(), EngineError> {
        self.resolve_grant(grant, true).await
    }

    async fn capacity_on(
        &self,
        room_type_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<CapacitySnapshot>, EngineError> {
        let row = sqlx::query(
            r#"
            SELECT total_units, held_units, booked_units
              FROM room_night_capacity
             WHERE room_type_id = $1 AND night = $2
            "#,
        )
        .bind(room_type_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(|row| {
            Ok(CapacitySnapshot {
                total_units: row.try_get("total_units").map_err(db_err)?,
                held_units: row.try_get("held_units").map_err(db_err)?,
                booked_units: row.try_get("booked_units").map_err(db_err)?,
            })
        })
        .transpose()
    }
}
