use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use roost_shared::StayRange;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;
use crate::reservation::Reservation;

/// Proof of a successful capacity reservation. The grant id is the
/// idempotency key for `commit`/`release`: a grant resolves at most once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldGrant {
    pub id: Uuid,
    pub room_type_id: Uuid,
    pub stay: StayRange,
    pub room_count: i32,
}

/// Point-in-time view of one (room type, date) capacity row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CapacitySnapshot {
    pub total_units: i32,
    pub held_units: i32,
    pub booked_units: i32,
}

impl CapacitySnapshot {
    pub fn available(&self) -> i32 {
        self.total_units - self.held_units - self.booked_units
    }
}

/// The single source of truth for "is there capacity".
///
/// All three mutations treat the full date range as one atomic unit; a
/// partial hold across a range is never a valid outcome. Implementations
/// serialize per (room_type_id, date) key and must acquire multi-date key
/// sets in ascending date order.
#[async_trait]
pub trait InventoryLedger: Send + Sync {
    /// Increment `held_units` for every night in the range, or fail with
    /// `CapacityExceeded` naming the dates that lack capacity. No partial
    /// grants.
    async fn try_reserve(
        &self,
        room_type_id: Uuid,
        stay: StayRange,
        room_count: i32,
    ) -> Result<HoldGrant, EngineError>;

    /// Give held capacity back. Idempotent per grant.
    async fn release(&self, grant: &HoldGrant) -> Result<(), EngineError>;

    /// Convert held capacity to booked capacity, net zero occupancy change.
    /// Idempotent per grant.
    async fn commit(&self, grant: &HoldGrant) -> Result<(), EngineError>;

    /// Read one capacity row, if provisioned.
    async fn capacity_on(
        &self,
        room_type_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<CapacitySnapshot>, EngineError>;
}

/// Durable store for reservation records.
///
/// `update` is the compare-and-set primitive the whole engine's concurrency
/// discipline rests on: it applies `next` only if the stored version still
/// equals `expected_version`, and bumps the version on success. Reservations
/// are never deleted; terminal records are retained for audit.
#[async_trait]
pub trait HoldStore: Send + Sync {
    async fn insert(&self, reservation: &Reservation) -> Result<(), EngineError>;

    async fn get(&self, id: Uuid) -> Result<Option<Reservation>, EngineError>;

    /// Compare-and-set write. Returns the stored record on success and
    /// `Conflict` if another writer got there first.
    async fn update(
        &self,
        expected_version: i64,
        next: &Reservation,
    ) -> Result<Reservation, EngineError>;

    /// Reservations still holding inventory whose deadline has passed, in
    /// deadline order.
    async fn list_expired(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Reservation>, EngineError>;
}
