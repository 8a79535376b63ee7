use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use roost_core::repository::HoldStore;
use roost_core::reservation::Reservation;
use roost_core::EngineError;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory hold store with the same compare-and-set contract as the
/// Postgres store. Used by tests and database-less local runs.
#[derive(Default)]
pub struct MemoryHoldStore {
    inner: RwLock<HashMap<Uuid, Reservation>>,
}

impl MemoryHoldStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HoldStore for MemoryHoldStore {
    async fn insert(&self, reservation: &Reservation) -> Result<(), EngineError> {
        let mut inner = self.inner.write().await;
        if inner.contains_key(&reservation.id) {
            return Err(EngineError::Conflict(reservation.id));
        }
        inner.insert(reservation.id, reservation.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Reservation>, EngineError> {
        Ok(self.inner.read().await.get(&id).cloned())
    }

    async fn update(
        &self,
        expected_version: i64,
        next: &Reservation,
    ) -> Result<Reservation, EngineError> {
        let mut inner = self.inner.write().await;
        let current = inner
            .get_mut(&next.id)
            .ok_or(EngineError::NotFound(next.id))?;

        if current.version != expected_version {
            return Err(EngineError::Conflict(next.id));
        }

        let mut stored = next.clone();
        stored.version = expected_version + 1;
        stored.updated_at = Utc::now();
        *current = stored.clone();
        Ok(stored)
    }

    async fn list_expired(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Reservation>, EngineError> {
        let inner = self.inner.read().await;
        let mut due: Vec<Reservation> = inner
            .values()
            .filter(|r| r.is_expired_at(now))
            .cloned()
            .collect();
        due.sort_by_key(|r| r.expires_at);
        due.truncate(limit);
        Ok(due)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use roost_core::repository::HoldGrant;
    use roost_core::reservation::{PriceSnapshot, ReservationStatus};
    use roost_shared::StayRange;

    fn reservation(expires_in: Duration) -> Reservation {
        let stay = StayRange::new(
            "2026-09-10".parse().unwrap(),
            "2026-09-12".parse().unwrap(),
        )
        .unwrap();
        let room_type_id = Uuid::new_v4();
        Reservation::new(
            "acct-1".to_string(),
            Uuid::new_v4(),
            room_type_id,
            stay,
            1,
            2,
            HoldGrant {
                id: Uuid::new_v4(),
                room_type_id,
                stay,
                room_count: 1,
            },
            vec![100_000, 100_000],
            0,
            PriceSnapshot {
                subtotal: 200_000,
                package_discount: 0,
                code_discounts: vec![],
                tax: 20_000,
                total: 220_000,
            },
            Utc::now() + expires_in,
        )
    }

    #[tokio::test]
    async fn test_cas_rejects_stale_version() {
        let store = MemoryHoldStore::new();
        let r = reservation(Duration::minutes(20));
        store.insert(&r).await.unwrap();

        let mut first = r.clone();
        first.status = ReservationStatus::AwaitingConfirmation;
        let stored = store.update(r.version, &first).await.unwrap();
        assert_eq!(stored.version, r.version + 1);

        // A second writer holding the original version must lose.
        let mut second = r.clone();
        second.status = ReservationStatus::Cancelled;
        let err = store.update(r.version, &second).await.unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));

        let current = store.get(r.id).await.unwrap().unwrap();
        assert_eq!(current.status, ReservationStatus::AwaitingConfirmation);
    }

    #[tokio::test]
    async fn test_duplicate_insert_rejected() {
        let store = MemoryHoldStore::new();
        let r = reservation(Duration::minutes(20));
        store.insert(&r).await.unwrap();
        assert!(store.insert(&r).await.is_err());
    }

    #[tokio::test]
    async fn test_list_expired_filters_and_orders() {
        let store = MemoryHoldStore::new();
        let fresh = reservation(Duration::minutes(20));
        let older = reservation(Duration::minutes(-10));
        let oldest = reservation(Duration::minutes(-30));
        for r in [&fresh, &older, &oldest] {
            store.insert(r).await.unwrap();
        }

        let due = store.list_expired(Utc::now(), 10).await.unwrap();
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].id, oldest.id);
        assert_eq!(due[1].id, older.id);
    }
}
