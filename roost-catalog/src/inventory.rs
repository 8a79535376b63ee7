use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use roost_core::catalog::CatalogProvider;
use roost_core::repository::{CapacitySnapshot, HoldGrant, InventoryLedger};
use roost_core::EngineError;
use roost_shared::StayRange;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tokio::time::timeout;
use uuid::Uuid;

/// One (room type, date) capacity row.
#[derive(Debug)]
struct CapacityCell {
    total_units: i32,
    held_units: i32,
    booked_units: i32,
}

impl CapacityCell {
    fn available(&self) -> i32 {
        self.total_units - self.held_units - self.booked_units
    }
}

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Per-attempt bound on acquiring one row lock. This sits in the
    /// synchronous checkout path, so it must stay sub-second.
    pub lock_timeout: Duration,
    /// Acquisition attempts before surfacing `DownstreamUnavailable`.
    pub max_attempts: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_millis(250),
            max_attempts: 3,
        }
    }
}

/// In-memory inventory ledger.
///
/// The unit of serialization is the (room_type_id, date) key: each row sits
/// behind its own mutex, so operations on disjoint room types or dates run
/// fully in parallel. Multi-date operations lock their rows in ascending
/// date order, which is the same global order for every caller and rules out
/// lock-order deadlock between overlapping ranges.
///
/// Rows are seeded lazily from the catalog's `total_units` on first touch;
/// provisioning itself is out of scope.
pub struct MemoryInventoryLedger {
    rows: RwLock<HashMap<(Uuid, NaiveDate), Arc<Mutex<CapacityCell>>>>,
    /// Grant ids that have already committed or released. A grant resolves
    /// at most once; the second resolve is a successful no-op.
    resolved: Mutex<HashSet<Uuid>>,
    catalog: Arc<dyn CatalogProvider>,
    config: LedgerConfig,
}

impl MemoryInventoryLedger {
    pub fn new(catalog: Arc<dyn CatalogProvider>, config: LedgerConfig) -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
            resolved: Mutex::new(HashSet::new()),
            catalog,
            config,
        }
    }

    /// Fetch the row handles for every night, seeding missing rows from the
    /// catalog. Returned in the same ascending order as `dates`.
    async fn cells_for(
        &self,
        room_type_id: Uuid,
        dates: &[NaiveDate],
    ) -> Result<Vec<Arc<Mutex<CapacityCell>>>, EngineError> {
        {
            let rows = self.rows.read().await;
            if let Some(cells) = dates
                .iter()
                .map(|d| rows.get(&(room_type_id, *d)).cloned())
                .collect::<Option<Vec<_>>>()
            {
                return Ok(cells);
            }
        }

        // At least one row is missing. Resolve the seed outside the map lock.
        let total_units = self.catalog.total_units(room_type_id).await?;

        let mut rows = self.rows.write().await;
        let cells = dates
            .iter()
            .map(|d| {
                rows.entry((room_type_id, *d))
                    .or_insert_with(|| {
                        Arc::new(Mutex::new(CapacityCell {
                            total_units,
                            held_units: 0,
                            booked_units: 0,
                        }))
                    })
                    .clone()
            })
            .collect();
        Ok(cells)
    }

    /// Lock every row in order, bounded per row. `None` means an attempt
    /// timed out and the caller should retry from scratch.
    async fn lock_all<'a>(
        &self,
        cells: &'a [Arc<Mutex<CapacityCell>>],
    ) -> Option<Vec<MutexGuard<'a, CapacityCell>>> {
        let mut guards = Vec::with_capacity(cells.len());
        for cell in cells {
            match timeout(self.config.lock_timeout, cell.lock()).await {
                Ok(guard) => guards.push(guard),
                Err(_) => return None,
            }
        }
        Some(guards)
    }

    /// Resolve a grant (commit or release) exactly once. `apply` runs with
    /// every row of the grant locked.
    async fn resolve_grant<F>(&self, grant: &HoldGrant, apply: F) -> Result<(), EngineError>
    where
        F: Fn(&mut CapacityCell, i32),
    {
        let dates: Vec<NaiveDate> = grant.stay.iter_nights().collect();
        let cells = self.cells_for(grant.room_type_id, &dates).await?;

        for _ in 0..self.config.max_attempts {
            let Some(mut guards) = self.lock_all(&cells).await else {
                continue;
            };

            let mut resolved = self.resolved.lock().await;
            if !resolved.insert(grant.id) {
                return Ok(());
            }
            drop(resolved);

            for guard in guards.iter_mut() {
                apply(guard, grant.room_count);
            }
            return Ok(());
        }

        Err(EngineError::DownstreamUnavailable(
            "inventory ledger lock acquisition timed out".to_string(),
        ))
    }
}

#[async_trait]
impl InventoryLedger for MemoryInventoryLedger {
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

        let dates: Vec<NaiveDate> = stay.iter_nights().collect();
        let cells = self.cells_for(room_type_id, &dates).await?;

        for _ in 0..self.config.max_attempts {
            let Some(mut guards) = self.lock_all(&cells).await else {
                continue;
            };

            let unavailable: Vec<NaiveDate> = dates
                .iter()
                .zip(guards.iter())
                .filter(|(_, cell)| cell.available() < room_count)
                .map(|(date, _)| *date)
                .collect();

            if !unavailable.is_empty() {
                return Err(EngineError::CapacityExceeded {
                    room_type_id,
                    unavailable_dates: unavailable,
                });
            }

            for guard in guards.iter_mut() {
                guard.held_units += room_count;
            }

            return Ok(HoldGrant {
                id: Uuid::new_v4(),
                room_type_id,
                stay,
                room_count,
            });
        }

        Err(EngineError::DownstreamUnavailable(
            "inventory ledger lock acquisition timed out".to_string(),
        ))
    }

    async fn release(&self, grant: &HoldGrant) -> Result<(), EngineError> {
        self.resolve_grant(grant, |cell, count| {
            cell.held_units = (cell.held_units - count).max(0);
        })
        .await
    }

    async fn commit(&self, grant: &HoldGrant) -> Result<(), EngineError> {
        self.resolve_grant(grant, |cell, count| {
            cell.held_units = (cell.held_units - count).max(0);
            cell.booked_units += count;
        })
        .await
    }

    async fn capacity_on(
        &self,
        room_type_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<CapacitySnapshot>, EngineError> {
        let cell = {
            let rows = self.rows.read().await;
            rows.get(&(room_type_id, date)).cloned()
        };
        match cell {
            Some(cell) => {
                let cell = cell.lock().await;
                Ok(Some(CapacitySnapshot {
                    total_units: cell.total_units,
                    held_units: cell.held_units,
                    booked_units: cell.booked_units,
                }))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rates::{RoomTypeEntry, StaticCatalog};

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn ledger_with(total_units: i32) -> (MemoryInventoryLedger, Uuid) {
        let room_type = Uuid::new_v4();
        let catalog = StaticCatalog::new()
            .with_room_type(room_type, RoomTypeEntry::new(total_units, 100_000));
        (
            MemoryInventoryLedger::new(Arc::new(catalog), LedgerConfig::default()),
            room_type,
        )
    }

    #[tokio::test]
    async fn test_reserve_commit_lifecycle() {
        let (ledger, room_type) = ledger_with(10);
        let stay = StayRange::new(d("2026-09-10"), d("2026-09-12")).unwrap();

        let grant = ledger.try_reserve(room_type, stay, 2).await.unwrap();
        for night in stay.iter_nights() {
            let cap = ledger.capacity_on(room_type, night).await.unwrap().unwrap();
            assert_eq!(cap.held_units, 2);
            assert_eq!(cap.booked_units, 0);
            assert_eq!(cap.available(), 8);
        }

        ledger.commit(&grant).await.unwrap();
        for night in stay.iter_nights() {
            let cap = ledger.capacity_on(room_type, night).await.unwrap().unwrap();
            assert_eq!(cap.held_units, 0);
            assert_eq!(cap.booked_units, 2);
            // Commit is a pure state transfer, no occupancy change.
            assert_eq!(cap.available(), 8);
        }
    }

    #[tokio::test]
    async fn test_release_returns_capacity() {
        let (ledger, room_type) = ledger_with(5);
        let stay = StayRange::new(d("2026-09-10"), d("2026-09-11")).unwrap();

        let grant = ledger.try_reserve(room_type, stay, 3).await.unwrap();
        ledger.release(&grant).await.unwrap();

        let cap = ledger
            .capacity_on(room_type, d("2026-09-10"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cap.held_units, 0);
        assert_eq!(cap.available(), 5);
    }

    #[tokio::test]
    async fn test_no_partial_grant_across_range() {
        let (ledger, room_type) = ledger_with(1);
        let first = StayRange::new(d("2026-09-11"), d("2026-09-13")).unwrap();
        let _grant = ledger.try_reserve(room_type, first, 1).await.unwrap();

        // Overlaps on the 12th only; the whole range must be refused and the
        // free nights must stay untouched.
        let second = StayRange::new(d("2026-09-12"), d("2026-09-15")).unwrap();
        let err = ledger.try_reserve(room_type, second, 1).await.unwrap_err();
        match err {
            EngineError::CapacityExceeded {
                unavailable_dates, ..
            } => assert_eq!(unavailable_dates, vec![d("2026-09-12")]),
            other => panic!("expected CapacityExceeded, got {other:?}"),
        }

        for night in [d("2026-09-13"), d("2026-09-14")] {
            let cap = ledger.capacity_on(room_type, night).await.unwrap().unwrap();
            assert_eq!(cap.held_units, 0, "free night {night} must be untouched");
        }
    }

    #[tokio::test]
    async fn test_no_overbooking_under_concurrency() {
        let capacity = 3;
        let contenders = 12;
        let (ledger, room_type) = ledger_with(capacity);
        let ledger = Arc::new(ledger);
        let stay = StayRange::new(d("2026-09-10"), d("2026-09-13")).unwrap();

        let mut handles = Vec::new();
        for _ in 0..contenders {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger.try_reserve(room_type, stay, 1).await
            }));
        }

        let mut granted = 0;
        let mut refused = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => granted += 1,
                Err(EngineError::CapacityExceeded { .. }) => refused += 1,
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        assert_eq!(granted, capacity);
        assert_eq!(refused, contenders - capacity);

        for night in stay.iter_nights() {
            let cap = ledger.capacity_on(room_type, night).await.unwrap().unwrap();
            assert!(cap.held_units + cap.booked_units <= cap.total_units);
            assert_eq!(cap.held_units, capacity);
        }
    }

    #[tokio::test]
    async fn test_commit_is_idempotent_per_grant() {
        let (ledger, room_type) = ledger_with(4);
        let stay = StayRange::new(d("2026-09-10"), d("2026-09-11")).unwrap();

        let grant = ledger.try_reserve(room_type, stay, 2).await.unwrap();
        ledger.commit(&grant).await.unwrap();
        ledger.commit(&grant).await.unwrap();

        let cap = ledger
            .capacity_on(room_type, d("2026-09-10"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cap.booked_units, 2);
        assert_eq!(cap.held_units, 0);
    }

    #[tokio::test]
    async fn test_release_after_commit_is_noop() {
        let (ledger, room_type) = ledger_with(4);
        let stay = StayRange::new(d("2026-09-10"), d("2026-09-11")).unwrap();

        let grant = ledger.try_reserve(room_type, stay, 1).await.unwrap();
        ledger.commit(&grant).await.unwrap();
        // The grant already resolved; a late release must not free booked units.
        ledger.release(&grant).await.unwrap();

        let cap = ledger
            .capacity_on(room_type, d("2026-09-10"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cap.booked_units, 1);
        assert_eq!(cap.available(), 3);
    }

    #[tokio::test]
    async fn test_disjoint_room_types_do_not_interfere() {
        let room_a = Uuid::new_v4();
        let room_b = Uuid::new_v4();
        let catalog = StaticCatalog::new()
            .with_room_type(room_a, RoomTypeEntry::new(1, 100_000))
            .with_room_type(room_b, RoomTypeEntry::new(1, 100_000));
        let ledger = MemoryInventoryLedger::new(Arc::new(catalog), LedgerConfig::default());
        let stay = StayRange::new(d("2026-09-10"), d("2026-09-11")).unwrap();

        ledger.try_reserve(room_a, stay, 1).await.unwrap();
        // Room A is full; room B must still grant.
        ledger.try_reserve(room_b, stay, 1).await.unwrap();
        assert!(ledger.try_reserve(room_a, stay, 1).await.is_err());
    }
}
