use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use roost_core::catalog::CatalogProvider;
use roost_core::EngineError;
use uuid::Uuid;

/// Catalog entry for one room type: fixed unit count plus a base rate with
/// optional per-date overrides (seasonal pricing).
#[derive(Debug, Clone)]
pub struct RoomTypeEntry {
    pub total_units: i32,
    pub base_rate: i64,
    pub date_overrides: HashMap<NaiveDate, i64>,
}

impl RoomTypeEntry {
    pub fn new(total_units: i32, base_rate: i64) -> Self {
        Self {
            total_units,
            base_rate,
            date_overrides: HashMap::new(),
        }
    }

    pub fn with_rate_on(mut self, date: NaiveDate, rate: i64) -> Self {
        self.date_overrides.insert(date, rate);
        self
    }
}

/// In-memory catalog provider. The real catalog service is an external
/// collaborator; this stands in at the same trait boundary for local runs
/// and tests.
#[derive(Debug, Default)]
pub struct StaticCatalog {
    room_types: HashMap<Uuid, RoomTypeEntry>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_room_type(mut self, room_type_id: Uuid, entry: RoomTypeEntry) -> Self {
        self.room_types.insert(room_type_id, entry);
        self
    }

    fn entry(&self, room_type_id: Uuid) -> Result<&RoomTypeEntry, EngineError> {
        self.room_types.get(&room_type_id).ok_or_else(|| {
            EngineError::ValidationFailed(format!("unknown room type {room_type_id}"))
        })
    }
}

#[async_trait]
impl CatalogProvider for StaticCatalog {
    async fn total_units(&self, room_type_id: Uuid) -> Result<i32, EngineError> {
        Ok(self.entry(room_type_id)?.total_units)
    }

    async fn base_rate(&self, room_type_id: Uuid, date: NaiveDate) -> Result<i64, EngineError> {
        let entry = self.entry(room_type_id)?;
        Ok(entry
            .date_overrides
            .get(&date)
            .copied()
            .unwrap_or(entry.base_rate))
    }
}
