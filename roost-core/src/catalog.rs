use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::EngineError;

/// Boundary to the hotel/room catalog service. Descriptive data only; the
/// ledger owns the live counters.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Physical units of this room type, used to seed capacity rows.
    async fn total_units(&self, room_type_id: Uuid) -> Result<i32, EngineError>;

    /// Nightly base rate in minor currency units. Rates may vary per date.
    async fn base_rate(&self, room_type_id: Uuid, date: NaiveDate) -> Result<i64, EngineError>;
}
