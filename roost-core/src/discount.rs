use async_trait::async_trait;
use roost_shared::StayRange;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountType {
    Percent,
    Fixed,
}

/// A validated discount, as granted by the validator. `value` is basis
/// points for PERCENT codes and minor currency units for FIXED codes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiscountGrant {
    pub code: String,
    pub discount_type: DiscountType,
    pub value: i64,
    pub max_discount_cap: Option<i64>,
}

/// Boundary to the external discount validator.
///
/// Applied codes are validated twice: once at apply time and again at
/// confirmation, because eligibility windows and usage caps may have moved
/// in between. Usage is only recorded at confirmation.
#[async_trait]
pub trait DiscountValidator: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    async fn validate(
        &self,
        code: &str,
        account_id: &str,
        hotel_id: Uuid,
        room_type_id: Uuid,
        subtotal: i64,
        stay: StayRange,
    ) -> Result<DiscountGrant, EngineError>;

    /// Count one consumption against the per-account usage cap.
    async fn record_usage(&self, code: &str, account_id: &str) -> Result<(), EngineError>;
}
