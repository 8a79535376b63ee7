use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    RequiresPaymentMethod,
    Processing,
    Succeeded,
    Failed,
    Canceled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    /// Provider's reference (e.g. pi_...). This is the key the asynchronous
    /// status callback arrives under.
    pub id: String,
    pub reservation_id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub client_secret: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Boundary to the payment gateway. Only the intent/callback contract is in
/// scope; the gateway's own transaction processing is not.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(
        &self,
        reservation_id: Uuid,
        amount: i64,
        currency: &str,
    ) -> Result<PaymentIntent, EngineError>;

    async fn get_intent(&self, intent_id: &str) -> Result<PaymentIntent, EngineError>;
}
