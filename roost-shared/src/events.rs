use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

/// Audit-log payloads emitted at the reservation lifecycle edges.

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct HoldCreatedEvent {
    pub reservation_id: Uuid,
    pub room_type_id: Uuid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub room_count: i32,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct ReservationConfirmedEvent {
    pub reservation_id: Uuid,
    pub account_id: String,
    pub payment_reference: String,
    pub total: i64,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct ReservationCancelledEvent {
    pub reservation_id: Uuid,
    pub reason: String,
    pub timestamp: i64,
}
