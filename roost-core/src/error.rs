use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

/// Error taxonomy shared across the engine.
///
/// Capacity and expiration errors are definitive outcomes, never retried
/// internally. `DownstreamUnavailable` is the only variant a caller should
/// retry with backoff.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error("no capacity for room type {room_type_id} on {} date(s)", unavailable_dates.len())]
    CapacityExceeded {
        room_type_id: Uuid,
        unavailable_dates: Vec<NaiveDate>,
    },

    #[error("reservation {reservation_id} expired at {expired_at}")]
    Expired {
        reservation_id: Uuid,
        expired_at: DateTime<Utc>,
    },

    #[error("reservation {0} was resolved by a concurrent operation")]
    Conflict(Uuid),

    #[error("discount code {code} rejected: {reason}")]
    DiscountRejected { code: String, reason: String },

    #[error("reservation {0} not found")]
    NotFound(Uuid),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("downstream unavailable: {0}")]
    DownstreamUnavailable(String),
}

impl EngineError {
    /// Machine-readable kind, carried in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            EngineError::Expired { .. } => "EXPIRED",
            EngineError::Conflict(_) => "CONFLICT",
            EngineError::DiscountRejected { .. } => "DISCOUNT_REJECTED",
            EngineError::NotFound(_) => "NOT_FOUND",
            EngineError::Forbidden(_) => "FORBIDDEN",
            EngineError::ValidationFailed(_) => "VALIDATION_FAILED",
            EngineError::DownstreamUnavailable(_) => "DOWNSTREAM_UNAVAILABLE",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::DownstreamUnavailable(_))
    }
}
