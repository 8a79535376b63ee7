use chrono::{DateTime, Utc};
use roost_shared::{Masked, StayRange};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::discount::{DiscountGrant, DiscountType};
use crate::repository::HoldGrant;

/// Reservation lifecycle states.
///
/// Forward path: CREATED -> AWAITING_CONFIRMATION -> CONFIRMED -> CHECKED_IN
/// -> CHECKED_OUT -> COMPLETED. CANCELLED is reachable only from the two
/// pre-confirmation states.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Created,
    AwaitingConfirmation,
    Confirmed,
    CheckedIn,
    CheckedOut,
    Completed,
    Cancelled,
}

impl ReservationStatus {
    /// True while the reservation still holds (not yet booked) inventory and
    /// is subject to the expiry deadline.
    pub fn holds_inventory(&self) -> bool {
        matches!(
            self,
            ReservationStatus::Created | ReservationStatus::AwaitingConfirmation
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReservationStatus::Completed | ReservationStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Created => "CREATED",
            ReservationStatus::AwaitingConfirmation => "AWAITING_CONFIRMATION",
            ReservationStatus::Confirmed => "CONFIRMED",
            ReservationStatus::CheckedIn => "CHECKED_IN",
            ReservationStatus::CheckedOut => "CHECKED_OUT",
            ReservationStatus::Completed => "COMPLETED",
            ReservationStatus::Cancelled => "CANCELLED",
        }
    }
}

/// Cancellation reason recorded on the terminal record.
pub const CANCEL_REASON_EXPIRED: &str = "EXPIRED";
pub const CANCEL_REASON_PAYMENT_FAILED: &str = "PAYMENT_FAILED";
pub const CANCEL_REASON_USER: &str = "USER_REQUESTED";

/// A discount as applied to a reservation: the validated code plus the
/// amount it actually removed from the running subtotal. A value, not an
/// entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiscountApplication {
    pub code: String,
    pub discount_type: DiscountType,
    pub computed_amount: i64,
}

/// The single authoritative price breakdown for a reservation. Replaced
/// wholesale on every discount change, never patched in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriceSnapshot {
    /// Sum of per-night rates times room count, minor units.
    pub subtotal: i64,
    pub package_discount: i64,
    pub code_discounts: Vec<DiscountApplication>,
    pub tax: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuestContact {
    pub full_name: String,
    pub email: Masked<String>,
    pub phone: Masked<String>,
}

/// Durable record of one reservation attempt and its lifecycle.
///
/// `version` is the optimistic-concurrency token: every successful store
/// update requires the caller to present the version it read, and bumps it.
/// `expires_at` is set while the status holds inventory and cleared on
/// confirmation; terminal records are retained forever for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub account_id: String,
    pub hotel_id: Uuid,
    pub room_type_id: Uuid,
    pub stay: StayRange,
    pub room_count: i32,
    pub guest_count: i32,
    pub status: ReservationStatus,
    pub version: i64,
    pub grant: HoldGrant,
    /// Per-night rates captured at hold creation; price recomputes reuse
    /// these so the subtotal cannot drift under the customer mid-checkout.
    pub nightly_rates: Vec<i64>,
    pub package_discount_bps: i64,
    pub applied_codes: Vec<DiscountGrant>,
    pub price_snapshot: PriceSnapshot,
    pub guest_contact: Option<GuestContact>,
    pub payment_method: Option<String>,
    pub payment_reference: Option<String>,
    pub cancel_reason: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        account_id: String,
        hotel_id: Uuid,
        room_type_id: Uuid,
        stay: StayRange,
        room_count: i32,
        guest_count: i32,
        grant: HoldGrant,
        nightly_rates: Vec<i64>,
        package_discount_bps: i64,
        price_snapshot: PriceSnapshot,
        expires_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            account_id,
            hotel_id,
            room_type_id,
            stay,
            room_count,
            guest_count,
            status: ReservationStatus::Created,
            version: 0,
            grant,
            nightly_rates,
            package_discount_bps,
            applied_codes: Vec::new(),
            price_snapshot,
            guest_contact: None,
            payment_method: None,
            payment_reference: None,
            cancel_reason: None,
            expires_at: Some(expires_at),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the hold deadline has passed, relative to `now`. Only
    /// meaningful while the status holds inventory.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(deadline) => self.status.holds_inventory() && now >= deadline,
            None => false,
        }
    }

    pub fn was_expired(&self) -> bool {
        self.status == ReservationStatus::Cancelled
            && self.cancel_reason.as_deref() == Some(CANCEL_REASON_EXPIRED)
    }

    pub fn seconds_to_expiry(&self, now: DateTime<Utc>) -> Option<i64> {
        self.expires_at
            .map(|deadline| (deadline - now).num_seconds().max(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(ReservationStatus::Created.holds_inventory());
        assert!(ReservationStatus::AwaitingConfirmation.holds_inventory());
        assert!(!ReservationStatus::Confirmed.holds_inventory());
        assert!(!ReservationStatus::Cancelled.holds_inventory());
        assert!(ReservationStatus::Cancelled.is_terminal());
        assert!(ReservationStatus::Completed.is_terminal());
        assert!(!ReservationStatus::CheckedOut.is_terminal());
    }

    #[test]
    fn test_status_serializes_screaming_snake() {
        let json = serde_json::to_string(&ReservationStatus::AwaitingConfirmation).unwrap();
        assert_eq!(json, "\"AWAITING_CONFIRMATION\"");
    }
}
