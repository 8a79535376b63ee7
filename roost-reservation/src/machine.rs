use std::sync::Arc;

use chrono::{Duration, Utc};
use roost_catalog::{PriceEngine, PriceQuote};
use roost_core::catalog::CatalogProvider;
use roost_core::discount::{DiscountGrant, DiscountValidator};
use roost_core::identity::Caller;
use roost_core::repository::{HoldStore, InventoryLedger};
use roost_core::reservation::{
    GuestContact, Reservation, ReservationStatus, CANCEL_REASON_EXPIRED,
};
use roost_core::EngineError;
use roost_shared::events::{HoldCreatedEvent, ReservationCancelledEvent, ReservationConfirmedEvent};
use roost_shared::StayRange;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub hold_ttl_seconds: i64,
    pub max_discount_codes: usize,
    pub currency: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            hold_ttl_seconds: 20 * 60,
            max_discount_codes: 2,
            currency: "USD".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateHoldRequest {
    pub hotel_id: Uuid,
    pub room_type_id: Uuid,
    pub stay: StayRange,
    pub room_count: i32,
    pub guest_count: i32,
    /// Account-tier discount, basis points. Resolved by the caller from the
    /// customer's package tier; applied before any promotional codes.
    #[serde(default)]
    pub package_discount_bps: i64,
}

/// Forward-only post-confirmation transitions. No inventory effect: capacity
/// was converted to booked units at confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StayEvent {
    CheckIn,
    CheckOut,
    Complete,
}

/// Orchestrates the reservation lifecycle.
///
/// Every transition is a compare-and-set against the hold store's
/// (status, version) pair; the ledger is only touched after the CAS decides
/// a winner, and grant-level idempotence in the ledger absorbs duplicate
/// follow-ups. This is what makes confirm-vs-expire a first-writer-wins
/// race instead of a double-booking bug.
pub struct ReservationEngine {
    store: Arc<dyn HoldStore>,
    ledger: Arc<dyn InventoryLedger>,
    catalog: Arc<dyn CatalogProvider>,
    discounts: Arc<dyn DiscountValidator>,
    pricing: PriceEngine,
    config: EngineConfig,
}

impl ReservationEngine {
    pub fn new(
        store: Arc<dyn HoldStore>,
        ledger: Arc<dyn InventoryLedger>,
        catalog: Arc<dyn CatalogProvider>,
        discounts: Arc<dyn DiscountValidator>,
        pricing: PriceEngine,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            ledger,
            catalog,
            discounts,
            pricing,
            config,
        }
    }

    pub fn currency(&self) -> &str {
        &self.config.currency
    }

    fn quote(&self, reservation: &Reservation, codes: Vec<DiscountGrant>) -> PriceQuote {
        PriceQuote {
            nightly_rates: reservation.nightly_rates.clone(),
            room_count: reservation.room_count as i64,
            package_discount_bps: reservation.package_discount_bps,
            codes,
        }
    }

    /// Reserve capacity and write a CREATED hold with a fixed deadline.
    /// On any failure after the grant, the grant is released: a failed
    /// create has no side effects.
    pub async fn create_hold(
        &self,
        caller: &Caller,
        req: CreateHoldRequest,
    ) -> Result<Reservation, EngineError> {
        if req.room_count < 1 {
            return Err(EngineError::ValidationFailed(
                "room_count must be at least 1".to_string(),
            ));
        }
        if req.guest_count < 1 {
            return Err(EngineError::ValidationFailed(
                "guest_count must be at least 1".to_string(),
            ));
        }
        if req.stay.nights() < 1 {
            return Err(EngineError::ValidationFailed(
                "check_out must be after check_in".to_string(),
            ));
        }
        if !(0..=10_000).contains(&req.package_discount_bps) {
            return Err(EngineError::ValidationFailed(
                "package_discount_bps must be between 0 and 10000".to_string(),
            ));
        }

        let grant = self
            .ledger
            .try_reserve(req.room_type_id, req.stay, req.room_count)
            .await?;

        let mut nightly_rates = Vec::with_capacity(req.stay.nights() as usize);
        for night in req.stay.iter_nights() {
            match self.catalog.base_rate(req.room_type_id, night).await {
                Ok(rate) => nightly_rates.push(rate),
                Err(err) => {
                    self.ledger.release(&grant).await?;
                    return Err(err);
                }
            }
        }

        let snapshot = self.pricing.compute(&PriceQuote {
            nightly_rates: nightly_rates.clone(),
            room_count: req.room_count as i64,
            package_discount_bps: req.package_discount_bps,
            codes: Vec::new(),
        });

        let expires_at = Utc::now() + Duration::seconds(self.config.hold_ttl_seconds);
        let reservation = Reservation::new(
            caller.account_id.clone(),
            req.hotel_id,
            req.room_type_id,
            req.stay,
            req.room_count,
            req.guest_count,
            grant.clone(),
            nightly_rates,
            req.package_discount_bps,
            snapshot,
            expires_at,
        );

        if let Err(err) = self.store.insert(&reservation).await {
            self.ledger.release(&grant).await?;
            return Err(err);
        }

        let event = HoldCreatedEvent {
            reservation_id: reservation.id,
            room_type_id: reservation.room_type_id,
            check_in: reservation.stay.check_in,
            check_out: reservation.stay.check_out,
            room_count: reservation.room_count,
            expires_at,
        };
        tracing::info!(?event, "hold created");

        Ok(reservation)
    }

    /// Current state, for reload-safe client rehydration. A foreign id reads
    /// the same as a bad one.
    pub async fn get(&self, caller: &Caller, id: Uuid) -> Result<Reservation, EngineError> {
        let reservation = self
            .store
            .get(id)
            .await?
            .ok_or(EngineError::NotFound(id))?;
        if !caller.may_act_on(&reservation.account_id) {
            return Err(EngineError::NotFound(id));
        }
        Ok(reservation)
    }

    async fn get_owned(&self, caller: &Caller, id: Uuid) -> Result<Reservation, EngineError> {
        let reservation = self
            .store
            .get(id)
            .await?
            .ok_or(EngineError::NotFound(id))?;
        if !caller.may_act_on(&reservation.account_id) {
            return Err(EngineError::Forbidden(
                "reservation belongs to another account".to_string(),
            ));
        }
        Ok(reservation)
    }

    /// Drive an overdue hold through the expiry path and report `Expired`.
    /// Losing the internal race is fine: the sweeper produced the same
    /// outcome.
    async fn expired(&self, reservation: Reservation) -> EngineError {
        let expired_at = reservation.expires_at.unwrap_or_else(Utc::now);
        let id = reservation.id;
        if let Err(err) = self.expire(&reservation).await {
            tracing::warn!(reservation_id = %id, error = %err, "lazy expiry failed");
        }
        EngineError::Expired {
            reservation_id: id,
            expired_at,
        }
    }

    /// Map a resolved (non-held) status to the error a pre-confirmation
    /// operation should report.
    fn resolved_error(reservation: &Reservation) -> EngineError {
        if reservation.was_expired() {
            EngineError::Expired {
                reservation_id: reservation.id,
                expired_at: reservation.updated_at,
            }
        } else {
            EngineError::Conflict(reservation.id)
        }
    }

    /// CREATED -> AWAITING_CONFIRMATION. Attaching payment details does not
    /// extend the hold: the deadline stays fixed at creation time.
    pub async fn attach_guest_and_payment(
        &self,
        caller: &Caller,
        id: Uuid,
        guest_contact: GuestContact,
        payment_method: String,
    ) -> Result<Reservation, EngineError> {
        let reservation = self.get_owned(caller, id).await?;

        if reservation.status != ReservationStatus::Created {
            return Err(Self::resolved_error(&reservation));
        }
        if reservation.is_expired_at(Utc::now()) {
            return Err(self.expired(reservation).await);
        }

        let mut next = reservation.clone();
        next.status = ReservationStatus::AwaitingConfirmation;
        next.guest_contact = Some(guest_contact);
        next.payment_method = Some(payment_method);
        next.updated_at = Utc::now();

        self.store.update(reservation.version, &next).await
    }

    /// Apply one promotional code and replace the price snapshot. Rejection
    /// leaves the snapshot untouched.
    pub async fn apply_discount_code(
        &self,
        caller: &Caller,
        id: Uuid,
        code: &str,
    ) -> Result<Reservation, EngineError> {
        let reservation = self.get_owned(caller, id).await?;

        if !reservation.status.holds_inventory() {
            return Err(Self::resolved_error(&reservation));
        }
        if reservation.is_expired_at(Utc::now()) {
            return Err(self.expired(reservation).await);
        }

        if reservation.applied_codes.len() >= self.config.max_discount_codes {
            return Err(EngineError::DiscountRejected {
                code: code.to_string(),
                reason: format!(
                    "at most {} discount codes may be applied",
                    self.config.max_discount_codes
                ),
            });
        }
        if reservation.applied_codes.iter().any(|g| g.code == code) {
            return Err(EngineError::DiscountRejected {
                code: code.to_string(),
                reason: "code already applied".to_string(),
            });
        }

        let grant = self
            .discounts
            .validate(
                code,
                &reservation.account_id,
                reservation.hotel_id,
                reservation.room_type_id,
                reservation.price_snapshot.subtotal,
                reservation.stay,
            )
            .await?;

        let mut codes = reservation.applied_codes.clone();
        codes.push(grant);
        let snapshot = self.pricing.compute(&self.quote(&reservation, codes.clone()));

        let mut next = reservation.clone();
        next.applied_codes = codes;
        next.price_snapshot = snapshot;
        next.updated_at = Utc::now();

        self.store.update(reservation.version, &next).await
    }

    /// Remove an applied code and recompute the snapshot.
    pub async fn remove_discount_code(
        &self,
        caller: &Caller,
        id: Uuid,
        code: &str,
    ) -> Result<Reservation, EngineError> {
        let reservation = self.get_owned(caller, id).await?;

        if !reservation.status.holds_inventory() {
            return Err(Self::resolved_error(&reservation));
        }
        if reservation.is_expired_at(Utc::now()) {
            return Err(self.expired(reservation).await);
        }

        if !reservation.applied_codes.iter().any(|g| g.code == code) {
            return Err(EngineError::DiscountRejected {
                code: code.to_string(),
                reason: "code is not applied to this reservation".to_string(),
            });
        }

        let codes: Vec<DiscountGrant> = reservation
            .applied_codes
            .iter()
            .filter(|g| g.code != code)
            .cloned()
            .collect();
        let snapshot = self.pricing.compute(&self.quote(&reservation, codes.clone()));

        let mut next = reservation.clone();
        next.applied_codes = codes;
        next.price_snapshot = snapshot;
        next.updated_at = Utc::now();

        self.store.update(reservation.version, &next).await
    }

    /// Finalize the hold into a confirmed booking. Idempotent: a repeat call
    /// after success returns the confirmed reservation and re-issues the
    /// (grant-idempotent) ledger commit rather than double-committing.
    ///
    /// Every applied code is re-validated here; a rejection leaves the
    /// reservation in AWAITING_CONFIRMATION so the caller can remove the
    /// offending code and retry within the remaining TTL.
    pub async fn confirm(
        &self,
        caller: &Caller,
        id: Uuid,
        payment_reference: String,
    ) -> Result<Reservation, EngineError> {
        let reservation = self.get_owned(caller, id).await?;

        match reservation.status {
            ReservationStatus::Confirmed => {
                // Repeat call (client retry or duplicate gateway callback).
                self.ledger.commit(&reservation.grant).await?;
                return Ok(reservation);
            }
            ReservationStatus::Cancelled => {
                self.ledger.release(&reservation.grant).await?;
                return Err(Self::resolved_error(&reservation));
            }
            ReservationStatus::Created => {
                return Err(EngineError::ValidationFailed(
                    "guest and payment details not attached".to_string(),
                ))
            }
            ReservationStatus::CheckedIn
            | ReservationStatus::CheckedOut
            | ReservationStatus::Completed => return Err(EngineError::Conflict(id)),
            ReservationStatus::AwaitingConfirmation => {}
        }

        let now = Utc::now();
        if reservation.is_expired_at(now) {
            return Err(self.expired(reservation).await);
        }

        // Conditions may have moved since apply time; each code must still
        // hold, and the snapshot is rebuilt from the fresh grants.
        let mut fresh_codes = Vec::with_capacity(reservation.applied_codes.len());
        for applied in &reservation.applied_codes {
            let fresh = self
                .discounts
                .validate(
                    &applied.code,
                    &reservation.account_id,
                    reservation.hotel_id,
                    reservation.room_type_id,
                    reservation.price_snapshot.subtotal,
                    reservation.stay,
                )
                .await?;
            fresh_codes.push(fresh);
        }
        let snapshot = self
            .pricing
            .compute(&self.quote(&reservation, fresh_codes.clone()));

        let mut next = reservation.clone();
        next.status = ReservationStatus::Confirmed;
        next.expires_at = None;
        next.payment_reference = Some(payment_reference);
        next.applied_codes = fresh_codes;
        next.price_snapshot = snapshot;
        next.updated_at = now;

        match self.store.update(reservation.version, &next).await {
            Ok(stored) => {
                self.ledger.commit(&stored.grant).await?;
                for code in &stored.applied_codes {
                    if let Err(err) = self
                        .discounts
                        .record_usage(&code.code, &stored.account_id)
                        .await
                    {
                        tracing::warn!(code = %code.code, error = %err, "usage recording failed");
                    }
                }

                let event = ReservationConfirmedEvent {
                    reservation_id: stored.id,
                    account_id: stored.account_id.clone(),
                    payment_reference: stored.payment_reference.clone().unwrap_or_default(),
                    total: stored.price_snapshot.total,
                    timestamp: now.timestamp(),
                };
                tracing::info!(?event, "reservation confirmed");
                Ok(stored)
            }
            Err(EngineError::Conflict(_)) => {
                // Someone else got there first; report what they decided.
                let current = self
                    .store
                    .get(id)
                    .await?
                    .ok_or(EngineError::NotFound(id))?;
                match current.status {
                    ReservationStatus::Confirmed => {
                        self.ledger.commit(&current.grant).await?;
                        Ok(current)
                    }
                    ReservationStatus::Cancelled => {
                        self.ledger.release(&current.grant).await?;
                        Err(Self::resolved_error(&current))
                    }
                    _ => Err(EngineError::Conflict(id)),
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Cancel a pre-confirmation hold and release its capacity. Idempotent;
    /// usable any time including past expiry as a cleanup path. A repeat
    /// call re-issues the grant-idempotent release, so a cancel whose
    /// release failed after the status write heals on retry instead of
    /// leaking held units.
    pub async fn cancel(
        &self,
        caller: &Caller,
        id: Uuid,
        reason: &str,
    ) -> Result<Reservation, EngineError> {
        let reservation = self.get_owned(caller, id).await?;

        match reservation.status {
            ReservationStatus::Cancelled => {
                self.ledger.release(&reservation.grant).await?;
                return Ok(reservation);
            }
            ReservationStatus::Created | ReservationStatus::AwaitingConfirmation => {}
            // Post-confirmation cancellation is a refund flow, not a hold
            // release.
            _ => return Err(EngineError::Conflict(id)),
        }

        let mut next = reservation.clone();
        next.status = ReservationStatus::Cancelled;
        next.cancel_reason = Some(reason.to_string());
        next.expires_at = None;
        next.updated_at = Utc::now();

        match self.store.update(reservation.version, &next).await {
            Ok(stored) => {
                self.ledger.release(&stored.grant).await?;
                let event = ReservationCancelledEvent {
                    reservation_id: stored.id,
                    reason: reason.to_string(),
                    timestamp: stored.updated_at.timestamp(),
                };
                tracing::info!(?event, "reservation cancelled");
                Ok(stored)
            }
            Err(EngineError::Conflict(_)) => {
                let current = self
                    .store
                    .get(id)
                    .await?
                    .ok_or(EngineError::NotFound(id))?;
                match current.status {
                    ReservationStatus::Cancelled => {
                        self.ledger.release(&current.grant).await?;
                        Ok(current)
                    }
                    _ => Err(EngineError::Conflict(id)),
                }
            }
            Err(err) => Err(err),
        }
    }

    /// CONFIRMED -> CHECKED_IN -> CHECKED_OUT -> COMPLETED.
    pub async fn advance_stay(
        &self,
        caller: &Caller,
        id: Uuid,
        event: StayEvent,
    ) -> Result<Reservation, EngineError> {
        let reservation = self.get_owned(caller, id).await?;

        let target = match (reservation.status, event) {
            (ReservationStatus::Confirmed, StayEvent::CheckIn) => ReservationStatus::CheckedIn,
            (ReservationStatus::CheckedIn, StayEvent::CheckOut) => ReservationStatus::CheckedOut,
            (ReservationStatus::CheckedOut, StayEvent::Complete) => ReservationStatus::Completed,
            (status, event) => {
                return Err(EngineError::ValidationFailed(format!(
                    "cannot apply {event:?} to a {} reservation",
                    status.as_str()
                )))
            }
        };

        let mut next = reservation.clone();
        next.status = target;
        next.updated_at = Utc::now();
        self.store.update(reservation.version, &next).await
    }

    /// Expired holds due for sweeping, oldest deadline first.
    pub async fn due_for_expiry(&self, limit: usize) -> Result<Vec<Reservation>, EngineError> {
        self.store.list_expired(Utc::now(), limit).await
    }

    /// Cancel one overdue hold with reason EXPIRED. Returns whether this
    /// caller performed the sweep; losing the CAS to a concurrent confirm or
    /// another sweeper is a normal no-op outcome.
    pub async fn expire(&self, stale: &Reservation) -> Result<bool, EngineError> {
        if !stale.status.holds_inventory() || !stale.is_expired_at(Utc::now()) {
            return Ok(false);
        }

        let mut next = stale.clone();
        next.status = ReservationStatus::Cancelled;
        next.cancel_reason = Some(CANCEL_REASON_EXPIRED.to_string());
        next.expires_at = None;
        next.updated_at = Utc::now();

        match self.store.update(stale.version, &next).await {
            Ok(stored) => {
                self.ledger.release(&stored.grant).await?;
                tracing::info!(reservation_id = %stored.id, "hold expired, capacity released");
                Ok(true)
            }
            Err(EngineError::Conflict(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }
}
