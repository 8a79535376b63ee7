use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, patch, post},
    Extension, Json, Router,
};
use chrono::Utc;
use roost_core::identity::Caller;
use roost_core::reservation::{GuestContact, Reservation, CANCEL_REASON_USER};
use roost_reservation::{CreateHoldRequest, StayEvent};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ReservationResponse {
    #[serde(flatten)]
    reservation: Reservation,
    /// Remaining hold time, absent once the reservation no longer carries a
    /// deadline.
    #[serde(skip_serializing_if = "Option::is_none")]
    seconds_to_expiry: Option<i64>,
}

impl From<Reservation> for ReservationResponse {
    fn from(reservation: Reservation) -> Self {
        let seconds_to_expiry = reservation.seconds_to_expiry(Utc::now());
        Self {
            reservation,
            seconds_to_expiry,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GuestAndPaymentRequest {
    pub guest_contact: GuestContact,
    pub payment_method: String,
}

#[derive(Debug, Deserialize)]
pub struct ApplyDiscountRequest {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub payment_reference: String,
}

#[derive(Debug, Serialize)]
pub struct PaymentIntentResponse {
    pub intent_id: String,
    pub amount: i64,
    pub currency: String,
    pub client_secret: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/reservations", post(create_reservation))
        .route("/v1/reservations/{id}", get(get_reservation))
        .route(
            "/v1/reservations/{id}/guest-and-payment",
            patch(attach_guest_and_payment),
        )
        .route(
            "/v1/reservations/{id}/discount-codes",
            post(apply_discount_code),
        )
        .route(
            "/v1/reservations/{id}/discount-codes/{code}",
            delete(remove_discount_code),
        )
        .route(
            "/v1/reservations/{id}/payment-intent",
            post(create_payment_intent),
        )
        .route("/v1/reservations/{id}/confirm", post(confirm_reservation))
        .route("/v1/reservations/{id}/cancel", post(cancel_reservation))
        .route("/v1/reservations/{id}/stay", post(advance_stay))
}

async fn create_reservation(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<CreateHoldRequest>,
) -> Result<(StatusCode, Json<ReservationResponse>), ApiError> {
    let reservation = state.engine.create_hold(&caller, req).await?;
    Ok((StatusCode::CREATED, Json(reservation.into())))
}

async fn get_reservation(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReservationResponse>, ApiError> {
    let reservation = state.engine.get(&caller, id).await?;
    Ok(Json(reservation.into()))
}

async fn attach_guest_and_payment(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    Json(req): Json<GuestAndPaymentRequest>,
) -> Result<Json<ReservationResponse>, ApiError> {
    let reservation = state
        .engine
        .attach_guest_and_payment(&caller, id, req.guest_contact, req.payment_method)
        .await?;
    Ok(Json(reservation.into()))
}

async fn apply_discount_code(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    Json(req): Json<ApplyDiscountRequest>,
) -> Result<Json<ReservationResponse>, ApiError> {
    let reservation = state
        .engine
        .apply_discount_code(&caller, id, &req.code)
        .await?;
    Ok(Json(reservation.into()))
}

async fn remove_discount_code(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path((id, code)): Path<(Uuid, String)>,
) -> Result<Json<ReservationResponse>, ApiError> {
    let reservation = state
        .engine
        .remove_discount_code(&caller, id, &code)
        .await?;
    Ok(Json(reservation.into()))
}

/// Opens a gateway intent for the reservation's current total. The gateway's
/// asynchronous callback lands on the webhook endpoint and resolves the
/// reservation from there.
async fn create_payment_intent(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentIntentResponse>, ApiError> {
    let reservation = state.engine.get(&caller, id).await?;
    let intent = state.payments.initialize_payment(&reservation).await?;
    Ok(Json(PaymentIntentResponse {
        intent_id: intent.id,
        amount: intent.amount,
        currency: intent.currency,
        client_secret: intent.client_secret,
    }))
}

async fn confirm_reservation(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    Json(req): Json<ConfirmRequest>,
) -> Result<Json<ReservationResponse>, ApiError> {
    let reservation = state
        .engine
        .confirm(&caller, id, req.payment_reference)
        .await?;
    Ok(Json(reservation.into()))
}

async fn cancel_reservation(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReservationResponse>, ApiError> {
    let reservation = state
        .engine
        .cancel(&caller, id, CANCEL_REASON_USER)
        .await?;
    Ok(Json(reservation.into()))
}

#[derive(Debug, Deserialize)]
pub struct StayEventRequest {
    pub event: StayEvent,
}

async fn advance_stay(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    Json(req): Json<StayEventRequest>,
) -> Result<Json<ReservationResponse>, ApiError> {
    let reservation = state.engine.advance_stay(&caller, id, req.event).await?;
    Ok(Json(reservation.into()))
}
