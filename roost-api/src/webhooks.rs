use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::Deserialize;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PaymentWebhook {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub data: WebhookData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookData {
    pub object: PaymentIntentObject,
}

#[derive(Debug, Deserialize)]
pub struct PaymentIntentObject {
    pub id: String,
    pub status: String,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/webhooks/payments", post(handle_payment_webhook))
}

/// Gateway status callback. The intent status is fetched back from the
/// gateway rather than trusted from the payload, then mapped onto the
/// reservation by the orchestrator. Duplicate deliveries are absorbed by
/// the idempotent confirm/cancel underneath, so we always return 200 for a
/// known event type.
async fn handle_payment_webhook(
    State(state): State<AppState>,
    Json(payload): Json<PaymentWebhook>,
) -> Result<StatusCode, StatusCode> {
    tracing::info!(
        event = %payload.type_,
        intent_id = %payload.data.object.id,
        "payment webhook received"
    );

    if payload.type_ == "payment_intent.succeeded"
        || payload.type_ == "payment_intent.payment_failed"
        || payload.type_ == "payment_intent.canceled"
    {
        let intent_id = &payload.data.object.id;
        match state.payments.process_callback(intent_id).await {
            Ok(reservation) => {
                tracing::info!(
                    reservation_id = %reservation.id,
                    status = reservation.status.as_str(),
                    "payment webhook processed"
                );
            }
            // Only a transient failure earns a 5xx (and a gateway retry).
            // Definitive outcomes like an expired or already-resolved
            // reservation are acknowledged: redelivering can never change
            // them.
            Err(err) if err.is_retryable() => {
                tracing::error!(intent_id = %intent_id, error = %err, "payment webhook failed");
                return Err(StatusCode::SERVICE_UNAVAILABLE);
            }
            Err(err) => {
                tracing::warn!(
                    intent_id = %intent_id,
                    kind = err.kind(),
                    error = %err,
                    "payment webhook resolved against a settled reservation"
                );
            }
        }
    }

    Ok(StatusCode::OK)
}
