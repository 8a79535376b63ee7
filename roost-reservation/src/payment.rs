use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use roost_core::identity::Caller;
use roost_core::payment::{PaymentGateway, PaymentIntent, PaymentStatus};
use roost_core::reservation::{Reservation, CANCEL_REASON_PAYMENT_FAILED};
use roost_core::EngineError;
use uuid::Uuid;

use crate::machine::ReservationEngine;

/// Maps the payment gateway's asynchronous status callbacks onto the
/// reservation state machine: succeeded -> confirm, failed/canceled ->
/// cancel. Duplicate callbacks are harmless because confirm is idempotent.
pub struct PaymentOrchestrator {
    gateway: Arc<dyn PaymentGateway>,
    engine: Arc<ReservationEngine>,
}

impl PaymentOrchestrator {
    pub fn new(gateway: Arc<dyn PaymentGateway>, engine: Arc<ReservationEngine>) -> Self {
        Self { gateway, engine }
    }

    /// Outbound leg: open an intent with the gateway for the reservation's
    /// current total.
    pub async fn initialize_payment(
        &self,
        reservation: &Reservation,
    ) -> Result<PaymentIntent, EngineError> {
        self.gateway
            .create_intent(
                reservation.id,
                reservation.price_snapshot.total,
                self.engine.currency(),
            )
            .await
    }

    /// Inbound leg: resolve a status callback keyed by intent reference.
    pub async fn process_callback(&self, intent_id: &str) -> Result<Reservation, EngineError> {
        let intent = self.gateway.get_intent(intent_id).await?;
        let system = Caller::system();

        match intent.status {
            PaymentStatus::Succeeded => {
                self.engine
                    .confirm(&system, intent.reservation_id, intent.id.clone())
                    .await
            }
            PaymentStatus::Failed | PaymentStatus::Canceled => {
                self.engine
                    .cancel(&system, intent.reservation_id, CANCEL_REASON_PAYMENT_FAILED)
                    .await
            }
            // Not final yet; report current state unchanged.
            _ => self.engine.get(&system, intent.reservation_id).await,
        }
    }
}

/// Gateway stand-in for tests and local runs. Encodes the reservation id in
/// the intent reference so `get_intent` can recover it, and reports the
/// configured terminal status.
pub struct MockPaymentGateway {
    outcome: PaymentStatus,
}

impl MockPaymentGateway {
    pub fn succeeding() -> Self {
        Self {
            outcome: PaymentStatus::Succeeded,
        }
    }

    pub fn failing() -> Self {
        Self {
            outcome: PaymentStatus::Failed,
        }
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_intent(
        &self,
        reservation_id: Uuid,
        amount: i64,
        currency: &str,
    ) -> Result<PaymentIntent, EngineError> {
        Ok(PaymentIntent {
            id: format!("mock_pi_{}", reservation_id.simple()),
            reservation_id,
            amount,
            currency: currency.to_string(),
            status: PaymentStatus::RequiresPaymentMethod,
            client_secret: Some("mock_secret".to_string()),
            created_at: Utc::now(),
        })
    }

    async fn get_intent(&self, intent_id: &str) -> Result<PaymentIntent, EngineError> {
        let raw = intent_id.strip_prefix("mock_pi_").ok_or_else(|| {
            EngineError::ValidationFailed(format!("unknown payment intent {intent_id}"))
        })?;
        let reservation_id = Uuid::parse_str(raw).map_err(|_| {
            EngineError::ValidationFailed(format!("unknown payment intent {intent_id}"))
        })?;

        Ok(PaymentIntent {
            id: intent_id.to_string(),
            reservation_id,
            amount: 0,
            currency: "USD".to_string(),
            status: self.outcome.clone(),
            client_secret: None,
            created_at: Utc::now(),
        })
    }
}
