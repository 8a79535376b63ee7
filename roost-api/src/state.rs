use std::sync::Arc;

use roost_reservation::{PaymentOrchestrator, ReservationEngine};

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ReservationEngine>,
    pub payments: Arc<PaymentOrchestrator>,
    pub auth: AuthConfig,
}
