pub mod expiry;
pub mod machine;
pub mod payment;

pub use expiry::ExpirySweeper;
pub use machine::{CreateHoldRequest, EngineConfig, ReservationEngine, StayEvent};
pub use payment::{MockPaymentGateway, PaymentOrchestrator};
