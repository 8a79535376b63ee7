pub mod catalog;
pub mod discount;
pub mod error;
pub mod identity;
pub mod payment;
pub mod repository;
pub mod reservation;

pub use error::EngineError;
