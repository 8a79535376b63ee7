pub mod events;
pub mod pii;
pub mod stay;

pub use pii::Masked;
pub use stay::StayRange;
