pub mod inventory;
pub mod pricing;
pub mod rates;
pub mod rules;

pub use inventory::{LedgerConfig, MemoryInventoryLedger};
pub use pricing::{PriceConfig, PriceEngine, PriceQuote};
pub use rates::{RoomTypeEntry, StaticCatalog};
pub use rules::{DiscountRule, StaticDiscountValidator};
