pub mod app_config;
pub mod database;
pub mod memory;
pub mod pg;

pub use app_config::Config;
pub use database::DbClient;
pub use memory::MemoryHoldStore;
pub use pg::{PgHoldStore, PgInventoryLedger};
