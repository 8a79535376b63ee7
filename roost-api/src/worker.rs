use std::sync::Arc;
use std::time::Duration;

use roost_reservation::{ExpirySweeper, ReservationEngine};
use roost_store::app_config::BusinessRules;

/// Spawns the background expiry sweep. Holds past their deadline are
/// cancelled and their capacity released within one sweep interval.
pub fn start_expiry_worker(
    engine: Arc<ReservationEngine>,
    rules: &BusinessRules,
) -> tokio::task::JoinHandle<()> {
    let sweeper = ExpirySweeper::new(
        engine,
        Duration::from_secs(rules.sweep_interval_seconds),
        rules.sweep_batch_size,
    );
    tokio::spawn(sweeper.run())
}
