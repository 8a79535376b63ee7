use std::sync::Arc;
use std::time::Duration;

use crate::machine::ReservationEngine;
use roost_core::EngineError;

/// Background sweep that releases abandoned holds.
///
/// Safe to run with multiple concurrent sweepers and against in-flight
/// confirms: each cancellation is the same compare-and-set every other
/// transition uses, so a hold is swept at most once and a lost race is a
/// no-op rather than an error.
pub struct ExpirySweeper {
    engine: Arc<ReservationEngine>,
    interval: Duration,
    batch_size: usize,
}

impl ExpirySweeper {
    pub fn new(engine: Arc<ReservationEngine>, interval: Duration, batch_size: usize) -> Self {
        Self {
            engine,
            interval,
            batch_size,
        }
    }

    /// One pass over the overdue holds. Returns how many this sweeper
    /// actually cancelled.
    pub async fn sweep_once(&self) -> Result<usize, EngineError> {
        let due = self.engine.due_for_expiry(self.batch_size).await?;
        let mut swept = 0;
        for reservation in &due {
            match self.engine.expire(reservation).await {
                Ok(true) => swept += 1,
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(reservation_id = %reservation.id, error = %err, "sweep failed");
                }
            }
        }
        Ok(swept)
    }

    /// Sweep loop. The interval bounds how long past its deadline a hold can
    /// keep capacity away from other customers.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(interval_ms = self.interval.as_millis() as u64, "expiry sweeper started");
        loop {
            ticker.tick().await;
            match self.sweep_once().await {
                Ok(0) => {}
                Ok(swept) => tracing::info!(swept, "expired holds released"),
                Err(err) => tracing::error!(error = %err, "expiry sweep pass failed"),
            }
        }
    }
}
