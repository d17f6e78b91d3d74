//! ==============================================================================
//! sampler.rs - periodic background sampling
//! ==============================================================================
//!
//! purpose:
//!     on every tick take one reading and append it to the history. sampling
//!     is best effort: a failed sensor read or a failed append is logged and
//!     that tick's reading is gone. the next tick is the only retry.
//!
//! lifecycle:
//!
//!     spawn() ──> [ interval tick ] ──> tick() ──┐
//!                       ^                        │
//!                       └────────────────────────┘
//!     shutdown() ──> cancel token ──> wait grace period ──> abort if still busy
//!
//! relationships:
//!     - uses: sensor.rs (SensorReader), store.rs (MeasurementStore)
//!     - reports to: metrics.rs (tick outcome counters)
//!     - started/stopped by: main.rs
//!
//! ==============================================================================

use crate::metrics::{SensorMetrics, TickOutcome};
use crate::sensor::SensorReader;
use crate::store::MeasurementStore;

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub struct Sampler {
    reader: SensorReader,
    store: MeasurementStore,
    metrics: SensorMetrics,
    interval: Duration,
    show_sensor_data: bool,
}

impl Sampler {
    pub fn new(
        reader: SensorReader,
        store: MeasurementStore,
        metrics: SensorMetrics,
        interval: Duration,
    ) -> Self {
        Self {
            reader,
            store,
            metrics,
            interval,
            show_sensor_data: false,
        }
    }

    /// log every stored reading at info instead of debug
    pub fn show_sensor_data(mut self, show: bool) -> Self {
        self.show_sensor_data = show;
        self
    }

    /// one sampling attempt; never fails, the outcome is only reported
    pub async fn tick(&self) -> TickOutcome {
        let outcome = match self.reader.read().await {
            Err(e) => {
                tracing::warn!(error = %e, "Sensor read failed, skipping tick");
                TickOutcome::SensorError
            }
            Ok(reading) => match self.store.append(&reading).await {
                Ok(()) => {
                    if self.show_sensor_data {
                        tracing::info!(
                            pm2_5 = ?reading.pm2_5,
                            pm10 = ?reading.pm10,
                            aqi = ?reading.aqi,
                            "[SDS011] reading stored"
                        );
                    } else {
                        tracing::debug!(timestamp = %reading.timestamp, "reading stored");
                    }
                    TickOutcome::Stored
                }
                Err(e) => {
                    tracing::error!(error = %e, key = %self.store.key(), "Append failed, reading dropped");
                    TickOutcome::StoreError
                }
            },
        };
        self.metrics.record_tick(outcome);
        outcome
    }

    /// start the timer loop; the first tick fires one interval from now.
    /// cancelling `parent` stops the loop too.
    pub fn spawn(self, parent: &CancellationToken, grace: Duration) -> SamplerHandle {
        let cancel = parent.child_token();
        let loop_cancel = cancel.clone();

        let task = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + self.interval;
            let mut ticker = tokio::time::interval_at(start, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::info!(interval_seconds = self.interval.as_secs(), "Sampler started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.tick().await;
                    }
                    () = loop_cancel.cancelled() => {
                        break;
                    }
                }
            }
            tracing::info!("Sampler stopped");
        });

        SamplerHandle { cancel, task, grace }
    }
}

pub struct SamplerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
    grace: Duration,
}

impl SamplerHandle {
    /// stop ticking; an in-flight tick gets `grace` to finish before it is aborted
    pub async fn shutdown(self) {
        self.cancel.cancel();

        let abort = self.task.abort_handle();
        match tokio::time::timeout(self.grace, self.task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "Sampler task failed"),
            Err(_) => {
                tracing::warn!(grace_ms = self.grace.as_millis() as u64, "Sampler tick still running after grace period, abandoning");
                abort.abort();
            }
        }
    }
}
