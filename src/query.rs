//! ==============================================================================
//! query.rs - read side of the pipeline
//! ==============================================================================
//!
//! purpose:
//!     answers the two questions the web layer asks: "what is the air like
//!     right now" (always a live sensor read) and "what did it look like
//!     lately" (the stored history, oldest first).
//!
//! relationships:
//!     - uses: sensor.rs (SensorReader), store.rs (MeasurementStore)
//!     - used by: server.rs
//!     - history on/off is fixed at startup by main.rs (Subsystem)
//!
//! ==============================================================================

use crate::domain::Reading;
use crate::error::{CoreError, Result};
use crate::sensor::SensorReader;
use crate::store::MeasurementStore;

/// whether the history subsystem was built at startup
#[derive(Clone)]
pub enum Subsystem {
    Disabled,
    Enabled(MeasurementStore),
}

#[derive(Clone)]
pub struct QueryService {
    reader: SensorReader,
    history: Subsystem,
    max_len: usize,
}

impl QueryService {
    pub fn new(reader: SensorReader, history: Subsystem, max_len: usize) -> Self {
        Self {
            reader,
            history,
            max_len: max_len.max(1),
        }
    }

    pub fn history_enabled(&self) -> bool {
        matches!(self.history, Subsystem::Enabled(_))
    }

    /// live sensor read; never served from history
    pub async fn current(&self) -> Result<Reading> {
        self.reader.read().await
    }

    /// up to `n` (capped at the configured maximum) readings, oldest first
    pub async fn historical(&self, n: usize) -> Result<Vec<Reading>> {
        let store = match &self.history {
            Subsystem::Disabled => return Err(CoreError::FeatureDisabled),
            Subsystem::Enabled(store) => store,
        };
        if n == 0 {
            return Err(CoreError::InvalidLength(n));
        }

        let mut readings = store.recent(n.min(self.max_len)).await?;
        readings.reverse();
        Ok(readings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::testing::{FixedSensor, SlowSensor};
    use crate::store::MemoryBackend;
    use chrono::TimeZone;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::time::Duration;

    fn reading(secs: i64, aqi: f64) -> Reading {
        let ts = chrono::Utc.timestamp_opt(secs, 0).unwrap();
        Reading::new(ts, 1.0, 2.0, aqi)
    }

    fn reader() -> SensorReader {
        SensorReader::new(Arc::new(FixedSensor::new(12.0, 54.0)), Duration::from_secs(1))
    }

    fn enabled() -> (QueryService, MeasurementStore) {
        let store = MeasurementStore::new(Arc::new(MemoryBackend::new()), "q", None);
        (QueryService::new(reader(), Subsystem::Enabled(store.clone()), 30), store)
    }

    #[tokio::test]
    async fn test_historical_is_chronological() {
        let (service, store) = enabled();
        for (t, aqi) in [(1, 10.0), (2, 20.0), (3, 30.0)] {
            store.append(&reading(t, aqi)).await.unwrap();
        }

        let history = service.historical(2).await.unwrap();
        assert_eq!(history, vec![reading(2, 20.0), reading(3, 30.0)]);

        let all = service.historical(30).await.unwrap();
        assert!(all.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[tokio::test]
    async fn test_historical_capped_at_max_len() {
        let (service, store) = enabled();
        for t in 0..40 {
            store.append(&reading(t, t as f64)).await.unwrap();
        }
        let history = service.historical(1000).await.unwrap();
        assert_eq!(history.len(), 30);
        assert_eq!(history.last().and_then(|r| r.aqi), Some(39.0));
    }

    #[tokio::test]
    async fn test_historical_empty_and_zero() {
        let (service, _) = enabled();
        assert!(service.historical(30).await.unwrap().is_empty());
        assert!(matches!(service.historical(0).await, Err(CoreError::InvalidLength(0))));
    }

    #[tokio::test]
    async fn test_disabled_rejects_history_but_serves_current() {
        let service = QueryService::new(reader(), Subsystem::Disabled, 30);
        assert!(!service.history_enabled());
        assert!(matches!(service.historical(30).await, Err(CoreError::FeatureDisabled)));

        let now = service.current().await.unwrap();
        assert_eq!(now.aqi, Some(50.0));
    }

    #[tokio::test]
    async fn test_current_bypasses_store() {
        use std::sync::atomic::Ordering;

        let sensor = Arc::new(FixedSensor::new(12.0, 54.0));
        let store = MeasurementStore::new(Arc::new(MemoryBackend::new()), "q", None);
        let service = QueryService::new(
            SensorReader::new(sensor.clone(), Duration::from_secs(1)),
            Subsystem::Enabled(store.clone()),
            30,
        );
        store.append(&reading(1, 99.0)).await.unwrap();

        let now = service.current().await.unwrap();
        assert_eq!(now.aqi, Some(50.0));
        assert_eq!(sensor.calls.load(Ordering::SeqCst), 1);

        service.current().await.unwrap();
        assert_eq!(sensor.calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.recent(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_current_timeout_is_sensor_unavailable() {
        let slow = SensorReader::new(
            Arc::new(SlowSensor {
                delay: Duration::from_millis(300),
                slow: AtomicBool::new(true),
            }),
            Duration::from_millis(20),
        );
        let (_, store) = enabled();
        let service = QueryService::new(slow, Subsystem::Enabled(store.clone()), 30);
        store.append(&reading(1, 10.0)).await.unwrap();

        // no fallback to the stored reading
        assert!(matches!(service.current().await, Err(CoreError::SensorUnavailable(_))));
    }

    #[tokio::test]
    async fn test_hung_sensor_fails_current_and_tick_independently() {
        use crate::metrics::{SensorMetrics, TickOutcome};
        use crate::sampler::Sampler;
        use std::sync::atomic::Ordering;

        let sensor = Arc::new(SlowSensor {
            delay: Duration::from_millis(300),
            slow: AtomicBool::new(true),
        });
        let reader = SensorReader::new(sensor.clone(), Duration::from_millis(30));
        let store = MeasurementStore::new(Arc::new(MemoryBackend::new()), "race", None);
        let service = QueryService::new(reader.clone(), Subsystem::Enabled(store.clone()), 30);
        let sampler = Sampler::new(reader, store.clone(), SensorMetrics::new().unwrap(), Duration::from_secs(60));

        let (now, tick) = tokio::join!(service.current(), sampler.tick());
        assert!(matches!(now, Err(CoreError::SensorUnavailable(_))));
        assert_eq!(tick, TickOutcome::SensorError);
        assert!(service.historical(30).await.unwrap().is_empty());

        sensor.slow.store(false, Ordering::SeqCst);
        assert_eq!(sampler.tick().await, TickOutcome::Stored);
        assert_eq!(service.historical(30).await.unwrap().len(), 1);
    }
}
