//! ==============================================================================
//! sensor.rs - bounded, async access to the particulate sensor
//! ==============================================================================
//!
//! purpose:
//!     turns the blocking driver call into a Reading: runs the driver on the
//!     blocking pool, bounds it with a timeout, stamps the capture time and
//!     derives the aqi.
//!
//! relationships:
//!     - used by: sampler.rs (every tick), query.rs (current reading)
//!     - uses: hal.rs (SensorDriver), aqi.rs
//!
//! ==============================================================================

use crate::aqi;
use crate::domain::Reading;
use crate::error::{CoreError, Result};
use crate::hal::SensorDriver;

use std::sync::Arc;
use std::time::Duration;

/// clone-able handle shared by the sampler and the web handlers
#[derive(Clone)]
pub struct SensorReader {
    driver: Arc<dyn SensorDriver>,
    timeout: Duration,
}

impl SensorReader {
    pub fn new(driver: Arc<dyn SensorDriver>, timeout: Duration) -> Self {
        Self { driver, timeout }
    }

    /// take one live reading
    ///
    /// a hung driver only costs the caller `timeout`; the blocking thread is
    /// left to finish on its own.
    pub async fn read(&self) -> Result<Reading> {
        let driver = self.driver.clone();
        let task = tokio::task::spawn_blocking(move || driver.read_now());

        let sample = match tokio::time::timeout(self.timeout, task).await {
            Err(_) => {
                return Err(CoreError::SensorUnavailable(format!(
                    "read timed out after {}ms",
                    self.timeout.as_millis()
                )))
            }
            Ok(Err(e)) => {
                return Err(CoreError::SensorUnavailable(format!("task join error: {}", e)))
            }
            Ok(Ok(Err(e))) => return Err(CoreError::SensorUnavailable(format!("{:#}", e))),
            Ok(Ok(Ok(sample))) => sample,
        };

        let aqi = aqi::compute(sample.pm2_5, sample.pm10);
        Ok(Reading::new(chrono::Utc::now(), sample.pm2_5, sample.pm10, aqi))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! scripted drivers shared by tests across modules

    use crate::domain::RawSample;
    use crate::hal::SensorDriver;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    /// returns a fixed sample, or fails while `failing` is set
    pub struct FixedSensor {
        pub sample: RawSample,
        pub failing: AtomicBool,
        pub calls: AtomicUsize,
    }

    impl FixedSensor {
        pub fn new(pm2_5: f64, pm10: f64) -> Self {
            Self {
                sample: RawSample { pm2_5, pm10 },
                failing: AtomicBool::new(false),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl SensorDriver for FixedSensor {
        fn read_now(&self) -> anyhow::Result<RawSample> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                anyhow::bail!("sensor unplugged");
            }
            Ok(self.sample)
        }
    }

    /// blocks for `delay` while `slow` is set, simulating a hung port
    pub struct SlowSensor {
        pub delay: Duration,
        pub slow: AtomicBool,
    }

    impl SensorDriver for SlowSensor {
        fn read_now(&self) -> anyhow::Result<RawSample> {
            if self.slow.load(Ordering::SeqCst) {
                std::thread::sleep(self.delay);
            }
            Ok(RawSample { pm2_5: 5.0, pm10: 10.0 })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn test_read_computes_aqi() {
        let reader = SensorReader::new(Arc::new(FixedSensor::new(10.0, 100.0)), Duration::from_secs(1));
        let reading = reader.read().await.unwrap();
        assert_eq!(reading.pm2_5, Some(10.0));
        assert_eq!(reading.pm10, Some(100.0));
        assert_eq!(reading.aqi, Some(73.0));
    }

    #[tokio::test]
    async fn test_driver_error_is_sensor_unavailable() {
        let sensor = Arc::new(FixedSensor::new(1.0, 1.0));
        sensor.failing.store(true, Ordering::SeqCst);
        let reader = SensorReader::new(sensor, Duration::from_secs(1));
        let err = reader.read().await.unwrap_err();
        assert!(matches!(err, CoreError::SensorUnavailable(ref m) if m.contains("unplugged")));
    }

    #[tokio::test]
    async fn test_hung_driver_times_out() {
        let sensor = Arc::new(SlowSensor {
            delay: Duration::from_millis(500),
            slow: AtomicBool::new(true),
        });
        let reader = SensorReader::new(sensor, Duration::from_millis(20));
        let started = std::time::Instant::now();
        let err = reader.read().await.unwrap_err();
        assert!(matches!(err, CoreError::SensorUnavailable(_)));
        assert!(started.elapsed() < Duration::from_millis(400));
    }
}
