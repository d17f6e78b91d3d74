//! ==============================================================================
//! metrics.rs - prometheus registry for the scrape endpoint
//! ==============================================================================
//!
//! purpose:
//!     the registry is built once at startup and handed to the web state and
//!     the sampler; nothing here is global.
//!
//! exported:
//!     - sensor_reading{type="pm25|pm10|aqi"}: latest reading, set on scrape
//!     - sampler_ticks_total{outcome="stored|sensor_error|store_error"}
//!
//! relationships:
//!     - written by: sampler.rs (tick outcomes), server.rs (gauges)
//!
//! ==============================================================================

use crate::projector::Gauges;
use prometheus::{Encoder, GaugeVec, IntCounterVec, Opts, Registry, TextEncoder};

/// outcome label values for `sampler_ticks_total`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    Stored,
    SensorError,
    StoreError,
}

impl TickOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            TickOutcome::Stored => "stored",
            TickOutcome::SensorError => "sensor_error",
            TickOutcome::StoreError => "store_error",
        }
    }
}

#[derive(Clone)]
pub struct SensorMetrics {
    registry: Registry,
    sensor_reading: GaugeVec,
    sampler_ticks: IntCounterVec,
}

impl SensorMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let sensor_reading = GaugeVec::new(
            Opts::new("sensor_reading", "PM25, PM10 and AQI level readings"),
            &["type"],
        )?;
        let sampler_ticks = IntCounterVec::new(
            Opts::new("sampler_ticks_total", "Sampler ticks by outcome"),
            &["outcome"],
        )?;

        registry.register(Box::new(sensor_reading.clone()))?;
        registry.register(Box::new(sampler_ticks.clone()))?;

        Ok(Self { registry, sensor_reading, sampler_ticks })
    }

    pub fn record_tick(&self, outcome: TickOutcome) {
        self.sampler_ticks.with_label_values(&[outcome.as_str()]).inc();
    }

    #[cfg(test)]
    pub fn tick_count(&self, outcome: TickOutcome) -> u64 {
        self.sampler_ticks.with_label_values(&[outcome.as_str()]).get()
    }

    /// set the reading gauges and encode the whole registry in text format
    pub fn render(&self, gauges: &Gauges) -> Result<String, prometheus::Error> {
        for (kind, value) in gauges.iter() {
            self.sensor_reading.with_label_values(&[kind]).set(value);
        }

        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_gauges() {
        let metrics = SensorMetrics::new().unwrap();
        let text = metrics
            .render(&Gauges { pm25: 12.5, pm10: 20.0, aqi: 52.0 })
            .unwrap();
        assert!(text.contains("sensor_reading{type=\"pm25\"} 12.5"));
        assert!(text.contains("sensor_reading{type=\"pm10\"} 20"));
        assert!(text.contains("sensor_reading{type=\"aqi\"} 52"));
    }

    #[test]
    fn test_tick_counters() {
        let metrics = SensorMetrics::new().unwrap();
        metrics.record_tick(TickOutcome::Stored);
        metrics.record_tick(TickOutcome::Stored);
        metrics.record_tick(TickOutcome::SensorError);
        assert_eq!(metrics.tick_count(TickOutcome::Stored), 2);
        assert_eq!(metrics.tick_count(TickOutcome::SensorError), 1);
        assert_eq!(metrics.tick_count(TickOutcome::StoreError), 0);

        let text = metrics.render(&Gauges { pm25: 0.0, pm10: 0.0, aqi: 0.0 }).unwrap();
        assert!(text.contains("sampler_ticks_total{outcome=\"stored\"} 2"));
    }

    #[test]
    fn test_registries_are_independent() {
        let a = SensorMetrics::new().unwrap();
        let b = SensorMetrics::new().unwrap();
        a.record_tick(TickOutcome::Stored);
        assert_eq!(b.tick_count(TickOutcome::Stored), 0);
    }
}
