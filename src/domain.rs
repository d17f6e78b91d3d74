//! ==============================================================================
//! domain.rs - reading types shared across the host
//! ==============================================================================
//!
//! purpose:
//!     the single sample type that flows from the sensor through the store
//!     to the projections, plus the raw driver output it is built from.
//!
//! relationships:
//!     - RawSample: produced by hal.rs drivers
//!     - Reading: built by sensor.rs, persisted by store.rs as json
//!
//! ==============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// one particulate sample as captured from the sensor
///
/// serialized with the `pm2.5` key the dashboard and api clients expect.
/// pollutant values are optional on decode: a record written before a field
/// existed decodes with `None`.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Reading {
    /// capture time, sub-second precision
    pub timestamp: DateTime<Utc>,

    /// fine particulate matter, µg/m³
    #[serde(rename = "pm2.5", default)]
    pub pm2_5: Option<f64>,

    /// coarse particulate matter, µg/m³
    #[serde(default)]
    pub pm10: Option<f64>,

    /// us epa air quality index derived from pm2.5 and pm10
    #[serde(default)]
    pub aqi: Option<f64>,
}

impl Reading {
    pub fn new(timestamp: DateTime<Utc>, pm2_5: f64, pm10: f64, aqi: f64) -> Self {
        Self {
            timestamp,
            pm2_5: Some(pm2_5),
            pm10: Some(pm10),
            aqi: Some(aqi),
        }
    }

    /// timestamp with the fractional seconds dropped, used for chart labels
    pub fn label(&self) -> String {
        self.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// raw concentrations as returned by a sensor driver, before time-stamping
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawSample {
    pub pm2_5: f64,
    pub pm10: f64,
}
