//! ==============================================================================
//! projector.rs - chart and gauge views of readings
//! ==============================================================================
//!
//! purpose:
//!     pure projections of readings, no i/o. the chart projection feeds the
//!     chart.js dashboard; the gauges feed the prometheus scrape.
//!
//! relationships:
//!     - input: domain::Reading (from query.rs)
//!     - used by: server.rs (dashboard, /metrics)
//!
//! ==============================================================================

use crate::domain::Reading;
use crate::error::{CoreError, Result};
use serde::Serialize;

/// most readings a chart will ever show
pub const CHART_MAX_POINTS: usize = 30;

/// chart.js dataset: values plus fixed styling
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Series {
    pub label: &'static str,
    pub data: Vec<Option<f64>>,
    pub background_color: &'static str,
    pub border_color: &'static str,
    pub border_width: u8,
}

impl Series {
    fn new(label: &'static str, color: &'static str, data: Vec<Option<f64>>) -> Self {
        Self {
            label,
            data,
            background_color: color,
            border_color: color,
            border_width: 3,
        }
    }
}

/// oldest-first labels with one aligned value per label in each series
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ChartProjection {
    pub labels: Vec<String>,
    pub aqi: Series,
    pub pm10: Series,
    pub pm2: Series,
}

/// flat gauge values for one reading
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Gauges {
    pub pm25: f64,
    pub pm10: f64,
    pub aqi: f64,
}

impl Gauges {
    /// (type label, value) pairs in a fixed order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> {
        [("pm25", self.pm25), ("pm10", self.pm10), ("aqi", self.aqi)].into_iter()
    }
}

/// chart projection of a chronological slice; only the newest
/// `CHART_MAX_POINTS` readings are kept
pub fn to_chart(readings: &[Reading]) -> ChartProjection {
    let start = readings.len().saturating_sub(CHART_MAX_POINTS);
    let window = &readings[start..];

    ChartProjection {
        labels: window.iter().map(Reading::label).collect(),
        aqi: Series::new("aqi", "#181d27", window.iter().map(|r| r.aqi).collect()),
        pm10: Series::new("pm10", "#cc0000", window.iter().map(|r| r.pm10).collect()),
        pm2: Series::new("pm2.5", "#42C0FB", window.iter().map(|r| r.pm2_5).collect()),
    }
}

pub fn to_gauges(reading: &Reading) -> Result<Gauges> {
    Ok(Gauges {
        pm25: reading.pm2_5.ok_or(CoreError::MissingField("pm2.5"))?,
        pm10: reading.pm10.ok_or(CoreError::MissingField("pm10"))?,
        aqi: reading.aqi.ok_or(CoreError::MissingField("aqi"))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn series(k: usize) -> Vec<Reading> {
        (0..k)
            .map(|i| {
                let ts = chrono::Utc.timestamp_opt(1_700_000_000 + i as i64, 500_000_000).unwrap();
                Reading::new(ts, i as f64 + 0.5, i as f64 * 2.0, i as f64)
            })
            .collect()
    }

    #[test]
    fn test_alignment() {
        for k in [0, 1, 29, 30, 31, 45] {
            let chart = to_chart(&series(k));
            let expected = k.min(CHART_MAX_POINTS);
            assert_eq!(chart.labels.len(), expected);
            assert_eq!(chart.aqi.data.len(), expected);
            assert_eq!(chart.pm10.data.len(), expected);
            assert_eq!(chart.pm2.data.len(), expected);
        }
    }

    #[test]
    fn test_truncation_keeps_newest_30() {
        let input = series(45);
        let chart = to_chart(&input);
        assert_eq!(chart.aqi.data.first(), Some(&Some(15.0)));
        assert_eq!(chart.aqi.data.last(), Some(&Some(44.0)));
        assert_eq!(chart.labels[0], input[15].label());
        assert_eq!(chart.labels[29], input[44].label());
    }

    #[test]
    fn test_labels_and_values_copied() {
        let input = series(2);
        let chart = to_chart(&input);
        assert!(!chart.labels[0].contains('.'));
        assert_eq!(chart.pm2.data, vec![Some(0.5), Some(1.5)]);
        assert_eq!(chart.pm10.data, vec![Some(0.0), Some(2.0)]);
    }

    #[test]
    fn test_chart_json_shape() {
        let json = serde_json::to_value(to_chart(&series(1))).unwrap();
        assert_eq!(json["pm2"]["label"], "pm2.5");
        assert_eq!(json["pm2"]["backgroundColor"], "#42C0FB");
        assert_eq!(json["aqi"]["borderColor"], "#181d27");
        assert_eq!(json["pm10"]["borderWidth"], 3);
    }

    #[test]
    fn test_missing_value_renders_null() {
        let mut input = series(1);
        input[0].pm10 = None;
        let json = serde_json::to_value(to_chart(&input)).unwrap();
        assert!(json["pm10"]["data"][0].is_null());
    }

    #[test]
    fn test_gauges() {
        let reading = series(3).pop().unwrap();
        let first = to_gauges(&reading).unwrap();
        let second = to_gauges(&reading).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, Gauges { pm25: 2.5, pm10: 4.0, aqi: 2.0 });
        let keys: Vec<_> = first.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["pm25", "pm10", "aqi"]);
    }

    #[test]
    fn test_gauges_missing_field() {
        let mut reading = series(1).pop().unwrap();
        reading.aqi = None;
        assert!(matches!(to_gauges(&reading), Err(CoreError::MissingField("aqi"))));
    }
}
