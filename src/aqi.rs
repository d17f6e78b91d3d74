//! ==============================================================================
//! aqi.rs - US EPA air quality index
//! ==============================================================================
//!
//! purpose:
//!     each pollutant maps to a sub-index by linear interpolation inside its
//!     breakpoint band; the reported aqi is the larger of the two.
//!
//! relationships:
//!     - used by: sensor.rs (every reading gets its aqi at capture time)
//!
//! ==============================================================================

/// (c_low, c_high, i_low, i_high)
type Band = (f64, f64, f64, f64);

const PM25_BANDS: [Band; 7] = [
    (0.0, 12.0, 0.0, 50.0),
    (12.1, 35.4, 51.0, 100.0),
    (35.5, 55.4, 101.0, 150.0),
    (55.5, 150.4, 151.0, 200.0),
    (150.5, 250.4, 201.0, 300.0),
    (250.5, 350.4, 301.0, 400.0),
    (350.5, 500.4, 401.0, 500.0),
];

const PM10_BANDS: [Band; 7] = [
    (0.0, 54.0, 0.0, 50.0),
    (55.0, 154.0, 51.0, 100.0),
    (155.0, 254.0, 101.0, 150.0),
    (255.0, 354.0, 151.0, 200.0),
    (355.0, 424.0, 201.0, 300.0),
    (425.0, 504.0, 301.0, 400.0),
    (505.0, 604.0, 401.0, 500.0),
];

const AQI_MAX: f64 = 500.0;

// guards against 35.4 * 10.0 landing on 353.999...
const EPSILON: f64 = 1e-9;

fn truncate(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    ((value * scale) + EPSILON).floor() / scale
}

fn sub_index(concentration: f64, bands: &[Band]) -> f64 {
    if concentration <= 0.0 {
        return 0.0;
    }
    for &(c_lo, c_hi, i_lo, i_hi) in bands {
        if concentration >= c_lo && concentration <= c_hi {
            return (i_hi - i_lo) / (c_hi - c_lo) * (concentration - c_lo) + i_lo;
        }
    }
    AQI_MAX
}

/// sub-index for pm2.5 (concentration truncated to 0.1 µg/m³)
pub fn pm25_index(pm2_5: f64) -> f64 {
    sub_index(truncate(pm2_5, 1), &PM25_BANDS).round()
}

/// sub-index for pm10 (concentration truncated to 1 µg/m³)
pub fn pm10_index(pm10: f64) -> f64 {
    sub_index(truncate(pm10, 0), &PM10_BANDS).round()
}

/// overall aqi, the max of both sub-indices
pub fn compute(pm2_5: f64, pm10: f64) -> f64 {
    pm25_index(pm2_5).max(pm10_index(pm10))
}
