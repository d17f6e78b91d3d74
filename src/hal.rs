//! ==============================================================================
//! hal.rs - Hardware Abstraction Layer for the particulate sensor
//! ==============================================================================
//!
//! purpose:
//!     provides a single blocking "read now" call for the air-quality sensor.
//!     abstracts away the difference between running on a real Raspberry Pi
//!     with an SDS011 on the UART (using `rppal`) and a development machine
//!     (using a mock).
//!
//! design philosophy:
//!     - "Compile Anywhere": the host builds without the `hardware` feature.
//!     - "One Reader At A Time": the serial port sits behind a mutex so the
//!       sampler and an api request never interleave frame bytes.
//!
//! relationships:
//!     - used by: sensor.rs (wraps the driver with a timeout and aqi)
//!     - uses: rppal (on feature="hardware")
//!
//! sds011 data frame (10 bytes, 9600 8N1, one frame per second):
//!
//!     AA C0 | p25 lo | p25 hi | p10 lo | p10 hi | id1 | id2 | checksum | AB
//!
//!     pm = u16 little endian / 10.0, checksum = sum(bytes 2..=7) mod 256
//!
//! ==============================================================================

use crate::config::SensorConfig;
use crate::domain::RawSample;

use anyhow::{anyhow, bail, Result};
use std::sync::Arc;

pub const FRAME_LEN: usize = 10;
const FRAME_HEAD: u8 = 0xAA;
const FRAME_CMD_DATA: u8 = 0xC0;
const FRAME_TAIL: u8 = 0xAB;

pub trait SensorDriver: Send + Sync {
    /// blocking read of one sample; may take up to a second on real hardware
    fn read_now(&self) -> Result<RawSample>;
}

/// decode a complete sds011 data frame
pub fn parse_frame(frame: &[u8; FRAME_LEN]) -> Result<RawSample> {
    if frame[0] != FRAME_HEAD || frame[1] != FRAME_CMD_DATA || frame[9] != FRAME_TAIL {
        bail!("malformed sds011 frame: {}", hex::encode(frame));
    }

    let checksum = frame[2..8].iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    if checksum != frame[8] {
        bail!(
            "sds011 checksum mismatch (expected {:02x}, got {:02x}): {}",
            checksum,
            frame[8],
            hex::encode(frame)
        );
    }

    let pm2_5 = u16::from_le_bytes([frame[2], frame[3]]) as f64 / 10.0;
    let pm10 = u16::from_le_bytes([frame[4], frame[5]]) as f64 / 10.0;
    Ok(RawSample { pm2_5, pm10 })
}

/// pick the driver named in config
pub fn open_driver(config: &SensorConfig) -> Result<Arc<dyn SensorDriver>> {
    match config.driver.as_str() {
        "mock" => Ok(Arc::new(MockSensor::new())),
        #[cfg(feature = "hardware")]
        "sds011" => Ok(Arc::new(Sds011::open(&config.serial_port, config.baud_rate)?)),
        #[cfg(not(feature = "hardware"))]
        "sds011" => Err(anyhow!("sds011 driver requires the `hardware` feature")),
        other => Err(anyhow!("unknown sensor driver: {}", other)),
    }
}

/// pull one frame out of a byte stream, resyncing on the `AA C0` header pair.
/// a lone 0xAA inside a data frame is not taken as a start.
#[cfg(any(test, feature = "hardware"))]
pub fn read_frame<F>(mut next_byte: F, max_scan: usize) -> Result<[u8; FRAME_LEN]>
where
    F: FnMut() -> Result<u8>,
{
    let mut prev = next_byte()?;
    let mut scanned = 1;
    loop {
        let byte = next_byte()?;
        if prev == FRAME_HEAD && byte == FRAME_CMD_DATA {
            break;
        }
        prev = byte;
        scanned += 1;
        if scanned >= max_scan {
            bail!("no sds011 frame header within {} bytes", max_scan);
        }
    }

    let mut frame = [0u8; FRAME_LEN];
    frame[0] = FRAME_HEAD;
    frame[1] = FRAME_CMD_DATA;
    for slot in frame.iter_mut().skip(2) {
        *slot = next_byte()?;
    }
    Ok(frame)
}

// ==============================================================================================
// MOCK IMPLEMENTATION (For WSL / Non-Hardware Build)
// ==============================================================================================

/// deterministic synthetic readings that move a little on every call
pub struct MockSensor {
    calls: std::sync::atomic::AtomicU64,
}

impl MockSensor {
    pub fn new() -> Self {
        tracing::info!("Using MOCK sensor (no hardware access)");
        Self { calls: std::sync::atomic::AtomicU64::new(0) }
    }
}

impl Default for MockSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorDriver for MockSensor {
    fn read_now(&self) -> Result<RawSample> {
        let n = self.calls.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let sample = RawSample {
            pm2_5: 8.0 + (n % 10) as f64 * 0.5,
            pm10: 15.0 + (n % 7) as f64 * 1.5,
        };
        tracing::debug!("[MOCK SDS011] pm2.5={} pm10={}", sample.pm2_5, sample.pm10);
        Ok(sample)
    }
}

// ==============================================================================================
// REAL IMPLEMENTATION (For Raspberry Pi)
// ==============================================================================================

#[cfg(feature = "hardware")]
pub struct Sds011 {
    uart: std::sync::Mutex<rppal::uart::Uart>,
}

#[cfg(feature = "hardware")]
impl Sds011 {
    // the sensor emits one frame per second in active mode
    const READ_TIMEOUT: std::time::Duration = std::time::Duration::from_millis(1500);
    // two frames worth of bytes before giving up on finding a header
    const MAX_SCAN: usize = FRAME_LEN * 2 + 1;

    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        use rppal::uart::{Parity, Uart};

        tracing::info!(port = %path, baud_rate, "Using REAL SDS011 sensor (rppal uart)");
        let mut uart = Uart::with_path(path, baud_rate, Parity::None, 8, 1)?;
        uart.set_read_mode(1, Self::READ_TIMEOUT)?;
        Ok(Self { uart: std::sync::Mutex::new(uart) })
    }

    fn read_byte(uart: &mut rppal::uart::Uart) -> Result<u8> {
        let mut byte = [0u8; 1];
        match uart.read(&mut byte)? {
            0 => bail!("sds011 read timed out"),
            _ => Ok(byte[0]),
        }
    }
}

#[cfg(feature = "hardware")]
impl SensorDriver for Sds011 {
    fn read_now(&self) -> Result<RawSample> {
        let mut uart = self
            .uart
            .lock()
            .map_err(|_| anyhow!("sds011 port lock poisoned"))?;

        // active mode queues a frame every second; drop the backlog so the
        // next frame is the current one
        uart.flush(rppal::uart::Queue::Input)?;

        let frame = read_frame(|| Self::read_byte(&mut uart), Self::MAX_SCAN)?;
        tracing::debug!("[SDS011] frame {}", hex::encode(frame));
        parse_frame(&frame)
    }
}
