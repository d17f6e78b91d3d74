//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `host.toml`.
//!     loads configuration from file or falls back to defaults, then applies
//!     the environment overrides the deployment scripts rely on.
//!
//! structure:
//!     - ServerConfig: Where the dashboard / api / metrics listen.
//!     - SamplingConfig: Whether history is kept and how often to sample.
//!     - SensorConfig: Which driver to use and how long a read may take.
//!     - StorageConfig: Where the history list lives.
//!     - HistoryConfig: Default and maximum number of readings per query.
//!     - LoggingConfig: Log level and per-reading output.
//!
//! environment:
//!     REDIS_ENABLED=true|false -> sampling.enabled
//!     REDIS_URL                -> storage.redis_url
//!     PORT                     -> server.port
//!
//! ==============================================================================

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct HostConfig {
    pub server: ServerConfig,
    pub sampling: SamplingConfig,
    pub sensor: SensorConfig,
    pub storage: StorageConfig,
    pub history: HistoryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SamplingConfig {
    /// when false the sampler and the store are never built
    pub enabled: bool,
    pub interval_seconds: u64,
    /// how long shutdown waits for an in-flight tick
    pub shutdown_grace_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SensorConfig {
    /// "mock" or "sds011"
    pub driver: String,
    pub serial_port: String,
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    /// "redis" or "memory"
    pub backend: String,
    pub redis_url: String,
    /// list key holding this sensor's readings
    pub key: String,
    pub pool_size: usize,
    /// trim the list to this many entries after each append; unset keeps everything
    pub max_entries: Option<usize>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HistoryConfig {
    pub default_len: usize,
    pub max_len: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub show_sensor_data: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_address: "0.0.0.0".to_string(), port: 8000 }
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self { enabled: false, interval_seconds: 60, shutdown_grace_seconds: 5 }
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            driver: "mock".to_string(),
            serial_port: "/dev/ttyUSB0".to_string(),
            baud_rate: 9600,
            read_timeout_ms: 3000,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "redis".to_string(),
            redis_url: "redis://127.0.0.1:6379".to_string(),
            key: "measurements".to_string(),
            pool_size: 4,
            max_entries: None,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { default_len: 30, max_len: 30 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), show_sensor_data: true }
    }
}

impl SamplingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds.max(1))
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_seconds)
    }
}

impl HistoryConfig {
    /// keep both lengths usable: max_len >= 1 and default_len in 1..=max_len
    pub fn normalize(&mut self) {
        let max_len = self.max_len.max(1);
        let default_len = self.default_len.clamp(1, max_len);
        if (default_len, max_len) != (self.default_len, self.max_len) {
            println!(
                "[CONFIG] Warning: history lengths adjusted to default_len={} max_len={}",
                default_len, max_len
            );
        }
        self.default_len = default_len;
        self.max_len = max_len;
    }
}

impl SensorConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl HostConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let mut config: HostConfig = toml::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))?;

        config.history.normalize();
        Ok(config)
    }

    /// Load with default fallback, then apply environment overrides
    ///
    /// runs before logging is set up, so it reports on stdout.
    pub fn load_or_default() -> Self {
        let mut config = Self::load_from_known_paths();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    fn load_from_known_paths() -> Self {
        let paths = [
            std::path::PathBuf::from("config").join("host.toml"),
            std::path::PathBuf::from("..").join("config").join("host.toml"),
        ];

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        println!("[CONFIG] Loaded from {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        println!("[CONFIG] Warning: Failed to load {}: {}", path.display(), e);
                    }
                }
            }
        }

        println!("[CONFIG] Warning: No config file found - using defaults");
        Self::default()
    }

    /// apply overrides from a variable lookup (std::env::var in production)
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(enabled) = lookup("REDIS_ENABLED") {
            self.sampling.enabled = enabled.trim().eq_ignore_ascii_case("true");
        }
        if let Some(url) = lookup("REDIS_URL") {
            self.storage.redis_url = url;
        }
        if let Some(port) = lookup("PORT") {
            match port.trim().parse() {
                Ok(port) => self.server.port = port,
                Err(_) => println!("[CONFIG] Warning: Ignoring invalid PORT {:?}", port),
            }
        }
    }

    /// Log configuration summary
    pub fn log_summary(&self) {
        let bind = format!("{}:{}", self.server.bind_address, self.server.port);
        tracing::info!(
            bind = %bind,
            sensor_driver = %self.sensor.driver,
            serial_port = %self.sensor.serial_port,
            baud_rate = self.sensor.baud_rate,
            read_timeout_ms = self.sensor.read_timeout_ms,
            "Host configuration"
        );
        if self.sampling.enabled {
            tracing::info!(
                interval_seconds = self.sampling.interval_seconds,
                backend = %self.storage.backend,
                key = %self.storage.key,
                max_entries = ?self.storage.max_entries,
                "History enabled"
            );
        } else {
            tracing::info!("History disabled (set REDIS_ENABLED=true to enable)");
        }
    }
}
