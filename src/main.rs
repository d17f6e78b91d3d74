//! ==============================================================================
//! main.rs - air quality host entry point
//! ==============================================================================
//!
//! purpose:
//!     samples an SDS011 particulate sensor, keeps a rolling history of the
//!     readings and serves them as a chart dashboard, a json api and a
//!     prometheus scrape.
//!
//! responsibilities:
//!     - load configuration (config/host.toml + environment)
//!     - open the sensor driver (mock or real uart)
//!     - build the history subsystem when enabled (store + sampler)
//!     - serve the web routes
//!     - stop everything cleanly on ctrl+c / sigterm
//!
//! architecture:
//!
//!     ┌─────────────────────────────────────────────────────────────┐
//!     │                    rust host (this file)                     │
//!     │  ┌─────────────┐                      ┌─────────────────┐   │
//!     │  │  sampler    │ append               │   web server    │   │
//!     │  │ (60s cycle) │──────────┐           │   (port 8000)   │   │
//!     │  └──────┬──────┘          ▼           └───┬─────────┬───┘   │
//!     │         │         ┌───────────────┐      │ history │ now   │
//!     │         │         │ measurement   │◄─────┘         │       │
//!     │         │         │ store (redis) │                │       │
//!     │         │         └───────────────┘                │       │
//!     │         │          ┌────────────────┐              │       │
//!     │         └─────────►│ sensor reader  │◄─────────────┘       │
//!     │                    │ (timeout, aqi) │                      │
//!     │                    └───────┬────────┘                      │
//!     └────────────────────────────┼───────────────────────────────┘
//!                                  │ blocking read
//!                          ┌───────┴───────┐
//!                          │ hal: sds011   │
//!                          │  or mock      │
//!                          └───────────────┘
//!
//! ==============================================================================

mod aqi;
mod config;
mod domain;
mod error;
mod hal;
mod logging;
mod metrics;
mod projector;
mod query;
mod sampler;
mod sensor;
mod server;
mod store;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use crate::query::{QueryService, Subsystem};
use crate::sampler::{Sampler, SamplerHandle};

#[tokio::main]
async fn main() -> Result<()> {
    // startup banner
    println!("===========================================================");
    println!("  Air Quality Host");
    println!("  \"Sample, Keep, Chart\"");
    println!("===========================================================");

    // step 1: load configuration, then logging (its level comes from config)
    let config = config::HostConfig::load_or_default();
    logging::init(&config.logging.level);
    config.log_summary();

    // step 2: sensor
    let driver = hal::open_driver(&config.sensor).context("failed to open sensor driver")?;
    let reader = sensor::SensorReader::new(driver, config.sensor.read_timeout());

    // step 3: metrics registry, shared by the sampler and /metrics
    let metrics = metrics::SensorMetrics::new().context("failed to build metrics registry")?;

    let cancel = CancellationToken::new();

    // step 4: history subsystem, decided once
    let (history, sampler) = if config.sampling.enabled {
        let store = store::MeasurementStore::from_config(&config.storage).await?;
        let handle = Sampler::new(
            reader.clone(),
            store.clone(),
            metrics.clone(),
            config.sampling.interval(),
        )
        .show_sensor_data(config.logging.show_sensor_data)
        .spawn(&cancel, config.sampling.shutdown_grace());
        (Subsystem::Enabled(store), Some(handle))
    } else {
        (Subsystem::Disabled, None)
    };

    // step 5: web server until shutdown
    let state = server::AppState {
        query: QueryService::new(reader, history, config.history.max_len),
        metrics,
        default_len: config.history.default_len,
    };
    let addr: SocketAddr = format!("{}:{}", config.server.bind_address, config.server.port)
        .parse()
        .context("invalid server bind address")?;

    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received");
        cancel_on_signal.cancel();
    });

    let served = server::run_server(state, addr, cancel.clone()).await;

    // step 6: stop sampling whatever the server outcome; the token is shared,
    // this only bounds the wait for an in-flight tick
    cancel.cancel();
    stop_sampler(sampler).await;

    if let Err(e) = &served {
        tracing::error!(error = %e, "Web server error");
    }
    tracing::info!("Shutdown complete");
    served
}

async fn stop_sampler(sampler: Option<SamplerHandle>) {
    if let Some(handle) = sampler {
        handle.shutdown().await;
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
