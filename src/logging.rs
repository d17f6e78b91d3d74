//! ==============================================================================
//! logging.rs - tracing subscriber setup
//! ==============================================================================
//!
//! purpose:
//!     installs the global fmt subscriber once at startup. `RUST_LOG` wins
//!     over `logging.level` from host.toml.
//!
//! relationships:
//!     - called by: main.rs, right after the config is loaded
//!
//! ==============================================================================

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// install the global subscriber; `RUST_LOG` wins over the configured level
pub fn init(level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false))
        .init();
}
