//! Logging setup
//!
//! The engine logs through the `log` facade. Binaries call [`init`] once with
//! the [`LoggingConfig`] section of their configuration; `RUST_LOG` is parsed
//! last so it always overrides the file settings.

pub use log::{debug, error, info, trace, warn};

use crate::core::config::LoggingConfig;
use log::LevelFilter;

/// Initialize the global logger from configuration
///
/// Returns `false` if a logger was already installed (tests, embedding
/// applications); that is not an error.
pub fn init(config: &LoggingConfig) -> bool {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(parse_level(&config.level));
    for (module, level) in &config.module_levels {
        builder.filter_module(module, parse_level(level));
    }
    if config.timestamps {
        builder.format_timestamp_millis();
    } else {
        builder.format_timestamp(None);
    }
    builder.parse_env("RUST_LOG");

    match builder.try_init() {
        Ok(()) => {
            log::debug!("Logger initialised at level {}", config.level);
            true
        }
        Err(_) => false,
    }
}

/// Parse a level name, falling back to `info` for unknown names
pub fn parse_level(level: &str) -> LevelFilter {
    level.parse().unwrap_or(LevelFilter::Info)
}
