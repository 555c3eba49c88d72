//! Tracing setup for hosts embedding the narrator.
//!
//! The filter sits behind a reload layer so the level from `AppConfig` can be
//! applied after the config file has been read.

use crate::config::LogLevel;
use tracing::{info, warn};
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

pub type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

/// Install the global subscriber. `RUST_LOG` wins over `default_level`.
///
/// Fails if the host already installed a subscriber of its own.
pub fn init_tracing(default_level: LogLevel) -> Result<ReloadHandle, TryInitError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| filter_for(default_level.as_filter_str()));
    let (filter_layer, handle) = reload::Layer::new(env_filter);
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(filter_layer),
        )
        .try_init()?;
    info!(level = %default_level, "Narrator logging initialized");
    Ok(handle)
}

/// Swap the active filter, e.g. after a config reload.
pub fn set_log_level(handle: &ReloadHandle, level: LogLevel) {
    let parsed = filter_for(level.as_filter_str());
    match handle.modify(|filter| *filter = parsed) {
        Ok(()) => info!(%level, "Applied log level from config"),
        Err(err) => warn!(%level, "Failed to update log level: {err}"),
    }
}

fn filter_for(directive: &str) -> EnvFilter {
    EnvFilter::builder()
        .parse(directive)
        .unwrap_or_else(|_| EnvFilter::new("debug"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_level_builds_a_filter() {
        for level in [
            LogLevel::Trace,
            LogLevel::Debug,
            LogLevel::Info,
            LogLevel::Warn,
            LogLevel::Error,
        ] {
            let filter = filter_for(level.as_filter_str());
            assert_eq!(filter.to_string(), level.as_filter_str());
        }
    }
}
