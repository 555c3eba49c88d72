//! Narrator settings: reconstruction tolerances, narration pacing and voice
//! ranking tables.
//!
//! Hosts usually read `conf/config.toml` through [`load_config`]; a missing or
//! malformed file yields [`AppConfig::default`] so reading can still start.

mod defaults;
mod io;
mod models;
mod tables;

pub use io::{load_config, parse_config, serialize_config};
pub use models::{AppConfig, LogLevel};
