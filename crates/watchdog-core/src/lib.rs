//! watchdog-core — shared types for the infrastructure watchdog.
//!
//! Holds the issue model every probe reports into, and the TOML
//! configuration the daemon is started from.

pub mod config;
pub mod error;
pub mod types;

pub use config::{EXAMPLE_CONFIG, HealthCheckSpec, RetryConfig, WatchdogConfig, parse_duration};
pub use error::{ConfigError, ConfigResult};
pub use types::*;
