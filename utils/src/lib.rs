//! Shared utilities for the Dyad governance engine.

pub mod logging;
pub mod stats;
pub mod time;

pub use logging::{init_logging, LogFormat};
pub use stats::StatsCounter;
pub use time::{format_duration, format_remaining};
