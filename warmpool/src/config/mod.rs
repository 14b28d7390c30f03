//! Configuration loading.
//!
//! - [`ConfigFile`]: registry settings and pool policies read from INI
//! - [`parse_duration`] / [`format_duration`]: human-readable durations

mod duration;
mod file;
mod parser;

pub use duration::{format_duration, parse_duration, DurationParseError};
pub use file::{ConfigFile, ConfigFileError, POOL_SECTION_PREFIX};
