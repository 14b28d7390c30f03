//! CLI command implementations.
//!
//! # Command Modules
//!
//! - [`check`] - Validate a pool config file and print its pools
//! - [`simulate`] - Run configured pools against a simulated flaky provider

pub mod check;
pub mod simulate;
