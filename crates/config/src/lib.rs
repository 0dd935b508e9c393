//! Configuration module for movavg
//!
//! Handles loading retry, pool, and engine settings from TOML files and environment variable overrides.

pub mod config;

pub use config::*;
