//! CLI-specific functionality
//!
//! This module contains argument parsing and configuration discovery.

pub mod args;
pub mod config;

pub use args::{AnalyzeArgs, Args, Commands};
pub use config::{ConfigDiscovery, LoadedSettings};
