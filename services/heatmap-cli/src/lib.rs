//! Heatmap CLI library.
//!
//! This module exposes the command implementations for testing purposes.

pub mod commands;
pub mod config;
pub mod config_loader;
pub mod report;
