//! Configuration loading and management.
//!
//! This module provides functionality to load, validate and override the
//! engine configuration stored in `.watch-attach/config.toml`.

pub mod error;
pub mod loader;
pub mod models;
