//! # wa-protocol
//!
//! Core protocol definitions and data models for watch-attach.
//!
//! This crate defines all shared data structures used for:
//! - Process snapshots produced by the OS process provider
//! - Watch task and debug session bookkeeping
//! - Configuration file parsing (`.watch-attach/config.toml`)
//! - Communication between the attach engine and the hosting IDE
//!
//! ## Modules
//!
//! - [`process_models`]: Process snapshot entries
//! - [`task_models`]: Watch tasks and build task requests
//! - [`session_models`]: Debug session state and attach configuration
//! - [`config_models`]: Engine configuration from config.toml
//! - [`ipc`]: Operations and Events exchanged with the IDE
//!
//! ## Design Principles
//!
//! - Minimal dependencies: Only serde, ts-rs, chrono and uuid
//! - TypeScript generation: All types derive `TS` for the IDE extension
//! - Independent compilation: No dependencies on other watch-attach crates

pub mod config_models;
pub mod ipc;
pub mod process_models;
pub mod session_models;
pub mod task_models;

// Re-export all public types for convenience
pub use config_models::*;
pub use ipc::*;
pub use process_models::*;
pub use session_models::*;
pub use task_models::*;
