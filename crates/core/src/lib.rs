//! # wa-core
//!
//! Process scanning and debugger attachment engine for watch-attach.
//!
//! This crate provides:
//! - Configuration loading from the `.watch-attach/` directory
//! - OS process snapshots and subtree filtering
//! - Command line classification against workspace roots
//! - Watch task and debug session bookkeeping
//! - The polling attachment engine and its host interfaces
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and validation
//! - [`snapshot`]: Process snapshot providers
//! - [`matcher`]: Workspace matching of command lines
//! - [`tasks`]: Watch task registry, discovery and launch
//! - [`sessions`]: Per-pid debug session state machine
//! - [`engine`]: The attachment engine, its inbox and handle
//! - [`host`]: Collaborator traits and their real implementations

pub mod config;
pub mod engine;
pub mod host;
pub mod matcher;
pub mod sessions;
pub mod snapshot;
pub mod tasks;

pub use engine::{AttachmentEngine, Collaborators, EngineHandle, TickReport};
