//! Watch task management.
//!
//! This module provides:
//! - `TaskRegistry`: running watch tasks and process-to-task correlation
//! - Project file discovery under a workspace root
//! - Launch preparation: project resolution and build task requests

pub mod discovery;
pub mod launch;
pub mod registry;

pub use launch::{build_request, launch_watch, resolve_project, LaunchError};
pub use registry::{StartOutcome, TaskRegistry};
