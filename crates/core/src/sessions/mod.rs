//! Debug session tracking.
//!
//! This module provides:
//! - `SessionEntry` and its state transitions
//! - `SessionRegistry`: attach, reattach and disconnect decisions per pid

pub mod entry;
pub mod registry;

pub use entry::{EntryState, PromptState, SessionEntry};
pub use registry::{Observation, Resolution, SessionError, SessionRegistry, SessionTiming, SweepReport};
