//! Process snapshot models.
//!
//! A snapshot entry describes one running OS process as seen during a
//! single poll tick. Entries are produced fresh on every tick and are never
//! persisted.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A single running OS process.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, TS)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInfo {
    /// Operating system process id.
    pub pid: u32,

    /// Parent process id, if the platform reports one.
    pub parent_pid: Option<u32>,

    /// Full command line, arguments joined by spaces.
    ///
    /// Arguments that contain whitespace are wrapped in double quotes so
    /// the path extraction in the matcher can recover them.
    pub command_line: String,
}

impl ProcessInfo {
    /// Create a new snapshot entry.
    pub fn new(pid: u32, parent_pid: Option<u32>, command_line: impl Into<String>) -> Self {
        Self {
            pid,
            parent_pid,
            command_line: command_line.into(),
        }
    }
}
