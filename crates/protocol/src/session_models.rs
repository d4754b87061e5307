//! Debug session models.
//!
//! The engine tracks its own view of every debug session it started,
//! keyed by process id. These types describe that view and the attach
//! request handed to the IDE.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Lifecycle state of an engine-tracked debug session.
///
/// Absent pids have no entry at all. The status progresses:
/// Attached -> Disconnected -> (reattached or evicted)
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    /// A debug session was requested for the pid.
    Attached,

    /// The IDE reported the session terminated and the debounce elapsed.
    Disconnected,
}

/// Answer to a "debug disconnected, reattach?" prompt.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReattachDecision {
    /// Attach the debugger to the process again.
    Yes,

    /// Leave the session disconnected.
    No,

    /// Stop the watch task that owns the process.
    Stop,
}

/// Attach request passed to the IDE's debug API.
///
/// Serialized the same way an IDE launch configuration is written:
///
/// ```json
/// { "type": "coreclr", "request": "attach", "name": "Api - .NET Core Attach - AUTO - 100", "processId": 100 }
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
pub struct DebugConfiguration {
    /// Debugger type, e.g. `coreclr`.
    #[serde(rename = "type")]
    pub kind: String,

    /// Request kind, always an attach request for this engine.
    pub request: String,

    /// Unique display name, ends with `- <pid>`.
    pub name: String,

    /// Process to attach to.
    pub process_id: u32,
}
