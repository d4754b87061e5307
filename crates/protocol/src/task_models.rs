//! Watch task models.
//!
//! This module defines the structures for tracking watch-build tasks
//! launched for a monitored project, and the request handed to the task
//! host to launch one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use ts_rs::TS;

/// Opaque handle returned by the task host for a launched build task.
///
/// The engine only stores it and hands it back when asking the host to
/// terminate the task.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, TS)]
pub struct TaskHandle(pub String);

impl std::fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Represents a running watch task for one project in one workspace.
///
/// Each task is identified by a deterministic id derived from the task
/// source, the task name and the workspace name, so starting the same
/// project twice in the same workspace yields the same id.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
pub struct WatchTask {
    /// Deterministic task identity.
    pub id: String,

    /// Absolute path of the workspace root the task was started in.
    pub workspace_root: String,

    /// Absolute path of the project file being watched.
    pub project_file: String,

    /// Display name of the project (project file stem).
    pub project_name: String,

    /// Process id of the watch process, once the host reports it.
    pub process_id: Option<u32>,

    /// Handle assigned by the task host once the launch completed.
    pub handle: Option<TaskHandle>,

    /// When the task was registered.
    #[ts(type = "string")]
    pub started_at: DateTime<Utc>,
}

/// Everything the task host needs to launch a watch process.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
pub struct BuildTaskRequest {
    /// Identity of the task being launched, echoed back in lifecycle events.
    pub task_id: String,

    /// Human readable task label, e.g. `Watch Api`.
    pub label: String,

    /// Workspace root the task belongs to.
    pub workspace_root: String,

    /// Executable to run.
    pub command: String,

    /// Arguments passed to the executable.
    pub args: Vec<String>,

    /// Extra environment variables.
    pub env: HashMap<String, String>,

    /// Working directory.
    pub cwd: String,
}
