//! Collaborator interfaces implemented by the hosting environment.
//!
//! This module provides:
//! - `DebugHost`: starts and disconnects debug sessions
//! - `ReattachPrompt`: asks the user what to do after a disconnect
//! - `TaskHost`: launches and terminates watch processes
//! - `WorkspaceHost`: workspace roots, project discovery and pickers
//!
//! The engine never blocks on a host: asynchronous calls are spawned and
//! their results come back as messages applied at the next tick.

pub mod channel;
pub mod process_host;

pub use channel::ChannelHost;
pub use process_host::ProcessTaskHost;

use crate::tasks::discovery::discover_project_files;
use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;
use wa_protocol::session_models::{DebugConfiguration, ReattachDecision};
use wa_protocol::task_models::{BuildTaskRequest, TaskHandle};

/// Errors reported by host collaborators.
#[derive(Error, Debug)]
pub enum HostError {
    /// The host refused or failed the request.
    #[error("Host request failed: {0}")]
    Request(String),

    /// The executable to launch could not be found on PATH.
    #[error("Executable not found: {0}")]
    ExecutableNotFound(String),

    /// The task handle is unknown to the host.
    #[error("Unknown task handle: {0}")]
    UnknownTask(TaskHandle),

    /// The connection to the host is gone.
    #[error("Host channel closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type HostResult<T> = Result<T, HostError>;

/// Starts and stops debug sessions in the IDE.
///
/// Both calls are fire-and-forget requests: the IDE reports the actual
/// session lifecycle through `HostEvent::SessionStarted` and
/// `HostEvent::SessionTerminated`.
pub trait DebugHost: Send + Sync {
    /// Requests an attach debug session.
    fn start_debug_session(&self, config: DebugConfiguration) -> HostResult<()>;

    /// Requests that the named session be disconnected.
    fn disconnect_session(&self, name: &str) -> HostResult<()>;
}

/// Asks the user whether to reattach to a restarted process.
#[async_trait]
pub trait ReattachPrompt: Send + Sync {
    /// Resolves once the user answers. Hosts that cannot ask return
    /// `ReattachDecision::No`.
    async fn prompt_reattach(&self, project: &str, pid: u32) -> ReattachDecision;
}

/// Launches and terminates watch-build tasks.
#[async_trait]
pub trait TaskHost: Send + Sync {
    /// Launches the task and returns its handle.
    ///
    /// The host reports the watch process pid through
    /// `HostEvent::TaskProcessStarted` and its exit through
    /// `HostEvent::TaskEnded`.
    async fn start_build_task(&self, request: BuildTaskRequest) -> HostResult<TaskHandle>;

    /// Terminates a running task.
    async fn terminate_task(&self, handle: &TaskHandle) -> HostResult<()>;
}

/// Workspace queries and user interaction unrelated to sessions.
#[async_trait]
pub trait WorkspaceHost: Send + Sync {
    /// Absolute paths of the open workspace roots.
    fn list_workspace_roots(&self) -> Vec<String>;

    /// Finds project files under `root`.
    ///
    /// The default walks the filesystem.
    async fn find_project_files(&self, root: &str, extensions: &[String]) -> HostResult<Vec<String>> {
        let root = PathBuf::from(root);
        let extensions = extensions.to_vec();
        let found = tokio::task::spawn_blocking(move || discover_project_files(&root, &extensions))
            .await
            .map_err(|e| HostError::Request(format!("project discovery panicked: {e}")))?
            .map_err(|e| HostError::Request(format!("project discovery failed: {e}")))?;

        Ok(found
            .into_iter()
            .map(|path| path.to_string_lossy().into_owned())
            .collect())
    }

    /// Lets the user pick one of several projects. `None` when dismissed.
    async fn select_project(&self, candidates: &[String]) -> Option<String>;

    /// Shows an informational message.
    fn notify(&self, message: &str);
}
