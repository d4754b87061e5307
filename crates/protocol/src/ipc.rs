//! Inter-process communication protocol.
//!
//! This module defines the message types exchanged between the attach
//! engine and the IDE that owns the debug sessions.
//!
//! The protocol follows an Operation/Event pattern:
//! - `Op`: Notifications and answers sent from the IDE to the engine
//! - `Event`: Requests sent from the engine to the IDE
//!
//! Messages are newline-delimited JSON so the IDE side can be a plain
//! child-process bridge.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::session_models::{DebugConfiguration, ReattachDecision};

/// Lifecycle notifications about tasks and debug sessions.
///
/// These are produced by the task host and the IDE and delivered to the
/// engine, which applies them at the next tick boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum HostEvent {
    /// The watch process of a task started.
    TaskProcessStarted { task_id: String, pid: u32 },

    /// A task ended (its watch process exited or was terminated).
    TaskEnded { task_id: String },

    /// A debug session actually started in the IDE.
    SessionStarted { name: String },

    /// A debug session terminated in the IDE.
    SessionTerminated { name: String },
}

/// Operations sent from the IDE to the engine.
///
/// Uses tagged enum serialization for TypeScript compatibility:
/// ```json
/// {
///   "type": "sessionTerminated",
///   "payload": { "name": "Api - .NET Core Attach - AUTO - 100" }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Op {
    /// A debug session started.
    SessionStarted { name: String },

    /// A debug session terminated.
    SessionTerminated { name: String },

    /// A task's watch process started (for IDE-managed tasks).
    TaskProcessStarted { task_id: String, pid: u32 },

    /// A task ended (for IDE-managed tasks).
    TaskEnded { task_id: String },

    /// The user answered a reattach prompt.
    ReattachAnswer {
        #[ts(type = "string")]
        request_id: Uuid,
        decision: ReattachDecision,
    },

    /// The user picked a project, or dismissed the picker.
    ProjectSelected {
        #[ts(type = "string")]
        request_id: Uuid,
        project: Option<String>,
    },

    /// Stop the engine and terminate all watch tasks.
    Shutdown,
}

impl Op {
    /// Convert a lifecycle operation into the host event the engine
    /// consumes. Answers and shutdown are not lifecycle events.
    pub fn into_host_event(self) -> Option<HostEvent> {
        match self {
            Op::SessionStarted { name } => Some(HostEvent::SessionStarted { name }),
            Op::SessionTerminated { name } => Some(HostEvent::SessionTerminated { name }),
            Op::TaskProcessStarted { task_id, pid } => {
                Some(HostEvent::TaskProcessStarted { task_id, pid })
            }
            Op::TaskEnded { task_id } => Some(HostEvent::TaskEnded { task_id }),
            Op::ReattachAnswer { .. } | Op::ProjectSelected { .. } | Op::Shutdown => None,
        }
    }
}

/// Events sent from the engine to the IDE.
///
/// Uses tagged enum serialization for TypeScript compatibility:
/// ```json
/// {
///   "type": "startDebugSession",
///   "payload": {
///     "config": { "type": "coreclr", "request": "attach", "name": "Api - .NET Core Attach - AUTO - 100", "processId": 100 }
///   }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Event {
    /// Start an attach debug session.
    StartDebugSession { config: DebugConfiguration },

    /// Disconnect a debug session whose process vanished.
    DisconnectSession { name: String },

    /// Ask the user whether to reattach after a disconnect.
    ///
    /// The IDE answers with `Op::ReattachAnswer` carrying the same id.
    PromptReattach {
        #[ts(type = "string")]
        request_id: Uuid,
        project: String,
        pid: u32,
    },

    /// Ask the user to pick one of several project files.
    ///
    /// The IDE answers with `Op::ProjectSelected` carrying the same id.
    SelectProject {
        #[ts(type = "string")]
        request_id: Uuid,
        candidates: Vec<String>,
    },

    /// Informational message to show to the user.
    Notice { message: String },
}
