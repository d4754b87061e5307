//! Session entry state machine.
//!
//! This module provides the per-pid entry stored by the SessionRegistry
//! and the functions that move it between states.

use wa_protocol::config_models::DebugSettings;
use wa_protocol::session_models::{DebugConfiguration, SessionStatus};
use wa_protocol::task_models::WatchTask;

/// Engine-side record of a debug session, keyed by pid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEntry {
    pub pid: u32,
    pub task_id: String,
    pub project_name: String,
    pub name: String,

    /// Reassigned from a registry-wide counter on every transition; timers
    /// carry the epoch they were armed with and are ignored once it no
    /// longer matches.
    pub epoch: u64,

    pub state: EntryState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryState {
    Attached(AttachedState),
    Disconnected(PromptState),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachedState {
    /// The IDE confirmed the session started.
    pub started: bool,

    /// A terminate event arrived and the disconnect debounce is running.
    pub terminating: bool,

    /// Consecutive ticks the process was not seen.
    pub missing_ticks: u32,

    /// The engine disconnected the session itself because its process
    /// vanished.
    pub force_disconnected: bool,
}

/// Reattach prompt progress of a disconnected entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptState {
    Idle,
    Awaiting { candidate_pid: u32 },
    Declined,
    Stopping,
}

impl SessionEntry {
    pub fn status(&self) -> SessionStatus {
        match self.state {
            EntryState::Attached(_) => SessionStatus::Attached,
            EntryState::Disconnected(_) => SessionStatus::Disconnected,
        }
    }

    pub fn attached(&self) -> Option<&AttachedState> {
        match &self.state {
            EntryState::Attached(state) => Some(state),
            EntryState::Disconnected(_) => None,
        }
    }

    pub fn attached_mut(&mut self) -> Option<&mut AttachedState> {
        match &mut self.state {
            EntryState::Attached(state) => Some(state),
            EntryState::Disconnected(_) => None,
        }
    }

    pub fn prompt(&self) -> Option<PromptState> {
        match self.state {
            EntryState::Attached(_) => None,
            EntryState::Disconnected(prompt) => Some(prompt),
        }
    }

    /// Attached and waiting for the disconnect debounce.
    pub fn is_terminating(&self) -> bool {
        self.attached().map(|a| a.terminating).unwrap_or(false)
    }
}

/// Display name of the session for `pid`: `<project> - <base> - <pid>`.
pub fn session_name(project_name: &str, base_name: &str, pid: u32) -> String {
    format!("{project_name} - {base_name} - {pid}")
}

/// Builds the attach request for `pid`.
pub fn debug_configuration(settings: &DebugSettings, name: &str, pid: u32) -> DebugConfiguration {
    DebugConfiguration {
        kind: settings.kind.clone(),
        request: settings.request.clone(),
        name: name.to_string(),
        process_id: pid,
    }
}

/// Creates a freshly attached entry.
pub fn new_attached(pid: u32, task: &WatchTask, name: String, epoch: u64) -> SessionEntry {
    SessionEntry {
        pid,
        task_id: task.id.clone(),
        project_name: task.project_name.clone(),
        name,
        epoch,
        state: EntryState::Attached(AttachedState::default()),
    }
}

/// Marks an attached entry as terminating.
///
/// Returns false if the entry is disconnected or already terminating; the
/// epoch is left unchanged in that case.
pub fn begin_terminating(entry: &mut SessionEntry, epoch: u64) -> bool {
    let Some(attached) = entry.attached_mut() else {
        return false;
    };
    if attached.terminating {
        return false;
    }
    attached.terminating = true;
    entry.epoch = epoch;
    true
}

/// Moves the entry to `Disconnected` with the given prompt state.
pub fn disconnect(entry: &mut SessionEntry, prompt: PromptState, epoch: u64) {
    entry.state = EntryState::Disconnected(prompt);
    entry.epoch = epoch;
}
