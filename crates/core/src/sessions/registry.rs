//! Per-pid debug session bookkeeping.
//!
//! The SessionRegistry decides, for every matched process, whether to
//! attach, reattach after asking the user, or leave it alone. It owns all
//! debounce timers; timer expiries come back through the engine inbox and
//! are applied only if the entry's epoch is unchanged.

use crate::engine::inbox::{Inbound, Scheduler};
use crate::host::{DebugHost, HostError, ReattachPrompt};
use crate::sessions::entry::{
    begin_terminating, debug_configuration, disconnect, new_attached, session_name, EntryState,
    PromptState, SessionEntry,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use wa_protocol::config_models::{DebugSettings, EngineConfig};
use wa_protocol::session_models::{ReattachDecision, SessionStatus};
use wa_protocol::task_models::WatchTask;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to start debug session '{name}': {source}")]
    AttachFailed {
        name: String,
        #[source]
        source: HostError,
    },
}

/// Debounce windows and thresholds used by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTiming {
    pub disconnect_debounce: Duration,
    pub eviction_debounce: Duration,
    pub stop_confirm: Duration,
    pub missing_ticks_before_disconnect: u32,
}

impl From<&EngineConfig> for SessionTiming {
    fn from(config: &EngineConfig) -> Self {
        Self {
            disconnect_debounce: Duration::from_millis(config.disconnect_debounce_ms),
            eviction_debounce: Duration::from_millis(config.eviction_debounce_ms),
            stop_confirm: Duration::from_millis(config.stop_confirm_ms),
            missing_ticks_before_disconnect: config.missing_ticks_before_disconnect.max(1),
        }
    }
}

/// What the registry did with a matched process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// A debug session was requested for a new pid.
    Attached { name: String },

    /// The task's previous session was still inside its disconnect
    /// debounce; it was dropped and the new pid attached without asking.
    Replaced { name: String, evicted_pid: u32 },

    /// The pid is already attached.
    Tracked,

    /// A reattach prompt was opened for the task's disconnected session.
    Prompted { disconnected_pid: u32 },

    /// A prompt or a stop is already pending for the task.
    Waiting,

    /// The user declined attaching this pid for this task.
    Ignored,
}

/// Result of applying a reattach answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Reattached { name: String },
    Declined,

    /// The owning task must be terminated; confirm with
    /// `on_stop_confirmed` using the returned epoch.
    StopTask {
        task_id: String,
        pid: u32,
        epoch: u64,
    },

    /// The user said yes but the task ended in the meantime.
    TaskGone,

    /// The answer no longer matches a pending prompt.
    Stale,
}

/// Outcome of the end-of-tick sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Sessions disconnected because their process vanished.
    pub forced_disconnects: Vec<u32>,

    /// Entries dropped because their process vanished before the IDE ever
    /// reported the session as started.
    pub evicted: Vec<u32>,
}

pub struct SessionRegistry {
    entries: HashMap<u32, SessionEntry>,
    by_name: HashMap<String, u32>,
    active: HashSet<String>,
    /// Declined candidate pids, with the task they were declined for.
    ignored: HashMap<u32, String>,
    next_epoch: u64,
    debug_host: Arc<dyn DebugHost>,
    prompt: Arc<dyn ReattachPrompt>,
    scheduler: Scheduler,
    settings: DebugSettings,
    timing: SessionTiming,
}

impl SessionRegistry {
    pub fn new(
        debug_host: Arc<dyn DebugHost>,
        prompt: Arc<dyn ReattachPrompt>,
        scheduler: Scheduler,
        settings: DebugSettings,
        timing: SessionTiming,
    ) -> Self {
        Self {
            entries: HashMap::new(),
            by_name: HashMap::new(),
            active: HashSet::new(),
            ignored: HashMap::new(),
            next_epoch: 0,
            debug_host,
            prompt,
            scheduler,
            settings,
            timing,
        }
    }

    pub fn status(&self, pid: u32) -> Option<SessionStatus> {
        self.entries.get(&pid).map(SessionEntry::status)
    }

    pub fn get(&self, pid: u32) -> Option<&SessionEntry> {
        self.entries.get(&pid)
    }

    pub fn entries(&self) -> impl Iterator<Item = &SessionEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the IDE reported the named session as running.
    pub fn is_active(&self, name: &str) -> bool {
        self.active.contains(name)
    }

    pub fn is_ignored(&self, pid: u32) -> bool {
        self.ignored.contains_key(&pid)
    }

    /// Drops the declined pids of an ended task, so a reused pid is
    /// treated as a new process.
    ///
    /// Sessions attached to the task's processes are left to disconnect
    /// through the usual events.
    pub fn forget_task(&mut self, task_id: &str) {
        self.ignored.retain(|_, owner| owner != task_id);
    }

    /// Applies the attach rules to a process matched to `task` this tick.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AttachFailed` if the debug host rejects the
    /// attach request. No entry is recorded in that case, so the next tick
    /// tries again.
    pub fn observe(&mut self, pid: u32, task: &WatchTask) -> Result<Observation, SessionError> {
        match self.ignored.get(&pid) {
            Some(owner) if *owner == task.id => return Ok(Observation::Ignored),
            Some(_) => {
                debug!(pid, task = %task.id, "Declined pid reused by another task");
                self.ignored.remove(&pid);
            }
            None => {}
        }

        if let Some(entry) = self.entries.get(&pid) {
            return Ok(match entry.prompt() {
                None => Observation::Tracked,
                Some(PromptState::Idle) => {
                    self.begin_reattach(pid, pid);
                    Observation::Prompted {
                        disconnected_pid: pid,
                    }
                }
                Some(_) => Observation::Waiting,
            });
        }

        if let Some(pending) = self.find_for_task(&task.id, SessionEntry::is_terminating) {
            debug!(old = pending, new = pid, "Process restarted inside disconnect debounce");
            self.evict(pending);
            let name = self.attach(pid, task)?;
            return Ok(Observation::Replaced {
                name,
                evicted_pid: pending,
            });
        }

        if let Some(disconnected) = self.find_for_task(&task.id, |e| e.prompt().is_some()) {
            let prompt = self.entries.get(&disconnected).and_then(SessionEntry::prompt);
            return Ok(match prompt {
                Some(PromptState::Idle) | Some(PromptState::Declined) => {
                    self.begin_reattach(disconnected, pid);
                    Observation::Prompted {
                        disconnected_pid: disconnected,
                    }
                }
                _ => Observation::Waiting,
            });
        }

        let name = self.attach(pid, task)?;
        Ok(Observation::Attached { name })
    }

    /// Records that the IDE started the named session.
    pub fn on_session_started(&mut self, name: &str) {
        self.active.insert(name.to_string());
        if let Some(attached) = self
            .by_name
            .get(name)
            .and_then(|pid| self.entries.get_mut(pid))
            .and_then(SessionEntry::attached_mut)
        {
            attached.started = true;
        }
        debug!(session = %name, "Debug session started");
    }

    /// Starts the disconnect debounce for the named session.
    ///
    /// Returns the pid of the session, if the engine knows it.
    pub fn on_session_terminated(&mut self, name: &str) -> Option<u32> {
        self.active.remove(name);
        let pid = *self.by_name.get(name)?;
        let epoch = self.bump_epoch();
        let entry = self.entries.get_mut(&pid)?;

        if begin_terminating(entry, epoch) {
            info!(pid, session = %name, "Debug session terminated");
            self.scheduler.after(
                self.timing.disconnect_debounce,
                Inbound::DisconnectDebounceElapsed { pid, epoch },
            );
        }
        Some(pid)
    }

    pub fn on_disconnect_debounce_elapsed(&mut self, pid: u32, epoch: u64) {
        let Some(entry) = self.entries.get(&pid) else {
            return;
        };
        if entry.epoch != epoch || !entry.is_terminating() {
            return;
        }

        let forced = entry
            .attached()
            .map(|a| a.force_disconnected)
            .unwrap_or(false);
        if forced {
            debug!(pid, "Dropping force-disconnected session");
            self.evict(pid);
            return;
        }

        let next = self.bump_epoch();
        if let Some(entry) = self.entries.get_mut(&pid) {
            disconnect(entry, PromptState::Idle, next);
            let name = entry.name.clone();
            self.by_name.remove(&name);
            info!(pid, session = %name, "Debug session disconnected");
        }
        self.arm_eviction(pid, next);
    }

    pub fn on_eviction_elapsed(&mut self, pid: u32, epoch: u64) {
        let evictable = self.entries.get(&pid).is_some_and(|entry| {
            entry.epoch == epoch
                && matches!(
                    entry.prompt(),
                    Some(PromptState::Idle) | Some(PromptState::Declined)
                )
        });
        if evictable {
            debug!(pid, "Evicting disconnected session");
            self.evict(pid);
        }
    }

    /// Applies the user's answer to a reattach prompt.
    ///
    /// `task` is the live task owning the disconnected session, if it is
    /// still running.
    pub fn resolve_reattach(
        &mut self,
        disconnected_pid: u32,
        candidate_pid: u32,
        decision: ReattachDecision,
        task: Option<&WatchTask>,
    ) -> Result<Resolution, SessionError> {
        let pending = self
            .entries
            .get(&disconnected_pid)
            .and_then(SessionEntry::prompt)
            == Some(PromptState::Awaiting { candidate_pid });
        if !pending {
            return Ok(Resolution::Stale);
        }

        info!(disconnected_pid, candidate_pid, ?decision, "Reattach answered");
        match decision {
            ReattachDecision::Yes => {
                self.evict(disconnected_pid);
                let Some(task) = task else {
                    return Ok(Resolution::TaskGone);
                };
                if self.entries.contains_key(&candidate_pid) {
                    return Ok(Resolution::Stale);
                }
                let name = self.attach(candidate_pid, task)?;
                Ok(Resolution::Reattached { name })
            }
            ReattachDecision::No => {
                if let Some(entry) = self.entries.get(&disconnected_pid) {
                    self.ignored.insert(candidate_pid, entry.task_id.clone());
                }
                let epoch = self.bump_epoch();
                if let Some(entry) = self.entries.get_mut(&disconnected_pid) {
                    disconnect(entry, PromptState::Declined, epoch);
                }
                self.arm_eviction(disconnected_pid, epoch);
                Ok(Resolution::Declined)
            }
            ReattachDecision::Stop => {
                let epoch = self.bump_epoch();
                let Some(entry) = self.entries.get_mut(&disconnected_pid) else {
                    return Ok(Resolution::Stale);
                };
                disconnect(entry, PromptState::Stopping, epoch);
                self.ignored.insert(candidate_pid, entry.task_id.clone());
                Ok(Resolution::StopTask {
                    task_id: entry.task_id.clone(),
                    pid: disconnected_pid,
                    epoch,
                })
            }
        }
    }

    /// Completes a stop started by `Resolution::StopTask`.
    ///
    /// The entry is evicted when the task was terminated; otherwise it is
    /// treated like a declined prompt, and the candidate stays ignored.
    pub fn on_stop_confirmed(&mut self, pid: u32, epoch: u64, terminated: bool) {
        let stopping = self.entries.get(&pid).is_some_and(|entry| {
            entry.epoch == epoch && entry.prompt() == Some(PromptState::Stopping)
        });
        if !stopping {
            return;
        }

        if terminated {
            self.evict(pid);
            return;
        }

        let next = self.bump_epoch();
        if let Some(entry) = self.entries.get_mut(&pid) {
            disconnect(entry, PromptState::Declined, next);
        }
        self.arm_eviction(pid, next);
    }

    /// End-of-tick cleanup of attached sessions whose process vanished.
    ///
    /// `seen` holds every pid matched this tick. An attached session whose
    /// process stays missing for the configured number of consecutive
    /// ticks is disconnected once through the debug host if the IDE
    /// reported it as started, and dropped otherwise.
    pub fn sweep(&mut self, seen: &HashSet<u32>) -> SweepReport {
        let threshold = self.timing.missing_ticks_before_disconnect;
        let mut forced = Vec::new();
        let mut dropped = Vec::new();

        for entry in self.entries.values_mut() {
            let EntryState::Attached(attached) = &mut entry.state else {
                continue;
            };
            if seen.contains(&entry.pid) {
                attached.missing_ticks = 0;
                continue;
            }
            if attached.terminating || attached.force_disconnected {
                continue;
            }

            attached.missing_ticks += 1;
            if attached.missing_ticks < threshold {
                continue;
            }

            if self.active.contains(&entry.name) {
                attached.force_disconnected = true;
                forced.push(entry.pid);
            } else {
                dropped.push(entry.pid);
            }
        }

        for &pid in &forced {
            let epoch = self.bump_epoch();
            let Some(entry) = self.entries.get_mut(&pid) else {
                continue;
            };
            let name = entry.name.clone();
            begin_terminating(entry, epoch);

            info!(pid, session = %name, "Process vanished, disconnecting session");
            if let Err(e) = self.debug_host.disconnect_session(&name) {
                warn!(pid, session = %name, error = %e, "Failed to disconnect session");
            }
            self.scheduler.after(
                self.timing.disconnect_debounce,
                Inbound::DisconnectDebounceElapsed { pid, epoch },
            );
        }

        for &pid in &dropped {
            debug!(pid, "Process vanished before its session started");
            self.evict(pid);
        }

        forced.sort_unstable();
        dropped.sort_unstable();
        SweepReport {
            forced_disconnects: forced,
            evicted: dropped,
        }
    }

    /// Forgets every session. Used on shutdown; pending timers become
    /// no-ops.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.by_name.clear();
        self.active.clear();
        self.ignored.clear();
    }

    fn attach(&mut self, pid: u32, task: &WatchTask) -> Result<String, SessionError> {
        let name = session_name(&task.project_name, &self.settings.name, pid);
        let config = debug_configuration(&self.settings, &name, pid);

        self.debug_host
            .start_debug_session(config)
            .map_err(|source| SessionError::AttachFailed {
                name: name.clone(),
                source,
            })?;

        info!(pid, session = %name, task = %task.id, "Attaching debugger");
        let epoch = self.bump_epoch();
        self.by_name.insert(name.clone(), pid);
        self.entries
            .insert(pid, new_attached(pid, task, name.clone(), epoch));
        Ok(name)
    }

    fn begin_reattach(&mut self, disconnected_pid: u32, candidate_pid: u32) {
        let epoch = self.bump_epoch();
        let Some(entry) = self.entries.get_mut(&disconnected_pid) else {
            return;
        };
        disconnect(entry, PromptState::Awaiting { candidate_pid }, epoch);

        let project = entry.project_name.clone();
        let prompt = self.prompt.clone();
        info!(disconnected_pid, candidate_pid, project = %project, "Asking to reattach");
        self.scheduler.spawn(async move {
            let decision = prompt.prompt_reattach(&project, candidate_pid).await;
            Inbound::ReattachAnswered {
                disconnected_pid,
                candidate_pid,
                decision,
            }
        });
    }

    fn arm_eviction(&self, pid: u32, epoch: u64) {
        self.scheduler.after(
            self.timing.eviction_debounce,
            Inbound::EvictionElapsed { pid, epoch },
        );
    }

    fn evict(&mut self, pid: u32) -> Option<SessionEntry> {
        let entry = self.entries.remove(&pid)?;
        if self.by_name.get(&entry.name) == Some(&pid) {
            self.by_name.remove(&entry.name);
        }
        self.active.remove(&entry.name);
        Some(entry)
    }

    fn find_for_task(&self, task_id: &str, predicate: impl Fn(&SessionEntry) -> bool) -> Option<u32> {
        self.entries
            .values()
            .filter(|entry| entry.task_id == task_id && predicate(entry))
            .map(|entry| entry.pid)
            .min()
    }

    fn bump_epoch(&mut self) -> u64 {
        self.next_epoch += 1;
        self.next_epoch
    }
}
