//! Attachment engine.
//!
//! The AttachmentEngine polls the process table on a fixed interval,
//! correlates runtime processes to the watch tasks that spawned them and
//! drives the session registry. It is the only owner of the task and
//! session registries; everything else talks to it through an
//! `EngineHandle`.

pub mod inbox;

pub use inbox::{EngineHandle, EngineInbox, Inbound, Scheduler};

use crate::host::{DebugHost, ReattachPrompt, TaskHost, WorkspaceHost};
use crate::matcher::WorkspaceMatcher;
use crate::sessions::{Observation, Resolution, SessionRegistry, SessionTiming};
use crate::snapshot::{descendants, ProcessSnapshotProvider};
use crate::tasks::launch::build_request;
use crate::tasks::registry::{StartOutcome, TaskRegistry};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};
use wa_protocol::config_models::{EngineConfig, WatchConfig};
use wa_protocol::ipc::HostEvent;
use wa_protocol::process_models::ProcessInfo;
use wa_protocol::session_models::ReattachDecision;
use wa_protocol::task_models::TaskHandle;

/// The hosts an engine works with.
pub struct Collaborators {
    pub snapshot: Arc<dyn ProcessSnapshotProvider>,
    pub workspace: Arc<dyn WorkspaceHost>,
    pub tasks: Arc<dyn TaskHost>,
    pub debug: Arc<dyn DebugHost>,
    pub prompt: Arc<dyn ReattachPrompt>,
}

/// What happened during one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Inbox messages applied before scanning.
    pub messages: usize,

    /// Pids correlated to a watch task, ascending.
    pub matched: Vec<u32>,

    /// Pids a debug session was requested for.
    pub attached: Vec<u32>,

    /// Pids a reattach prompt was opened for.
    pub prompted: Vec<u32>,

    /// Pids whose session was disconnected because the process vanished.
    pub forced_disconnects: Vec<u32>,

    /// Pids dropped because the process vanished before the session started.
    pub evicted: Vec<u32>,

    /// Pids whose attach request failed.
    pub failures: Vec<u32>,
}

impl TickReport {
    pub fn has_activity(&self) -> bool {
        self.messages > 0
            || !self.attached.is_empty()
            || !self.prompted.is_empty()
            || !self.forced_disconnects.is_empty()
            || !self.evicted.is_empty()
            || !self.failures.is_empty()
    }
}

pub struct AttachmentEngine {
    config: EngineConfig,
    matcher: WorkspaceMatcher,
    snapshot: Arc<dyn ProcessSnapshotProvider>,
    workspace: Arc<dyn WorkspaceHost>,
    task_host: Arc<dyn TaskHost>,
    tasks: TaskRegistry,
    sessions: SessionRegistry,
    rx: mpsc::Receiver<Inbound>,
    stop: Arc<Notify>,
    scheduler: Scheduler,
}

impl AttachmentEngine {
    /// Creates an engine fed by `inbox`.
    ///
    /// # Arguments
    ///
    /// * `config` - Polling, debounce and attach settings
    /// * `hosts` - Collaborators the engine calls out to
    /// * `inbox` - Receiving half from `EngineHandle::channel`
    pub fn new(config: EngineConfig, hosts: Collaborators, inbox: EngineInbox) -> Self {
        let EngineInbox {
            rx,
            stop,
            scheduler,
        } = inbox;

        let sessions = SessionRegistry::new(
            hosts.debug,
            hosts.prompt,
            scheduler.clone(),
            config.debug.clone(),
            SessionTiming::from(&config),
        );

        Self {
            matcher: WorkspaceMatcher::new(&config.matcher.false_positive_tokens),
            config,
            snapshot: hosts.snapshot,
            workspace: hosts.workspace,
            task_host: hosts.tasks,
            tasks: TaskRegistry::new(),
            sessions,
            rx,
            stop,
            scheduler,
        }
    }

    pub fn tasks(&self) -> &TaskRegistry {
        &self.tasks
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.config.poll_interval_ms.max(1))
    }

    /// Drives ticks on the poll interval until `EngineHandle::stop` is
    /// called, then shuts down.
    pub async fn run(mut self) {
        let mut interval = tokio::time::interval(self.poll_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let stop = self.stop.clone();
        info!(poll_ms = self.config.poll_interval_ms, "Attachment engine started");

        loop {
            tokio::select! {
                _ = stop.notified() => break,
                _ = interval.tick() => {
                    let report = self.tick();
                    if report.has_activity() {
                        debug!(?report, "Tick");
                    }
                }
            }
        }

        self.shutdown().await;
        info!("Attachment engine stopped");
    }

    /// Runs one poll cycle.
    ///
    /// Applies pending inbox messages, scans the subtrees of all watch
    /// processes, attaches or prompts for matched pids and finally cleans
    /// up sessions whose process vanished. Failures for one pid never
    /// affect the others.
    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport {
            messages: self.drain_inbox(),
            ..Default::default()
        };

        let matched = self.scan();

        for (&pid, task_id) in &matched {
            let Some(task) = self.tasks.get(task_id) else {
                continue;
            };
            match self.sessions.observe(pid, task) {
                Ok(Observation::Attached { .. }) | Ok(Observation::Replaced { .. }) => {
                    report.attached.push(pid)
                }
                Ok(Observation::Prompted { .. }) => report.prompted.push(pid),
                Ok(_) => {}
                Err(e) => {
                    warn!(pid, error = %e, "Attach failed");
                    report.failures.push(pid);
                }
            }
        }

        let seen: HashSet<u32> = matched.keys().copied().collect();
        let sweep = self.sessions.sweep(&seen);
        report.forced_disconnects = sweep.forced_disconnects;
        report.evicted = sweep.evicted;
        report.matched = matched.into_keys().collect();
        report
    }

    /// Applies every message currently in the inbox, in arrival order.
    ///
    /// Returns the number of messages applied.
    pub fn drain_inbox(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(message) = self.rx.try_recv() {
            self.apply(message);
            applied += 1;
        }
        applied
    }

    /// Forgets all sessions and terminates every running watch task.
    ///
    /// Messages sent to the engine afterwards are dropped.
    pub async fn shutdown(&mut self) {
        self.rx.close();
        self.sessions.clear();

        for task in self.tasks.drain() {
            let Some(handle) = task.handle else {
                continue;
            };
            if let Err(e) = self.task_host.terminate_task(&handle).await {
                warn!(task = %task.id, error = %e, "Failed to terminate watch task");
            }
        }
    }

    /// Pids of watch task descendants correlated to a task, with the task id.
    fn scan(&self) -> BTreeMap<u32, String> {
        let mut matched = BTreeMap::new();
        let watch_pids: Vec<u32> = self
            .tasks
            .tasks_with_pid()
            .filter_map(|task| task.process_id)
            .collect();
        if watch_pids.is_empty() {
            return matched;
        }

        let roots = self.workspace.list_workspace_roots();
        let all = self.snapshot.list_processes(None);
        let mut visited = HashSet::new();

        for watch_pid in watch_pids {
            for process in descendants(&all, watch_pid) {
                if !visited.insert(process.pid) {
                    continue;
                }
                if let Some(task_id) = self.correlate(&process, &roots) {
                    matched.insert(process.pid, task_id);
                }
            }
        }
        matched
    }

    fn correlate(&self, process: &ProcessInfo, roots: &[String]) -> Option<String> {
        let root = self.matcher.match_workspace(&process.command_line, roots)?;
        let path = self.matcher.candidate_path(&process.command_line)?;
        let task = self.tasks.find_by_process_path_prefix(&path)?;
        trace!(pid = process.pid, root = %root, task = %task.id, "Process matched");
        Some(task.id.clone())
    }

    fn apply(&mut self, message: Inbound) {
        match message {
            Inbound::Host(event) => self.apply_host_event(event),
            Inbound::StartWatch {
                workspace_root,
                project_file,
                watch,
            } => self.start_watch(&workspace_root, &project_file, &watch),
            Inbound::TaskLaunched { task_id, result } => match result {
                Ok(handle) => self.on_task_launched(&task_id, handle),
                Err(e) => {
                    warn!(task = %task_id, error = %e, "Failed to launch watch task");
                    self.tasks.on_task_ended(&task_id);
                    self.sessions.forget_task(&task_id);
                    self.workspace
                        .notify(&format!("Failed to start watch task: {e}"));
                }
            },
            Inbound::DisconnectDebounceElapsed { pid, epoch } => {
                self.sessions.on_disconnect_debounce_elapsed(pid, epoch)
            }
            Inbound::EvictionElapsed { pid, epoch } => self.sessions.on_eviction_elapsed(pid, epoch),
            Inbound::ReattachAnswered {
                disconnected_pid,
                candidate_pid,
                decision,
            } => self.on_reattach_answered(disconnected_pid, candidate_pid, decision),
            Inbound::StopConfirmed {
                pid,
                epoch,
                terminated,
            } => self.sessions.on_stop_confirmed(pid, epoch, terminated),
        }
    }

    fn apply_host_event(&mut self, event: HostEvent) {
        match event {
            HostEvent::TaskProcessStarted { task_id, pid } => {
                self.tasks.on_process_started(&task_id, pid);
            }
            HostEvent::TaskEnded { task_id } => {
                self.tasks.on_task_ended(&task_id);
                self.sessions.forget_task(&task_id);
            }
            HostEvent::SessionStarted { name } => self.sessions.on_session_started(&name),
            HostEvent::SessionTerminated { name } => {
                self.sessions.on_session_terminated(&name);
            }
        }
    }

    fn start_watch(&mut self, workspace_root: &str, project_file: &str, watch: &WatchConfig) {
        match self.tasks.start(workspace_root, project_file) {
            StartOutcome::AlreadyRunning(task) => {
                info!(task = %task.id, "Watch task already running, not starting another");
                self.workspace.notify(&format!(
                    "A watch task for {} is already running",
                    task.project_name
                ));
            }
            StartOutcome::Started(task) => {
                let request = build_request(&task, watch);
                let host = self.task_host.clone();
                let task_id = task.id;
                self.scheduler.spawn(async move {
                    let result = host.start_build_task(request).await;
                    Inbound::TaskLaunched { task_id, result }
                });
            }
        }
    }

    fn on_task_launched(&mut self, task_id: &str, handle: TaskHandle) {
        if self.tasks.attach_handle(task_id, handle) {
            debug!(task = %task_id, "Watch task launched");
        } else {
            debug!(task = %task_id, "Watch task ended before its launch completed");
        }
    }

    fn on_reattach_answered(
        &mut self,
        disconnected_pid: u32,
        candidate_pid: u32,
        decision: ReattachDecision,
    ) {
        let task_id = self
            .sessions
            .get(disconnected_pid)
            .map(|entry| entry.task_id.clone());
        let task = task_id.as_deref().and_then(|id| self.tasks.get(id));

        match self
            .sessions
            .resolve_reattach(disconnected_pid, candidate_pid, decision, task)
        {
            Ok(Resolution::StopTask { task_id, pid, epoch }) => self.stop_task(&task_id, pid, epoch),
            Ok(Resolution::TaskGone) => {
                debug!(disconnected_pid, "Reattach accepted but the task has ended")
            }
            Ok(Resolution::Stale) => debug!(disconnected_pid, "Stale reattach answer"),
            Ok(_) => {}
            Err(e) => warn!(candidate_pid, error = %e, "Reattach failed"),
        }
    }

    /// Terminates the task owning a disconnected session, then confirms
    /// the stop after the configured delay.
    fn stop_task(&self, task_id: &str, pid: u32, epoch: u64) {
        let handle = self.tasks.get(task_id).and_then(|task| task.handle.clone());
        let host = self.task_host.clone();
        let confirm = Duration::from_millis(self.config.stop_confirm_ms);
        let task_id = task_id.to_string();
        info!(task = %task_id, pid, "Stopping watch task");

        self.scheduler.spawn(async move {
            let terminated = match handle {
                Some(handle) => match host.terminate_task(&handle).await {
                    Ok(()) => {
                        tokio::time::sleep(confirm).await;
                        true
                    }
                    Err(e) => {
                        warn!(task = %task_id, error = %e, "Failed to stop watch task");
                        false
                    }
                },
                None => {
                    warn!(task = %task_id, "Watch task has no handle, cannot stop it");
                    false
                }
            };
            Inbound::StopConfirmed {
                pid,
                epoch,
                terminated,
            }
        });
    }
}
