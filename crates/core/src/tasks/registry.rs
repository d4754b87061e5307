//! Registry of running watch tasks.
//!
//! The TaskRegistry keeps one entry per (workspace, project) pair while its
//! watch process runs. Running processes are correlated back to the task
//! that spawned them by path, not by pid: the runtime process sits several
//! launcher processes below the watch process.

use crate::matcher::path_has_prefix;
use chrono::Utc;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};
use wa_protocol::task_models::{TaskHandle, WatchTask};

/// Source component of every task id.
pub const TASK_SOURCE: &str = "watch-attach";

/// Result of asking the registry to start a task.
#[derive(Debug, Clone, PartialEq)]
pub enum StartOutcome {
    /// A new task was registered; the caller launches its process.
    Started(WatchTask),

    /// A task with the same identity is already running. No process must
    /// be spawned; the caller tells the user.
    AlreadyRunning(WatchTask),
}

/// Tracks in-flight watch tasks keyed by their deterministic id.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: HashMap<String, WatchTask>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derives the task id from the task source, the task name and the
    /// workspace name.
    ///
    /// The task name embeds the project path relative to the workspace
    /// root, so two projects in one workspace never share an id.
    pub fn task_id(workspace_root: &str, project_file: &str) -> String {
        let workspace_name = Path::new(workspace_root)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| workspace_root.to_string());
        format!(
            "{TASK_SOURCE}:{}:{workspace_name}",
            task_name(workspace_root, project_file)
        )
    }

    /// Registers a watch task for `project_file` in `workspace_root`.
    ///
    /// # Returns
    ///
    /// `StartOutcome::AlreadyRunning` with the existing task if one with the
    /// same id is running; the registry is left untouched in that case.
    pub fn start(&mut self, workspace_root: &str, project_file: &str) -> StartOutcome {
        let id = Self::task_id(workspace_root, project_file);

        if let Some(existing) = self.tasks.get(&id) {
            debug!(task = %id, "Watch task already running");
            return StartOutcome::AlreadyRunning(existing.clone());
        }

        let task = WatchTask {
            id: id.clone(),
            workspace_root: workspace_root.to_string(),
            project_file: project_file.to_string(),
            project_name: project_name(project_file),
            process_id: None,
            handle: None,
            started_at: Utc::now(),
        };
        info!(task = %id, project = %task.project_name, "Watch task registered");
        self.tasks.insert(id, task.clone());

        StartOutcome::Started(task)
    }

    /// Records the pid of the task's watch process.
    ///
    /// A later call for the same task overwrites the pid: the most recent
    /// spawn wins. Returns false for unknown tasks.
    pub fn on_process_started(&mut self, task_id: &str, pid: u32) -> bool {
        match self.tasks.get_mut(task_id) {
            Some(task) => {
                if let Some(previous) = task.process_id.replace(pid) {
                    debug!(task = %task_id, previous, pid, "Watch process respawned");
                }
                true
            }
            None => {
                debug!(task = %task_id, pid, "Process started for unknown task");
                false
            }
        }
    }

    /// Stores the handle returned by the task host.
    pub fn attach_handle(&mut self, task_id: &str, handle: TaskHandle) -> bool {
        match self.tasks.get_mut(task_id) {
            Some(task) => {
                task.handle = Some(handle);
                true
            }
            None => false,
        }
    }

    /// Removes an ended task.
    ///
    /// Debug sessions attached to the task's processes are not touched;
    /// they disconnect on their own when the process goes away.
    pub fn on_task_ended(&mut self, task_id: &str) -> Option<WatchTask> {
        let removed = self.tasks.remove(task_id);
        if removed.is_some() {
            info!(task = %task_id, "Watch task ended");
        }
        removed
    }

    /// Finds the task whose project folder is a path prefix of `path`.
    ///
    /// When project folders are nested, the deepest folder wins.
    pub fn find_by_process_path_prefix(&self, path: &str) -> Option<&WatchTask> {
        self.tasks
            .values()
            .filter_map(|task| {
                let folder = project_folder(&task.project_file);
                path_has_prefix(path, &folder).then_some((folder.len(), task))
            })
            .max_by(|(a_len, a), (b_len, b)| a_len.cmp(b_len).then_with(|| b.id.cmp(&a.id)))
            .map(|(_, task)| task)
    }

    pub fn get(&self, task_id: &str) -> Option<&WatchTask> {
        self.tasks.get(task_id)
    }

    /// Tasks whose watch process pid is known.
    pub fn tasks_with_pid(&self) -> impl Iterator<Item = &WatchTask> {
        self.tasks.values().filter(|task| task.process_id.is_some())
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Removes and returns every task.
    pub fn drain(&mut self) -> Vec<WatchTask> {
        self.tasks.drain().map(|(_, task)| task).collect()
    }
}

fn task_name(workspace_root: &str, project_file: &str) -> String {
    let relative = Path::new(project_file)
        .strip_prefix(workspace_root)
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|_| project_file.to_string());
    format!("Watch {}", relative.replace('\\', "/"))
}

/// Project display name: the project file stem.
pub fn project_name(project_file: &str) -> String {
    let normalized = project_file.replace('\\', "/");
    Path::new(&normalized)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or(normalized)
}

/// Folder containing the project file.
pub fn project_folder(project_file: &str) -> String {
    let normalized = project_file.replace('\\', "/");
    match normalized.rfind('/') {
        Some(index) => normalized[..index].to_string(),
        None => String::new(),
    }
}
